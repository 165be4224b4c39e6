use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::profile::UserId;
use crate::model::task::{Task, TaskId, TaskStatus};

/// Unique project identifier
pub type ProjectId = Uuid;

/// A project and the ordered tasks it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    /// Owning user; the nil UUID for the anonymous local owner
    pub user_id: UserId,
    /// Display name, never empty
    pub name: String,
    pub description: Option<String>,
    /// Tasks in insertion order
    pub tasks: Vec<Task>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        user_id: UserId,
        name: impl Into<String>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Project {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            description,
            tasks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch into this project, bumping `updated_at`.
    pub fn apply(&mut self, patch: &ProjectPatch, now: DateTime<Utc>) {
        if patch.name.is_none() && patch.description.is_none() {
            return;
        }
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        self.updated_at = now;
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Remove a task, returning it with its former position.
    pub fn remove_task(&mut self, id: TaskId) -> Option<(usize, Task)> {
        let idx = self.tasks.iter().position(|t| t.id == id)?;
        Some((idx, self.tasks.remove(idx)))
    }

    /// Tasks currently in the given status, in insertion order
    pub fn tasks_with_status(&self, status: TaskStatus) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.status == status)
    }

    pub fn status_count(&self, status: TaskStatus) -> usize {
        self.tasks_with_status(status).count()
    }

    /// Completed share of the task list as a whole percentage; 0 when empty
    pub fn completion_percent(&self) -> u8 {
        if self.tasks.is_empty() {
            return 0;
        }
        let done = self.status_count(TaskStatus::Done);
        ((done as f64 / self.tasks.len() as f64) * 100.0).round() as u8
    }

    /// Up to `limit` unfinished tasks with deadlines, soonest first
    pub fn upcoming_deadlines(&self, limit: usize) -> Vec<&Task> {
        let mut upcoming: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.deadline.is_some() && t.status != TaskStatus::Done)
            .collect();
        upcoming.sort_by_key(|t| t.deadline);
        upcoming.truncate(limit);
        upcoming
    }
}

/// Field-level merge patch for a project. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }

    pub fn rename(name: impl Into<String>) -> Self {
        ProjectPatch {
            name: Some(name.into()),
            description: None,
        }
    }
}
