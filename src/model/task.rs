use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::project::ProjectId;

/// Unique task identifier (client-generated v4, may be replaced by a
/// store-assigned id on reconciliation).
pub type TaskId = Uuid;

/// Experience reward assigned to a task when none is given explicitly.
pub const DEFAULT_XP_REWARD: u32 = 10;

/// Kanban status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// All statuses in canonical board order
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    /// The serialized slug for this status
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }

    /// Parse a status slug
    pub fn from_str(s: &str) -> Option<TaskStatus> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "in-progress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }

    /// Default column heading shown for this status
    pub fn title(self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }
}

/// A task nested under exactly one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Owning project (lookup key, never an object reference)
    pub project_id: ProjectId,
    /// Short title, never empty
    pub title: String,
    pub description: Option<String>,
    /// Free-form markdown notes
    pub notes: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    /// Experience granted when the task is completed
    pub xp_reward: u32,
    /// Accumulated focused minutes, only ever added to
    pub focus_time: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Materialize a draft into a task owned by `project_id`.
    pub fn new(project_id: ProjectId, draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Task {
            id: Uuid::new_v4(),
            project_id,
            title: draft.title,
            description: draft.description,
            notes: draft.notes,
            deadline: draft.deadline,
            status: draft.status,
            xp_reward: draft.xp_reward,
            focus_time: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch into this task. Absent patch fields are left untouched;
    /// any applied field bumps `updated_at`.
    pub fn apply(&mut self, patch: &TaskPatch, now: DateTime<Utc>) {
        if patch.is_empty() {
            return;
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = Some(deadline);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(xp_reward) = patch.xp_reward {
            self.xp_reward = xp_reward;
        }
        if let Some(focus_time) = patch.focus_time {
            self.focus_time = focus_time;
        }
        self.updated_at = now;
    }

    /// Deadline passed and the task is not done
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(deadline) => deadline < now && self.status != TaskStatus::Done,
            None => false,
        }
    }

    /// Deadline falls on the current UTC calendar day
    pub fn is_due_today(&self, now: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(deadline) => {
                deadline.year() == now.year() && deadline.ordinal() == now.ordinal()
            }
            None => false,
        }
    }
}

/// Fields for creating a task, before it has identity or timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub xp_reward: u32,
}

impl TaskDraft {
    /// Draft with the given title, status `todo`, and the default reward
    pub fn new(title: impl Into<String>) -> Self {
        TaskDraft {
            title: title.into(),
            description: None,
            notes: None,
            deadline: None,
            status: TaskStatus::Todo,
            xp_reward: DEFAULT_XP_REWARD,
        }
    }
}

/// Field-level merge patch for a task. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xp_reward: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_time: Option<u32>,
}

impl TaskPatch {
    /// Patch that only moves the task to `status`
    pub fn status(status: TaskStatus) -> Self {
        TaskPatch {
            status: Some(status),
            ..TaskPatch::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }
}
