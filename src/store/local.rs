use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::model::{Profile, Project, ProjectId, ProjectPatch, Task, TaskDraft, TaskId, TaskPatch, UserId};
use crate::store::lock::DirLock;
use crate::store::{ProfileStore, ProjectStore, StoreError};

/// Slot holding the full project collection, tasks embedded
pub const PROJECTS_SLOT: &str = "projects.json";
/// Slot holding the single local profile
pub const PROFILE_SLOT: &str = "profile.json";

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Store adapter backed by JSON slots in a local directory.
///
/// The whole collection is kept in memory and re-serialized on every
/// mutation; writes go through a temp file rename so a crash never leaves
/// a half-written slot. An advisory lock on the directory is held for the
/// lifetime of the store.
pub struct LocalStore {
    dir: PathBuf,
    projects: Vec<Project>,
    profile: Option<Profile>,
    _lock: DirLock,
}

impl LocalStore {
    /// Open (creating if needed) the data directory and load both slots.
    pub fn open(dir: impl Into<PathBuf>) -> Result<LocalStore, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::Write {
            path: dir.clone(),
            source: e,
        })?;
        let lock = DirLock::acquire(&dir, LOCK_TIMEOUT)?;

        let projects = read_slot(&dir.join(PROJECTS_SLOT))?.unwrap_or_default();
        let profile = read_slot(&dir.join(PROFILE_SLOT))?;
        Ok(LocalStore {
            dir,
            projects,
            profile,
            _lock: lock,
        })
    }

    fn persist_projects(&self) -> Result<(), StoreError> {
        write_slot(&self.dir.join(PROJECTS_SLOT), &self.projects)
    }

    fn project_mut(&mut self, id: ProjectId) -> Result<&mut Project, StoreError> {
        self.projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    /// Locate a task across all projects. Task ids are unique store-wide.
    fn task_position(&self, task_id: TaskId) -> Option<(usize, usize)> {
        self.projects.iter().enumerate().find_map(|(pi, project)| {
            project
                .tasks
                .iter()
                .position(|t| t.id == task_id)
                .map(|ti| (pi, ti))
        })
    }
}

impl ProjectStore for LocalStore {
    fn list_projects(&mut self, _owner: UserId) -> Result<Vec<Project>, StoreError> {
        Ok(self.projects.clone())
    }

    fn create_project(
        &mut self,
        owner: UserId,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, StoreError> {
        let project = Project::new(owner, name, description.map(str::to_string), Utc::now());
        self.projects.push(project.clone());
        self.persist_projects()?;
        Ok(project)
    }

    fn update_project(
        &mut self,
        id: ProjectId,
        patch: &ProjectPatch,
    ) -> Result<Project, StoreError> {
        let now = Utc::now();
        let project = self.project_mut(id)?;
        project.apply(patch, now);
        let confirmed = project.clone();
        self.persist_projects()?;
        Ok(confirmed)
    }

    fn delete_project(&mut self, id: ProjectId) -> Result<(), StoreError> {
        let before = self.projects.len();
        self.projects.retain(|p| p.id != id);
        if self.projects.len() != before {
            self.persist_projects()?;
        }
        Ok(())
    }

    fn add_task(&mut self, project_id: ProjectId, draft: &TaskDraft) -> Result<Task, StoreError> {
        let now = Utc::now();
        let project = self.project_mut(project_id)?;
        let task = Task::new(project_id, draft.clone(), now);
        project.tasks.push(task.clone());
        self.persist_projects()?;
        Ok(task)
    }

    fn update_task(&mut self, task_id: TaskId, patch: &TaskPatch) -> Result<Task, StoreError> {
        let now = Utc::now();
        let (pi, ti) = self
            .task_position(task_id)
            .ok_or(StoreError::NotFound(task_id))?;
        let project = &mut self.projects[pi];
        project.tasks[ti].apply(patch, now);
        let confirmed = project.tasks[ti].clone();
        self.persist_projects()?;
        Ok(confirmed)
    }

    fn delete_task(&mut self, task_id: TaskId) -> Result<(), StoreError> {
        if let Some((pi, ti)) = self.task_position(task_id) {
            self.projects[pi].tasks.remove(ti);
            self.persist_projects()?;
        }
        Ok(())
    }
}

impl ProfileStore for LocalStore {
    fn load_profile(&mut self, owner: UserId) -> Result<Option<Profile>, StoreError> {
        Ok(self
            .profile
            .as_ref()
            .filter(|p| p.user_id == owner)
            .cloned())
    }

    fn save_profile(&mut self, profile: &Profile) -> Result<Profile, StoreError> {
        write_slot(&self.dir.join(PROFILE_SLOT), profile)?;
        self.profile = Some(profile.clone());
        Ok(profile.clone())
    }
}

/// Read a JSON slot. A missing file is `None`; a malformed one is an error.
fn read_slot<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    Ok(Some(serde_json::from_str(&content)?))
}

fn write_slot<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(value)?;
    atomic_write(path, &content).map_err(|e| StoreError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write file contents atomically: write to a temp file in the same
/// directory, then rename over the target.
fn atomic_write(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
