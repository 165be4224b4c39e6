pub mod local;
pub mod lock;
pub mod remote;

pub use local::LocalStore;
pub use lock::{DirLock, LockError};
pub use remote::{RemoteBackend, RemoteStore};

use std::path::PathBuf;

use uuid::Uuid;

use crate::model::{
    Profile, Project, ProjectId, ProjectPatch, Task, TaskDraft, TaskId, TaskPatch, UserId,
};

/// Error type for store adapter operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not signed in")]
    NotAuthenticated,
    #[error("no such record: {0}")]
    NotFound(Uuid),
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed store data: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("backend rejected the call: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, StoreError::NotAuthenticated)
    }
}

/// Store adapter contract, implemented by both the local and remote
/// variants. Creation calls take fields rather than entities; the adapter
/// assigns identity and timestamps and returns the confirmed record, which
/// the caller reconciles against its optimistic placeholder.
pub trait ProjectStore {
    /// All projects for `owner`. The remote variant filters to the owner
    /// and orders by creation time descending; the local variant returns
    /// the full stored set.
    fn list_projects(&mut self, owner: UserId) -> Result<Vec<Project>, StoreError>;

    fn create_project(
        &mut self,
        owner: UserId,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, StoreError>;

    fn update_project(
        &mut self,
        id: ProjectId,
        patch: &ProjectPatch,
    ) -> Result<Project, StoreError>;

    /// Deletes the project and, by cascade, all its tasks. Deleting an
    /// absent project is a no-op.
    fn delete_project(&mut self, id: ProjectId) -> Result<(), StoreError>;

    fn add_task(&mut self, project_id: ProjectId, draft: &TaskDraft) -> Result<Task, StoreError>;

    /// Task ids are unique across projects, so updates address the task
    /// directly without naming its project.
    fn update_task(&mut self, task_id: TaskId, patch: &TaskPatch) -> Result<Task, StoreError>;

    /// Deleting an absent task is a no-op.
    fn delete_task(&mut self, task_id: TaskId) -> Result<(), StoreError>;
}

/// Profile persistence, parallel to the project contract
pub trait ProfileStore {
    fn load_profile(&mut self, owner: UserId) -> Result<Option<Profile>, StoreError>;
    fn save_profile(&mut self, profile: &Profile) -> Result<Profile, StoreError>;
}

/// Combined adapter surface held by the session
pub trait Store: ProjectStore + ProfileStore {}

impl<T: ProjectStore + ProfileStore> Store for T {}

/// A resolved account from the external identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub email: Option<String>,
}

/// External identity/session provider, consulted by the remote adapter
/// before every call
pub trait Identity {
    /// The signed-in account, if any
    fn current_user(&self) -> Option<UserAccount>;
}
