use log::debug;

use crate::model::{
    Profile, Project, ProjectId, ProjectPatch, Task, TaskDraft, TaskId, TaskPatch, UserId,
};
use crate::store::{Identity, ProfileStore, ProjectStore, StoreError, UserAccount};

/// Black-box transport to the remote CRUD API.
///
/// Rows are shaped exactly like the entities. The backend performs no
/// identity resolution or scoping of its own; the adapter passes the
/// resolved owner where the API needs it.
pub trait RemoteBackend {
    fn fetch_projects(&mut self, owner: UserId) -> Result<Vec<Project>, StoreError>;
    fn insert_project(
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
    fn delete_project(&mut self, id: ProjectId) -> Result<(), StoreError>;
    fn insert_task(
        &mut self,
        project_id: ProjectId,
        draft: &TaskDraft,
    ) -> Result<Task, StoreError>;
    fn update_task(&mut self, task_id: TaskId, patch: &TaskPatch) -> Result<Task, StoreError>;
    fn delete_task(&mut self, task_id: TaskId) -> Result<(), StoreError>;
    fn fetch_profile(&mut self, owner: UserId) -> Result<Option<Profile>, StoreError>;
    fn upsert_profile(&mut self, profile: &Profile) -> Result<Profile, StoreError>;
}

/// Store adapter over a remote CRUD API, scoped to the authenticated user.
///
/// Every call resolves the identity first; without one it fails with
/// `StoreError::NotAuthenticated` and the backend is never contacted. The
/// owner argument of the contract is superseded by the resolved identity.
pub struct RemoteStore {
    backend: Box<dyn RemoteBackend>,
    identity: Box<dyn Identity>,
}

impl RemoteStore {
    pub fn new(backend: Box<dyn RemoteBackend>, identity: Box<dyn Identity>) -> Self {
        RemoteStore { backend, identity }
    }

    fn user(&self) -> Result<UserAccount, StoreError> {
        self.identity
            .current_user()
            .ok_or(StoreError::NotAuthenticated)
    }
}

impl ProjectStore for RemoteStore {
    fn list_projects(&mut self, _owner: UserId) -> Result<Vec<Project>, StoreError> {
        let user = self.user()?;
        let mut projects = self.backend.fetch_projects(user.id)?;
        // newest first, regardless of backend ordering
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!("fetched {} projects for {}", projects.len(), user.id);
        Ok(projects)
    }

    fn create_project(
        &mut self,
        _owner: UserId,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, StoreError> {
        let user = self.user()?;
        self.backend.insert_project(user.id, name, description)
    }

    fn update_project(
        &mut self,
        id: ProjectId,
        patch: &ProjectPatch,
    ) -> Result<Project, StoreError> {
        self.user()?;
        self.backend.update_project(id, patch)
    }

    fn delete_project(&mut self, id: ProjectId) -> Result<(), StoreError> {
        self.user()?;
        self.backend.delete_project(id)
    }

    fn add_task(&mut self, project_id: ProjectId, draft: &TaskDraft) -> Result<Task, StoreError> {
        self.user()?;
        self.backend.insert_task(project_id, draft)
    }

    fn update_task(&mut self, task_id: TaskId, patch: &TaskPatch) -> Result<Task, StoreError> {
        self.user()?;
        self.backend.update_task(task_id, patch)
    }

    fn delete_task(&mut self, task_id: TaskId) -> Result<(), StoreError> {
        self.user()?;
        self.backend.delete_task(task_id)
    }
}

impl ProfileStore for RemoteStore {
    fn load_profile(&mut self, _owner: UserId) -> Result<Option<Profile>, StoreError> {
        let user = self.user()?;
        self.backend.fetch_profile(user.id)
    }

    fn save_profile(&mut self, profile: &Profile) -> Result<Profile, StoreError> {
        self.user()?;
        self.backend.upsert_profile(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    struct FakeIdentity(Option<UserAccount>);

    impl Identity for FakeIdentity {
        fn current_user(&self) -> Option<UserAccount> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        projects: Vec<Project>,
        calls: usize,
    }

    impl RemoteBackend for FakeBackend {
        fn fetch_projects(&mut self, owner: UserId) -> Result<Vec<Project>, StoreError> {
            self.calls += 1;
            Ok(self
                .projects
                .iter()
                .filter(|p| p.user_id == owner)
                .cloned()
                .collect())
        }

        fn insert_project(
            &mut self,
            owner: UserId,
            name: &str,
            description: Option<&str>,
        ) -> Result<Project, StoreError> {
            self.calls += 1;
            let project = Project::new(owner, name, description.map(str::to_string), Utc::now());
            self.projects.push(project.clone());
            Ok(project)
        }

        fn update_project(
            &mut self,
            id: ProjectId,
            _patch: &ProjectPatch,
        ) -> Result<Project, StoreError> {
            Err(StoreError::NotFound(id))
        }

        fn delete_project(&mut self, _id: ProjectId) -> Result<(), StoreError> {
            Ok(())
        }

        fn insert_task(
            &mut self,
            project_id: ProjectId,
            draft: &TaskDraft,
        ) -> Result<Task, StoreError> {
            Ok(Task::new(project_id, draft.clone(), Utc::now()))
        }

        fn update_task(&mut self, task_id: TaskId, _patch: &TaskPatch) -> Result<Task, StoreError> {
            Err(StoreError::NotFound(task_id))
        }

        fn delete_task(&mut self, _task_id: TaskId) -> Result<(), StoreError> {
            Ok(())
        }

        fn fetch_profile(&mut self, _owner: UserId) -> Result<Option<Profile>, StoreError> {
            Ok(None)
        }

        fn upsert_profile(&mut self, profile: &Profile) -> Result<Profile, StoreError> {
            Ok(profile.clone())
        }
    }

    fn signed_in(user: UserId) -> Box<FakeIdentity> {
        Box::new(FakeIdentity(Some(UserAccount {
            id: user,
            email: Some("ada@example.com".into()),
        })))
    }

    #[test]
    fn test_unauthenticated_calls_never_reach_the_backend() {
        let mut store = RemoteStore::new(
            Box::new(FakeBackend::default()),
            Box::new(FakeIdentity(None)),
        );
        assert!(matches!(
            store.list_projects(Uuid::new_v4()),
            Err(StoreError::NotAuthenticated)
        ));
        assert!(matches!(
            store.create_project(Uuid::new_v4(), "Thesis", None),
            Err(StoreError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_list_scopes_to_identity_and_orders_newest_first() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let base = Utc::now();

        let mut backend = FakeBackend::default();
        for (i, owner) in [(0, user), (1, other), (2, user)] {
            let mut project = Project::new(owner, format!("p{i}"), None, base);
            project.created_at = base + Duration::minutes(i);
            backend.projects.push(project);
        }

        let mut store = RemoteStore::new(Box::new(backend), signed_in(user));
        // the caller-passed owner is superseded by the resolved identity
        let projects = store.list_projects(other).unwrap();
        let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["p2", "p0"]);
    }

    #[test]
    fn test_create_uses_identity_owner() {
        let user = Uuid::new_v4();
        let mut store = RemoteStore::new(Box::new(FakeBackend::default()), signed_in(user));
        let project = store
            .create_project(Uuid::new_v4(), "Thesis", Some("final paper"))
            .unwrap();
        assert_eq!(project.user_id, user);
    }
}
