//! One running instance of the tracker core.
//!
//! A session owns the store adapter, the optimistic project state, the
//! profile, and the board configuration. Mutations go through the session
//! so every optimistic change is driven to the store and reconciled before
//! the call returns, and so completing a task banks its reward.

use chrono::{DateTime, Utc};
use log::{debug, info};
use uuid::Uuid;

use crate::board::{Board, BoardError, TaskMove};
use crate::breakdown;
use crate::model::{
    AppConfig, Profile, ProjectId, ProjectPatch, RollbackPolicy, StoreBackend, TaskDraft, TaskId,
    TaskPatch, TaskStatus,
};
use crate::state::{
    ProfileState, ProjectsState, StoreReply, SyncOutcome, ValidationError, execute,
};
use crate::store::{
    Identity, LocalStore, RemoteBackend, RemoteStore, Store, StoreError, UserAccount,
};
use crate::xp;

/// Error establishing a session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("configured backend is remote but no backend and identity were supplied")]
    MissingRemote,
    #[error("a remote session requires a signed-in user")]
    SignedOut,
}

/// Error from a session mutation. Validation errors mean nothing changed;
/// persistence errors mean the optimistic change failed to settle and was
/// handled per the rollback policy.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("could not save changes: {0}")]
    Persistence(#[from] StoreError),
}

/// User-facing notices queued by mutations, drained by the embedder
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A task reached done and its reward was added to the profile
    TaskCompleted { title: String, xp: u32 },
}

/// Container for everything one user works against
pub struct Session {
    config: AppConfig,
    account: UserAccount,
    board: Board,
    store: Box<dyn Store>,
    projects: ProjectsState,
    profile: ProfileState,
    notices: Vec<Notice>,
}

impl Session {
    /// Session against the local JSON-slot store. Local writes are kept on
    /// failure; there is no separate authority to reconcile against.
    pub fn local(config: AppConfig) -> Result<Session, SessionError> {
        let store = LocalStore::open(config.store.data_dir())?;
        let account = UserAccount {
            id: Uuid::nil(),
            email: None,
        };
        Session::assemble(config, Box::new(store), account, RollbackPolicy::Keep, false)
    }

    /// Session against a remote backend. The identity provider must have a
    /// signed-in user; that account owns everything the session touches.
    pub fn remote(
        config: AppConfig,
        backend: Box<dyn RemoteBackend>,
        identity: Box<dyn Identity>,
    ) -> Result<Session, SessionError> {
        let account = identity.current_user().ok_or(SessionError::SignedOut)?;
        let policy = config.sync.rollback;
        let store = RemoteStore::new(backend, identity);
        Session::assemble(config, Box::new(store), account, policy, true)
    }

    /// Pick the adapter the configuration names. Remote parts are only
    /// needed when the configured backend is remote.
    pub fn bootstrap(
        config: AppConfig,
        remote: Option<(Box<dyn RemoteBackend>, Box<dyn Identity>)>,
    ) -> Result<Session, SessionError> {
        match config.store.backend {
            StoreBackend::Local => Session::local(config),
            StoreBackend::Remote => {
                let (backend, identity) = remote.ok_or(SessionError::MissingRemote)?;
                Session::remote(config, backend, identity)
            }
        }
    }

    /// Session over a caller-supplied store, for embedders with their own
    /// persistence. The rollback policy and project ordering follow the
    /// configured backend kind.
    pub fn with_store(
        config: AppConfig,
        store: Box<dyn Store>,
        account: UserAccount,
    ) -> Result<Session, SessionError> {
        let policy = config.sync.rollback;
        let newest_first = config.store.backend == StoreBackend::Remote;
        Session::assemble(config, store, account, policy, newest_first)
    }

    fn assemble(
        config: AppConfig,
        store: Box<dyn Store>,
        account: UserAccount,
        policy: RollbackPolicy,
        newest_first: bool,
    ) -> Result<Session, SessionError> {
        let board = Board::new(config.board.columns.clone())?;
        let projects = ProjectsState::new(account.id, policy, newest_first);
        Ok(Session {
            config,
            account,
            board,
            store,
            projects,
            profile: ProfileState::new(),
            notices: Vec::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn account(&self) -> &UserAccount {
        &self.account
    }

    /// Read access to the optimistic project collection
    pub fn projects(&self) -> &ProjectsState {
        &self.projects
    }

    /// Drain queued notices, oldest first
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Replace local state with the store's current collection. A signed-out
    /// remote session quietly presents an empty collection instead of
    /// failing; everything else surfaces as an error.
    pub fn refresh(&mut self) -> Result<(), SyncError> {
        match self.store.list_projects(self.account.id) {
            Ok(projects) => {
                info!("loaded {} projects", projects.len());
                self.projects.replace_all(projects);
                Ok(())
            }
            Err(e) if e.is_not_authenticated() => {
                debug!("not signed in; presenting an empty collection");
                self.projects.replace_all(Vec::new());
                Ok(())
            }
            Err(e) => Err(SyncError::Persistence(e)),
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Create a project and settle the write. Returns the confirmed id.
    pub fn create_project(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<ProjectId, SyncError> {
        let id = self.projects.create_project(name, description, Utc::now())?;
        for reply in self.drive()? {
            if let StoreReply::Project(project) = reply {
                return Ok(project.id);
            }
        }
        Ok(id)
    }

    pub fn update_project(&mut self, id: ProjectId, patch: ProjectPatch) -> Result<(), SyncError> {
        self.projects.update_project(id, patch, Utc::now())?;
        self.drive()?;
        Ok(())
    }

    pub fn delete_project(&mut self, id: ProjectId) -> Result<(), SyncError> {
        self.projects.delete_project(id);
        self.drive()?;
        Ok(())
    }

    /// Add a task. Returns the confirmed task id, or `None` when the
    /// project no longer exists.
    pub fn add_task(
        &mut self,
        project_id: ProjectId,
        draft: TaskDraft,
    ) -> Result<Option<TaskId>, SyncError> {
        let Some(id) = self.projects.add_task(project_id, draft, Utc::now())? else {
            return Ok(None);
        };
        for reply in self.drive()? {
            if let StoreReply::Task(task) = reply {
                return Ok(Some(task.id));
            }
        }
        Ok(Some(id))
    }

    /// Patch a task and settle the write. Moving a task into `done` from
    /// any other status banks its reward on the profile and queues a
    /// completion notice.
    pub fn update_task(
        &mut self,
        project_id: ProjectId,
        task_id: TaskId,
        patch: TaskPatch,
    ) -> Result<(), SyncError> {
        let completion = self
            .projects
            .get_task(project_id, task_id)
            .filter(|task| {
                patch.status == Some(TaskStatus::Done) && task.status != TaskStatus::Done
            })
            .map(|task| (task.title.clone(), task.xp_reward));

        self.projects
            .update_task(project_id, task_id, patch, Utc::now())?;
        self.drive()?;

        if let Some((title, reward)) = completion {
            self.award_completion(title, reward)?;
        }
        Ok(())
    }

    pub fn delete_task(&mut self, project_id: ProjectId, task_id: TaskId) -> Result<(), SyncError> {
        self.projects.delete_task(project_id, task_id);
        self.drive()?;
        Ok(())
    }

    /// Apply a move produced by the drag engine. A move whose task has
    /// vanished in the meantime is dropped quietly.
    pub fn apply_move(&mut self, task_move: TaskMove) -> Result<(), SyncError> {
        let Some(project_id) = self.projects.project_of(task_move.task_id) else {
            debug!("dropping move for unknown task {}", task_move.task_id);
            return Ok(());
        };
        self.update_task(
            project_id,
            task_move.task_id,
            TaskPatch::status(task_move.status),
        )
    }

    /// Record a finished focus session: the minutes go to the task's
    /// counter and to the profile's lifetime total.
    pub fn record_focus(
        &mut self,
        project_id: ProjectId,
        task_id: TaskId,
        minutes: u32,
    ) -> Result<(), SyncError> {
        let now = Utc::now();
        if !self.projects.add_focus_minutes(project_id, task_id, minutes, now) {
            return Ok(());
        }
        self.drive()?;
        self.ensure_profile(now)?;
        self.profile
            .add_focus_minutes(self.store.as_mut(), minutes, now)?;
        Ok(())
    }

    /// Create tasks for accepted breakdown suggestions. Returns how many
    /// were created.
    pub fn add_breakdown_tasks(
        &mut self,
        project_id: ProjectId,
        source: &str,
        suggestions: &[String],
    ) -> Result<usize, SyncError> {
        let drafts = breakdown::drafts_from_suggestions(source, suggestions, Utc::now());
        let mut created = 0;
        for draft in drafts {
            if self.add_task(project_id, draft)?.is_some() {
                created += 1;
            }
        }
        info!("added {created} generated subtasks");
        Ok(created)
    }

    /// The session owner's profile, created on first access
    pub fn profile(&mut self) -> Result<&Profile, SyncError> {
        let profile = self
            .profile
            .load_or_create(self.store.as_mut(), &self.account, Utc::now())?;
        Ok(profile)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Run queued store writes to completion. Later commands still run
    /// when an earlier one fails; the first failure is the one reported.
    fn drive(&mut self) -> Result<Vec<StoreReply>, SyncError> {
        let mut replies = Vec::new();
        let mut first_failure = None;
        while let Some(command) = self.projects.next_command() {
            let ticket = command.ticket();
            let result = execute(self.store.as_mut(), command);
            if let Ok(reply) = &result {
                replies.push(reply.clone());
            }
            if let SyncOutcome::Failed { error, .. } = self.projects.resolve(ticket, result) {
                first_failure.get_or_insert(error);
            }
        }
        match first_failure {
            Some(error) => Err(SyncError::Persistence(error)),
            None => Ok(replies),
        }
    }

    fn ensure_profile(&mut self, now: DateTime<Utc>) -> Result<(), SyncError> {
        self.profile
            .load_or_create(self.store.as_mut(), &self.account, now)?;
        Ok(())
    }

    fn award_completion(&mut self, title: String, reward: u32) -> Result<(), SyncError> {
        let now = Utc::now();
        self.ensure_profile(now)?;
        self.profile.add_xp(self.store.as_mut(), reward, now)?;
        self.profile
            .award_badge(self.store.as_mut(), xp::FIRST_TASK, now)?;
        info!("task completed: {title} (+{reward} xp)");
        self.notices.push(Notice::TaskCompleted { title, xp: reward });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{DragState, DropTarget};
    use crate::model::Project;
    use tempfile::TempDir;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.store.dir = Some(dir.to_path_buf());
        config
    }

    /// Store whose reads work but whose writes always fail
    struct ReadOnlyStore(Vec<Project>);

    impl crate::store::ProjectStore for ReadOnlyStore {
        fn list_projects(&mut self, _owner: Uuid) -> Result<Vec<Project>, StoreError> {
            Ok(self.0.clone())
        }
        fn create_project(
            &mut self,
            _owner: Uuid,
            _name: &str,
            _description: Option<&str>,
        ) -> Result<Project, StoreError> {
            Err(StoreError::Backend("read-only".into()))
        }
        fn update_project(
            &mut self,
            _id: ProjectId,
            _patch: &ProjectPatch,
        ) -> Result<Project, StoreError> {
            Err(StoreError::Backend("read-only".into()))
        }
        fn delete_project(&mut self, _id: ProjectId) -> Result<(), StoreError> {
            Err(StoreError::Backend("read-only".into()))
        }
        fn add_task(
            &mut self,
            _project_id: ProjectId,
            _draft: &TaskDraft,
        ) -> Result<crate::model::Task, StoreError> {
            Err(StoreError::Backend("read-only".into()))
        }
        fn update_task(
            &mut self,
            _task_id: TaskId,
            _patch: &TaskPatch,
        ) -> Result<crate::model::Task, StoreError> {
            Err(StoreError::Backend("read-only".into()))
        }
        fn delete_task(&mut self, _task_id: TaskId) -> Result<(), StoreError> {
            Err(StoreError::Backend("read-only".into()))
        }
    }

    impl crate::store::ProfileStore for ReadOnlyStore {
        fn load_profile(&mut self, _owner: Uuid) -> Result<Option<Profile>, StoreError> {
            Ok(None)
        }
        fn save_profile(&mut self, _profile: &Profile) -> Result<Profile, StoreError> {
            Err(StoreError::Backend("read-only".into()))
        }
    }

    #[test]
    fn test_local_round_trip_persists_projects_and_tasks() {
        let tmp = TempDir::new().unwrap();
        let project_id;
        {
            let mut session = Session::local(config_in(tmp.path())).unwrap();
            session.refresh().unwrap();
            project_id = session.create_project("Thesis", Some("final paper")).unwrap();
            session
                .add_task(project_id, TaskDraft::new("Draft outline"))
                .unwrap()
                .unwrap();
            assert!(session.projects().is_settled());
        }
        let mut session = Session::local(config_in(tmp.path())).unwrap();
        session.refresh().unwrap();
        let project = session.projects().get(project_id).unwrap();
        assert_eq!(project.name, "Thesis");
        assert_eq!(project.tasks.len(), 1);
        assert_eq!(project.tasks[0].title, "Draft outline");
    }

    #[test]
    fn test_completing_a_task_banks_xp_and_first_badge() {
        let tmp = TempDir::new().unwrap();
        let mut session = Session::local(config_in(tmp.path())).unwrap();
        let project_id = session.create_project("Thesis", None).unwrap();
        let task_id = session
            .add_task(project_id, TaskDraft::new("Draft outline"))
            .unwrap()
            .unwrap();

        session
            .update_task(project_id, task_id, TaskPatch::status(TaskStatus::Done))
            .unwrap();

        let profile = session.profile().unwrap();
        assert_eq!(profile.xp, 10);
        assert!(profile.has_badge(xp::FIRST_TASK));
        assert_eq!(
            session.take_notices(),
            vec![Notice::TaskCompleted {
                title: "Draft outline".into(),
                xp: 10
            }]
        );
        // drained
        assert!(session.take_notices().is_empty());
    }

    #[test]
    fn test_done_to_done_does_not_award_again() {
        let tmp = TempDir::new().unwrap();
        let mut session = Session::local(config_in(tmp.path())).unwrap();
        let project_id = session.create_project("Thesis", None).unwrap();
        let task_id = session
            .add_task(project_id, TaskDraft::new("Draft outline"))
            .unwrap()
            .unwrap();

        session
            .update_task(project_id, task_id, TaskPatch::status(TaskStatus::Done))
            .unwrap();
        session
            .update_task(project_id, task_id, TaskPatch::status(TaskStatus::Done))
            .unwrap();
        assert_eq!(session.profile().unwrap().xp, 10);

        // leaving done and completing again is a fresh completion
        session
            .update_task(project_id, task_id, TaskPatch::status(TaskStatus::Todo))
            .unwrap();
        session
            .update_task(project_id, task_id, TaskPatch::status(TaskStatus::Done))
            .unwrap();
        assert_eq!(session.profile().unwrap().xp, 20);
    }

    #[test]
    fn test_drag_to_done_flows_through_the_board() {
        let tmp = TempDir::new().unwrap();
        let mut session = Session::local(config_in(tmp.path())).unwrap();
        let project_id = session.create_project("Thesis", None).unwrap();
        let task_id = session
            .add_task(project_id, TaskDraft::new("Draft outline"))
            .unwrap()
            .unwrap();

        let mut drag = DragState::new();
        drag.drag_start(task_id);
        let tasks = session.projects().get(project_id).unwrap().tasks.clone();
        let task_move = drag
            .drag_end(
                session.board(),
                Some(DropTarget::Column(TaskStatus::Done)),
                &tasks,
            )
            .unwrap();
        session.apply_move(task_move).unwrap();

        let task = session.projects().get_task(project_id, task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(session.take_notices().len(), 1);
    }

    #[test]
    fn test_record_focus_updates_task_and_profile() {
        let tmp = TempDir::new().unwrap();
        let mut session = Session::local(config_in(tmp.path())).unwrap();
        let project_id = session.create_project("Thesis", None).unwrap();
        let task_id = session
            .add_task(project_id, TaskDraft::new("Draft outline"))
            .unwrap()
            .unwrap();

        session.record_focus(project_id, task_id, 25).unwrap();
        session.record_focus(project_id, task_id, 4).unwrap();

        let task = session.projects().get_task(project_id, task_id).unwrap();
        assert_eq!(task.focus_time, 29);
        assert_eq!(session.profile().unwrap().total_focus_time, 29);

        // zero minutes changes nothing
        session.record_focus(project_id, task_id, 0).unwrap();
        assert_eq!(session.profile().unwrap().total_focus_time, 29);
    }

    #[test]
    fn test_breakdown_tasks_added_to_project() {
        let tmp = TempDir::new().unwrap();
        let mut session = Session::local(config_in(tmp.path())).unwrap();
        let project_id = session.create_project("Auth", None).unwrap();

        let suggestions = vec!["Sketch the schema".to_string(), "Add sessions".to_string()];
        let created = session
            .add_breakdown_tasks(project_id, "Build authentication", &suggestions)
            .unwrap();
        assert_eq!(created, 2);

        let project = session.projects().get(project_id).unwrap();
        assert_eq!(project.tasks.len(), 2);
        assert_eq!(
            project.tasks[0].description.as_deref(),
            Some("Generated from: Build authentication")
        );
    }

    #[test]
    fn test_failed_write_reverts_and_surfaces() {
        let mut seeded = Project::new(Uuid::nil(), "Thesis", None, Utc::now());
        let task = crate::model::Task::new(seeded.id, TaskDraft::new("Draft outline"), Utc::now());
        let project_id = seeded.id;
        let task_id = task.id;
        seeded.tasks.push(task);

        let account = UserAccount {
            id: Uuid::nil(),
            email: None,
        };
        let mut session = Session::with_store(
            AppConfig::default(),
            Box::new(ReadOnlyStore(vec![seeded])),
            account,
        )
        .unwrap();
        session.refresh().unwrap();

        let result =
            session.update_task(project_id, task_id, TaskPatch::status(TaskStatus::Done));
        assert!(matches!(result, Err(SyncError::Persistence(_))));

        // reverted, and no reward was banked
        let task = session.projects().get_task(project_id, task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(session.take_notices().is_empty());
    }

    #[test]
    fn test_bootstrap_requires_remote_parts() {
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Remote;
        assert!(matches!(
            Session::bootstrap(config, None),
            Err(SessionError::MissingRemote)
        ));
    }
}
