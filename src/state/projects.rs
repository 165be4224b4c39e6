//! Optimistic project state and its write-back queue.
//!
//! Mutations apply to the in-memory collection immediately and enqueue a
//! [`StoreCommand`] for the driver to run against the store. Every pending
//! write carries a [`WriteTicket`]; feeding the store's result back through
//! [`ProjectsState::resolve`] reconciles confirmed data into the optimistic
//! state, or rolls the change back when the write failed.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, warn};

use crate::model::{
    Project, ProjectId, ProjectPatch, RollbackPolicy, Task, TaskDraft, TaskId, TaskPatch, UserId,
};
use crate::store::{ProjectStore, StoreError};

/// Error type for rejected mutations. Validation happens before the
/// optimistic apply, so a rejected mutation changes nothing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("project name cannot be empty")]
    EmptyProjectName,
    #[error("task title cannot be empty")]
    EmptyTaskTitle,
}

/// Correlation key pairing an optimistic apply with its store result.
/// Tickets are issued in mutation order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WriteTicket(u64);

/// A store write queued by an optimistic mutation, to be executed by the
/// driver in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCommand {
    CreateProject {
        ticket: WriteTicket,
        owner: UserId,
        name: String,
        description: Option<String>,
    },
    UpdateProject {
        ticket: WriteTicket,
        id: ProjectId,
        patch: ProjectPatch,
    },
    DeleteProject {
        ticket: WriteTicket,
        id: ProjectId,
    },
    AddTask {
        ticket: WriteTicket,
        project_id: ProjectId,
        draft: TaskDraft,
    },
    UpdateTask {
        ticket: WriteTicket,
        task_id: TaskId,
        patch: TaskPatch,
    },
    DeleteTask {
        ticket: WriteTicket,
        task_id: TaskId,
    },
}

impl StoreCommand {
    pub fn ticket(&self) -> WriteTicket {
        match self {
            StoreCommand::CreateProject { ticket, .. }
            | StoreCommand::UpdateProject { ticket, .. }
            | StoreCommand::DeleteProject { ticket, .. }
            | StoreCommand::AddTask { ticket, .. }
            | StoreCommand::UpdateTask { ticket, .. }
            | StoreCommand::DeleteTask { ticket, .. } => *ticket,
        }
    }
}

/// Confirmed data returned by the store for a completed write
#[derive(Debug, Clone, PartialEq)]
pub enum StoreReply {
    Project(Project),
    Task(Task),
    Deleted,
}

/// How a pending write settled
#[derive(Debug)]
pub enum SyncOutcome {
    /// Confirmed data was merged into the optimistic state
    Reconciled,
    /// The write failed; `reverted` reports whether the optimistic change
    /// was rolled back (per the configured policy)
    Failed { error: StoreError, reverted: bool },
    /// The result no longer applies: its target was deleted locally while
    /// the write was in flight, or the ticket is unknown
    Dropped,
}

/// Captured inverse of an optimistic apply, replayed when a failed write
/// is rolled back
#[derive(Debug, Clone)]
enum Undo {
    /// Inverse of a create: drop the placeholder
    RemoveProject(ProjectId),
    /// Inverse of a delete: put the entity back where it was
    RestoreProject { index: usize, project: Project },
    /// Inverse of an update: restore the overwritten fields
    ProjectFields {
        id: ProjectId,
        name: String,
        description: Option<String>,
        updated_at: DateTime<Utc>,
    },
    RemoveTask {
        project_id: ProjectId,
        task_id: TaskId,
    },
    RestoreTask {
        project_id: ProjectId,
        index: usize,
        task: Task,
    },
    TaskFields { prior: Task },
}

#[derive(Debug)]
struct PendingWrite {
    ticket: WriteTicket,
    undo: Undo,
}

/// The optimistic project collection for one user.
///
/// Projects keep their display order; `newest_first` controls whether a
/// freshly created project goes to the front (remote mode lists newest
/// first) or the back (local mode keeps insertion order).
pub struct ProjectsState {
    owner: UserId,
    policy: RollbackPolicy,
    newest_first: bool,
    projects: IndexMap<ProjectId, Project>,
    queue: VecDeque<StoreCommand>,
    pending: Vec<PendingWrite>,
    next_ticket: u64,
}

impl ProjectsState {
    pub fn new(owner: UserId, policy: RollbackPolicy, newest_first: bool) -> Self {
        ProjectsState {
            owner,
            policy,
            newest_first,
            projects: IndexMap::new(),
            queue: VecDeque::new(),
            pending: Vec::new(),
            next_ticket: 0,
        }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn policy(&self) -> RollbackPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Projects in display order
    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn get(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    pub fn get_task(&self, project_id: ProjectId, task_id: TaskId) -> Option<&Task> {
        self.projects.get(&project_id).and_then(|p| p.task(task_id))
    }

    /// Project owning `task_id`, if any
    pub fn project_of(&self, task_id: TaskId) -> Option<ProjectId> {
        self.projects
            .values()
            .find(|p| p.task(task_id).is_some())
            .map(|p| p.id)
    }

    /// The `limit` nearest deadlines across all projects, soonest first.
    /// Done tasks and tasks without a deadline are skipped.
    pub fn upcoming_deadlines(&self, limit: usize) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .projects
            .values()
            .flat_map(|p| p.upcoming_deadlines(usize::MAX))
            .collect();
        tasks.sort_by_key(|t| t.deadline);
        tasks.truncate(limit);
        tasks
    }

    /// True when no writes are queued or awaiting confirmation
    pub fn is_settled(&self) -> bool {
        self.queue.is_empty() && self.pending.is_empty()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Create a project optimistically. The returned id is a placeholder
    /// until the store confirms the write, at which point the entry adopts
    /// the store-assigned id.
    pub fn create_project(
        &mut self,
        name: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ProjectId, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyProjectName);
        }
        let description = normalize_optional(description);

        let project = Project::new(self.owner, name, description.clone(), now);
        let id = project.id;
        if self.newest_first {
            self.projects.shift_insert(0, id, project);
        } else {
            self.projects.insert(id, project);
        }

        let ticket = self.issue(Undo::RemoveProject(id));
        self.queue.push_back(StoreCommand::CreateProject {
            ticket,
            owner: self.owner,
            name: name.to_string(),
            description,
        });
        Ok(id)
    }

    /// Patch a project. Unknown targets and empty patches are dropped
    /// without queuing anything.
    pub fn update_project(
        &mut self,
        id: ProjectId,
        patch: ProjectPatch,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        let patch = normalize_project_patch(patch)?;
        if patch.is_empty() {
            return Ok(());
        }
        let Some(project) = self.projects.get_mut(&id) else {
            debug!("dropping update for unknown project {id}");
            return Ok(());
        };

        let undo = Undo::ProjectFields {
            id,
            name: project.name.clone(),
            description: project.description.clone(),
            updated_at: project.updated_at,
        };
        project.apply(&patch, now);

        let ticket = self.issue(undo);
        self.queue
            .push_back(StoreCommand::UpdateProject { ticket, id, patch });
        Ok(())
    }

    /// Delete a project and every task under it. Deleting an unknown id
    /// is a no-op.
    pub fn delete_project(&mut self, id: ProjectId) {
        let Some((index, _, project)) = self.projects.shift_remove_full(&id) else {
            return;
        };
        let ticket = self.issue(Undo::RestoreProject { index, project });
        self.queue
            .push_back(StoreCommand::DeleteProject { ticket, id });
    }

    /// Add a task to a project. Returns the placeholder task id, or `None`
    /// when the project no longer exists (the add is dropped).
    pub fn add_task(
        &mut self,
        project_id: ProjectId,
        draft: TaskDraft,
        now: DateTime<Utc>,
    ) -> Result<Option<TaskId>, ValidationError> {
        let draft = normalize_draft(draft)?;
        let Some(project) = self.projects.get_mut(&project_id) else {
            debug!("dropping task add for unknown project {project_id}");
            return Ok(None);
        };

        let task = Task::new(project_id, draft.clone(), now);
        let task_id = task.id;
        project.tasks.push(task);

        let ticket = self.issue(Undo::RemoveTask {
            project_id,
            task_id,
        });
        self.queue.push_back(StoreCommand::AddTask {
            ticket,
            project_id,
            draft,
        });
        Ok(Some(task_id))
    }

    /// Patch a task. Unknown targets and empty patches are dropped without
    /// queuing anything.
    pub fn update_task(
        &mut self,
        project_id: ProjectId,
        task_id: TaskId,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        let patch = normalize_task_patch(patch)?;
        if patch.is_empty() {
            return Ok(());
        }
        let Some(task) = self
            .projects
            .get_mut(&project_id)
            .and_then(|p| p.task_mut(task_id))
        else {
            debug!("dropping update for unknown task {task_id}");
            return Ok(());
        };

        let undo = Undo::TaskFields {
            prior: task.clone(),
        };
        task.apply(&patch, now);

        let ticket = self.issue(undo);
        self.queue.push_back(StoreCommand::UpdateTask {
            ticket,
            task_id,
            patch,
        });
        Ok(())
    }

    /// Delete a task. Unknown project or task ids are a no-op.
    pub fn delete_task(&mut self, project_id: ProjectId, task_id: TaskId) {
        let Some(project) = self.projects.get_mut(&project_id) else {
            return;
        };
        let Some((index, task)) = project.remove_task(task_id) else {
            return;
        };
        let ticket = self.issue(Undo::RestoreTask {
            project_id,
            index,
            task,
        });
        self.queue
            .push_back(StoreCommand::DeleteTask { ticket, task_id });
    }

    /// Add focused minutes to a task's running total. Returns whether the
    /// task existed and a write was queued.
    pub fn add_focus_minutes(
        &mut self,
        project_id: ProjectId,
        task_id: TaskId,
        minutes: u32,
        now: DateTime<Utc>,
    ) -> bool {
        if minutes == 0 {
            return false;
        }
        let Some(task) = self.get_task(project_id, task_id) else {
            debug!("dropping focus record for unknown task {task_id}");
            return false;
        };
        let patch = TaskPatch {
            focus_time: Some(task.focus_time.saturating_add(minutes)),
            ..TaskPatch::default()
        };
        // a focus patch carries no title, so validation cannot reject it
        self.update_task(project_id, task_id, patch, now).is_ok()
    }

    // ------------------------------------------------------------------
    // Driver interface
    // ------------------------------------------------------------------

    /// Next store write to execute, in issue order
    pub fn next_command(&mut self) -> Option<StoreCommand> {
        self.queue.pop_front()
    }

    /// Feed back the store's result for `ticket` and settle the pending
    /// write: merge confirmed data, roll back a failure per the policy, or
    /// drop results whose target is gone.
    pub fn resolve(
        &mut self,
        ticket: WriteTicket,
        result: Result<StoreReply, StoreError>,
    ) -> SyncOutcome {
        let Some(position) = self.pending.iter().position(|p| p.ticket == ticket) else {
            warn!("ignoring result for unknown write {ticket:?}");
            return SyncOutcome::Dropped;
        };
        let pending = self.pending.remove(position);

        match result {
            Ok(reply) => self.reconcile(pending.undo, reply),
            Err(error) => {
                // deleting something the store already forgot is success
                if matches!(error, StoreError::NotFound(_))
                    && matches!(
                        pending.undo,
                        Undo::RestoreProject { .. } | Undo::RestoreTask { .. }
                    )
                {
                    return SyncOutcome::Reconciled;
                }
                warn!("store write {ticket:?} failed: {error}");
                let reverted = self.policy == RollbackPolicy::Revert;
                if reverted {
                    self.revert(pending.undo);
                }
                SyncOutcome::Failed { error, reverted }
            }
        }
    }

    /// Adopt an authoritative snapshot, discarding queued commands and
    /// pending correlation state.
    pub fn replace_all(&mut self, projects: Vec<Project>) {
        if !self.is_settled() {
            debug!(
                "replacing project state with {} writes unsettled",
                self.queue.len() + self.pending.len()
            );
        }
        self.projects = projects.into_iter().map(|p| (p.id, p)).collect();
        self.queue.clear();
        self.pending.clear();
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    fn reconcile(&mut self, undo: Undo, reply: StoreReply) -> SyncOutcome {
        match (undo, reply) {
            (Undo::RemoveProject(temp_id), StoreReply::Project(confirmed)) => {
                self.adopt_created_project(temp_id, confirmed)
            }
            (Undo::ProjectFields { id, .. }, StoreReply::Project(confirmed)) => {
                self.merge_project_fields(id, confirmed)
            }
            (
                Undo::RemoveTask {
                    project_id,
                    task_id,
                },
                StoreReply::Task(confirmed),
            ) => self.adopt_created_task(project_id, task_id, confirmed),
            (Undo::TaskFields { prior }, StoreReply::Task(confirmed)) => {
                self.merge_task(prior.project_id, prior.id, confirmed)
            }
            (Undo::RestoreProject { .. }, StoreReply::Deleted)
            | (Undo::RestoreTask { .. }, StoreReply::Deleted) => SyncOutcome::Reconciled,
            (undo, reply) => {
                warn!("store reply does not match the pending write: {undo:?} vs {reply:?}");
                SyncOutcome::Dropped
            }
        }
    }

    /// A confirmed create replaces the placeholder entry. Tasks attached
    /// while the create was in flight move over to the confirmed project,
    /// and anything still referencing the placeholder id is remapped.
    fn adopt_created_project(&mut self, temp_id: ProjectId, confirmed: Project) -> SyncOutcome {
        let Some((index, _, local)) = self.projects.shift_remove_full(&temp_id) else {
            debug!("create confirmed for project deleted locally: {temp_id}");
            return SyncOutcome::Dropped;
        };

        let confirmed_id = confirmed.id;
        let mut merged = confirmed;
        for mut task in local.tasks {
            if merged.task(task.id).is_none() {
                task.project_id = confirmed_id;
                merged.tasks.push(task);
            }
        }
        if confirmed_id != temp_id {
            self.adopt_project_id(temp_id, confirmed_id);
        }
        self.projects.shift_insert(index, confirmed_id, merged);
        SyncOutcome::Reconciled
    }

    fn merge_project_fields(&mut self, id: ProjectId, confirmed: Project) -> SyncOutcome {
        let Some(project) = self.projects.get_mut(&id) else {
            debug!("update confirmed for project deleted locally: {id}");
            return SyncOutcome::Dropped;
        };
        // tasks stay local; task writes reconcile on their own tickets
        project.name = confirmed.name;
        project.description = confirmed.description;
        project.created_at = confirmed.created_at;
        project.updated_at = confirmed.updated_at;
        SyncOutcome::Reconciled
    }

    fn adopt_created_task(
        &mut self,
        project_id: ProjectId,
        temp_id: TaskId,
        confirmed: Task,
    ) -> SyncOutcome {
        let Some(project) = self.projects.get_mut(&project_id) else {
            debug!("add confirmed for project deleted locally: {project_id}");
            return SyncOutcome::Dropped;
        };
        let Some(position) = project.tasks.iter().position(|t| t.id == temp_id) else {
            debug!("add confirmed for task deleted locally: {temp_id}");
            return SyncOutcome::Dropped;
        };

        let confirmed_id = confirmed.id;
        project.tasks[position] = confirmed;
        if confirmed_id != temp_id {
            self.adopt_task_id(temp_id, confirmed_id);
        }
        SyncOutcome::Reconciled
    }

    fn merge_task(&mut self, project_id: ProjectId, task_id: TaskId, confirmed: Task) -> SyncOutcome {
        let Some(task) = self
            .projects
            .get_mut(&project_id)
            .and_then(|p| p.task_mut(task_id))
        else {
            debug!("update confirmed for task deleted locally: {task_id}");
            return SyncOutcome::Dropped;
        };
        *task = confirmed;
        SyncOutcome::Reconciled
    }

    /// Rewrite every queued command and pending undo that still references
    /// a placeholder project id
    fn adopt_project_id(&mut self, old: ProjectId, new: ProjectId) {
        for command in &mut self.queue {
            match command {
                StoreCommand::UpdateProject { id, .. } | StoreCommand::DeleteProject { id, .. }
                    if *id == old =>
                {
                    *id = new;
                }
                StoreCommand::AddTask { project_id, .. } if *project_id == old => {
                    *project_id = new;
                }
                _ => {}
            }
        }
        for pending in &mut self.pending {
            match &mut pending.undo {
                Undo::ProjectFields { id, .. } if *id == old => *id = new,
                Undo::RestoreProject { project, .. } if project.id == old => {
                    project.id = new;
                    for task in &mut project.tasks {
                        task.project_id = new;
                    }
                }
                Undo::RemoveTask { project_id, .. } if *project_id == old => *project_id = new,
                Undo::RestoreTask {
                    project_id, task, ..
                } if *project_id == old => {
                    *project_id = new;
                    task.project_id = new;
                }
                Undo::TaskFields { prior } if prior.project_id == old => {
                    prior.project_id = new;
                }
                _ => {}
            }
        }
    }

    fn adopt_task_id(&mut self, old: TaskId, new: TaskId) {
        for command in &mut self.queue {
            match command {
                StoreCommand::UpdateTask { task_id, .. }
                | StoreCommand::DeleteTask { task_id, .. }
                    if *task_id == old =>
                {
                    *task_id = new;
                }
                _ => {}
            }
        }
        for pending in &mut self.pending {
            match &mut pending.undo {
                Undo::RemoveTask { task_id, .. } if *task_id == old => *task_id = new,
                Undo::RestoreTask { task, .. } if task.id == old => task.id = new,
                Undo::TaskFields { prior } if prior.id == old => prior.id = new,
                _ => {}
            }
        }
    }

    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::RemoveProject(id) => {
                self.projects.shift_remove(&id);
            }
            Undo::RestoreProject { index, project } => {
                let index = index.min(self.projects.len());
                self.projects.shift_insert(index, project.id, project);
            }
            Undo::ProjectFields {
                id,
                name,
                description,
                updated_at,
            } => {
                if let Some(project) = self.projects.get_mut(&id) {
                    project.name = name;
                    project.description = description;
                    project.updated_at = updated_at;
                }
            }
            Undo::RemoveTask {
                project_id,
                task_id,
            } => {
                if let Some(project) = self.projects.get_mut(&project_id) {
                    project.remove_task(task_id);
                }
            }
            Undo::RestoreTask {
                project_id,
                index,
                task,
            } => {
                if let Some(project) = self.projects.get_mut(&project_id) {
                    let index = index.min(project.tasks.len());
                    project.tasks.insert(index, task);
                }
            }
            Undo::TaskFields { prior } => {
                if let Some(task) = self
                    .projects
                    .get_mut(&prior.project_id)
                    .and_then(|p| p.task_mut(prior.id))
                {
                    *task = prior;
                }
            }
        }
    }

    fn issue(&mut self, undo: Undo) -> WriteTicket {
        let ticket = WriteTicket(self.next_ticket);
        self.next_ticket += 1;
        self.pending.push(PendingWrite { ticket, undo });
        ticket
    }
}

/// Run one queued command against a store and shape the result for
/// [`ProjectsState::resolve`].
pub fn execute<S: ProjectStore + ?Sized>(
    store: &mut S,
    command: StoreCommand,
) -> Result<StoreReply, StoreError> {
    match command {
        StoreCommand::CreateProject {
            owner,
            name,
            description,
            ..
        } => store
            .create_project(owner, &name, description.as_deref())
            .map(StoreReply::Project),
        StoreCommand::UpdateProject { id, patch, .. } => {
            store.update_project(id, &patch).map(StoreReply::Project)
        }
        StoreCommand::DeleteProject { id, .. } => {
            store.delete_project(id).map(|()| StoreReply::Deleted)
        }
        StoreCommand::AddTask {
            project_id, draft, ..
        } => store.add_task(project_id, &draft).map(StoreReply::Task),
        StoreCommand::UpdateTask { task_id, patch, .. } => {
            store.update_task(task_id, &patch).map(StoreReply::Task)
        }
        StoreCommand::DeleteTask { task_id, .. } => {
            store.delete_task(task_id).map(|()| StoreReply::Deleted)
        }
    }
}

fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Trim the name and collapse a blank description to "no change"
fn normalize_project_patch(mut patch: ProjectPatch) -> Result<ProjectPatch, ValidationError> {
    if let Some(name) = patch.name.take() {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyProjectName);
        }
        patch.name = Some(name.to_string());
    }
    patch.description = patch
        .description
        .take()
        .and_then(|d| normalize_optional(Some(&d)));
    Ok(patch)
}

fn normalize_task_patch(mut patch: TaskPatch) -> Result<TaskPatch, ValidationError> {
    if let Some(title) = patch.title.take() {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTaskTitle);
        }
        patch.title = Some(title.to_string());
    }
    patch.description = patch
        .description
        .take()
        .and_then(|d| normalize_optional(Some(&d)));
    Ok(patch)
}

fn normalize_draft(mut draft: TaskDraft) -> Result<TaskDraft, ValidationError> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTaskTitle);
    }
    draft.title = title.to_string();
    draft.description = draft
        .description
        .take()
        .and_then(|d| normalize_optional(Some(&d)));
    Ok(draft)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
