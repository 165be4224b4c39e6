use crate::model::{Task, TaskId, TaskStatus};

/// Error type for board construction
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("board has no columns")]
    NoColumns,
    #[error("duplicate column: {0}")]
    DuplicateColumn(&'static str),
}

/// Ordered column set, fixed at startup from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    columns: Vec<TaskStatus>,
}

impl Board {
    /// The default todo / in-progress / done layout
    pub fn standard() -> Board {
        Board {
            columns: TaskStatus::ALL.to_vec(),
        }
    }

    /// Validate an ordered column list: at least one column, no repeats.
    pub fn new(columns: Vec<TaskStatus>) -> Result<Board, BoardError> {
        if columns.is_empty() {
            return Err(BoardError::NoColumns);
        }
        for (i, status) in columns.iter().enumerate() {
            if columns[..i].contains(status) {
                return Err(BoardError::DuplicateColumn(status.as_str()));
            }
        }
        Ok(Board { columns })
    }

    pub fn columns(&self) -> &[TaskStatus] {
        &self.columns
    }

    pub fn contains(&self, status: TaskStatus) -> bool {
        self.columns.contains(&status)
    }

    /// Tasks grouped per configured column, insertion order preserved
    /// within each lane.
    pub fn lanes<'a>(&self, tasks: &'a [Task]) -> Vec<(TaskStatus, Vec<&'a Task>)> {
        self.columns
            .iter()
            .map(|&status| {
                let lane: Vec<&Task> = tasks.iter().filter(|t| t.status == status).collect();
                (status, lane)
            })
            .collect()
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::standard()
    }
}

/// Where a drag gesture ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Column(TaskStatus),
    Task(TaskId),
}

/// The status change a settled drag asks for, forwarded as an update patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskMove {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

/// Drag gesture state machine: idle → dragging → idle.
///
/// Holds only the active task id; drop resolution happens when the gesture
/// settles. Dropping on another task is an accepted gesture with no
/// persisted effect, since order is not a modeled task attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DragState {
    active: Option<TaskId>,
}

impl DragState {
    pub fn new() -> Self {
        DragState::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_task(&self) -> Option<TaskId> {
        self.active
    }

    pub fn drag_start(&mut self, task: TaskId) {
        self.active = Some(task);
    }

    /// Settle the gesture, returning to idle.
    ///
    /// Only a drop on a configured column whose status differs from the
    /// dragged task's current status yields a move. Cancelled gestures,
    /// self-drops, task-target drops, and drops on the task's own column
    /// all resolve to nothing.
    pub fn drag_end(
        &mut self,
        board: &Board,
        target: Option<DropTarget>,
        tasks: &[Task],
    ) -> Option<TaskMove> {
        let active = self.active.take()?;
        let target = target?;
        let current = tasks.iter().find(|t| t.id == active)?.status;

        match target {
            DropTarget::Column(status) => {
                if !board.contains(status) || status == current {
                    return None;
                }
                Some(TaskMove {
                    task_id: active,
                    status,
                })
            }
            DropTarget::Task(_) => None,
        }
    }
}
