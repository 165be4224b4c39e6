//! Breaking a large task into concrete subtasks with a language model.
//!
//! The planner backend is behind a trait so the core stays independent of
//! any provider; it receives one prompt and returns free-form text. Lines
//! of that text starting with a dash become suggestions, and accepted
//! suggestions become ordinary task drafts.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::model::{DEFAULT_XP_REWARD, TaskDraft, TaskStatus};

/// Deadline granted to generated subtasks
const SUBTASK_DEADLINE_DAYS: i64 = 7;

/// A dash-marked list item; the capture is the item text
static ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s*(\S.*?)\s*$").expect("item pattern is valid"));

/// Error from a planner backend
#[derive(Debug, thiserror::Error)]
#[error("subtask planner failed: {message}")]
pub struct PlannerError {
    message: String,
}

impl PlannerError {
    pub fn new(message: impl Into<String>) -> Self {
        PlannerError {
            message: message.into(),
        }
    }
}

/// A backend that can propose subtasks for a prompt
pub trait SubtaskPlanner {
    /// Produce raw planner output for `prompt`
    fn suggest(&mut self, prompt: &str) -> Result<String, PlannerError>;
}

/// Prompt asking for a dash-list breakdown of `source`
pub fn build_prompt(source: &str) -> String {
    format!(
        "Break down this task: \"{source}\". Provide 3-5 specific, actionable \
         subtasks. Format each subtask as a single line starting with \"- \". \
         Keep each subtask focused and concrete."
    )
}

/// Extract suggestions from raw planner output. Only lines starting with a
/// dash count; the dash and surrounding whitespace are stripped. Anything
/// else (prose, blank lines) is ignored, so an off-format reply yields an
/// empty list rather than garbage suggestions.
pub fn parse_suggestions(response: &str) -> Vec<String> {
    response
        .lines()
        .filter_map(|line| ITEM.captures(line))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Ask `planner` for a breakdown of `source` and parse the reply
pub fn suggest_subtasks<P: SubtaskPlanner + ?Sized>(
    planner: &mut P,
    source: &str,
) -> Result<Vec<String>, PlannerError> {
    let raw = planner.suggest(&build_prompt(source))?;
    Ok(parse_suggestions(&raw))
}

/// Turn accepted suggestions into task drafts: status `todo`, the default
/// reward, a one-week deadline, and a description tying the subtask back
/// to the task it came from.
pub fn drafts_from_suggestions(
    source: &str,
    suggestions: &[String],
    now: DateTime<Utc>,
) -> Vec<TaskDraft> {
    suggestions
        .iter()
        .map(|title| TaskDraft {
            title: title.clone(),
            description: Some(format!("Generated from: {source}")),
            notes: None,
            deadline: Some(now + Duration::days(SUBTASK_DEADLINE_DAYS)),
            status: TaskStatus::Todo,
            xp_reward: DEFAULT_XP_REWARD,
        })
        .collect()
}
