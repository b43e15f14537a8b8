//! Planner: decomposes a task into an ordered list of subtasks.
//!
//! The order is a naming aid for the coders, not an execution order; the
//! engine runs every subtask concurrently.

use serde::{Deserialize, Serialize};

use super::{WorkerRole, WorkerSettings, call};
use crate::anthropic::MessageSender;
use crate::error::WorkerError;

pub(crate) const PREAMBLE: &str =
    "You are the planning agent of a multi-agent code generation pipeline.";

pub const MIN_SUBTASKS: usize = 3;
pub const MAX_SUBTASKS: usize = 7;

const TEMPERATURE: f32 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub subtasks: Vec<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Asks the model for a plan and validates it.
pub async fn plan<C: MessageSender>(
    client: &C,
    settings: &WorkerSettings,
    task: &str,
    framework: &str,
) -> Result<Plan, WorkerError> {
    let raw: Plan = call(
        client,
        settings,
        WorkerRole::Planner,
        system_prompt(framework),
        format!("Task: {task}\nFramework: {framework}"),
        TEMPERATURE,
    )
    .await?;
    validate(raw)
}

/// Enforces 3-7 non-blank subtasks; trims whitespace.
pub(crate) fn validate(plan: Plan) -> Result<Plan, WorkerError> {
    let subtasks: Vec<String> = plan
        .subtasks
        .into_iter()
        .map(|s| s.trim().to_string())
        .collect();

    if let Some(pos) = subtasks.iter().position(|s| s.is_empty()) {
        return Err(WorkerError::violation(
            WorkerRole::Planner,
            format!("subtask {} is blank", pos + 1),
        ));
    }
    if !(MIN_SUBTASKS..=MAX_SUBTASKS).contains(&subtasks.len()) {
        return Err(WorkerError::violation(
            WorkerRole::Planner,
            format!(
                "expected {MIN_SUBTASKS}-{MAX_SUBTASKS} subtasks, got {}",
                subtasks.len()
            ),
        ));
    }

    Ok(Plan {
        subtasks,
        reasoning: plan.reasoning.filter(|r| !r.trim().is_empty()),
    })
}

fn system_prompt(framework: &str) -> String {
    format!(
        "{PREAMBLE}\n\
         Break the user's software task into clear subtasks a coder can implement \
         independently.\n\
         \n\
         Rules:\n\
         - Produce between {MIN_SUBTASKS} and {MAX_SUBTASKS} subtasks\n\
         - Each subtask is specific and implementable on its own\n\
         - Order subtasks logically, dependencies first\n\
         - Cover both component creation and integration\n\
         - Follow {framework} conventions\n\
         \n\
         Respond with ONLY valid JSON, no other text:\n\
         {{\"subtasks\": [\"<subtask>\", ...], \"reasoning\": \"<why this breakdown>\"}}"
    )
}
