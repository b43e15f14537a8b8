//! Planner, Coder and Reviewer contracts.
//!
//! Each worker is a stateless async function that makes exactly one call
//! through a [`MessageSender`], parses the answer against a strict schema
//! and returns either the typed output or a [`WorkerError`]. There are no
//! retries and no caching here: a bad answer is the engine's problem.

pub mod coder;
pub mod planner;
pub mod reviewer;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::anthropic::{Message, MessageSender, MessagesRequest};
use crate::error::WorkerError;

pub use coder::{CodeOutput, CodeRequest};
pub use planner::Plan;
pub use reviewer::Review;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// The three worker roles of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRole {
    Planner,
    Coder,
    Reviewer,
}

impl WorkerRole {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerRole::Planner => "planner",
            WorkerRole::Coder => "coder",
            WorkerRole::Reviewer => "reviewer",
        }
    }

    /// First line of the role's system prompt.
    pub fn preamble(self) -> &'static str {
        match self {
            WorkerRole::Planner => planner::PREAMBLE,
            WorkerRole::Coder => coder::PREAMBLE,
            WorkerRole::Reviewer => reviewer::PREAMBLE,
        }
    }

    /// Identifies which worker built `req`, from its system prompt.
    pub fn of(req: &MessagesRequest) -> Option<Self> {
        let system = req.system.as_deref()?;
        [WorkerRole::Planner, WorkerRole::Coder, WorkerRole::Reviewer]
            .into_iter()
            .find(|role| system.starts_with(role.preamble()))
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model selection shared by every worker call.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub model: String,
    pub max_tokens: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 8192,
        }
    }
}

/// One structured model call: send, strip an optional code fence, parse.
pub(crate) async fn call<C, T>(
    client: &C,
    settings: &WorkerSettings,
    role: WorkerRole,
    system: String,
    user: String,
    temperature: f32,
) -> Result<T, WorkerError>
where
    C: MessageSender,
    T: DeserializeOwned,
{
    let req = MessagesRequest {
        model: settings.model.clone(),
        max_tokens: settings.max_tokens,
        system: Some(system),
        temperature: Some(temperature),
        messages: vec![Message::user(user)],
    };

    tracing::debug!(worker = %role, model = %req.model, "invoking worker");
    let response = client
        .send_message(&req)
        .await
        .map_err(|source| WorkerError::WorkerFailure {
            worker: role,
            source,
        })?;

    let text = response.text();
    let json = extract_json(&text);
    if json.is_empty() {
        return Err(WorkerError::violation(role, "empty response"));
    }
    serde_json::from_str(json)
        .map_err(|e| WorkerError::violation(role, format!("invalid JSON: {e}")))
}

/// Strips a surrounding markdown code fence (```` ```json ... ``` ````), if any.
pub(crate) fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedModel;

    #[test]
    fn extract_json_passes_plain_text_through() {
        assert_eq!(extract_json("  {\"a\":1}\n"), "{\"a\":1}");
    }

    #[test]
    fn extract_json_strips_fences() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("```\n{\"a\":1}\n```\n"), "{\"a\":1}");
        assert_eq!(extract_json("```json\n{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn role_is_recovered_from_system_prompt() {
        let req = MessagesRequest {
            model: "m".into(),
            max_tokens: 1,
            system: Some(format!("{}\nmore", reviewer::PREAMBLE)),
            temperature: None,
            messages: vec![],
        };
        assert_eq!(WorkerRole::of(&req), Some(WorkerRole::Reviewer));

        let anonymous = MessagesRequest { system: None, ..req };
        assert_eq!(WorkerRole::of(&anonymous), None);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&WorkerRole::Coder).unwrap(),
            "\"coder\""
        );
        assert_eq!(WorkerRole::Planner.to_string(), "planner");
    }

    #[tokio::test]
    async fn call_reports_empty_response_as_violation() {
        let model = FixedModel::new("   ");
        let result: Result<serde_json::Value, _> = call(
            &model,
            &WorkerSettings::default(),
            WorkerRole::Planner,
            planner::PREAMBLE.to_string(),
            "Task: x".into(),
            0.3,
        )
        .await;
        assert!(matches!(
            result,
            Err(WorkerError::PromptContractViolation { worker: WorkerRole::Planner, .. })
        ));
    }

    #[tokio::test]
    async fn call_sends_settings_and_temperature() {
        let model = FixedModel::new("{}");
        let settings = WorkerSettings {
            model: "claude-haiku-4-5-20251001".into(),
            max_tokens: 512,
        };
        let _: serde_json::Value = call(
            &model,
            &settings,
            WorkerRole::Coder,
            coder::PREAMBLE.to_string(),
            "Subtask: x".into(),
            0.2,
        )
        .await
        .unwrap();

        let req = model.last_request().unwrap();
        assert_eq!(req.model, "claude-haiku-4-5-20251001");
        assert_eq!(req.max_tokens, 512);
        assert_eq!(req.temperature, Some(0.2));
        assert_eq!(WorkerRole::of(&req), Some(WorkerRole::Coder));
    }
}
