//! Reviewer: scores the merged files and decides approve vs. revise.

use serde::{Deserialize, Serialize};

use super::{WorkerRole, WorkerSettings, call};
use crate::anthropic::MessageSender;
use crate::error::WorkerError;
use crate::state_machine::FileMap;

pub(crate) const PREAMBLE: &str =
    "You are the review agent of a multi-agent code generation pipeline.";

const TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub approved: bool,
    /// Quality score, 1-10.
    #[serde(default)]
    pub score: Option<u8>,
    pub feedback: String,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

pub async fn review<C: MessageSender>(
    client: &C,
    settings: &WorkerSettings,
    files: &FileMap,
    framework: &str,
) -> Result<Review, WorkerError> {
    let raw: Review = call(
        client,
        settings,
        WorkerRole::Reviewer,
        system_prompt(framework),
        user_message(files, framework),
        TEMPERATURE,
    )
    .await?;
    validate(raw)
}

pub(crate) fn validate(review: Review) -> Result<Review, WorkerError> {
    if let Some(score) = review.score
        && !(1..=10).contains(&score)
    {
        return Err(WorkerError::violation(
            WorkerRole::Reviewer,
            format!("score {score} outside 1-10"),
        ));
    }
    Ok(review)
}

fn system_prompt(framework: &str) -> String {
    format!(
        "{PREAMBLE}\n\
         You review {framework} code for quality and completeness.\n\
         \n\
         Check for:\n\
         - Syntax errors and bugs\n\
         - {framework} best practices\n\
         - Missing imports or dependencies\n\
         - Security issues and bad patterns\n\
         - Whether the code is complete and functional\n\
         \n\
         Set approved=true if the code is functional and meets basic standards; \
         set approved=false only for critical issues that must be fixed. \
         Be specific in your feedback.\n\
         \n\
         Respond with ONLY valid JSON, no other text:\n\
         {{\"approved\": <bool>, \"score\": <1-10>, \"feedback\": \"<overall assessment>\", \
         \"issues\": [\"<issue>\"], \"suggestions\": [\"<suggestion>\"]}}"
    )
}

/// Renders files as `--- path ---` delimited blocks.
fn user_message(files: &FileMap, framework: &str) -> String {
    let mut msg = format!("Please review the following {framework} code:\n");
    for (path, content) in files {
        msg.push_str(&format!("\n--- {path} ---\n{content}\n"));
    }
    msg
}
