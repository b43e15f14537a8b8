//! Coder: turns one subtask into a set of files.
//!
//! Used two ways: as a fan-out worker with no project context, and as the
//! single revision worker that sees every accumulated file plus the
//! reviewer's feedback.

use serde::{Deserialize, Serialize};

use super::{WorkerRole, WorkerSettings, call};
use crate::anthropic::MessageSender;
use crate::error::WorkerError;
use crate::state_machine::FileMap;

pub(crate) const PREAMBLE: &str =
    "You are the coding agent of a multi-agent code generation pipeline.";

/// Subtask handed to the revision coder.
pub const REVISION_SUBTASK: &str = "Apply review feedback";

const TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, Copy)]
pub struct CodeRequest<'a> {
    pub subtask: &'a str,
    pub framework: &'a str,
    /// The whole task, for context.
    pub task: Option<&'a str>,
    pub existing_files: Option<&'a FileMap>,
    pub review_feedback: Option<&'a str>,
}

impl<'a> CodeRequest<'a> {
    pub fn new(subtask: &'a str, framework: &'a str) -> Self {
        Self {
            subtask,
            framework,
            task: None,
            existing_files: None,
            review_feedback: None,
        }
    }

    pub fn with_task(mut self, task: &'a str) -> Self {
        self.task = Some(task);
        self
    }

    pub fn with_existing_files(mut self, files: &'a FileMap) -> Self {
        self.existing_files = Some(files);
        self
    }

    pub fn with_feedback(mut self, feedback: &'a str) -> Self {
        self.review_feedback = Some(feedback);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeOutput {
    pub files: FileMap,
    #[serde(default)]
    pub explanation: Option<String>,
}

pub async fn generate<C: MessageSender>(
    client: &C,
    settings: &WorkerSettings,
    req: &CodeRequest<'_>,
) -> Result<CodeOutput, WorkerError> {
    let raw: CodeOutput = call(
        client,
        settings,
        WorkerRole::Coder,
        system_prompt(req),
        user_message(req),
        TEMPERATURE,
    )
    .await?;
    validate(raw)
}

/// At least one file, and no blank paths.
pub(crate) fn validate(output: CodeOutput) -> Result<CodeOutput, WorkerError> {
    if output.files.is_empty() {
        return Err(WorkerError::violation(WorkerRole::Coder, "no files returned"));
    }
    if output.files.keys().any(|path| path.trim().is_empty()) {
        return Err(WorkerError::violation(
            WorkerRole::Coder,
            "file with blank path",
        ));
    }
    Ok(CodeOutput {
        files: output.files,
        explanation: output.explanation.filter(|e| !e.trim().is_empty()),
    })
}

fn system_prompt(req: &CodeRequest<'_>) -> String {
    let framework = req.framework;
    let mut prompt = format!(
        "{PREAMBLE}\n\
         You are an expert {framework} developer. Write complete, working code for the \
         subtask you are given.\n\
         \n\
         Rules:\n\
         - Follow {framework} best practices and modern syntax\n\
         - Include every import a file needs\n\
         - Split components, logic and styles into separate files where natural\n\
         - File paths start with / and use extensions appropriate for {framework}\n"
    );

    if let Some(files) = req.existing_files.filter(|f| !f.is_empty()) {
        let listing = serde_json::to_string_pretty(files).unwrap_or_default();
        prompt.push_str(&format!("\nExisting project files:\n{listing}\n"));
    }
    if let Some(feedback) = req.review_feedback {
        prompt.push_str(&format!("\nReviewer feedback to address:\n{feedback}\n"));
    }

    prompt.push_str(
        "\nRespond with ONLY valid JSON, no other text:\n\
         {\"files\": {\"/path/File.ext\": \"<file content>\"}, \"explanation\": \"<what was built>\"}",
    );
    prompt
}

fn user_message(req: &CodeRequest<'_>) -> String {
    let mut msg = String::new();
    if let Some(task) = req.task {
        msg.push_str(&format!("Main task: {task}\n"));
    }
    msg.push_str(&format!(
        "Framework: {}\nSubtask: {}",
        req.framework, req.subtask
    ));
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedModel;

    #[tokio::test]
    async fn parses_files_and_explanation() {
        let model = FixedModel::new(
            r#"{"files": {"/App.jsx": "export default function App() {}"}, "explanation": "root component"}"#,
        );
        let out = generate(
            &model,
            &WorkerSettings::default(),
            &CodeRequest::new("Create App", "react").with_task("Create a todo app"),
        )
        .await
        .unwrap();
        assert_eq!(out.files.len(), 1);
        assert!(out.files.contains_key("/App.jsx"));
        assert_eq!(out.explanation.as_deref(), Some("root component"));

        let req = model.last_request().unwrap();
        assert_eq!(
            req.user_text(),
            "Main task: Create a todo app\nFramework: react\nSubtask: Create App"
        );
    }

    #[tokio::test]
    async fn revision_prompt_carries_files_and_feedback() {
        let model = FixedModel::new(r#"{"files": {"/App.jsx": "fixed"}}"#);
        let mut existing = FileMap::new();
        existing.insert("/App.jsx".into(), "broken".into());

        let req = CodeRequest::new(REVISION_SUBTASK, "react")
            .with_existing_files(&existing)
            .with_feedback("App.jsx is missing an export");
        generate(&model, &WorkerSettings::default(), &req).await.unwrap();

        let system = model.last_request().unwrap().system.unwrap();
        assert!(system.contains("\"/App.jsx\": \"broken\""));
        assert!(system.contains("App.jsx is missing an export"));
    }

    #[tokio::test]
    async fn empty_file_map_is_a_contract_violation() {
        let model = FixedModel::new(r#"{"files": {}, "explanation": "nothing"}"#);
        let err = generate(
            &model,
            &WorkerSettings::default(),
            &CodeRequest::new("Create App", "react"),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no files returned"));
    }

    #[tokio::test]
    async fn non_string_content_is_a_contract_violation() {
        let model = FixedModel::new(r#"{"files": {"/App.jsx": 42}}"#);
        let err = generate(
            &model,
            &WorkerSettings::default(),
            &CodeRequest::new("Create App", "react"),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            WorkerError::PromptContractViolation { worker: WorkerRole::Coder, .. }
        ));
    }

    #[test]
    fn blank_path_is_rejected() {
        let mut files = FileMap::new();
        files.insert("  ".into(), "x".into());
        let err = validate(CodeOutput {
            files,
            explanation: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("blank path"));
    }
}
