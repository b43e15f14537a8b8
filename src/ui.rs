//! Terminal output: spinners and colored summaries.
//!
//! `indicatif` drives the spinner, `console` the colors. [`WorkflowProgress`]
//! follows one generation from submission to result.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{WorkflowListResponse, WorkflowStatusResponse};
use crate::generate::{GeneratedProject, GenerationPath};
use crate::state_machine::WorkflowStatus;

/// Spinner plus colored status lines for a running generation.
///
/// Success is green, failure red, fallbacks and soft results yellow.
pub struct WorkflowProgress {
    pb: ProgressBar,
    last: Option<WorkflowStatus>,
    green: Style,
    red: Style,
    yellow: Style,
}

impl WorkflowProgress {
    pub fn start(task: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("submitting: {task}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            last: None,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Updates the spinner; prints a line whenever the status changes.
    pub fn observe(&mut self, status: &WorkflowStatusResponse) {
        if self.last != Some(status.status) {
            self.pb.println(format!(
                "  {} {}",
                self.yellow.apply_to("→"),
                describe(status)
            ));
            self.last = Some(status.status);
        }
        self.pb.set_message(describe(status));
    }

    pub fn complete(&self, project: &GeneratedProject) {
        self.pb.finish_and_clear();
        match (project.path, project.approved) {
            (GenerationPath::OneShot, _) => println!(
                "  {} Generated {} file(s) in single-shot mode (service unavailable)",
                self.yellow.apply_to("!"),
                project.files.len()
            ),
            (GenerationPath::Orchestrated, Some(false)) => println!(
                "  {} Generated {} file(s); reviewer still had open issues",
                self.yellow.apply_to("!"),
                project.files.len()
            ),
            (GenerationPath::Orchestrated, _) => println!(
                "  {} Generated {} file(s), approved by review",
                self.green.apply_to("✓"),
                project.files.len()
            ),
        }
    }

    pub fn fail(&self, error: &dyn std::fmt::Display) {
        self.pb.finish_and_clear();
        println!("  {} Generation failed: {error}", self.red.apply_to("✗"));
    }
}

fn describe(status: &WorkflowStatusResponse) -> String {
    match status.current_agent {
        Some(agent) if !status.status.is_terminal() => format!(
            "{} ({agent}, iteration {})",
            status.status, status.iteration
        ),
        _ => format!("{} (iteration {})", status.status, status.iteration),
    }
}

pub fn print_status(status: &WorkflowStatusResponse) {
    let style = status_style(status.status);
    println!("{}  {}", status.workflow_id, style.apply_to(describe(status)));
    if let Some(error) = &status.error {
        println!("  {}", Style::new().red().apply_to(error));
    }
}

pub fn print_list(list: &WorkflowListResponse) {
    if list.workflows.is_empty() {
        println!("No workflows.");
        return;
    }
    for w in &list.workflows {
        let agent = w.current_agent.map(|a| a.as_str()).unwrap_or("-");
        println!(
            "{}  {} {:<9} {}",
            w.workflow_id,
            status_style(w.status).apply_to(format!("{:<16}", w.status.as_str())),
            agent,
            w.task
        );
    }
    println!("{} workflow(s)", list.count);
}

/// Prints every file with a dimmed path header.
pub fn print_files(project: &GeneratedProject) {
    let header = Style::new().dim();
    for (path, content) in &project.files {
        println!("{}", header.apply_to(format!("─── {path} ───")));
        println!("{content}");
    }
    if let Some(explanation) = &project.explanation {
        println!("{}", header.apply_to("─── explanation ───"));
        println!("{explanation}");
    }
}

fn status_style(status: WorkflowStatus) -> Style {
    match status {
        WorkflowStatus::Completed => Style::new().green(),
        WorkflowStatus::Failed => Style::new().red(),
        _ => Style::new().yellow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::WorkerRole;

    fn status(status: WorkflowStatus, agent: Option<WorkerRole>) -> WorkflowStatusResponse {
        WorkflowStatusResponse {
            workflow_id: "abc".into(),
            status,
            current_agent: agent,
            iteration: 1,
            error: None,
        }
    }

    #[test]
    fn describe_names_the_running_agent() {
        let s = status(WorkflowStatus::CodingRevision, Some(WorkerRole::Coder));
        assert_eq!(describe(&s), "coding_revision (coder, iteration 1)");
    }

    #[test]
    fn describe_omits_agent_once_terminal() {
        let s = status(WorkflowStatus::Completed, Some(WorkerRole::Reviewer));
        assert_eq!(describe(&s), "completed (iteration 1)");
    }
}
