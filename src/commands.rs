//! Subcommand implementations behind the CLI.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::anthropic::AnthropicClient;
use crate::api;
use crate::client::OrchestratorClient;
use crate::config::Config;
use crate::engine::WorkflowEngine;
use crate::generate::{self, GeneratedProject, GenerationPath};
use crate::state_machine::FileMap;
use crate::store::InMemoryJobStore;
use crate::stub::{ModelBackend, StubModel};
use crate::ui::{self, WorkflowProgress};

/// Live client when an API key is configured, the offline stub otherwise.
pub fn model_backend(config: &Config) -> Result<ModelBackend> {
    if config.api_key.is_empty() {
        warn!("no API key configured; using the offline stub model");
        return Ok(ModelBackend::Stub(StubModel));
    }
    let client = match &config.llm_base_url {
        Some(url) => AnthropicClient::with_base_url(config.api_key.clone(), url.clone()),
        None => AnthropicClient::new(config.api_key.clone()),
    }
    .context("failed to build Anthropic client")?;
    Ok(ModelBackend::Anthropic(client))
}

pub async fn serve(config: &Config) -> Result<()> {
    let backend = model_backend(config)?;
    info!(
        backend = backend.name(),
        model = %config.model,
        max_iterations = config.max_iterations,
        max_parallel_coders = config.max_parallel_coders,
        "starting workflow service"
    );
    let engine = Arc::new(WorkflowEngine::new(
        backend,
        Arc::new(InMemoryJobStore::new()),
        config.engine_settings(),
    ));
    api::serve(config.listen, engine).await
}

pub async fn generate(
    config: &Config,
    task: &str,
    framework: &str,
    out: Option<&Path>,
) -> Result<()> {
    let service = service_client(config)?;
    let backend = model_backend(config)?;

    let mut progress = WorkflowProgress::start(task);
    let result = generate::generate(
        &service,
        &backend,
        &config.worker_settings(),
        task,
        framework,
        config.wait_options(),
        |status| progress.observe(status),
    )
    .await;

    let project = match result {
        Ok(project) => project,
        Err(err) => {
            progress.fail(&err);
            return Err(err.into());
        }
    };
    progress.complete(&project);
    if let Some(id) = &project.workflow_id {
        println!("  workflow: {id}");
    }
    emit(&project, out)
}

pub async fn status(config: &Config, id: &str) -> Result<()> {
    let status = service_client(config)?.get_status(id).await?;
    ui::print_status(&status);
    Ok(())
}

pub async fn result(config: &Config, id: &str, out: Option<&Path>) -> Result<()> {
    let result = service_client(config)?.get_result(id).await?;
    let project = GeneratedProject {
        files: result.files,
        explanation: result.explanation,
        path: GenerationPath::Orchestrated,
        workflow_id: Some(result.workflow_id),
        approved: result.approved,
    };
    if let Some(error) = &result.error {
        bail!("workflow {id} failed: {error}");
    }
    if let Some(feedback) = result.review_feedback.filter(|_| project.approved == Some(false)) {
        println!("open review feedback: {feedback}");
    }
    emit(&project, out)
}

pub async fn list(config: &Config) -> Result<()> {
    let list = service_client(config)?.list_workflows().await?;
    ui::print_list(&list);
    Ok(())
}

fn service_client(config: &Config) -> Result<OrchestratorClient> {
    Ok(OrchestratorClient::new(
        &config.service_url,
        config.request_timeout(),
    )?)
}

fn emit(project: &GeneratedProject, out: Option<&Path>) -> Result<()> {
    match out {
        Some(dir) => {
            let written = write_files(dir, &project.files)?;
            for path in &written {
                println!("  wrote {}", path.display());
            }
            Ok(())
        }
        None => {
            ui::print_files(project);
            Ok(())
        }
    }
}

/// Writes `files` under `dir`, creating parent directories.
///
/// Generated paths are rooted at `/`; they are re-rooted at `dir` and any
/// path that would escape it is rejected before anything is written.
pub fn write_files(dir: &Path, files: &FileMap) -> Result<Vec<PathBuf>> {
    let targets = files
        .iter()
        .map(|(path, content)| Ok((dir.join(relative(path)?), content)))
        .collect::<Result<Vec<_>>>()?;

    let mut written = Vec::with_capacity(targets.len());
    for (target, content) in targets {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&target, content)
            .with_context(|| format!("failed to write {}", target.display()))?;
        written.push(target);
    }
    Ok(written)
}

fn relative(path: &str) -> Result<PathBuf> {
    let mut rel = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => rel.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                bail!("refusing to write outside the output directory: {path}")
            }
        }
    }
    if rel.as_os_str().is_empty() {
        bail!("generated file has an empty path");
    }
    Ok(rel)
}
