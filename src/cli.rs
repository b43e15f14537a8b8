//! Command-line interface built on clap.
//!
//! [`Cli`] holds the subcommands ([`Command`]) and the global flags
//! (`--config`, `--service-url`, `--verbose`).

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::api::DEFAULT_FRAMEWORK;

/// CODEFORGE: planner, parallel coders and a reviewer turning one task into a project.
#[derive(Debug, Parser)]
#[command(name = "codeforge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (defaults to ./codeforge.toml when present).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the workflow service.
    #[arg(long, global = true)]
    pub service_url: Option<String>,

    /// Debug-level logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs the workflow HTTP service.
    Serve {
        /// Address to bind, overriding `listen` from the config.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Generates a project, through the service when reachable.
    Generate {
        /// What to build.
        task: String,

        #[arg(long, short, default_value = DEFAULT_FRAMEWORK)]
        framework: String,

        /// Directory to write the generated files into.
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Shows the status of a workflow.
    Status { id: String },

    /// Prints the result of a finished workflow.
    Result {
        id: String,

        /// Directory to write the files into instead of printing them.
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Lists every workflow the service knows about.
    List,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_generate_subcommand() {
        let cli = Cli::parse_from(["codeforge", "generate", "Create a todo app"]);
        match cli.command {
            Command::Generate {
                task,
                framework,
                out,
            } => {
                assert_eq!(task, "Create a todo app");
                assert_eq!(framework, "react");
                assert!(out.is_none());
            }
            _ => panic!("expected Generate command"),
        }
    }

    #[test]
    fn cli_parses_generate_options() {
        let cli = Cli::parse_from([
            "codeforge",
            "generate",
            "A counter",
            "--framework",
            "vue",
            "--out",
            "./counter",
        ]);
        match cli.command {
            Command::Generate { framework, out, .. } => {
                assert_eq!(framework, "vue");
                assert_eq!(out, Some(PathBuf::from("./counter")));
            }
            _ => panic!("expected Generate command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "codeforge",
            "--config",
            "ci.toml",
            "--service-url",
            "http://orchestrator:8000",
            "--verbose",
            "list",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("ci.toml")));
        assert_eq!(cli.service_url.as_deref(), Some("http://orchestrator:8000"));
        assert!(matches!(cli.command, Command::List));
    }

    #[test]
    fn cli_parses_serve_listen() {
        let cli = Cli::parse_from(["codeforge", "serve", "--listen", "0.0.0.0:9000"]);
        match cli.command {
            Command::Serve { listen } => assert_eq!(listen.unwrap().port(), 9000),
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn cli_requires_workflow_id() {
        assert!(Cli::try_parse_from(["codeforge", "status"]).is_err());
        let cli = Cli::parse_from(["codeforge", "result", "abc", "-o", "out"]);
        assert!(matches!(cli.command, Command::Result { ref id, .. } if id == "abc"));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
