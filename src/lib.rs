//! CODEFORGE: multi-agent code generation.
//!
//! A task goes through a planner, one coder per planned subtask running
//! concurrently, a reducer merging their files, and a reviewer that can send
//! the result back for a bounded number of revisions. Jobs run in the
//! background behind an HTTP API; [`generate`] is the caller-side entry
//! point that falls back to a single model call when the service is down.

pub mod anthropic;
pub mod api;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod generate;
pub mod logging;
pub mod reducer;
pub mod state_machine;
pub mod store;
pub mod stub;
pub mod ui;
pub mod workers;

#[cfg(test)]
mod testing;
