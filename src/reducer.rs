//! Fan-in of parallel coder outputs.
//!
//! Outputs are merged by key union in ascending subtask index, so when two
//! subtasks emit the same path the later subtask wins regardless of which
//! coder finished first.

use crate::state_machine::FileMap;
use crate::workers::CodeOutput;

/// Merges per-subtask outputs, given in subtask order, into one output.
pub fn reduce(outputs: Vec<CodeOutput>) -> CodeOutput {
    let mut merged = CodeOutput::default();
    let mut explanations = Vec::new();

    for (index, output) in outputs.into_iter().enumerate() {
        for path in merge_into(&mut merged.files, output.files) {
            tracing::debug!(subtask = index, %path, "path collision; later subtask wins");
        }
        if let Some(explanation) = output.explanation {
            explanations.push(explanation);
        }
    }

    if !explanations.is_empty() {
        merged.explanation = Some(explanations.join("\n"));
    }
    merged
}

/// Inserts every incoming file into `target`, returning the paths that
/// were overwritten. Never removes a key.
pub fn merge_into(target: &mut FileMap, incoming: FileMap) -> Vec<String> {
    let mut overwritten = Vec::new();
    for (path, content) in incoming {
        if target.contains_key(&path) {
            overwritten.push(path.clone());
        }
        target.insert(path, content);
    }
    overwritten
}
