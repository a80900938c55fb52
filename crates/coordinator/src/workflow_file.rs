//! Best-effort workflow-definition parsing.
//!
//! Workflow files are CI-style YAML documents. The coordinator only reads
//! the fields it needs for tagging (top-level `name` and `labels`, plus
//! each job's `name` and `labels`) and ignores everything else (`on:`,
//! `steps:`, triggers, ...). Parsing never fails a submission: a file that
//! cannot be opened or parsed yields an empty tag set and an error string
//! carried on the record.

use std::collections::BTreeSet;

use camino::Utf8Path;
use meshkit_primitives::{OFFLINE_TAG, P2P_TAG};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::warn;

/// Metadata extracted from a workflow source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowTags {
    /// Top-level `name`, when the source is a parseable file.
    pub name: Option<String>,
    /// Union of all label lists plus implicit mesh tags from names.
    pub tags: BTreeSet<String>,
    /// Whether the tags mark the workflow for mesh execution.
    pub mesh_eligible: bool,
    /// Parse or read failure, if any. Submission proceeds regardless.
    pub error: Option<String>,
}

impl WorkflowTags {
    fn empty() -> Self {
        Self {
            name: None,
            tags: BTreeSet::new(),
            mesh_eligible: false,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::empty()
        }
    }
}

/// Extracts tags from a workflow source reference.
///
/// If `source_ref` names a readable file it is parsed as YAML; otherwise it
/// is treated as an opaque inline reference and yields no tags and no
/// error.
#[must_use]
pub fn parse_source(source_ref: &str) -> WorkflowTags {
    let path = Utf8Path::new(source_ref);
    if !path.is_file() {
        return WorkflowTags::empty();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(%path, error = %e, "failed to read workflow file");
            return WorkflowTags::failed(e.to_string());
        }
    };

    match serde_yaml::from_str::<Value>(&content) {
        Ok(doc) => extract(&doc),
        Err(e) => {
            warn!(%path, error = %e, "failed to parse workflow file");
            WorkflowTags::failed(e.to_string())
        }
    }
}

fn extract(doc: &Value) -> WorkflowTags {
    let mut tags = BTreeSet::new();

    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);

    collect_labels(doc.get("labels"), &mut tags);
    collect_implicit(name.as_deref(), &mut tags);

    if let Some(jobs) = doc.get("jobs").and_then(Value::as_mapping) {
        for (_job_key, job) in jobs.iter() {
            collect_labels(job.get("labels"), &mut tags);
            collect_implicit(job.get("name").and_then(Value::as_str), &mut tags);
        }
    }

    let mesh_eligible = tags.contains(P2P_TAG) || tags.contains(OFFLINE_TAG);

    WorkflowTags {
        name,
        tags,
        mesh_eligible,
        error: None,
    }
}

fn collect_labels(labels: Option<&Value>, tags: &mut BTreeSet<String>) {
    let Some(labels) = labels.and_then(Value::as_sequence) else {
        return;
    };

    for label in labels {
        if let Some(label) = label.as_str() {
            let _new = tags.insert(label.to_owned());
        }
    }
}

/// The reserved tag strings also count when they appear as substrings of a
/// workflow or job name, case-insensitively.
fn collect_implicit(name: Option<&str>, tags: &mut BTreeSet<String>) {
    let Some(name) = name else {
        return;
    };
    let lowered = name.to_lowercase();

    for tag in [P2P_TAG, OFFLINE_TAG] {
        if lowered.contains(tag) {
            let _new = tags.insert(tag.to_owned());
        }
    }
}
