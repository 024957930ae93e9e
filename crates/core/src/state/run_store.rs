//! # Run Store
//!
//! Volatile, in-process registry of research runs. Constructed once at startup and
//! passed to whoever needs it. Runs are kept for the process lifetime.

use crate::legal::{CaseLawCandidate, FactPattern, FinalResult, StatuteCandidate};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Accepted narrative length, in characters after trimming
pub const MIN_INPUT_CHARS: usize = 20;
pub const MAX_INPUT_CHARS: usize = 20_000;

const RUN_ID_LEN: usize = 12;

/// Rejected narrative
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InputError {
    #[error("case text is too short ({actual} characters, minimum {min})")]
    TooShort { min: usize, actual: usize },
    #[error("case text is too long ({actual} characters, maximum {max})")]
    TooLong { max: usize, actual: usize },
}

/// Trim and length-check a submitted narrative
pub fn validate_input(text: &str) -> Result<&str, InputError> {
    let trimmed = text.trim();
    let actual = trimmed.chars().count();
    if actual < MIN_INPUT_CHARS {
        return Err(InputError::TooShort {
            min: MIN_INPUT_CHARS,
            actual,
        });
    }
    if actual > MAX_INPUT_CHARS {
        return Err(InputError::TooLong {
            max: MAX_INPUT_CHARS,
            actual,
        });
    }
    Ok(trimmed)
}

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Complete,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Complete => "complete",
            RunStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Complete | RunStatus::Error)
    }
}

/// One end-to-end research request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub input_text: String,
    pub status: RunStatus,
    pub error: Option<String>,
    pub fact_pattern: Option<FactPattern>,
    pub statutes: Vec<StatuteCandidate>,
    pub case_law: Vec<CaseLawCandidate>,
    pub created_at: DateTime<Utc>,
}

impl Run {
    fn new(run_id: String, input_text: String) -> Self {
        Self {
            run_id,
            input_text,
            status: RunStatus::Pending,
            error: None,
            fact_pattern: None,
            statutes: Vec::new(),
            case_law: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Aggregate of whatever has been computed so far
    pub fn aggregate(&self) -> FinalResult {
        FinalResult {
            run_id: self.run_id.clone(),
            fact_pattern: self.fact_pattern.clone().unwrap_or_default(),
            statutes: self.statutes.clone(),
            case_law: self.case_law.clone(),
        }
    }

    /// The final result; only a completed run has one
    pub fn final_result(&self) -> Option<FinalResult> {
        (self.status == RunStatus::Complete).then(|| self.aggregate())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            status: self.status,
            error: self.error.clone(),
            created_at: self.created_at,
        }
    }
}

/// Listing entry for a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Process-lifetime registry of runs
#[derive(Default)]
pub struct RunStore {
    runs: RwLock<HashMap<String, Run>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending run
    pub fn create(&self, input_text: &str) -> Run {
        let mut runs = self.runs.write();
        let run_id = loop {
            let candidate: String = uuid::Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(RUN_ID_LEN)
                .collect();
            if !runs.contains_key(&candidate) {
                break candidate;
            }
        };
        let run = Run::new(run_id.clone(), input_text.to_string());
        runs.insert(run_id, run.clone());
        run
    }

    /// Snapshot of a run
    pub fn get(&self, run_id: &str) -> Option<Run> {
        self.runs.read().get(run_id).cloned()
    }

    /// Mutate a run in place. Returns `false` if the run does not exist.
    pub fn update(&self, run_id: &str, apply: impl FnOnce(&mut Run)) -> bool {
        match self.runs.write().get_mut(run_id) {
            Some(run) => {
                apply(run);
                true
            }
            None => false,
        }
    }

    /// Summaries of every run, oldest first
    pub fn list(&self) -> Vec<RunSummary> {
        let mut summaries: Vec<RunSummary> = self.runs.read().values().map(Run::summary).collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.run_id.cmp(&b.run_id)));
        summaries
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_fact_pattern, sample_statute};

    #[test]
    fn test_create_and_get() {
        let store = RunStore::new();
        let run = store.create("A long enough narrative of events.");
        assert_eq!(run.run_id.len(), 12);
        assert!(run.run_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(run.status, RunStatus::Pending);

        let fetched = store.get(&run.run_id).unwrap();
        assert_eq!(fetched.input_text, run.input_text);
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_final_result_only_when_complete() {
        let store = RunStore::new();
        let run = store.create("narrative");

        store.update(&run.run_id, |run| {
            run.status = RunStatus::Error;
            run.fact_pattern = Some(sample_fact_pattern());
            run.statutes = vec![sample_statute()];
            run.error = Some("synthesis failed".to_string());
        });
        let failed = store.get(&run.run_id).unwrap();
        assert!(failed.final_result().is_none());
        // Partial results are retained
        assert_eq!(failed.statutes.len(), 1);

        store.update(&run.run_id, |run| run.status = RunStatus::Complete);
        let result = store.get(&run.run_id).unwrap().final_result().unwrap();
        assert_eq!(result.run_id, run.run_id);
        assert_eq!(result.fact_pattern.issues.len(), 2);
    }

    #[test]
    fn test_update_unknown_run() {
        let store = RunStore::new();
        assert!(!store.update("nope", |run| run.status = RunStatus::Running));
    }

    #[test]
    fn test_list_runs() {
        let store = RunStore::new();
        let a = store.create("first narrative");
        let b = store.create("second narrative");
        store.update(&b.run_id, |run| run.status = RunStatus::Running);

        let listed = store.list();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|s| s.run_id == a.run_id && s.status == RunStatus::Pending));
        assert!(listed.iter().any(|s| s.run_id == b.run_id && s.status == RunStatus::Running));
    }

    #[test]
    fn test_validate_input() {
        assert_eq!(
            validate_input("   too short   "),
            Err(InputError::TooShort { min: 20, actual: 9 })
        );
        assert!(matches!(validate_input(&"x".repeat(20_001)), Err(InputError::TooLong { .. })));
        assert_eq!(
            validate_input("  I was rear-ended at a light.  "),
            Ok("I was rear-ended at a light.")
        );
    }

    #[test]
    fn test_status_wire_names() {
        for status in [RunStatus::Pending, RunStatus::Running, RunStatus::Complete, RunStatus::Error] {
            assert_eq!(serde_json::to_string(&status).unwrap(), format!("\"{}\"", status.as_str()));
        }
        assert!(RunStatus::Error.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }
}
