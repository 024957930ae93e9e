//! # Stream Events
//!
//! Progress events published for one run. On the wire every event is a
//! `{"type": ..., "payload": ...}` object.

use crate::legal::{CaseLawCandidate, FactPattern, FinalResult, StatuteCandidate};
use serde::{Deserialize, Serialize};

/// Status of one sub-agent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Searching,
    Complete,
    Failed,
}

/// Progress of one Wave 1 sub-agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatuteProgress {
    pub issue_id: String,
    pub label: String,
    pub status: ProgressStatus,
    /// Candidates found, on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// Progress of one Wave 2 sub-agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaselawProgress {
    /// "<code> <section>"
    pub statute: String,
    pub issue_id: String,
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// An event in a run's stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StreamEvent {
    RunStarted { run_id: String },
    FactPattern(FactPattern),
    Wave1Started { issue_count: usize },
    StatuteProgress(StatuteProgress),
    StatuteFound(StatuteCandidate),
    Wave1Complete { statutes: Vec<StatuteCandidate> },
    Wave2Started { statute_count: usize },
    CaselawProgress(CaselawProgress),
    CaselawFound(CaseLawCandidate),
    Wave2Complete { case_law: Vec<CaseLawCandidate> },
    RunComplete(FinalResult),
    Error { message: String },
}

impl StreamEvent {
    /// Wire name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::RunStarted { .. } => "run_started",
            StreamEvent::FactPattern(_) => "fact_pattern",
            StreamEvent::Wave1Started { .. } => "wave1_started",
            StreamEvent::StatuteProgress(_) => "statute_progress",
            StreamEvent::StatuteFound(_) => "statute_found",
            StreamEvent::Wave1Complete { .. } => "wave1_complete",
            StreamEvent::Wave2Started { .. } => "wave2_started",
            StreamEvent::CaselawProgress(_) => "caselaw_progress",
            StreamEvent::CaselawFound(_) => "caselaw_found",
            StreamEvent::Wave2Complete { .. } => "wave2_complete",
            StreamEvent::RunComplete(_) => "run_complete",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// `run_complete` and `error` end a run's stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::RunComplete(_) | StreamEvent::Error { .. })
    }

    /// Wire encoding
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(kind = self.kind(), error = %e, "Failed to encode stream event");
            format!(r#"{{"type":"error","payload":{{"message":"unencodable {} event"}}}}"#, self.kind())
        })
    }
}
