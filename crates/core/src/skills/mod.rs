//! # Casebrief Skills
//!
//! Completion-service driven units of work for the research pipeline.
//!
//! ## Architecture
//!
//! ```text
//! Coordinator
//!   ├── FactPatternSkill       narrative -> FactPattern
//!   ├── StatuteSkill   (xN)    plan -> bounded execute -> evaluate, one per issue
//!   ├── CaseLawSkill   (xN)    plan -> bounded execute -> evaluate, one per statute
//!   └── SynthesisSkill         merge, dedupe, rank once per wave
//! ```
//!
//! Sub-agents (`StatuteSkill`, `CaseLawSkill`) never fail on planning or evaluation
//! problems: those become an empty result. The only error they return is
//! [`AgentError::Fatal`], raised when a source rejects our credentials.

pub mod caselaw_skill;
pub mod fact_pattern_skill;
pub mod llm_helpers;
pub mod prompts;
pub mod statute_skill;
pub mod synthesis_skill;

pub use caselaw_skill::CaseLawSkill;
pub use fact_pattern_skill::FactPatternSkill;
pub use llm_helpers::{CompletionError, CompletionService};
pub use statute_skill::StatuteSkill;
pub use synthesis_skill::SynthesisSkill;

use crate::tools::SourceError;
use thiserror::Error;

/// Candidates below this confidence are never reported
pub const MIN_CONFIDENCE: f64 = 0.3;

/// Results kept per sub-agent invocation
pub const MAX_RESULTS_PER_AGENT: usize = 2;

/// Results kept per wave after synthesis
pub const MAX_RESULTS_PER_WAVE: usize = 4;

/// External requests one statute sub-agent may make
pub const STATUTE_REQUEST_BUDGET: usize = 5;

/// External requests one case-law sub-agent may make
pub const CASELAW_REQUEST_BUDGET: usize = 10;

/// Planned queries actually executed per sub-agent
pub(crate) const MAX_QUERIES: usize = 5;

/// Hits requested per search call
pub(crate) const HITS_PER_QUERY: usize = 5;

/// Per-item excerpt length shown to the evaluator
pub(crate) const EXCERPT_CHARS: usize = 2000;

pub(crate) const PLAN_MAX_TOKENS: u32 = 1024;
pub(crate) const EVALUATE_MAX_TOKENS: u32 = 4096;

/// Error a sub-agent may raise to its wave
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AgentError {
    #[error("fatal source failure: {0}")]
    Fatal(#[from] SourceError),
    /// The agent's task panicked or was cancelled
    #[error("sub-agent aborted: {0}")]
    Aborted(String),
}

/// Hard ceiling on external calls for one sub-agent invocation
#[derive(Debug, Clone)]
pub struct RequestBudget {
    limit: usize,
    used: usize,
}

impl RequestBudget {
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    /// Reserve one request. `false` once the budget is exhausted.
    pub fn try_spend(&mut self) -> bool {
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

/// An evaluator verdict on one retrieved item
pub trait Judged {
    fn is_relevant(&self) -> bool;
    fn confidence(&self) -> f64;
}

/// Selection policy shared by both sub-agent kinds: drop not-relevant and
/// low-confidence items, order by confidence (highest first), keep the top
/// [`MAX_RESULTS_PER_AGENT`].
pub fn select_relevant<T: Judged>(items: Vec<T>) -> Vec<T> {
    let mut kept: Vec<T> = items
        .into_iter()
        .filter(|item| item.is_relevant() && item.confidence() >= MIN_CONFIDENCE)
        .collect();
    kept.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
    kept.truncate(MAX_RESULTS_PER_AGENT);
    kept
}
