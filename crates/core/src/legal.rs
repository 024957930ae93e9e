//! # Legal Data Model
//!
//! Fact patterns, issues and the candidate citations produced by the research waves.
//! Candidates carry a natural identity used for deduplication across parallel agents.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

/// Maximum number of legal issues extracted per run (one Wave 1 agent each)
pub const MAX_ISSUES: usize = 4;

/// Jurisdiction assumed when the fact-pattern extraction omits one
pub const DEFAULT_JURISDICTION: &str = "California";

/// Confidence assumed when a completion omits one
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

pub(crate) fn default_jurisdiction() -> String {
    DEFAULT_JURISDICTION.to_string()
}

pub(crate) fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

/// Clamp a model-reported confidence into [0, 1]. NaN becomes 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A single legal issue identified in the narrative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LegalIssue {
    /// Identifier, unique within a run (e.g. "issue-1")
    pub id: String,
    /// Short topic label (e.g. "negligence")
    pub label: String,
    /// One-paragraph description of the issue
    pub description: String,
    /// Facts from the narrative supporting this issue
    #[serde(default)]
    pub relevant_facts: Vec<String>,
}

impl LegalIssue {
    /// Facts rendered as a bulleted list for prompts
    pub fn facts_as_bullets(&self) -> String {
        self.relevant_facts
            .iter()
            .map(|f| format!("- {}", f))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Structured summary of the narrative. Produced once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FactPattern {
    /// Condensed summary of the facts
    pub summary: String,
    /// Parties named in the narrative
    #[serde(default)]
    pub parties: Vec<String>,
    /// Distinct legal issues, at most four
    #[serde(default)]
    pub issues: Vec<LegalIssue>,
    /// Jurisdiction label
    #[serde(default = "default_jurisdiction")]
    pub jurisdiction: String,
}

impl Default for FactPattern {
    fn default() -> Self {
        Self {
            summary: String::new(),
            parties: Vec::new(),
            issues: Vec::new(),
            jurisdiction: default_jurisdiction(),
        }
    }
}

impl FactPattern {
    /// Enforce run invariants: unique issue ids (first wins), at most [`MAX_ISSUES`] issues,
    /// non-empty jurisdiction.
    pub fn normalized(mut self) -> Self {
        let mut seen = HashSet::new();
        self.issues.retain(|issue| seen.insert(issue.id.clone()));
        self.issues.truncate(MAX_ISSUES);
        if self.jurisdiction.trim().is_empty() {
            self.jurisdiction = default_jurisdiction();
        }
        self
    }

    /// Look up an issue by id
    pub fn issue(&self, id: &str) -> Option<&LegalIssue> {
        self.issues.iter().find(|issue| issue.id == id)
    }
}

/// Natural identity of a statute: code + section
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatuteKey {
    pub code: String,
    pub section: String,
}

impl StatuteKey {
    /// Codes compare case-insensitively ("pen" == "PEN"), sections by trimmed text.
    pub fn new(code: &str, section: &str) -> Self {
        Self {
            code: code.trim().to_ascii_uppercase(),
            section: section.trim().to_string(),
        }
    }
}

impl std::fmt::Display for StatuteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.section)
    }
}

/// Natural identity of a case: name + filing date
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaseKey {
    pub case_name: String,
    pub date_filed: String,
}

impl CaseKey {
    pub fn new(case_name: &str, date_filed: &str) -> Self {
        Self {
            case_name: case_name.trim().to_string(),
            date_filed: date_filed.trim().to_string(),
        }
    }
}

/// Shared contract of statute and case-law candidates for merge and ranking
pub trait Candidate {
    type Key: Eq + Hash + Clone;

    /// Natural identity used for deduplication
    fn natural_key(&self) -> Self::Key;

    /// Confidence score in [0, 1]
    fn confidence(&self) -> f64;
}

/// A statute candidate (Wave 1 output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatuteCandidate {
    pub code: String,
    pub section: String,
    pub title: String,
    pub full_text: String,
    pub url: String,
    pub relevance_summary: String,
    pub case_snippet: String,
    pub confidence: f64,
    pub source_issue_id: String,
}

impl StatuteCandidate {
    /// "<code> <section>" label used in progress events
    pub fn citation_label(&self) -> String {
        format!("{} {}", self.code, self.section)
    }
}

impl Candidate for StatuteCandidate {
    type Key = StatuteKey;

    fn natural_key(&self) -> StatuteKey {
        StatuteKey::new(&self.code, &self.section)
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// A case-law candidate (Wave 2 output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseLawCandidate {
    pub case_name: String,
    pub citation: String,
    pub court: String,
    pub date_filed: String,
    pub url: String,
    pub snippet: String,
    pub relevance_summary: String,
    pub related_statutes: Vec<String>,
    pub confidence: f64,
    pub source_issue_id: String,
}

impl Candidate for CaseLawCandidate {
    type Key = CaseKey;

    fn natural_key(&self) -> CaseKey {
        CaseKey::new(&self.case_name, &self.date_filed)
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Keep the first occurrence of every natural identity, preserving order
pub fn dedupe_by_identity<C: Candidate>(candidates: Vec<C>) -> Vec<C> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.natural_key()))
        .collect()
}

/// Final aggregate of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub run_id: String,
    pub fact_pattern: FactPattern,
    pub statutes: Vec<StatuteCandidate>,
    pub case_law: Vec<CaseLawCandidate>,
}
