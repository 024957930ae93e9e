//! Default prompt templates bundled at compile time.
//!
//! Each skill appends the JSON Schema of its expected output to these at call time.

/// Fact pattern analyst - narrative to structured issues
pub const FACT_PATTERN: &str = include_str!("defaults/fact_pattern.md");

/// Statute planner - keyword queries and direct section lookups for one issue
pub const STATUTE_PLAN: &str = include_str!("defaults/statute_plan.md");

/// Statute evaluator - relevance judgment per retrieved section
pub const STATUTE_EVALUATE: &str = include_str!("defaults/statute_evaluate.md");

/// Case law planner - opinion search queries for one statute
pub const CASELAW_PLAN: &str = include_str!("defaults/caselaw_plan.md");

/// Case law evaluator - relevance judgment per retrieved opinion
pub const CASELAW_EVALUATE: &str = include_str!("defaults/caselaw_evaluate.md");

/// Wave 1 synthesis - merge and rank statute candidates
pub const SYNTHESIZE_STATUTES: &str = include_str!("defaults/synthesize_statutes.md");

/// Wave 2 synthesis - merge and rank case-law candidates
pub const SYNTHESIZE_CASES: &str = include_str!("defaults/synthesize_cases.md");

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("fact_pattern", FACT_PATTERN),
        ("statute_plan", STATUTE_PLAN),
        ("statute_evaluate", STATUTE_EVALUATE),
        ("caselaw_plan", CASELAW_PLAN),
        ("caselaw_evaluate", CASELAW_EVALUATE),
        ("synthesize_statutes", SYNTHESIZE_STATUTES),
        ("synthesize_cases", SYNTHESIZE_CASES),
    ]
}
