//! # Synthesis Skill
//!
//! Once per wave: merge the candidates of every sub-agent into one ranked list of at
//! most [`MAX_RESULTS_PER_WAVE`]. The model sees compact candidates (no statute text)
//! and returns a ranking; large fields are re-attached from the original candidates
//! by natural identity.

use crate::legal::{
    clamp_confidence, default_confidence, dedupe_by_identity, CaseKey, CaseLawCandidate, Candidate, FactPattern,
    StatuteCandidate, StatuteKey,
};
use crate::skills::llm_helpers::{generate, instructions_with_schema, CompletionError, CompletionService};
use crate::skills::{prompts, MAX_RESULTS_PER_WAVE, MIN_CONFIDENCE};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const MAX_TOKENS: u32 = 4096;

/// Statute as the synthesizer sees it
#[derive(Serialize)]
struct StatuteBrief<'a> {
    code: &'a str,
    section: &'a str,
    title: &'a str,
    relevance_summary: &'a str,
    case_snippet: &'a str,
    confidence: f64,
    source_issue_id: &'a str,
}

impl<'a> From<&'a StatuteCandidate> for StatuteBrief<'a> {
    fn from(c: &'a StatuteCandidate) -> Self {
        Self {
            code: &c.code,
            section: &c.section,
            title: &c.title,
            relevance_summary: &c.relevance_summary,
            case_snippet: &c.case_snippet,
            confidence: c.confidence,
            source_issue_id: &c.source_issue_id,
        }
    }
}

/// Case as the synthesizer sees it
#[derive(Serialize)]
struct CaseBrief<'a> {
    case_name: &'a str,
    citation: &'a str,
    court: &'a str,
    date_filed: &'a str,
    snippet: &'a str,
    relevance_summary: &'a str,
    related_statutes: &'a [String],
    confidence: f64,
    source_issue_id: &'a str,
}

impl<'a> From<&'a CaseLawCandidate> for CaseBrief<'a> {
    fn from(c: &'a CaseLawCandidate) -> Self {
        Self {
            case_name: &c.case_name,
            citation: &c.citation,
            court: &c.court,
            date_filed: &c.date_filed,
            snippet: &c.snippet,
            relevance_summary: &c.relevance_summary,
            related_statutes: &c.related_statutes,
            confidence: c.confidence,
            source_issue_id: &c.source_issue_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RankedStatute {
    pub code: String,
    pub section: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub relevance_summary: String,
    #[serde(default)]
    pub case_snippet: String,
    /// 0.0 - 1.0
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub source_issue_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatuteRanking {
    /// Most relevant first, at most four
    #[serde(default)]
    pub ranked_statutes: Vec<RankedStatute>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RankedCase {
    pub case_name: String,
    #[serde(default)]
    pub citation: String,
    #[serde(default)]
    pub court: String,
    #[serde(default)]
    pub date_filed: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub relevance_summary: String,
    #[serde(default)]
    pub related_statutes: Vec<String>,
    /// 0.0 - 1.0
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub source_issue_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CaseRanking {
    /// Most useful first, at most four
    #[serde(default)]
    pub ranked_cases: Vec<RankedCase>,
}

/// Drop low confidence, dedupe, cap. Order is the model's ranking.
///
/// Filtering first keeps a confident entry whose identity was also listed earlier at low confidence.
fn finalize<C: Candidate>(candidates: Vec<C>) -> Vec<C> {
    let confident: Vec<C> = candidates
        .into_iter()
        .filter(|c| c.confidence() >= MIN_CONFIDENCE)
        .collect();
    let mut kept = dedupe_by_identity(confident);
    kept.truncate(MAX_RESULTS_PER_WAVE);
    kept
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

pub struct SynthesisSkill {
    llm: Arc<dyn CompletionService>,
}

impl SynthesisSkill {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    /// Wave 1 synthesis. Statutes the model returns that match no candidate are dropped.
    pub async fn synthesize_statutes(
        &self,
        fact_pattern: &FactPattern,
        candidates: &[StatuteCandidate],
    ) -> Result<Vec<StatuteCandidate>, CompletionError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let briefs: Vec<StatuteBrief> = candidates.iter().map(StatuteBrief::from).collect();
        let system = instructions_with_schema::<StatuteRanking>(prompts::SYNTHESIZE_STATUTES);
        let user = format!(
            "Synthesize and rank these statute results from multiple research agents:\n\n\
             FACT PATTERN:\n{}\n\nCANDIDATE STATUTES:\n{}",
            fact_pattern.summary,
            to_json(&briefs)?
        );
        let ranking: StatuteRanking = generate(self.llm.as_ref(), &system, &user, MAX_TOKENS).await?;

        let originals: HashMap<StatuteKey, &StatuteCandidate> = candidates
            .iter()
            .rev()
            .map(|c| (c.natural_key(), c))
            .collect();

        let rehydrated: Vec<StatuteCandidate> = ranking
            .ranked_statutes
            .into_iter()
            .filter_map(|ranked| {
                let key = StatuteKey::new(&ranked.code, &ranked.section);
                let Some(original) = originals.get(&key) else {
                    tracing::warn!(statute = %key, "Synthesis returned a statute no agent proposed, dropping");
                    return None;
                };
                Some(StatuteCandidate {
                    code: original.code.clone(),
                    section: original.section.clone(),
                    title: non_empty_or(ranked.title, &original.title),
                    full_text: original.full_text.clone(),
                    url: original.url.clone(),
                    relevance_summary: non_empty_or(ranked.relevance_summary, &original.relevance_summary),
                    case_snippet: non_empty_or(ranked.case_snippet, &original.case_snippet),
                    confidence: clamp_confidence(ranked.confidence),
                    source_issue_id: non_empty_or(ranked.source_issue_id, &original.source_issue_id),
                })
            })
            .collect();

        let result = finalize(rehydrated);
        tracing::info!(candidates = candidates.len(), kept = result.len(), "Statutes synthesized");
        Ok(result)
    }

    /// Wave 2 synthesis, with the finalized statutes as context.
    pub async fn synthesize_case_law(
        &self,
        fact_pattern: &FactPattern,
        statutes: &[StatuteCandidate],
        candidates: &[CaseLawCandidate],
    ) -> Result<Vec<CaseLawCandidate>, CompletionError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let statutes_summary = statutes
            .iter()
            .map(|s| format!("- {} {}: {}", s.code, s.section, s.title))
            .collect::<Vec<_>>()
            .join("\n");
        let briefs: Vec<CaseBrief> = candidates.iter().map(CaseBrief::from).collect();
        let system = instructions_with_schema::<CaseRanking>(prompts::SYNTHESIZE_CASES);
        let user = format!(
            "Synthesize and rank these case law results from multiple research agents:\n\n\
             FACT PATTERN:\n{}\n\nSTATUTES FOUND:\n{}\n\nCANDIDATE CASES:\n{}",
            fact_pattern.summary,
            statutes_summary,
            to_json(&briefs)?
        );
        let ranking: CaseRanking = generate(self.llm.as_ref(), &system, &user, MAX_TOKENS).await?;

        let originals: HashMap<CaseKey, &CaseLawCandidate> = candidates
            .iter()
            .rev()
            .map(|c| (c.natural_key(), c))
            .collect();

        let rehydrated: Vec<CaseLawCandidate> = ranking
            .ranked_cases
            .into_iter()
            .filter_map(|ranked| {
                let key = CaseKey::new(&ranked.case_name, &ranked.date_filed);
                let original = originals.get(&key).copied().or_else(|| {
                    candidates
                        .iter()
                        .find(|c| c.case_name.trim() == ranked.case_name.trim())
                });
                let Some(original) = original else {
                    tracing::warn!(case = %ranked.case_name, "Synthesis returned a case no agent proposed, dropping");
                    return None;
                };
                Some(CaseLawCandidate {
                    case_name: original.case_name.clone(),
                    citation: non_empty_or(ranked.citation, &original.citation),
                    court: non_empty_or(ranked.court, &original.court),
                    date_filed: original.date_filed.clone(),
                    url: original.url.clone(),
                    snippet: non_empty_or(ranked.snippet, &original.snippet),
                    relevance_summary: non_empty_or(ranked.relevance_summary, &original.relevance_summary),
                    related_statutes: if ranked.related_statutes.is_empty() {
                        original.related_statutes.clone()
                    } else {
                        ranked.related_statutes
                    },
                    confidence: clamp_confidence(ranked.confidence),
                    source_issue_id: non_empty_or(ranked.source_issue_id, &original.source_issue_id),
                })
            })
            .collect();

        let result = finalize(rehydrated);
        tracing::info!(candidates = candidates.len(), kept = result.len(), "Case law synthesized");
        Ok(result)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CompletionError> {
    serde_json::to_string_pretty(value).map_err(|e| CompletionError::Service(format!("failed to encode candidates: {}", e)))
}
