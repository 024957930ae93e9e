//! # Case Law Skill
//!
//! Wave 2 sub-agent. One instance researches one statute from Wave 1: plans opinion
//! searches, runs them within a budget of [`CASELAW_REQUEST_BUDGET`] requests (searches
//! and opinion fetches alike), then asks the model to judge the shortlisted cases.

use crate::legal::{
    clamp_confidence, default_confidence, CaseKey, CaseLawCandidate, FactPattern, LegalIssue, StatuteCandidate,
};
use crate::skills::llm_helpers::{generate, instructions_with_schema, truncate_chars, CompletionError, CompletionService};
use crate::skills::{
    prompts, select_relevant, AgentError, Judged, RequestBudget, CASELAW_REQUEST_BUDGET, EVALUATE_MAX_TOKENS,
    EXCERPT_CHARS, HITS_PER_QUERY, MAX_QUERIES, PLAN_MAX_TOKENS,
};
use crate::tools::{CaseHit, CaseLawClient};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

/// Public site the source's relative opinion paths hang off
pub const COURTLISTENER_SITE: &str = "https://www.courtlistener.com";

/// Hits that get an opinion fetch and go to the evaluator
const SHORTLIST: usize = 5;

const SNIPPET_CHARS: usize = 1000;

/// Search plan for one statute
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CaseLawPlan {
    /// Opinion search queries, best first
    #[serde(default)]
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

/// Verdict on one shortlisted case
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CaseEvaluation {
    pub case_name: String,
    #[serde(default)]
    pub citation: String,
    #[serde(default)]
    pub court: String,
    #[serde(default)]
    pub date_filed: String,
    #[serde(default)]
    pub is_relevant: bool,
    /// Quoted passage from the opinion
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub relevance_summary: String,
    /// Statute sections the case interprets
    #[serde(default)]
    pub related_statutes: Vec<String>,
    /// 0.0 - 1.0
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl Judged for CaseEvaluation {
    fn is_relevant(&self) -> bool {
        self.is_relevant
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CaseEvaluationResponse {
    #[serde(default)]
    pub evaluations: Vec<CaseEvaluation>,
}

/// Find the hit an evaluation refers to: exact identity first, then by name.
fn matching_hit<'a>(hits: &'a [CaseHit], ev: &CaseEvaluation) -> Option<&'a CaseHit> {
    let key = CaseKey::new(&ev.case_name, &ev.date_filed);
    hits.iter()
        .find(|hit| hit.key() == key)
        .or_else(|| hits.iter().find(|hit| hit.case_name.trim() == ev.case_name.trim()))
}

pub struct CaseLawSkill {
    llm: Arc<dyn CompletionService>,
    client: Arc<CaseLawClient>,
}

impl CaseLawSkill {
    pub fn new(llm: Arc<dyn CompletionService>, client: Arc<CaseLawClient>) -> Self {
        Self { llm, client }
    }

    /// Research case law for one statute. `issue` is the issue the statute came from.
    #[tracing::instrument(skip_all, fields(statute = %statute.citation_label()))]
    pub async fn run(
        &self,
        statute: &StatuteCandidate,
        issue: &LegalIssue,
        fact_pattern: &FactPattern,
    ) -> Result<Vec<CaseLawCandidate>, AgentError> {
        let plan = match self.plan(statute, issue, fact_pattern).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!(error = %e, "Case law planning failed");
                return Ok(Vec::new());
            }
        };

        let mut budget = RequestBudget::new(CASELAW_REQUEST_BUDGET);
        let hits = self.search(&plan, &mut budget).await?;
        if hits.is_empty() {
            tracing::info!("No cases found");
            return Ok(Vec::new());
        }

        let shortlist: Vec<CaseHit> = hits.into_iter().take(SHORTLIST).collect();
        let cases_text = self.describe(&shortlist, &mut budget).await?;
        tracing::info!(requests = budget.used(), "Case law search finished");

        let evaluations = match self.evaluate(statute, issue, &cases_text).await {
            Ok(evaluations) => evaluations,
            Err(e) => {
                tracing::error!(error = %e, "Case law evaluation failed");
                return Ok(Vec::new());
            }
        };

        let known: Vec<CaseEvaluation> = evaluations
            .into_iter()
            .filter(|ev| matching_hit(&shortlist, ev).is_some())
            .map(|mut ev| {
                ev.confidence = clamp_confidence(ev.confidence);
                ev
            })
            .collect();

        Ok(select_relevant(known)
            .into_iter()
            .filter_map(|ev| {
                let hit = matching_hit(&shortlist, &ev)?;
                let url = if hit.absolute_url.is_empty() {
                    String::new()
                } else {
                    format!("{}{}", COURTLISTENER_SITE, hit.absolute_url)
                };
                let related_statutes = if ev.related_statutes.is_empty() {
                    vec![statute.citation_label()]
                } else {
                    ev.related_statutes
                };
                Some(CaseLawCandidate {
                    case_name: hit.case_name.clone(),
                    citation: or_else(ev.citation, &hit.citation),
                    court: or_else(ev.court, &hit.court),
                    date_filed: hit.date_filed.clone(),
                    url,
                    snippet: ev.snippet,
                    relevance_summary: ev.relevance_summary,
                    related_statutes,
                    confidence: ev.confidence,
                    source_issue_id: issue.id.clone(),
                })
            })
            .collect())
    }

    async fn plan(
        &self,
        statute: &StatuteCandidate,
        issue: &LegalIssue,
        fact_pattern: &FactPattern,
    ) -> Result<CaseLawPlan, CompletionError> {
        let system = instructions_with_schema::<CaseLawPlan>(prompts::CASELAW_PLAN);
        let user = format!(
            "Find relevant California case law for:\n\n\
             STATUTE: {} Section {} - {}\nSTATUTE TEXT: {}\n\n\
             ISSUE: {} - {}\nRELEVANT FACTS:\n{}\n\nFULL CASE CONTEXT:\n{}",
            statute.code,
            statute.section,
            statute.title,
            truncate_chars(&statute.full_text, EXCERPT_CHARS),
            issue.label,
            issue.description,
            issue.facts_as_bullets(),
            fact_pattern.summary
        );
        generate(self.llm.as_ref(), &system, &user, PLAN_MAX_TOKENS).await
    }

    /// Run planned searches until the queries or the budget run out. First seen case wins.
    async fn search(&self, plan: &CaseLawPlan, budget: &mut RequestBudget) -> Result<Vec<CaseHit>, AgentError> {
        let mut seen = HashSet::new();
        let mut hits = Vec::new();

        for query in plan.search_queries.iter().take(MAX_QUERIES) {
            if query.trim().is_empty() {
                continue;
            }
            if !budget.try_spend() {
                break;
            }
            for hit in self.client.search(query, HITS_PER_QUERY).await? {
                if seen.insert(hit.key()) {
                    hits.push(hit);
                }
            }
        }
        Ok(hits)
    }

    /// Render the shortlist for the evaluator, fetching opinion text while budget remains.
    async fn describe(&self, shortlist: &[CaseHit], budget: &mut RequestBudget) -> Result<String, AgentError> {
        let mut text = String::new();
        for hit in shortlist {
            let _ = write!(
                text,
                "\n--- {} ---\nCourt: {}\nDate: {}\nCitation: {}\nSnippet: {}\n",
                hit.case_name,
                hit.court,
                hit.date_filed,
                hit.citation,
                truncate_chars(&hit.snippet, SNIPPET_CHARS)
            );

            let Some(opinion_id) = hit.opinion_id else {
                continue;
            };
            if !budget.try_spend() {
                continue;
            }
            if let Some(opinion) = self.client.fetch_opinion(opinion_id).await? {
                if !opinion.opinion_text.is_empty() {
                    let _ = writeln!(
                        text,
                        "Opinion excerpt: {}",
                        truncate_chars(&opinion.opinion_text, EXCERPT_CHARS)
                    );
                }
            }
        }
        Ok(text)
    }

    async fn evaluate(
        &self,
        statute: &StatuteCandidate,
        issue: &LegalIssue,
        cases_text: &str,
    ) -> Result<Vec<CaseEvaluation>, CompletionError> {
        let system = instructions_with_schema::<CaseEvaluationResponse>(prompts::CASELAW_EVALUATE);
        let user = format!(
            "Evaluate these cases for relevance:\n\n\
             STATUTE: {} Section {} - {}\nISSUE: {} - {}\nRELEVANT FACTS:\n{}\n\nCASES FOUND:\n{}",
            statute.code,
            statute.section,
            statute.title,
            issue.label,
            issue.description,
            issue.facts_as_bullets(),
            cases_text
        );
        let response: CaseEvaluationResponse =
            generate(self.llm.as_ref(), &system, &user, EVALUATE_MAX_TOKENS).await?;
        Ok(response.evaluations)
    }
}

fn or_else(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
