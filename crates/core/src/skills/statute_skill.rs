//! # Statute Skill
//!
//! Wave 1 sub-agent. One instance researches one [`LegalIssue`]:
//!
//! 1. **Plan** - the model proposes direct section lookups and keyword queries
//! 2. **Execute** - lookups first, then searches, each follow-up fetch charged to a
//!    budget of [`STATUTE_REQUEST_BUDGET`] requests
//! 3. **Evaluate** - the model judges every collected section; the best two survive

use crate::legal::{clamp_confidence, default_confidence, FactPattern, LegalIssue, StatuteCandidate, StatuteKey};
use crate::skills::llm_helpers::{generate, instructions_with_schema, truncate_chars, CompletionService};
use crate::skills::{
    prompts, select_relevant, AgentError, Judged, RequestBudget, EVALUATE_MAX_TOKENS, EXCERPT_CHARS,
    HITS_PER_QUERY, MAX_QUERIES, PLAN_MAX_TOKENS, STATUTE_REQUEST_BUDGET,
};
use crate::tools::{StatuteClient, StatuteSection};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A code section the planner expects to apply
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SectionRef {
    /// Code abbreviation, e.g. "PEN"
    pub code: String,
    /// Section number, e.g. "240"
    pub section: String,
}

/// Research plan for one issue
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatutePlan {
    /// Keyword phrases for the code text search, best first
    #[serde(default)]
    pub keyword_queries: Vec<String>,
    /// Sections to fetch directly, best first
    #[serde(default)]
    pub specific_lookups: Vec<SectionRef>,
    /// Short explanation of the strategy
    #[serde(default)]
    pub reasoning: String,
}

/// Verdict on one retrieved section
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatuteEvaluation {
    pub code: String,
    pub section: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_relevant: bool,
    #[serde(default)]
    pub relevance_summary: String,
    /// The facts that trigger this statute
    #[serde(default)]
    pub case_snippet: String,
    /// 0.0 - 1.0
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl Judged for StatuteEvaluation {
    fn is_relevant(&self) -> bool {
        self.is_relevant
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatuteEvaluationResponse {
    #[serde(default)]
    pub evaluations: Vec<StatuteEvaluation>,
}

/// Sections gathered during execute, first seen wins
#[derive(Default)]
struct Collected {
    order: Vec<StatuteKey>,
    sections: HashMap<StatuteKey, StatuteSection>,
}

impl Collected {
    fn contains(&self, key: &StatuteKey) -> bool {
        self.sections.contains_key(key)
    }

    fn insert(&mut self, section: StatuteSection) {
        let key = section.key();
        if !self.sections.contains_key(&key) {
            self.order.push(key.clone());
            self.sections.insert(key, section);
        }
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &StatuteSection> {
        self.order.iter().filter_map(|key| self.sections.get(key))
    }
}

pub struct StatuteSkill {
    llm: Arc<dyn CompletionService>,
    client: Arc<StatuteClient>,
}

impl StatuteSkill {
    pub fn new(llm: Arc<dyn CompletionService>, client: Arc<StatuteClient>) -> Self {
        Self { llm, client }
    }

    /// Research one issue. Returns at most two candidates, highest confidence first.
    #[tracing::instrument(skip_all, fields(issue = %issue.id))]
    pub async fn run(
        &self,
        issue: &LegalIssue,
        fact_pattern: &FactPattern,
    ) -> Result<Vec<StatuteCandidate>, AgentError> {
        let plan = match self.plan(issue, fact_pattern).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!(error = %e, "Statute planning failed");
                return Ok(Vec::new());
            }
        };

        let collected = self.execute(&plan, issue).await?;
        if collected.is_empty() {
            tracing::info!(label = %issue.label, "No statutes found");
            return Ok(Vec::new());
        }

        let evaluations = match self.evaluate(issue, &collected).await {
            Ok(evaluations) => evaluations,
            Err(e) => {
                tracing::error!(error = %e, "Statute evaluation failed");
                return Ok(Vec::new());
            }
        };

        let known: Vec<StatuteEvaluation> = evaluations
            .into_iter()
            .filter(|ev| {
                let known = collected.contains(&StatuteKey::new(&ev.code, &ev.section));
                if !known {
                    tracing::debug!(code = %ev.code, section = %ev.section, "Dropping evaluation of a section that was never retrieved");
                }
                known
            })
            .map(|mut ev| {
                ev.confidence = clamp_confidence(ev.confidence);
                ev
            })
            .collect();

        Ok(select_relevant(known)
            .into_iter()
            .filter_map(|ev| {
                let key = StatuteKey::new(&ev.code, &ev.section);
                let section = collected.sections.get(&key)?;
                Some(StatuteCandidate {
                    code: section.code.clone(),
                    section: section.section.clone(),
                    title: if ev.title.trim().is_empty() {
                        section.title.clone()
                    } else {
                        ev.title
                    },
                    full_text: section.full_text.clone(),
                    url: section.url.clone(),
                    relevance_summary: ev.relevance_summary,
                    case_snippet: ev.case_snippet,
                    confidence: ev.confidence,
                    source_issue_id: issue.id.clone(),
                })
            })
            .collect())
    }

    async fn plan(
        &self,
        issue: &LegalIssue,
        fact_pattern: &FactPattern,
    ) -> Result<StatutePlan, crate::skills::CompletionError> {
        let system = instructions_with_schema::<StatutePlan>(prompts::STATUTE_PLAN);
        let user = format!(
            "Find relevant California statutes for this legal issue:\n\n\
             ISSUE: {}\nDESCRIPTION: {}\nRELEVANT FACTS:\n{}\n\nFULL CASE CONTEXT:\n{}",
            issue.label,
            issue.description,
            issue.facts_as_bullets(),
            fact_pattern.summary
        );
        generate(self.llm.as_ref(), &system, &user, PLAN_MAX_TOKENS).await
    }

    /// Direct lookups, then keyword searches. Stops the moment the budget runs out.
    async fn execute(&self, plan: &StatutePlan, issue: &LegalIssue) -> Result<Collected, AgentError> {
        let mut budget = RequestBudget::new(STATUTE_REQUEST_BUDGET);
        let mut collected = Collected::default();
        let mut searched: HashSet<StatuteKey> = HashSet::new();

        for lookup in &plan.specific_lookups {
            if lookup.code.trim().is_empty() || lookup.section.trim().is_empty() {
                continue;
            }
            if !budget.try_spend() {
                break;
            }
            searched.insert(StatuteKey::new(&lookup.code, &lookup.section));
            if let Some(section) = self.client.fetch_section(&lookup.code, &lookup.section).await? {
                collected.insert(section);
            }
        }

        'queries: for query in plan.keyword_queries.iter().take(MAX_QUERIES) {
            if query.trim().is_empty() {
                continue;
            }
            if !budget.try_spend() {
                break;
            }
            let hits = self.client.keyword_search(query, HITS_PER_QUERY).await?;
            for hit in hits {
                if !searched.insert(hit.key()) {
                    continue;
                }
                if !budget.try_spend() {
                    break 'queries;
                }
                if let Some(section) = self.client.fetch_section(&hit.code, &hit.section).await? {
                    collected.insert(section);
                }
            }
        }

        tracing::info!(label = %issue.label, requests = budget.used(), found = collected.order.len(), "Statute search finished");
        Ok(collected)
    }

    async fn evaluate(
        &self,
        issue: &LegalIssue,
        collected: &Collected,
    ) -> Result<Vec<StatuteEvaluation>, crate::skills::CompletionError> {
        let statutes_text: String = collected
            .iter()
            .map(|sec| {
                format!(
                    "\n--- {} Section {} ---\nTitle: {}\nText: {}\n",
                    sec.code,
                    sec.section,
                    sec.title,
                    truncate_chars(&sec.full_text, EXCERPT_CHARS)
                )
            })
            .collect();

        let system = instructions_with_schema::<StatuteEvaluationResponse>(prompts::STATUTE_EVALUATE);
        let user = format!(
            "Evaluate these statutes for relevance to the issue:\n\n\
             ISSUE: {} - {}\nRELEVANT FACTS:\n{}\n\nSTATUTES FOUND:\n{}",
            issue.label,
            issue.description,
            issue.facts_as_bullets(),
            statutes_text
        );
        let response: StatuteEvaluationResponse =
            generate(self.llm.as_ref(), &system, &user, EVALUATE_MAX_TOKENS).await?;
        Ok(response.evaluations)
    }
}
