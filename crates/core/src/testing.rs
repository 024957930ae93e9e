//! Scripted fakes for the completion service and both legal-data sources.

use crate::legal::{CaseLawCandidate, FactPattern, LegalIssue, StatuteCandidate, StatuteKey};
use crate::skills::llm_helpers::{CompletionError, CompletionService};
use crate::tools::{CaseHit, CaseLawBackend, OpinionDetail, SourceError, StatuteBackend, StatuteHit, StatuteSection};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Responder = Box<dyn Fn(&str, &str) -> Result<Value, CompletionError> + Send + Sync>;

/// Completion service answering from a closure over (system, user)
pub struct FakeCompletion {
    respond: Responder,
    calls: AtomicUsize,
}

impl FakeCompletion {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&str, &str) -> Result<Value, CompletionError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn generate_structured(
        &self,
        system_instructions: &str,
        user_content: &str,
        _max_output_tokens: u32,
    ) -> Result<Value, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(system_instructions, user_content)
    }
}

/// Whether `system` was built from the bundled `prompt`
pub fn is_prompt(system: &str, prompt: &str) -> bool {
    system.starts_with(prompt.trim_end())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Normal,
    Transient,
    Unauthorized,
}

fn failure(mode: Mode, source_name: &'static str) -> Option<SourceError> {
    match mode {
        Mode::Normal => None,
        Mode::Transient => Some(SourceError::Transient {
            source_name,
            message: "503 Service Unavailable".to_string(),
        }),
        Mode::Unauthorized => Some(SourceError::Unauthorized {
            source_name,
            message: "401 Unauthorized".to_string(),
        }),
    }
}

/// In-memory statute source with call counters
pub struct FakeStatuteBackend {
    sections: HashMap<StatuteKey, StatuteSection>,
    search_hits: HashMap<String, Vec<StatuteKey>>,
    default_hits: Vec<StatuteKey>,
    mode: Mode,
    fetch_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl FakeStatuteBackend {
    pub fn new() -> Self {
        Self {
            sections: HashMap::new(),
            search_hits: HashMap::new(),
            default_hits: Vec::new(),
            mode: Mode::Normal,
            fetch_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_section(mut self, code: &str, section: &str, title: &str) -> Self {
        let key = StatuteKey::new(code, section);
        self.sections.insert(
            key.clone(),
            StatuteSection {
                code: key.code.clone(),
                section: key.section.clone(),
                title: title.to_string(),
                full_text: format!("{} {}. {} full text.", key.code, key.section, title),
                url: format!("https://leginfo.test/{}/{}", key.code, key.section),
            },
        );
        self
    }

    /// Hits returned for exactly `query`
    pub fn with_search_hits(mut self, query: &str, hits: &[(&str, &str)]) -> Self {
        let keys = hits.iter().map(|(c, s)| StatuteKey::new(c, s)).collect();
        self.search_hits.insert(query.to_string(), keys);
        self
    }

    /// Hits returned for any query without its own entry
    pub fn with_search_hits_everywhere(mut self, hits: &[(&str, &str)]) -> Self {
        self.default_hits = hits.iter().map(|(c, s)| StatuteKey::new(c, s)).collect();
        self
    }

    pub fn failing_transiently(mut self) -> Self {
        self.mode = Mode::Transient;
        self
    }

    pub fn unauthorized(mut self) -> Self {
        self.mode = Mode::Unauthorized;
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.fetch_calls() + self.search_calls()
    }
}

#[async_trait]
impl StatuteBackend for FakeStatuteBackend {
    async fn fetch_section(&self, code: &str, section: &str) -> Result<Option<StatuteSection>, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = failure(self.mode, "leginfo") {
            return Err(err);
        }
        Ok(self.sections.get(&StatuteKey::new(code, section)).cloned())
    }

    async fn keyword_search(&self, query: &str, max_results: usize) -> Result<Vec<StatuteHit>, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = failure(self.mode, "leginfo") {
            return Err(err);
        }
        let keys = self.search_hits.get(query).unwrap_or(&self.default_hits);
        Ok(keys
            .iter()
            .take(max_results)
            .map(|key| {
                let title = self
                    .sections
                    .get(key)
                    .map(|s| s.title.clone())
                    .unwrap_or_default();
                StatuteHit {
                    code: key.code.clone(),
                    section: key.section.clone(),
                    snippet: title.clone(),
                    title,
                    url: format!("https://leginfo.test/{}/{}", key.code, key.section),
                }
            })
            .collect())
    }
}

/// In-memory case-law source with call counters
pub struct FakeCaseLawBackend {
    cases: Vec<(CaseHit, OpinionDetail)>,
    mode: Mode,
    search_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl FakeCaseLawBackend {
    pub fn new() -> Self {
        Self {
            cases: Vec::new(),
            mode: Mode::Normal,
            search_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_case(mut self, case_name: &str, date_filed: &str, opinion_text: &str) -> Self {
        let n = self.cases.len() as u64;
        let opinion_id = n + 1;
        let absolute_url = format!("/opinion/{}/case-{}/", opinion_id, opinion_id);
        let hit = CaseHit {
            cluster_id: 100 + n,
            opinion_id: Some(opinion_id),
            case_name: case_name.to_string(),
            court: "California Supreme Court".to_string(),
            date_filed: date_filed.to_string(),
            citation: format!("{} Cal. {}d {}", n + 1, 2 + n % 3, 100 + n),
            snippet: format!("{} snippet", case_name),
            absolute_url: absolute_url.clone(),
        };
        let detail = OpinionDetail {
            opinion_id,
            cluster_id: 100 + n,
            opinion_text: opinion_text.to_string(),
            absolute_url,
        };
        self.cases.push((hit, detail));
        self
    }

    pub fn failing_transiently(mut self) -> Self {
        self.mode = Mode::Transient;
        self
    }

    pub fn unauthorized(mut self) -> Self {
        self.mode = Mode::Unauthorized;
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.search_calls() + self.fetch_calls()
    }
}

#[async_trait]
impl CaseLawBackend for FakeCaseLawBackend {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<CaseHit>, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = failure(self.mode, "courtlistener") {
            return Err(err);
        }
        Ok(self
            .cases
            .iter()
            .take(max_results)
            .map(|(hit, _)| hit.clone())
            .collect())
    }

    async fn fetch_opinion(&self, opinion_id: u64) -> Result<Option<OpinionDetail>, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = failure(self.mode, "courtlistener") {
            return Err(err);
        }
        Ok(self
            .cases
            .iter()
            .find(|(_, detail)| detail.opinion_id == opinion_id)
            .map(|(_, detail)| detail.clone()))
    }
}

/// Two-issue fact pattern: assault and negligence
pub fn sample_fact_pattern() -> FactPattern {
    FactPattern {
        summary: "After a minor collision, the other driver swung a tire iron at the client.".to_string(),
        parties: vec!["Client".to_string(), "Other driver".to_string()],
        issues: vec![
            LegalIssue {
                id: "issue-1".to_string(),
                label: "assault".to_string(),
                description: "Swinging a tire iron at the client.".to_string(),
                relevant_facts: vec!["The driver swung a tire iron".to_string()],
            },
            LegalIssue {
                id: "issue-2".to_string(),
                label: "negligence".to_string(),
                description: "Rear-ending the client's car at a light.".to_string(),
                relevant_facts: vec!["The driver rear-ended the client".to_string()],
            },
        ],
        jurisdiction: "California".to_string(),
    }
}

pub fn sample_statute() -> StatuteCandidate {
    StatuteCandidate {
        code: "PEN".to_string(),
        section: "240".to_string(),
        title: "Assault defined".to_string(),
        full_text: "An assault is an unlawful attempt, coupled with a present ability, to commit a violent injury on the person of another.".to_string(),
        url: "https://leginfo.test/PEN/240".to_string(),
        relevance_summary: "The swing of the tire iron is an attempt with present ability.".to_string(),
        case_snippet: "swung a tire iron".to_string(),
        confidence: 0.8,
        source_issue_id: "issue-1".to_string(),
    }
}

pub fn sample_case() -> CaseLawCandidate {
    CaseLawCandidate {
        case_name: "Rowland v. Christian".to_string(),
        citation: "69 Cal. 2d 108".to_string(),
        court: "California Supreme Court".to_string(),
        date_filed: "1968-08-08".to_string(),
        url: "https://www.courtlistener.com/opinion/1/rowland-v-christian/".to_string(),
        snippet: "duty of care".to_string(),
        relevance_summary: "General duty of care.".to_string(),
        related_statutes: vec!["CIV 1714".to_string()],
        confidence: 0.7,
        source_issue_id: "issue-2".to_string(),
    }
}
