//! # Research Coordinator
//!
//! Drives one run from narrative to final result:
//!
//! ```text
//! narrative → FactPattern → Wave 1 (statutes, one agent per issue) → synthesize
//!           → Wave 2 (case law, one agent per statute) → synthesize → FinalResult
//! ```
//!
//! Every stage transition emits one [`StreamEvent`]. Sub-agent failures are isolated
//! per task; only fact-pattern extraction and synthesis failures fail the run. The
//! run's stream is closed on every exit path.

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;

use crate::config::Settings;
use crate::legal::{CaseLawCandidate, FactPattern, FinalResult, LegalIssue, StatuteCandidate};
use crate::skills::{AgentError, CaseLawSkill, CompletionService, FactPatternSkill, StatuteSkill, SynthesisSkill};
use crate::state::{validate_input, InputError, RunStatus, RunStore};
use crate::tools::{CaseLawClient, CourtListenerBackend, LegInfoBackend, StatuteClient, TokenBucket};

use super::event_bus::EventBus;
use super::events::{CaselawProgress, ProgressStatus, StatuteProgress, StreamEvent};
use super::pipeline::{Pipeline, PipelineStage};
use super::wave::{flatten_outcomes, join_all_isolated};

/// Runs research pipelines against shared clients, bus and store
#[derive(Clone)]
pub struct Coordinator {
    llm: Arc<dyn CompletionService>,
    statutes: Arc<StatuteClient>,
    caselaw: Arc<CaseLawClient>,
    bus: EventBus,
    store: Arc<RunStore>,
}

impl Coordinator {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        statutes: Arc<StatuteClient>,
        caselaw: Arc<CaseLawClient>,
        bus: EventBus,
        store: Arc<RunStore>,
    ) -> Self {
        Self {
            llm,
            statutes,
            caselaw,
            bus,
            store,
        }
    }

    /// Wire up the HTTP-backed completion service and both legal-data sources
    pub fn from_settings(settings: &Settings, bus: EventBus, store: Arc<RunStore>) -> Result<Self> {
        let timeout = settings.request_timeout();

        let api_key = settings.completion_api_key();
        if api_key.is_empty() {
            tracing::warn!(
                provider = settings.model.provider.display_name(),
                "No completion API key configured, every run will fail"
            );
        }
        let llm = settings
            .model
            .create_llm(api_key, timeout)
            .context("Failed to build completion client")?;

        if settings.courtlistener_token.is_empty() {
            tracing::warn!("COURTLISTENER_TOKEN not set, case law research will find nothing");
        }

        let statutes = StatuteClient::new(
            Arc::new(LegInfoBackend::new(timeout)?),
            TokenBucket::new(settings.statute_rate_per_sec, settings.statute_burst),
            timeout,
            settings.max_search_results,
        );
        let caselaw = CaseLawClient::new(
            Arc::new(CourtListenerBackend::new(settings.courtlistener_token.clone(), timeout)?),
            TokenBucket::new(settings.caselaw_rate_per_sec, settings.caselaw_burst),
            timeout,
            settings.max_search_results,
        );

        tracing::info!(
            provider = settings.model.provider.display_name(),
            model = %settings.model.model,
            "Coordinator ready"
        );
        Ok(Self::new(llm, Arc::new(statutes), Arc::new(caselaw), bus, store))
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &Arc<RunStore> {
        &self.store
    }

    /// Validate the narrative and register a pending run without starting it
    pub fn create_run(&self, text: &str) -> Result<String, InputError> {
        let narrative = validate_input(text)?;
        let run = self.store.create(narrative);
        tracing::info!(run_id = %run.run_id, chars = narrative.chars().count(), "Run created");
        Ok(run.run_id)
    }

    /// Create a run and execute it in the background
    pub fn submit(&self, text: &str) -> Result<String, InputError> {
        let run_id = self.create_run(text)?;

        let coordinator = self.clone();
        let id = run_id.clone();
        tokio::spawn(async move {
            let worker = {
                let coordinator = coordinator.clone();
                let id = id.clone();
                tokio::spawn(async move { coordinator.execute(&id).await })
            };
            if let Err(join_error) = worker.await {
                coordinator.fail(&id, format!("run task panicked: {}", join_error));
            }
        });

        Ok(run_id)
    }

    /// Execute a pending run to completion. The outcome is also recorded on the run.
    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, run_id: &str) -> Result<FinalResult> {
        let Some(run) = self.store.get(run_id) else {
            anyhow::bail!("Unknown run {}", run_id);
        };
        self.store.update(run_id, |run| run.status = RunStatus::Running);

        let mut pipeline = Pipeline::new();
        let outcome = self.research(run_id, &run.input_text, &mut pipeline).await;

        match &outcome {
            Ok(result) => tracing::info!(
                statutes = result.statutes.len(),
                case_law = result.case_law.len(),
                "Run complete"
            ),
            Err(e) => {
                pipeline.fail();
                self.fail(run_id, format!("{:#}", e));
            }
        }
        self.bus.close(run_id);
        outcome
    }

    /// Terminal error: record it, tell subscribers, end the stream
    fn fail(&self, run_id: &str, message: String) {
        tracing::error!(run_id, error = %message, "Run failed");
        self.store.update(run_id, |run| {
            run.status = RunStatus::Error;
            run.error = Some(message.clone());
        });
        self.bus.emit(run_id, StreamEvent::Error { message });
        self.bus.close(run_id);
    }

    async fn research(&self, run_id: &str, narrative: &str, pipeline: &mut Pipeline) -> Result<FinalResult> {
        self.bus.emit(
            run_id,
            StreamEvent::RunStarted {
                run_id: run_id.to_string(),
            },
        );

        let fact_pattern = FactPatternSkill::new(Arc::clone(&self.llm))
            .run(narrative)
            .await
            .context("Fact pattern extraction failed")?;
        pipeline.advance_to(PipelineStage::FactPatternReady)?;
        self.store
            .update(run_id, |run| run.fact_pattern = Some(fact_pattern.clone()));
        self.bus.emit(run_id, StreamEvent::FactPattern(fact_pattern.clone()));

        let fact_pattern = Arc::new(fact_pattern);
        let synthesis = SynthesisSkill::new(Arc::clone(&self.llm));

        // Wave 1: one statute agent per issue
        pipeline.advance_to(PipelineStage::Wave1Running)?;
        self.bus.emit(
            run_id,
            StreamEvent::Wave1Started {
                issue_count: fact_pattern.issues.len(),
            },
        );
        let statute_skill = Arc::new(StatuteSkill::new(Arc::clone(&self.llm), Arc::clone(&self.statutes)));
        let tasks: Vec<_> = fact_pattern
            .issues
            .iter()
            .map(|issue| self.statute_task(run_id, Arc::clone(&statute_skill), issue.clone(), Arc::clone(&fact_pattern)))
            .collect();
        let candidates = flatten_outcomes("statutes", join_all_isolated(tasks).await);

        let statutes = synthesis
            .synthesize_statutes(&fact_pattern, &candidates)
            .await
            .context("Statute synthesis failed")?;
        pipeline.advance_to(PipelineStage::Wave1Complete)?;
        self.store.update(run_id, |run| run.statutes = statutes.clone());
        self.bus.emit(
            run_id,
            StreamEvent::Wave1Complete {
                statutes: statutes.clone(),
            },
        );

        // Wave 2: one case-law agent per statute
        pipeline.advance_to(PipelineStage::Wave2Running)?;
        let work: Vec<(StatuteCandidate, LegalIssue)> = statutes
            .iter()
            .filter_map(|statute| match fact_pattern.issue(&statute.source_issue_id) {
                Some(issue) => Some((statute.clone(), issue.clone())),
                None => {
                    tracing::warn!(
                        statute = %statute.citation_label(),
                        issue_id = %statute.source_issue_id,
                        "Statute refers to an unknown issue, skipping case law research"
                    );
                    None
                }
            })
            .collect();
        self.bus.emit(
            run_id,
            StreamEvent::Wave2Started {
                statute_count: work.len(),
            },
        );
        let caselaw_skill = Arc::new(CaseLawSkill::new(Arc::clone(&self.llm), Arc::clone(&self.caselaw)));
        let tasks: Vec<_> = work
            .into_iter()
            .map(|(statute, issue)| {
                self.caselaw_task(run_id, Arc::clone(&caselaw_skill), statute, issue, Arc::clone(&fact_pattern))
            })
            .collect();
        let candidates = flatten_outcomes("case_law", join_all_isolated(tasks).await);

        let case_law = synthesis
            .synthesize_case_law(&fact_pattern, &statutes, &candidates)
            .await
            .context("Case law synthesis failed")?;
        pipeline.advance_to(PipelineStage::Wave2Complete)?;
        self.store.update(run_id, |run| run.case_law = case_law.clone());
        self.bus.emit(
            run_id,
            StreamEvent::Wave2Complete {
                case_law: case_law.clone(),
            },
        );

        pipeline.advance_to(PipelineStage::RunComplete)?;
        let result = FinalResult {
            run_id: run_id.to_string(),
            fact_pattern: fact_pattern.as_ref().clone(),
            statutes,
            case_law,
        };
        self.store.update(run_id, |run| run.status = RunStatus::Complete);
        self.bus.emit(run_id, StreamEvent::RunComplete(result.clone()));
        Ok(result)
    }

    /// Statute agent wrapped with progress events
    fn statute_task(
        &self,
        run_id: &str,
        skill: Arc<StatuteSkill>,
        issue: LegalIssue,
        fact_pattern: Arc<FactPattern>,
    ) -> impl Future<Output = Result<Vec<StatuteCandidate>, AgentError>> + Send + 'static {
        let bus = self.bus.clone();
        let run_id = run_id.to_string();
        async move {
            let progress = |status: ProgressStatus, count: Option<usize>| {
                StreamEvent::StatuteProgress(StatuteProgress {
                    issue_id: issue.id.clone(),
                    label: issue.label.clone(),
                    status,
                    count,
                })
            };
            let agent_issue = issue.clone();
            let agent = async move { skill.run(&agent_issue, &fact_pattern).await };
            with_progress(&bus, &run_id, progress, StreamEvent::StatuteFound, agent).await
        }
    }

    /// Case-law agent wrapped with progress events
    fn caselaw_task(
        &self,
        run_id: &str,
        skill: Arc<CaseLawSkill>,
        statute: StatuteCandidate,
        issue: LegalIssue,
        fact_pattern: Arc<FactPattern>,
    ) -> impl Future<Output = Result<Vec<CaseLawCandidate>, AgentError>> + Send + 'static {
        let bus = self.bus.clone();
        let run_id = run_id.to_string();
        async move {
            let label = statute.citation_label();
            let issue_id = issue.id.clone();
            let progress = |status: ProgressStatus, count: Option<usize>| {
                StreamEvent::CaselawProgress(CaselawProgress {
                    statute: label.clone(),
                    issue_id: issue_id.clone(),
                    status,
                    count,
                })
            };
            let agent = async move { skill.run(&statute, &issue, &fact_pattern).await };
            with_progress(&bus, &run_id, progress, StreamEvent::CaselawFound, agent).await
        }
    }
}

/// Emit `searching`, run the agent on its own task, then emit each find and
/// `complete`, or `failed` when the agent errors, panics or is cancelled.
async fn with_progress<T, F>(
    bus: &EventBus,
    run_id: &str,
    progress: impl Fn(ProgressStatus, Option<usize>) -> StreamEvent,
    found: impl Fn(T) -> StreamEvent,
    agent: F,
) -> Result<Vec<T>, AgentError>
where
    T: Clone + Send + 'static,
    F: Future<Output = Result<Vec<T>, AgentError>> + Send + 'static,
{
    bus.emit(run_id, progress(ProgressStatus::Searching, None));
    let outcome = match tokio::spawn(agent).await {
        Ok(outcome) => outcome,
        Err(join_error) => Err(AgentError::Aborted(join_error.to_string())),
    };
    match outcome {
        Ok(candidates) => {
            for candidate in &candidates {
                bus.emit(run_id, found(candidate.clone()));
            }
            bus.emit(run_id, progress(ProgressStatus::Complete, Some(candidates.len())));
            Ok(candidates)
        }
        Err(e) => {
            bus.emit(run_id, progress(ProgressStatus::Failed, None));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::{prompts, CompletionError};
    use crate::state::Run;
    use crate::testing::{is_prompt, sample_fact_pattern, FakeCaseLawBackend, FakeCompletion, FakeStatuteBackend};
    use crate::tools::TokenBucket;
    use serde_json::{json, Value};
    use std::time::Duration;

    const NARRATIVE: &str = "After a fender bender the other driver got out and swung a tire iron at me.";

    /// Scripted model: PEN 240 for the assault issue, CIV 1714 for negligence,
    /// Rowland v. Christian for every statute.
    fn scripted(system: &str, user: &str) -> Result<Value, CompletionError> {
        if is_prompt(system, prompts::FACT_PATTERN) {
            Ok(serde_json::to_value(sample_fact_pattern()).unwrap())
        } else if is_prompt(system, prompts::STATUTE_PLAN) {
            let lookup = if user.contains("ISSUE: assault") {
                json!({"code": "PEN", "section": "240"})
            } else {
                json!({"code": "CIV", "section": "1714"})
            };
            Ok(json!({"keyword_queries": [], "specific_lookups": [lookup]}))
        } else if is_prompt(system, prompts::STATUTE_EVALUATE) {
            Ok(json!({"evaluations": [
                {"code": "PEN", "section": "240", "is_relevant": true, "confidence": 0.8},
                {"code": "CIV", "section": "1714", "is_relevant": true, "confidence": 0.6}
            ]}))
        } else if is_prompt(system, prompts::SYNTHESIZE_STATUTES) {
            Ok(json!({"ranked_statutes": [
                {"code": "PEN", "section": "240", "confidence": 0.8, "source_issue_id": "issue-1"},
                {"code": "CIV", "section": "1714", "confidence": 0.6, "source_issue_id": "issue-2"}
            ]}))
        } else if is_prompt(system, prompts::CASELAW_PLAN) {
            Ok(json!({"search_queries": ["duty of care"]}))
        } else if is_prompt(system, prompts::CASELAW_EVALUATE) {
            Ok(json!({"evaluations": [
                {"case_name": "Rowland v. Christian", "date_filed": "1968-08-08", "is_relevant": true, "confidence": 0.7}
            ]}))
        } else if is_prompt(system, prompts::SYNTHESIZE_CASES) {
            Ok(json!({"ranked_cases": [
                {"case_name": "Rowland v. Christian", "date_filed": "1968-08-08", "confidence": 0.7}
            ]}))
        } else {
            Err(CompletionError::Service("unexpected prompt".to_string()))
        }
    }

    fn statute_backend() -> FakeStatuteBackend {
        FakeStatuteBackend::new()
            .with_section("PEN", "240", "Assault defined")
            .with_section("CIV", "1714", "Responsibility for willful acts and negligence")
    }

    fn caselaw_backend() -> FakeCaseLawBackend {
        FakeCaseLawBackend::new().with_case("Rowland v. Christian", "1968-08-08", "duty of care owed to all")
    }

    fn coordinator(
        llm: Arc<FakeCompletion>,
        statutes: FakeStatuteBackend,
        caselaw: FakeCaseLawBackend,
    ) -> Coordinator {
        let timeout = Duration::from_secs(5);
        Coordinator::new(
            llm,
            Arc::new(StatuteClient::new(Arc::new(statutes), TokenBucket::unlimited(), timeout, 5)),
            Arc::new(CaseLawClient::new(Arc::new(caselaw), TokenBucket::unlimited(), timeout, 5)),
            EventBus::new(),
            Arc::new(RunStore::new()),
        )
    }

    /// Execute one run in the foreground and collect everything it emitted
    async fn run_collecting(coordinator: &Coordinator) -> (Result<FinalResult>, Vec<StreamEvent>, Run) {
        let run_id = coordinator.create_run(NARRATIVE).unwrap();
        let mut subscription = coordinator.bus().subscribe(&run_id);
        let outcome = coordinator.execute(&run_id).await;

        let mut events = Vec::new();
        while let Some(event) = subscription.recv().await {
            events.push(event);
        }
        let run = coordinator.store().get(&run_id).unwrap();
        (outcome, events, run)
    }

    fn stage_kinds(events: &[StreamEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(StreamEvent::kind)
            .filter(|kind| !kind.ends_with("_progress") && !kind.ends_with("_found"))
            .collect()
    }

    #[tokio::test]
    async fn test_end_to_end_two_issues() {
        let coordinator = coordinator(FakeCompletion::new(scripted), statute_backend(), caselaw_backend());

        let (outcome, events, run) = run_collecting(&coordinator).await;
        let result = outcome.unwrap();

        assert_eq!(result.statutes.len(), 2);
        assert_eq!(result.statutes[0].citation_label(), "PEN 240");
        assert!(result.statutes[0].confidence > result.statutes[1].confidence);
        // Full text comes back from the original candidate
        assert!(result.statutes[0].full_text.contains("Assault defined"));
        assert_eq!(result.case_law.len(), 1);
        assert_eq!(result.case_law[0].case_name, "Rowland v. Christian");

        assert_eq!(run.status, RunStatus::Complete);
        assert_eq!(run.final_result(), Some(result.clone()));
        assert!(matches!(events.last(), Some(StreamEvent::RunComplete(final_result)) if *final_result == result));
    }

    #[tokio::test]
    async fn test_stage_events_in_order() {
        let coordinator = coordinator(FakeCompletion::new(scripted), statute_backend(), caselaw_backend());

        let (_, events, _) = run_collecting(&coordinator).await;
        assert_eq!(
            stage_kinds(&events),
            vec![
                "run_started",
                "fact_pattern",
                "wave1_started",
                "wave1_complete",
                "wave2_started",
                "wave2_complete",
                "run_complete",
            ]
        );

        // Each agent reports searching before complete
        let progress: Vec<&StatuteProgress> = events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::StatuteProgress(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 4);
        for issue_id in ["issue-1", "issue-2"] {
            let statuses: Vec<ProgressStatus> = progress
                .iter()
                .filter(|p| p.issue_id == issue_id)
                .map(|p| p.status)
                .collect();
            assert_eq!(statuses, vec![ProgressStatus::Searching, ProgressStatus::Complete]);
        }
        assert_eq!(events.iter().filter(|e| e.kind() == "statute_found").count(), 2);
    }

    #[tokio::test]
    async fn test_case_law_auth_failure_still_completes() {
        let coordinator = coordinator(
            FakeCompletion::new(scripted),
            statute_backend(),
            FakeCaseLawBackend::new().unauthorized(),
        );

        let (outcome, events, run) = run_collecting(&coordinator).await;
        let result = outcome.unwrap();

        assert_eq!(result.statutes.len(), 2);
        assert!(result.case_law.is_empty());
        assert_eq!(run.status, RunStatus::Complete);

        let failed = events
            .iter()
            .filter(|event| matches!(event, StreamEvent::CaselawProgress(p) if p.status == ProgressStatus::Failed))
            .count();
        assert_eq!(failed, 2);
        assert!(events.iter().any(|e| matches!(e, StreamEvent::Wave2Complete { case_law } if case_law.is_empty())));
    }

    #[tokio::test]
    async fn test_statute_auth_failure_is_isolated_per_agent() {
        let coordinator = coordinator(
            FakeCompletion::new(scripted),
            statute_backend().unauthorized(),
            caselaw_backend(),
        );

        let (outcome, events, run) = run_collecting(&coordinator).await;
        let result = outcome.unwrap();

        assert!(result.statutes.is_empty());
        assert!(result.case_law.is_empty());
        assert_eq!(run.status, RunStatus::Complete);
        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::Wave2Started { statute_count: 0 })));
    }

    #[tokio::test]
    async fn test_panicking_agent_reports_failed_progress() {
        let llm = FakeCompletion::new(|system, user| {
            if is_prompt(system, prompts::STATUTE_PLAN) && user.contains("ISSUE: assault") {
                panic!("plan decoder crashed");
            }
            scripted(system, user)
        });
        let coordinator = coordinator(llm, statute_backend(), caselaw_backend());

        let (outcome, events, run) = run_collecting(&coordinator).await;
        let result = outcome.unwrap();
        assert_eq!(run.status, RunStatus::Complete);
        assert_eq!(result.statutes.len(), 1);
        assert_eq!(result.statutes[0].citation_label(), "CIV 1714");

        let statuses = |issue_id: &str| -> Vec<ProgressStatus> {
            events
                .iter()
                .filter_map(|event| match event {
                    StreamEvent::StatuteProgress(p) if p.issue_id == issue_id => Some(p.status),
                    _ => None,
                })
                .collect()
        };
        assert_eq!(statuses("issue-1"), vec![ProgressStatus::Searching, ProgressStatus::Failed]);
        assert_eq!(statuses("issue-2"), vec![ProgressStatus::Searching, ProgressStatus::Complete]);
    }

    #[tokio::test]
    async fn test_end_to_end_through_keyword_search() {
        let llm = FakeCompletion::new(|system, user| {
            if is_prompt(system, prompts::STATUTE_PLAN) {
                let query = if user.contains("ISSUE: assault") {
                    "assault with a deadly weapon"
                } else {
                    "negligent driving duty of care"
                };
                Ok(json!({"keyword_queries": [query], "specific_lookups": []}))
            } else {
                scripted(system, user)
            }
        });
        let statutes = statute_backend()
            .with_search_hits("assault with a deadly weapon", &[("PEN", "240")])
            .with_search_hits("negligent driving duty of care", &[("CIV", "1714")]);
        let coordinator = coordinator(llm, statutes, caselaw_backend());

        let (outcome, _, run) = run_collecting(&coordinator).await;
        let result = outcome.unwrap();

        assert_eq!(run.status, RunStatus::Complete);
        let labels: Vec<String> = result.statutes.iter().map(|s| s.citation_label()).collect();
        assert_eq!(labels, vec!["PEN 240", "CIV 1714"]);
        assert!(result.statutes[0].confidence > result.statutes[1].confidence);
        assert!(result.statutes[0].full_text.contains("Assault defined"));
        assert_eq!(result.case_law.len(), 1);
    }

    #[tokio::test]
    async fn test_fact_pattern_failure_fails_the_run() {
        let llm = FakeCompletion::new(|_, _| Err(CompletionError::Service("model offline".to_string())));
        let coordinator = coordinator(llm, statute_backend(), caselaw_backend());

        let (outcome, events, run) = run_collecting(&coordinator).await;
        assert!(outcome.is_err());

        assert_eq!(stage_kinds(&events), vec!["run_started", "error"]);
        assert_eq!(run.status, RunStatus::Error);
        assert!(run.error.as_deref().unwrap().contains("Fact pattern extraction failed"));
        assert!(run.fact_pattern.is_none());
        assert!(run.final_result().is_none());
        assert!(coordinator.bus().is_closed(&run.run_id));
    }

    #[tokio::test]
    async fn test_synthesis_failure_keeps_partial_results() {
        let llm = FakeCompletion::new(|system, user| {
            if is_prompt(system, prompts::SYNTHESIZE_CASES) {
                Err(CompletionError::MalformedOutput("not json".to_string()))
            } else {
                scripted(system, user)
            }
        });
        let coordinator = coordinator(llm, statute_backend(), caselaw_backend());

        let (outcome, events, run) = run_collecting(&coordinator).await;
        assert!(outcome.is_err());
        assert_eq!(events.last().map(StreamEvent::kind), Some("error"));
        assert!(!events.iter().any(|e| e.kind() == "run_complete"));

        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(run.statutes.len(), 2);
        assert!(run.final_result().is_none());
    }

    #[tokio::test]
    async fn test_statute_with_unknown_issue_is_dropped_from_wave_two() {
        let llm = FakeCompletion::new(|system, user| {
            if is_prompt(system, prompts::SYNTHESIZE_STATUTES) {
                Ok(json!({"ranked_statutes": [
                    {"code": "PEN", "section": "240", "confidence": 0.8, "source_issue_id": "issue-1"},
                    {"code": "CIV", "section": "1714", "confidence": 0.6, "source_issue_id": "issue-9"}
                ]}))
            } else {
                scripted(system, user)
            }
        });
        let coordinator = coordinator(llm, statute_backend(), caselaw_backend());

        let (outcome, events, _) = run_collecting(&coordinator).await;
        assert_eq!(outcome.unwrap().statutes.len(), 2);
        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::Wave2Started { statute_count: 1 })));
    }

    #[tokio::test]
    async fn test_empty_wave_skips_synthesis() {
        let llm = FakeCompletion::new(|system, user| {
            if is_prompt(system, prompts::STATUTE_PLAN) {
                Ok(json!({"keyword_queries": [], "specific_lookups": []}))
            } else {
                scripted(system, user)
            }
        });
        let coordinator = coordinator(Arc::clone(&llm), statute_backend(), caselaw_backend());

        let (outcome, _, _) = run_collecting(&coordinator).await;
        let result = outcome.unwrap();
        assert!(result.statutes.is_empty());
        // Fact pattern plus one plan per issue; no evaluate, no synthesis
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn test_submit_validates_and_runs_in_background() {
        let coordinator = coordinator(FakeCompletion::new(scripted), statute_backend(), caselaw_backend());

        assert!(matches!(coordinator.submit("too short"), Err(InputError::TooShort { .. })));
        assert!(coordinator.store().is_empty());

        let run_id = coordinator.submit(NARRATIVE).unwrap();
        let mut status = RunStatus::Pending;
        for _ in 0..500 {
            status = coordinator.store().get(&run_id).unwrap().status;
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, RunStatus::Complete);
        assert!(coordinator.bus().is_closed(&run_id));
    }

    #[tokio::test]
    async fn test_unknown_run() {
        let coordinator = coordinator(FakeCompletion::new(scripted), statute_backend(), caselaw_backend());
        assert!(coordinator.execute("missing").await.is_err());
    }
}
