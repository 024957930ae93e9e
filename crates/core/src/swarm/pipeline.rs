//! # Pipeline Stages
//!
//! The run state machine. Stages are strictly sequential; `Failed` is reachable
//! from anywhere and is terminal.

use serde::{Deserialize, Serialize};

/// Stage of a research run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Run accepted, nothing computed yet
    Started,
    /// Fact pattern extracted
    FactPatternReady,
    /// Statute sub-agents running
    Wave1Running,
    /// Statutes synthesized
    Wave1Complete,
    /// Case-law sub-agents running
    Wave2Running,
    /// Case law synthesized
    Wave2Complete,
    /// Final result produced
    RunComplete,
    /// Failed
    Failed,
}

impl PipelineStage {
    fn next(self) -> Self {
        match self {
            PipelineStage::Started => PipelineStage::FactPatternReady,
            PipelineStage::FactPatternReady => PipelineStage::Wave1Running,
            PipelineStage::Wave1Running => PipelineStage::Wave1Complete,
            PipelineStage::Wave1Complete => PipelineStage::Wave2Running,
            PipelineStage::Wave2Running => PipelineStage::Wave2Complete,
            PipelineStage::Wave2Complete => PipelineStage::RunComplete,
            PipelineStage::RunComplete => PipelineStage::RunComplete,
            PipelineStage::Failed => PipelineStage::Failed,
        }
    }
}

/// The pipeline state machine
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Current stage
    pub stage: PipelineStage,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            stage: PipelineStage::Started,
        }
    }
}

impl Pipeline {
    /// Create a new pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance, insisting the next stage is `expected`. Skipping is a bug.
    pub fn advance_to(&mut self, expected: PipelineStage) -> anyhow::Result<()> {
        let next = self.stage.next();
        if next != expected || self.is_complete() {
            anyhow::bail!("invalid stage transition {:?} -> {:?}", self.stage, expected);
        }
        self.stage = next;
        Ok(())
    }

    /// Fail the pipeline
    pub fn fail(&mut self) {
        self.stage = PipelineStage::Failed;
    }

    /// Check if pipeline is complete
    pub fn is_complete(&self) -> bool {
        matches!(self.stage, PipelineStage::RunComplete | PipelineStage::Failed)
    }
}
