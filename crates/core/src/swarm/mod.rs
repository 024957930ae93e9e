//! # Swarm Orchestration
//!
//! Runs the two-wave research pipeline and publishes its progress.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Narrative → Fact Pattern → Statute agents (per issue) → Synthesis
//!           → Case law agents (per statute) → Synthesis → Final result
//! ```

pub mod coordinator;
pub mod event_bus;
pub mod events;
pub mod pipeline;
pub mod wave;

pub use coordinator::Coordinator;
pub use event_bus::{EventBus, Subscription};
pub use events::{CaselawProgress, ProgressStatus, StatuteProgress, StreamEvent};
pub use pipeline::{Pipeline, PipelineStage};
pub use wave::{flatten_outcomes, join_all_isolated, TaskOutcome};
