//! # Casebrief Core
//!
//! The research engine: turns a free-text case narrative into ranked California
//! statutes and case law by orchestrating completion-service calls and rate-limited
//! lookups against two legal-data sources.
//!
//! ## Architecture
//!
//! - `legal` - Domain types (fact pattern, issues, candidates, final result)
//! - `skills/` - Completion-driven sub-agents and the per-wave synthesizer
//! - `tools/` - Rate limiters and bounded clients for the statute and case-law sources
//! - `swarm/` - Wave scheduling, run events and the pipeline coordinator
//! - `state/` - In-memory run store
//! - `models` / `config` - Provider selection and runtime settings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use casebrief_core::{config::Settings, state::RunStore, swarm::{Coordinator, EventBus}};
//!
//! let settings = Settings::load(None)?;
//! let coordinator = Coordinator::from_settings(&settings, EventBus::new(), Arc::new(RunStore::new()))?;
//! let run_id = coordinator.submit("My neighbor's dog bit me while I walked past their yard.")?;
//! ```

pub mod config;
pub mod legal;
pub mod models;
pub mod skills;
pub mod state;
pub mod swarm;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Settings;
pub use legal::{CaseLawCandidate, FactPattern, FinalResult, LegalIssue, StatuteCandidate};
pub use state::{Run, RunStatus, RunStore};
pub use swarm::{Coordinator, EventBus, StreamEvent};
