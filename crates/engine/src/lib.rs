//! FitGlue enrichment engine.
//!
//! The per-pipeline orchestrator and its surrounding run lifecycle:
//! tier gating, two-phase provider dispatch, stream and description
//! merging, time-marker reconciliation, destination outcome roll-up,
//! exclusion fan-out, and the lag-queue framing wrapper.

pub mod error;
pub mod fitfile;
pub mod framing;
pub mod lifecycle;
pub mod markers;
pub mod notifications;
pub mod orchestrator;
pub mod outcome;
pub mod slots;
pub mod stores;

pub use error::EngineError;
pub use framing::{EnrichmentHandler, HandleOutcome};
pub use lifecycle::RunStore;
pub use orchestrator::{Orchestrator, ProcessResult, ProcessStatus, RetrySignal};
pub use outcome::{compute_rollup, OutcomeReconciler, OutcomeUpdate};
pub use slots::DescriptionSlots;
