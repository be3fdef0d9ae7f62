//! Shared domain model for the FitGlue enrichment pipeline.
//!
//! This crate holds the types every other crate speaks: standardized
//! activities, inbound payloads, pipeline configuration, pipeline runs
//! with their destination outcomes, user records and tiers, pending
//! user inputs, enrichment results, and the enriched events that fan
//! out to destination workers.

pub mod activity;
pub mod clock;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod event;
pub mod payload;
pub mod pending_input;
pub mod pipeline;
pub mod run;
pub mod user;

pub use activity::{
    ActivityType, Lap, Record, Session, Source, StandardizedActivity, StrengthSet, TimeMarker,
};
pub use clock::{Clock, FixedClock, IdSource, SequenceIds, SystemClock, UuidSource};
pub use config::Config;
pub use enrichment::EnrichmentResult;
pub use error::CoreError;
pub use event::EnrichedEvent;
pub use payload::ActivityPayload;
pub use pending_input::{pending_input_id, PendingInput, PendingInputStatus};
pub use pipeline::{Destination, DestinationSettings, EnricherEntry, PipelineConfig, ProviderType};
pub use run::{
    DestinationOutcome, DestinationStatus, PipelineRun, PipelineRunStatus, ProviderExecution,
    ProviderExecutionStatus,
};
pub use user::{NotificationPreferences, Tier, UserRecord};
