//! Logical topic names.

/// Normalized activities from connectors, in to the splitter.
pub const RAW_ACTIVITY: &str = "raw_activity";

/// Enriched events out of the orchestrator, one per exclusion group.
pub const ENRICHED_ACTIVITY: &str = "enriched_activity";

/// Slow lane absorbing retryable enrichment pressure.
pub const ENRICHMENT_LAG: &str = "enrichment_lag";
