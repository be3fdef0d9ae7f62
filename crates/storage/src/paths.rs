//! Typed document paths for the per-tenant collection layout.
//!
//! Everything lives under `users/{user_id}/...`.

use fitglue_core::Destination;

pub const USERS: &str = "users";
pub const PIPELINES: &str = "pipelines";
pub const PIPELINE_RUNS: &str = "pipeline_runs";
pub const DESTINATION_OUTCOMES: &str = "destination_outcomes";
pub const PENDING_INPUTS: &str = "pending_inputs";

pub fn user(user_id: &str) -> String {
    format!("{USERS}/{user_id}")
}

pub fn pipeline(user_id: &str, pipeline_id: &str) -> String {
    format!("{USERS}/{user_id}/{PIPELINES}/{pipeline_id}")
}

pub fn pipeline_run(user_id: &str, run_id: &str) -> String {
    format!("{USERS}/{user_id}/{PIPELINE_RUNS}/{run_id}")
}

pub fn destination_outcomes(user_id: &str, run_id: &str) -> String {
    format!("{USERS}/{user_id}/{PIPELINE_RUNS}/{run_id}/{DESTINATION_OUTCOMES}")
}

pub fn destination_outcome(user_id: &str, run_id: &str, destination: &Destination) -> String {
    format!(
        "{USERS}/{user_id}/{PIPELINE_RUNS}/{run_id}/{DESTINATION_OUTCOMES}/{}",
        destination.doc_id()
    )
}

pub fn pending_input(user_id: &str, input_id: &str) -> String {
    format!("{USERS}/{user_id}/{PENDING_INPUTS}/{input_id}")
}

/// Blob path for the untouched original payload snapshot.
pub fn payload_blob(user_id: &str, activity_id: &str) -> String {
    format!("payloads/{user_id}/{activity_id}.json")
}

/// Blob path for the generated fit artifact.
pub fn fit_blob(user_id: &str, activity_id: &str) -> String {
    format!("activities/{user_id}/{activity_id}.fit")
}
