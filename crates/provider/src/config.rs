//! Per-call provider configuration.
//!
//! The underlying shape is the string→string mapping the UI edits.
//! The orchestrator overlays reserved keys onto the user's typed
//! config before each dispatch; providers read through the typed
//! getters.

use std::collections::HashMap;

use indexmap::IndexMap;

/// Reserved keys the orchestrator injects. User config must not rely
/// on them.
pub mod reserved {
    pub const PIPELINE_EXECUTION_ID: &str = "pipeline_execution_id";
    pub const PIPELINE_ID: &str = "pipeline_id";
    pub const ACTIVITY_ID: &str = "activity_id";
    pub const EXTERNAL_ID: &str = "external_id";
    /// Phase-1 description composition, present only for deferred
    /// providers running in Phase 2.
    pub const ENRICHED_DESCRIPTION: &str = "enriched_description";
}

/// Validated view over an enricher's config mapping.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    values: IndexMap<String, String>,
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let mut values = IndexMap::new();
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        for k in keys {
            values.insert(k.clone(), map[k].clone());
        }
        Self { values }
    }

    /// Overlay `key=value`, replacing any user-supplied entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_or(&self, key: &str, default: &'static str) -> &str {
        self.get(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key), Some("true") | Some("1") | Some("yes"))
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn pipeline_execution_id(&self) -> Option<&str> {
        self.get(reserved::PIPELINE_EXECUTION_ID)
    }

    pub fn activity_id(&self) -> Option<&str> {
        self.get(reserved::ACTIVITY_ID)
    }

    pub fn external_id(&self) -> Option<&str> {
        self.get(reserved::EXTERNAL_ID)
    }

    pub fn enriched_description(&self) -> Option<&str> {
        self.get(reserved::ENRICHED_DESCRIPTION)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
