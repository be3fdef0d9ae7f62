//! Branding step for free-tier activities.

use async_trait::async_trait;

use fitglue_core::{EnrichmentResult, ProviderType, StandardizedActivity, UserRecord};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::traits::{EnrichContext, EnricherProvider};

/// Appends the configured branding line as a trailing description
/// section. Runs only when the user's tier requires it; the
/// orchestrator decides, not the provider.
pub struct BrandingProvider {
    text: String,
}

impl BrandingProvider {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl EnricherProvider for BrandingProvider {
    fn name(&self) -> &str {
        "branding"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Branding
    }

    async fn enrich(
        &self,
        _ctx: &EnrichContext,
        _activity: &StandardizedActivity,
        _user: &UserRecord,
        _config: &ProviderConfig,
    ) -> Result<EnrichmentResult, ProviderError> {
        Ok(EnrichmentResult {
            description: self.text.clone(),
            ..EnrichmentResult::default()
        })
    }
}
