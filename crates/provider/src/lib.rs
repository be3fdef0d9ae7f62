//! Enricher provider contract and registry.
//!
//! Providers are values implementing the mandatory
//! `{name, provider_type, enrich}` set, with optional capabilities
//! (deferral, resume, service binding) as defaulted trait methods.
//! The registry is frozen at construction; the orchestrator receives
//! it by injection, never through global init side effects.

pub mod branding;
pub mod config;
pub mod error;
pub mod mock;
pub mod registry;
pub mod traits;

pub use branding::BrandingProvider;
pub use config::ProviderConfig;
pub use error::{ProviderError, WaitForInputRequest};
pub use mock::MockProvider;
pub use registry::{ProviderRegistry, RegistryBuilder};
pub use traits::{EnrichContext, EnricherProvider, ProviderServices};
