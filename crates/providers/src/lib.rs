//! Chat-completion providers for Triage.
//!
//! All providers implement the `triage_core::Provider` trait. The router
//! selects a provider by name and the generation service wraps the router
//! with quota accounting.

pub mod openai_compat;
pub mod router;
pub mod service;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, ProviderRouter};
pub use service::{GenerationService, Metering};
