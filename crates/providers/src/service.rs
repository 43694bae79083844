//! Generation service — the quota-aware front door to every provider.
//!
//! Each call is checked against the caller's monthly quota before any
//! provider is contacted, and its outcome is recorded afterwards. The
//! [`Metering`] mode narrows that for callers that do their own accounting.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use triage_core::error::ProviderError;
use triage_core::provider::{Generation, GenerationRequest, Generator};
use triage_core::quota::QuotaService;

use crate::router::ProviderRouter;

const QUOTA_DENIED: &str = "Monthly request limit exceeded";

/// How a [`GenerationService`] uses the quota service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metering {
    /// Check the quota, record every outcome
    #[default]
    Full,
    /// Check the quota and record failures; successes are left to the caller
    CheckOnly,
    /// No quota involvement at all
    Off,
}

pub struct GenerationService {
    router: Arc<ProviderRouter>,
    quota: Arc<dyn QuotaService>,
    metering: Metering,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl GenerationService {
    pub fn new(router: Arc<ProviderRouter>, quota: Arc<dyn QuotaService>) -> Self {
        Self {
            router,
            quota,
            metering: Metering::Full,
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_metering(mut self, metering: Metering) -> Self {
        self.metering = metering;
        self
    }

    pub fn metering(&self) -> Metering {
        self.metering
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }
}

#[async_trait]
impl Generator for GenerationService {
    async fn generate(
        &self,
        provider: &str,
        prompt: &str,
        owner_id: &str,
    ) -> std::result::Result<Generation, ProviderError> {
        let provider_name = if provider.trim().is_empty() {
            self.router.default_name().to_string()
        } else {
            provider.trim().to_ascii_lowercase()
        };

        let metered = self.metering != Metering::Off;

        if metered && !self.quota.is_allowed(owner_id).await {
            warn!(owner_id = %owner_id, provider = %provider_name, "Quota exhausted");
            self.quota
                .record(owner_id, &provider_name, false, Some(QUOTA_DENIED))
                .await;
            return Err(ProviderError::QuotaExceeded(owner_id.to_string()));
        }

        let result = match self.router.resolve(&provider_name) {
            Some(backend) => {
                let request = GenerationRequest::prompt(backend.default_model(), prompt)
                    .with_temperature(self.temperature)
                    .with_max_tokens(self.max_tokens);
                debug!(owner_id = %owner_id, provider = %provider_name, "Generating");
                backend.complete(request).await
            }
            None => Err(ProviderError::UnknownProvider(provider_name.clone())),
        };

        match &result {
            Ok(_) if self.metering == Metering::Full => {
                self.quota.record(owner_id, &provider_name, true, None).await;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(owner_id = %owner_id, provider = %provider_name, error = %e, "Generation failed");
                if metered {
                    let message = e.to_string();
                    self.quota
                        .record(owner_id, &provider_name, false, Some(&message))
                        .await;
                }
            }
        }

        result
    }
}
