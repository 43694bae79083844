//! Provider router — selects the correct LLM provider by name.
//!
//! Provider names are case-insensitive, so `OPENAI`, `Grok` and `gemini`
//! all resolve.

use std::collections::HashMap;
use std::sync::Arc;
use triage_config::AppConfig;
use triage_core::provider::Provider;

use crate::openai_compat::OpenAiCompatProvider;

/// Routes generation requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: normalize(&default_provider.into()),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(normalize(&name.into()), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn default_name(&self) -> &str {
        &self.default_provider
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(&normalize(name)).cloned()
    }

    /// Resolve a provider name; an empty name means the default provider.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Provider>> {
        if name.trim().is_empty() {
            self.default()
        } else {
            self.get(name)
        }
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Build providers from configuration.
///
/// Every `[providers.<name>]` entry is registered, plus the default and
/// classifier providers even when they have no section of their own.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        let model = provider_config
            .default_model
            .clone()
            .unwrap_or_else(|| model_for(config, name));

        router.register(name.clone(), make_provider(name, &base_url, &api_key, &model));
    }

    for name in [config.default_provider.as_str(), config.classifier_provider()] {
        if router.get(name).is_none() {
            let api_key = config.api_key.clone().unwrap_or_default();
            let model = model_for(config, name);
            router.register(
                name.to_string(),
                make_provider(name, &default_base_url(name), &api_key, &model),
            );
        }
    }

    router
}

fn make_provider(name: &str, base_url: &str, api_key: &str, model: &str) -> Arc<dyn Provider> {
    let provider = OpenAiCompatProvider::new(normalize(name), base_url, api_key, model);
    if is_local(name) {
        Arc::new(provider.without_key())
    } else {
        Arc::new(provider)
    }
}

fn model_for(config: &AppConfig, name: &str) -> String {
    if normalize(name) == normalize(&config.default_provider) {
        config.default_model.clone()
    } else {
        default_model(name).to_string()
    }
}

fn is_local(provider_name: &str) -> bool {
    matches!(normalize(provider_name).as_str(), "ollama" | "vllm" | "llamacpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match normalize(provider_name).as_str() {
        "openai" => "https://api.openai.com/v1".into(),
        "grok" | "xai" => "https://api.x.ai/v1".into(),
        "gemini" => "https://generativelanguage.googleapis.com/v1beta/openai".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" => "http://localhost:8080/v1".into(),
        other => format!("https://{other}.api.example.com/v1"),
    }
}

/// Default model for well-known providers.
fn default_model(provider_name: &str) -> &'static str {
    match normalize(provider_name).as_str() {
        "grok" | "xai" => "grok-2-latest",
        "gemini" => "gemini-1.5-flash",
        "openrouter" => "openai/gpt-4o-mini",
        "ollama" => "llama3.2",
        _ => "gpt-4o-mini",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_config::ProviderConfig;

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("openai");
        router.register("openai", Arc::new(OpenAiCompatProvider::openai("sk-test")));

        assert!(router.get("OPENAI").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
        assert!(router.resolve("").is_some());
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("GROK").contains("api.x.ai"));
        assert!(default_base_url("gemini").contains("googleapis.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let router = build_from_config(&config);
        let provider = router.default().unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.default_model(), "gpt-4o-mini");
    }

    #[test]
    fn build_registers_configured_and_classifier_providers() {
        let mut config = AppConfig::default();
        config.classifier.provider = Some("gemini".into());
        config.providers.insert(
            "grok".into(),
            ProviderConfig {
                api_key: Some("xai-key".into()),
                api_url: None,
                default_model: Some("grok-beta".into()),
            },
        );

        let router = build_from_config(&config);
        assert_eq!(router.list(), vec!["gemini", "grok", "openai"]);
        assert_eq!(router.get("grok").unwrap().default_model(), "grok-beta");
        assert_eq!(router.get("gemini").unwrap().default_model(), "gemini-1.5-flash");
    }
}
