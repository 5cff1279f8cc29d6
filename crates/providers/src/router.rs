//! Provider router - builds remote clients from configuration.

use docent_config::AppConfig;
use docent_core::provider::Provider;
use docent_core::sandbox::CodeSandbox;
use std::collections::HashMap;
use std::sync::Arc;

use crate::openai_compat::OpenAiCompatProvider;
use crate::sandbox::{DisabledSandbox, HttpSandbox};

/// Named completion providers with one default.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build completion providers from configuration.
///
/// The default provider is always registered, even if it has no
/// `[providers.*]` section.
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

        let provider = if name == "azure" {
            OpenAiCompatProvider::azure(&base_url, &api_key, provider_config.api_version.as_deref())
        } else {
            OpenAiCompatProvider::new(name, &base_url, &api_key)
        };
        router.register(name.clone(), Arc::new(provider));
    }

    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let base_url = default_base_url(&config.default_provider);
        let provider = if config.default_provider == "azure" {
            OpenAiCompatProvider::azure(&base_url, &api_key, None)
        } else {
            OpenAiCompatProvider::new(&config.default_provider, &base_url, &api_key)
        };
        router.register(config.default_provider.clone(), Arc::new(provider));
    }

    router
}

/// The configured sandbox, or a disabled one when no URL is set.
pub fn build_sandbox(config: &AppConfig) -> Arc<dyn CodeSandbox> {
    match &config.sandbox.url {
        Some(url) => Arc::new(HttpSandbox::new(url, config.sandbox.token.clone())),
        None => Arc::new(DisabledSandbox),
    }
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "azure" => "https://YOUR-RESOURCE.openai.azure.com".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_config::ProviderConfig;

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("openai");
        router.register("openai", Arc::new(OpenAiCompatProvider::openai("sk-test")));
        assert!(router.get("openai").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
    }

    #[test]
    fn build_from_default_config() {
        let router = build_from_config(&AppConfig::default());
        assert_eq!(router.default().unwrap().name(), "openai");
    }

    #[test]
    fn azure_section_builds_azure_provider() {
        let mut config = AppConfig {
            default_provider: "azure".into(),
            ..AppConfig::default()
        };
        config.providers.insert(
            "azure".into(),
            ProviderConfig {
                api_key: Some("k".into()),
                api_url: Some("https://res.openai.azure.com".into()),
                default_model: None,
                api_version: Some("2024-06-01".into()),
            },
        );
        let router = build_from_config(&config);
        assert_eq!(router.list(), vec!["azure"]);
        assert_eq!(router.default().unwrap().name(), "azure");
    }

    #[test]
    fn sandbox_disabled_without_url() {
        let mut config = AppConfig::default();
        assert!(!build_sandbox(&config).is_configured());
        config.sandbox.url = Some("http://localhost:9000".into());
        let sandbox = build_sandbox(&config);
        assert!(sandbox.is_configured());
        assert_eq!(sandbox.name(), "http");
    }
}
