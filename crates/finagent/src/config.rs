//! Configuration for the question-answering pipeline

use crate::error::{FinanceError, Result};
use finagent_llm::providers::OpenAICompatConfig;
use finagent_llm::providers::openai::DEFAULT_API_BASE;
use finagent_market::VciConfig;
use finagent_runtime::ModelSettings;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Model, sampling and network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceConfig {
    /// Model identifier sent with every completion
    pub model: String,

    /// Base URL of the OpenAI-compatible endpoint
    pub api_base: String,

    /// API key sent as a bearer token
    #[serde(skip_serializing, default)]
    pub api_key: String,

    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: usize,

    /// Upper bound on agent round trips per query
    pub max_iterations: usize,

    /// Attempts a structured chain gets before failing the request
    pub structured_attempts: usize,

    /// Timeout of one model call
    pub llm_timeout: Duration,

    /// Timeout of one market data call
    pub market_timeout: Duration,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: String::new(),
            temperature: 0.0,
            top_p: 0.95,
            max_tokens: 4096,
            max_iterations: 10,
            structured_attempts: 3,
            llm_timeout: Duration::from_secs(120),
            market_timeout: Duration::from_secs(30),
        }
    }
}

impl FinanceConfig {
    /// Create a new configuration builder
    pub fn builder() -> FinanceConfigBuilder {
        FinanceConfigBuilder::default()
    }

    /// Defaults overridden by `FINAGENT_*` environment variables
    ///
    /// The API key is read from `FINAGENT_API_KEY`, then `GOOGLE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(model) = get("FINAGENT_MODEL") {
            config.model = model;
        }
        if let Some(base) = get("FINAGENT_API_BASE") {
            config.api_base = base;
        }
        if let Some(key) = get("FINAGENT_API_KEY").or_else(|| get("GOOGLE_API_KEY")) {
            config.api_key = key;
        }
        if let Some(raw) = get("FINAGENT_TEMPERATURE") {
            config.temperature = parse_var("FINAGENT_TEMPERATURE", &raw)?;
        }
        if let Some(raw) = get("FINAGENT_TOP_P") {
            config.top_p = parse_var("FINAGENT_TOP_P", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(FinanceError::Config("model must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(FinanceError::Config(format!(
                "temperature must be in [0, 2], got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(FinanceError::Config(format!(
                "top_p must be in (0, 1], got {}",
                self.top_p
            )));
        }
        if self.structured_attempts == 0 {
            return Err(FinanceError::Config(
                "structured_attempts must be greater than 0".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(FinanceError::Config(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Sampling settings for every model call
    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
            top_p: Some(self.top_p),
        }
    }

    /// Settings for the OpenAI-compatible provider
    pub fn provider_config(&self) -> OpenAICompatConfig {
        OpenAICompatConfig::new(self.api_key.clone())
            .with_api_base(self.api_base.clone())
            .with_timeout(self.llm_timeout.as_secs())
    }

    /// Settings for the Vietcap gateway
    pub fn vci_config(&self) -> VciConfig {
        VciConfig::default().with_timeout(self.market_timeout)
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| FinanceError::Config(format!("{key} is not a valid number: '{raw}'")))
}

/// Builder for FinanceConfig
#[derive(Debug, Default)]
pub struct FinanceConfigBuilder {
    model: Option<String>,
    api_base: Option<String>,
    api_key: Option<String>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    max_tokens: Option<usize>,
    max_iterations: Option<usize>,
    structured_attempts: Option<usize>,
    llm_timeout: Option<Duration>,
    market_timeout: Option<Duration>,
}

impl FinanceConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn structured_attempts(mut self, attempts: usize) -> Self {
        self.structured_attempts = Some(attempts);
        self
    }

    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = Some(timeout);
        self
    }

    pub fn market_timeout(mut self, timeout: Duration) -> Self {
        self.market_timeout = Some(timeout);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<FinanceConfig> {
        let defaults = FinanceConfig::default();
        let config = FinanceConfig {
            model: self.model.unwrap_or(defaults.model),
            api_base: self.api_base.unwrap_or(defaults.api_base),
            api_key: self.api_key.unwrap_or(defaults.api_key),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            structured_attempts: self
                .structured_attempts
                .unwrap_or(defaults.structured_attempts),
            llm_timeout: self.llm_timeout.unwrap_or(defaults.llm_timeout),
            market_timeout: self.market_timeout.unwrap_or(defaults.market_timeout),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = FinanceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.structured_attempts, 3);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = FinanceConfig::from_lookup(lookup(&[
            ("FINAGENT_MODEL", "gemini-1.5-pro"),
            ("GOOGLE_API_KEY", "g-key"),
            ("FINAGENT_TEMPERATURE", "0.5"),
        ]))
        .unwrap();
        assert_eq!(config.model, "gemini-1.5-pro");
        assert_eq!(config.api_key, "g-key");
        assert!((config.temperature - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_own_key_wins_over_google_key() {
        let config = FinanceConfig::from_lookup(lookup(&[
            ("FINAGENT_API_KEY", "own"),
            ("GOOGLE_API_KEY", "google"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "own");
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = FinanceConfig::from_lookup(lookup(&[("FINAGENT_TOP_P", "nhiều")])).unwrap_err();
        assert!(matches!(err, FinanceError::Config(_)));
    }

    #[test]
    fn test_builder_validation() {
        assert!(FinanceConfig::builder().temperature(2.5).build().is_err());
        assert!(FinanceConfig::builder().top_p(0.0).build().is_err());
        assert!(FinanceConfig::builder().structured_attempts(0).build().is_err());
        assert!(FinanceConfig::builder().max_iterations(0).build().is_err());
        assert!(FinanceConfig::builder().model("  ").build().is_err());

        let config = FinanceConfig::builder()
            .model("gemini-2.0-flash-lite")
            .max_iterations(4)
            .build()
            .unwrap();
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.model_settings().model, "gemini-2.0-flash-lite");
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = FinanceConfig::builder().api_key("secret").build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
