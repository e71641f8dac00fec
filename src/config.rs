use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

/// Environment variable holding the Mistral API key (required).
pub const API_KEY_VAR: &str = "MISTRAL_API_KEY";
/// Optional override for the model name.
pub const MODEL_VAR: &str = "MISTRAL_MODEL";
/// Optional override for the sampling temperature.
pub const TEMPERATURE_VAR: &str = "MISTRAL_TEMPERATURE";
/// Optional override for the API base URL.
pub const ENDPOINT_VAR: &str = "MISTRAL_ENDPOINT";

pub const DEFAULT_MODEL: &str = "mistral-large-latest";
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_ENDPOINT: &str = "https://api.mistral.ai/v1";

/// Highest temperature the Mistral API accepts.
pub const MAX_TEMPERATURE: f64 = 1.5;

/// Read-only view of environment variables.
///
/// Configuration loading goes through this trait rather than `std::env`
/// so that callers (and tests) can hand in an explicit snapshot.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Credentials and model parameters for one Mistral adapter.
#[derive(Deserialize, Clone, PartialEq)]
pub struct MistralConfig {
    /// Supports ${ENV_VAR} substitution when loaded from a file
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Omitted from requests when unset
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

/// Top-level layout of a TOML config file.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    mistral: MistralConfig,
}

// The key never shows up in logs or panic messages.
impl fmt::Debug for MistralConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MistralConfig")
            .field("api_key", &"<redacted>")
            .field("model_name", &self.model_name)
            .field("temperature", &self.temperature)
            .field("endpoint", &self.endpoint)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl MistralConfig {
    /// Creates a config with default model, temperature and endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model_name: default_model(),
            temperature: default_temperature(),
            endpoint: default_endpoint(),
            max_tokens: None,
        }
    }

    pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Checks the key, the temperature range and the endpoint URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential(API_KEY_VAR));
        }
        if self.model_name.trim().is_empty() {
            return Err(ConfigError::invalid("model_name", &self.model_name, "must not be empty"));
        }
        if !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(ConfigError::invalid(
                "temperature",
                self.temperature.to_string(),
                format!("must be between 0.0 and {MAX_TEMPERATURE}"),
            ));
        }
        match url::Url::parse(&self.endpoint) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
            Ok(_) => {
                return Err(ConfigError::invalid("endpoint", &self.endpoint, "scheme must be http or https"));
            }
            Err(e) => return Err(ConfigError::invalid("endpoint", &self.endpoint, e.to_string())),
        }
        Ok(())
    }

    /// Loads the `[mistral]` table from a TOML file.
    pub fn load(path: impl AsRef<Path>, env: &impl EnvSource) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Reading Mistral config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content, env)
    }

    /// Parses TOML, expanding references like ${MISTRAL_API_KEY} from `env`
    /// first. A reference to an unset variable is an error.
    pub fn from_toml(content: &str, env: &impl EnvSource) -> Result<Self, ConfigError> {
        let expanded = shellexpand::env_with_context(content, |key: &str| {
            env.var(key).map(Some).ok_or(std::env::VarError::NotPresent)
        })?;
        let file: ConfigFile = toml::from_str(&expanded)?;
        file.mistral.validate()?;
        Ok(file.mistral)
    }
}

/// Builds a [`MistralConfig`] from environment variables.
///
/// `MISTRAL_API_KEY` is required; a missing or blank value fails with
/// [`ConfigError::MissingCredential`]. `MISTRAL_MODEL`,
/// `MISTRAL_TEMPERATURE` and `MISTRAL_ENDPOINT` override the defaults
/// when set to a non-empty value.
pub fn load_from_env_config(env: &impl EnvSource) -> Result<MistralConfig, ConfigError> {
    let api_key = non_empty(env, API_KEY_VAR).ok_or(ConfigError::MissingCredential(API_KEY_VAR))?;
    let mut config = MistralConfig::new(api_key);

    if let Some(model) = non_empty(env, MODEL_VAR) {
        config.model_name = model;
    }
    if let Some(raw) = non_empty(env, TEMPERATURE_VAR) {
        config.temperature = raw
            .trim()
            .parse()
            .map_err(|e: std::num::ParseFloatError| ConfigError::invalid(TEMPERATURE_VAR, &raw, e.to_string()))?;
    }
    if let Some(endpoint) = non_empty(env, ENDPOINT_VAR) {
        config.endpoint = endpoint;
    }

    config.validate()?;
    Ok(config)
}

fn non_empty(env: &impl EnvSource, key: &str) -> Option<String> {
    env.var(key).filter(|v| !v.trim().is_empty())
}
