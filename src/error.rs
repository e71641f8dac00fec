//! Error types for configuration loading and Mistral API calls.

use thiserror::Error;

/// Errors raised while building a [`MistralConfig`](crate::config::MistralConfig).
///
/// These happen once, at startup, and are not recoverable locally.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required credential is absent or blank.
    #[error("missing required credential: {0} is not set")]
    MissingCredential(&'static str),

    /// A setting is present but unusable.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// A `${VAR}` reference in the config file could not be expanded.
    #[error("cannot expand environment variables: {0}")]
    Expand(#[from] shellexpand::LookupError<std::env::VarError>),

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by [`MistralClient`](crate::llm::MistralClient) during a call.
#[derive(Error, Debug)]
pub enum MistralError {
    /// Transport failure (DNS, TLS, connection reset, invalid JSON body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("Mistral API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The API answered 2xx but returned no choices.
    #[error("Mistral API returned no choices")]
    EmptyResponse,
}

impl MistralError {
    /// True for 401/403 responses (bad or revoked key).
    pub fn is_auth(&self) -> bool {
        matches!(self, MistralError::Api { status: 401 | 403, .. })
    }

    /// True for 429 responses (quota or rate limit).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, MistralError::Api { status: 429, .. })
    }
}
