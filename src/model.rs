//! `MistralModel`: the adapter an orchestration layer talks to.
//!
//! Holds one [`MistralConfig`] and builds its [`ChatClient`] on first use.
//! The handle is built at most once per adapter, under a mutex, and then
//! shared by every call. Concurrent `run`/`async_run` calls on one adapter
//! are allowed and are not serialized; each call sends its own message.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use tracing::{debug, info};

use crate::config::{self, EnvSource, MistralConfig};
use crate::error::ConfigError;
use crate::llm::{ChatClient, ClientFactory, Message, MistralClientFactory};

pub struct MistralModel {
    config: MistralConfig,
    factory: Arc<dyn ClientFactory>,
    llm: Mutex<Option<Arc<dyn ChatClient>>>,
}

impl MistralModel {
    /// Creates an adapter backed by the Mistral HTTP client.
    pub fn new(config: MistralConfig) -> Self {
        Self::with_factory(config, MistralClientFactory)
    }

    /// Creates an adapter whose client comes from `factory`.
    pub fn with_factory(config: MistralConfig, factory: impl ClientFactory + 'static) -> Self {
        Self {
            config,
            factory: Arc::new(factory),
            llm: Mutex::new(None),
        }
    }

    /// Loads the Mistral configuration from environment variables.
    ///
    /// See [`config::load_from_env_config`].
    pub fn load_from_env_config(env: &impl EnvSource) -> Result<MistralConfig, ConfigError> {
        config::load_from_env_config(env)
    }

    pub fn config(&self) -> &MistralConfig {
        &self.config
    }

    /// Type name used in log lines.
    pub fn name(&self) -> &'static str {
        "MistralModel"
    }

    /// Returns the client handle, building it on the first call.
    ///
    /// The lock is held while the factory runs, so callers racing on a
    /// fresh adapter all receive the same handle.
    pub fn load(&self) -> Result<Arc<dyn ChatClient>> {
        let mut guard = self.llm.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(llm) = guard.as_ref() {
            return Ok(Arc::clone(llm));
        }

        let llm = self.factory.build(&self.config)?;
        debug!("Initialized LLM client: {}", llm.description());
        *guard = Some(Arc::clone(&llm));
        Ok(llm)
    }

    /// Async counterpart of [`MistralModel::load`]; performs no I/O.
    pub async fn async_load(&self) -> Result<Arc<dyn ChatClient>> {
        self.load()
    }

    /// Sends `input_text` as a single human message and returns the reply.
    ///
    /// Blocks the current thread. Client errors are returned unchanged.
    pub fn run(&self, input_text: &str) -> Result<String> {
        info!("Running LLM - {}", self.name());
        let llm = self.load()?;
        let message = Message::human(input_text);
        let resp = llm.invoke(std::slice::from_ref(&message))?;
        Ok(resp.content)
    }

    /// Non-blocking form of [`MistralModel::run`].
    pub async fn async_run(&self, input_text: &str) -> Result<String> {
        info!("Running LLM - {}", self.name());
        let llm = self.async_load().await?;
        let message = Message::human(input_text);
        let resp = llm.ainvoke(std::slice::from_ref(&message)).await?;
        Ok(resp.content)
    }
}
