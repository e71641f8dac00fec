//! Mistral chat adapter.
//!
//! Loads credentials and model parameters, builds a Mistral client on first
//! use, and runs single-turn prompts through it, blocking or async.
//!
//! ```no_run
//! use mistral_adapter::{load_from_env_config, MistralModel, ProcessEnv};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = load_from_env_config(&ProcessEnv)?;
//! let model = MistralModel::new(config);
//! let reply = model.async_run("Name three French cheeses.").await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod llm;
pub mod model;

pub use config::{load_from_env_config, EnvSource, MistralConfig, ProcessEnv};
pub use error::{ConfigError, MistralError};
pub use llm::{ChatClient, ChatResponse, ClientFactory, Message, MistralClient, Role};
pub use model::MistralModel;
