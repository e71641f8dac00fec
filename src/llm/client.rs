//! `ChatClient` trait: abstraction over the provider client.
//!
//! The model adapter never talks HTTP itself: it asks a [`ClientFactory`]
//! for a `ChatClient` once, then hands it one message list per call.
//! Tests swap in stub implementations through the same seam.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{ChatResponse, Message};
use crate::config::MistralConfig;

/// A client able to complete a conversation, blocking or not.
///
/// Errors are returned as produced by the implementation; callers must
/// not expect them to be retried or translated.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends the messages and blocks the current thread until the reply.
    ///
    /// Must not be called from inside an async task; use
    /// [`ChatClient::ainvoke`] there, or move the call to
    /// `tokio::task::spawn_blocking`.
    fn invoke(&self, messages: &[Message]) -> Result<ChatResponse>;

    /// Sends the messages and suspends the calling task until the reply.
    async fn ainvoke(&self, messages: &[Message]) -> Result<ChatResponse>;

    /// Human-readable description of the provider and model.
    ///
    /// Used in log output, e.g. `"mistral (mistral-large-latest)"`.
    fn description(&self) -> String;
}

/// Builds a [`ChatClient`] from a configuration.
///
/// A failure here means the client cannot be used at all (for example
/// the TLS backend failed to initialize) and is reported at load time.
pub trait ClientFactory: Send + Sync {
    fn build(&self, config: &MistralConfig) -> Result<Arc<dyn ChatClient>>;
}

impl<F> ClientFactory for F
where
    F: Fn(&MistralConfig) -> Result<Arc<dyn ChatClient>> + Send + Sync,
{
    fn build(&self, config: &MistralConfig) -> Result<Arc<dyn ChatClient>> {
        self(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time verification that both traits are object-safe.
    #[test]
    fn test_traits_are_object_safe() {
        fn _assert_client(_: &dyn ChatClient) {}
        fn _assert_factory(_: &dyn ClientFactory) {}
    }

    struct Fixed;

    #[async_trait]
    impl ChatClient for Fixed {
        fn invoke(&self, _messages: &[Message]) -> Result<ChatResponse> {
            Ok(ChatResponse {
                content: "fixed".to_string(),
                model: "fixed".to_string(),
                finish_reason: None,
                input_tokens: 0,
                output_tokens: 0,
            })
        }

        async fn ainvoke(&self, messages: &[Message]) -> Result<ChatResponse> {
            self.invoke(messages)
        }

        fn description(&self) -> String {
            "fixed".to_string()
        }
    }

    #[test]
    fn test_closure_factory() {
        let factory = |_: &MistralConfig| -> Result<Arc<dyn ChatClient>> { Ok(Arc::new(Fixed)) };
        let client = factory.build(&MistralConfig::new("x")).unwrap();
        assert_eq!(client.description(), "fixed");
        assert_eq!(client.invoke(&[]).unwrap().content, "fixed");
    }
}
