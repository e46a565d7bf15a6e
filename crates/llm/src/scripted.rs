//! Offline client with a scripted reply.

use async_trait::async_trait;
use pipeline::{LlmClient, LlmClientFactory, LlmError, LlmResponse, Message};

/// Answers without any network access.
///
/// With a configured reply, every invocation returns it. Without one, the
/// client echoes the most recent human message, and fails with
/// [`LlmError::EmptyResponse`] when there is none.
#[derive(Debug, Clone, Default)]
pub struct ScriptedClient {
    reply: Option<String>,
}

impl ScriptedClient {
    /// A client that always returns `reply`.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
        }
    }

    /// A client that echoes the last human message.
    pub fn echo() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, LlmError> {
        let content = match &self.reply {
            Some(reply) => reply.clone(),
            None => messages
                .iter()
                .rev()
                .find_map(|m| match m {
                    Message::Human(text) => Some(text.clone()),
                    _ => None,
                })
                .ok_or(LlmError::EmptyResponse)?,
        };
        Ok(LlmResponse::new(content))
    }
}

/// Produces [`ScriptedClient`]s.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFactory {
    reply: Option<String>,
}

impl ScriptedFactory {
    /// Clients built by this factory return `reply`, or echo when `None`.
    pub fn new(reply: Option<String>) -> Self {
        Self { reply }
    }
}

impl LlmClientFactory for ScriptedFactory {
    fn create(&self) -> Result<Box<dyn LlmClient>, LlmError> {
        Ok(Box::new(ScriptedClient {
            reply: self.reply.clone(),
        }))
    }
}
