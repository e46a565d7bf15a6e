//! Port traits implemented by infrastructure crates.
//!
//! A [`LlmClientFactory`] produces a fresh [`LlmClient`] each time a node
//! runs. Tests substitute their own implementations of both traits; no
//! runtime patching is involved.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ConversationState, LlmError, Message, NodeError, NodeId, Usage};

/// The text returned by one model invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated text.
    pub content: String,
    /// Token usage, when the provider reports it.
    pub usage: Option<Usage>,
}

impl LlmResponse {
    /// Creates a response without usage information.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }

    /// Attaches usage information (builder).
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// An object capable of asynchronous text generation.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends `messages` to the model and returns its reply.
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, LlmError>;
}

/// Builds [`LlmClient`]s from the factory's own configuration.
pub trait LlmClientFactory: Send + Sync {
    /// Creates a new client.
    fn create(&self) -> Result<Box<dyn LlmClient>, LlmError>;
}

impl<T: LlmClientFactory + ?Sized> LlmClientFactory for &T {
    fn create(&self) -> Result<Box<dyn LlmClient>, LlmError> {
        (**self).create()
    }
}

impl<T: LlmClientFactory + ?Sized> LlmClientFactory for Box<T> {
    fn create(&self) -> Result<Box<dyn LlmClient>, LlmError> {
        (**self).create()
    }
}

impl<T: LlmClientFactory + ?Sized> LlmClientFactory for Arc<T> {
    fn create(&self) -> Result<Box<dyn LlmClient>, LlmError> {
        (**self).create()
    }
}

/// A unit of work that transforms a [`ConversationState`].
#[async_trait]
pub trait Node: Send + Sync {
    /// The node's configured name.
    fn id(&self) -> &NodeId;

    /// Runs the node. On error the state is left as it was.
    async fn run(&self, state: &mut ConversationState) -> Result<(), NodeError>;
}
