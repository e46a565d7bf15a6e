//! Conversation messages.
//!
//! A [`Message`] is an immutable value: two messages are equal when both
//! their [`Role`] and their content are equal. On the wire a message is
//! `{"role": "human", "content": "hi"}`.

use serde::{Deserialize, Serialize};

/// Who authored a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Instructions for the model; usually first in the list.
    System,
    /// User input.
    Human,
    /// Model-authored reply.
    Ai,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::System => "system",
            Self::Human => "human",
            Self::Ai => "ai",
        };
        f.write_str(s)
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "role",
    content = "content",
    rename_all = "snake_case",
    deny_unknown_fields
)]
pub enum Message {
    /// System prompt.
    System(String),
    /// User input.
    Human(String),
    /// Model reply.
    Ai(String),
}

impl Message {
    /// Builds a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System(content.into())
    }

    /// Builds a human message.
    pub fn human(content: impl Into<String>) -> Self {
        Self::Human(content.into())
    }

    /// Builds an AI message.
    pub fn ai(content: impl Into<String>) -> Self {
        Self::Ai(content.into())
    }

    /// The author of this message.
    pub fn role(&self) -> Role {
        match self {
            Self::System(_) => Role::System,
            Self::Human(_) => Role::Human,
            Self::Ai(_) => Role::Ai,
        }
    }

    /// The message text.
    pub fn content(&self) -> &str {
        match self {
            Self::System(c) | Self::Human(c) | Self::Ai(c) => c,
        }
    }
}
