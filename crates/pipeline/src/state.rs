//! Conversation state passed through a node.
//!
//! [`ConversationState`] is a statically typed record: decoding a state
//! document rejects unknown or misspelt keys instead of carrying them along.
//! The caller owns the state and lends it to a node by `&mut`; the node sets
//! [`ConversationState::answer`] and appends the model's reply.

use serde::{Deserialize, Serialize};

use crate::{Message, StateError};

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// The pending prompt: an ordered list of messages prepared for the model.
///
/// In a state document the prompt may be written either as
/// `{"messages": [...]}` or as a bare string, which becomes a single human
/// message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PromptRepr")]
pub struct Prompt {
    /// Messages making up the prompt.
    pub messages: Vec<Message>,
}

impl Prompt {
    /// Creates a prompt from a list of messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Creates a prompt holding one human message, or no messages when `text`
    /// is empty.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            Self::default()
        } else {
            Self {
                messages: vec![Message::Human(text)],
            }
        }
    }

    /// Returns `true` when the prompt holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PromptRepr {
    Text(String),
    Structured(PromptFields),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PromptFields {
    #[serde(default)]
    messages: Vec<Message>,
}

impl From<PromptRepr> for Prompt {
    fn from(repr: PromptRepr) -> Self {
        match repr {
            PromptRepr::Text(text) => Prompt::from_text(text),
            PromptRepr::Structured(fields) => Prompt::new(fields.messages),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation state
// ---------------------------------------------------------------------------

/// The mutable record of prior messages, pending prompt, and resulting answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationState {
    /// Prior messages, oldest first.
    pub messages: Vec<Message>,

    /// The pending prompt.
    #[serde(default)]
    pub prompt: Prompt,

    /// The latest model answer. `None` until a node has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl ConversationState {
    /// Creates a state with the given history, an empty prompt, and no answer.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            prompt: Prompt::default(),
            answer: None,
        }
    }

    /// Replaces the prompt (builder).
    pub fn with_prompt(mut self, prompt: Prompt) -> Self {
        self.prompt = prompt;
        self
    }

    /// Records a model answer: sets [`Self::answer`] and appends the matching
    /// AI message to [`Self::messages`].
    pub fn record_answer(&mut self, content: impl Into<String>) {
        let content = content.into();
        self.messages.push(Message::Ai(content.clone()));
        self.answer = Some(content);
    }

    /// The most recent message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Decodes a state document.
    pub fn from_json(input: &str) -> Result<Self, StateError> {
        let state: Self = serde_json::from_str(input).map_err(StateError::Decode)?;
        tracing::debug!(
            messages = state.messages.len(),
            prompt_messages = state.prompt.messages.len(),
            "Decoded conversation state"
        );
        Ok(state)
    }

    /// Encodes the state as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, StateError> {
        serde_json::to_string_pretty(self).map_err(StateError::Encode)
    }
}

// ---------------------------------------------------------------------------
// Message source
// ---------------------------------------------------------------------------

/// Which message list of the state a node sends to the model.
///
/// The history (`messages`) and the prompt (`prompt.messages`) are separate
/// fields and are not guaranteed to be equal; the choice is configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    /// Send [`ConversationState::messages`].
    #[default]
    StateMessages,
    /// Send [`Prompt::messages`] of [`ConversationState::prompt`].
    PromptMessages,
}

impl MessageSource {
    /// Borrows the selected message list from `state`.
    pub fn select<'a>(&self, state: &'a ConversationState) -> &'a [Message] {
        match self {
            Self::StateMessages => &state.messages,
            Self::PromptMessages => &state.prompt.messages,
        }
    }
}

impl std::fmt::Display for MessageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::StateMessages => "state_messages",
            Self::PromptMessages => "prompt_messages",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for MessageSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "state_messages" => Ok(Self::StateMessages),
            "prompt_messages" => Ok(Self::PromptMessages),
            other => Err(format!(
                "unknown message source '{other}' (expected 'state_messages' or 'prompt_messages')"
            )),
        }
    }
}
