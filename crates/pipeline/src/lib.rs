//! Core conversation domain for LangNode.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, port trait, and cross-cutting error type used by the node and its
//! adapters. Infrastructure crates implement the traits defined here; they
//! never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`NodeId`, `ModelName`, `RunId`) |
//! | [`message`] | Conversation messages and their roles |
//! | [`state`] | `ConversationState`, `Prompt`, and `MessageSource` |
//! | [`ports`] | `LlmClient`, `LlmClientFactory`, and `Node` traits |
//! | [`types`] | Shared value types (`TokenCount`, `Usage`) |
//! | [`errors`] | Error and retry-policy types |

pub mod errors;
pub mod identifiers;
pub mod message;
pub mod ports;
pub mod state;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{LlmError, NodeError, RetryPolicy, StateError};
pub use identifiers::{ModelName, NodeId, RunId};
pub use message::{Message, Role};
pub use ports::{LlmClient, LlmClientFactory, LlmResponse, Node};
pub use state::{ConversationState, MessageSource, Prompt};
pub use types::{TokenCount, Usage};
