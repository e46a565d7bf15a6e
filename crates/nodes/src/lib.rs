//! LangNode node implementations.
//!
//! This crate provides [`LlmNode`], which obtains a model client from a
//! [`pipeline::LlmClientFactory`], invokes it once, and records the answer in
//! the [`pipeline::ConversationState`].
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Nodes sequence calls between the domain types in
//! the [`pipeline`] crate and infrastructure traits. They contain no provider
//! details of their own.

mod llm_node;

pub use llm_node::{llm_node, LlmNode};
