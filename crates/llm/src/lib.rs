//! LangNode LLM provider infrastructure adapters.
//!
//! Implements [`pipeline::LlmClient`] and [`pipeline::LlmClientFactory`]:
//!
//! - [`AnthropicFactory`] / [`AnthropicClient`] call the Anthropic Messages
//!   API over HTTPS.
//! - [`ScriptedFactory`] / [`ScriptedClient`] answer offline with a fixed
//!   reply (or echo the last human message), for local runs and tests.
//!
//! Additional providers are added as new modules in this crate without any
//! changes to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response
//! parsing, and status-code classification live here. The [`pipeline`] crate
//! sees only the port traits and [`pipeline::LlmError`].

mod anthropic;
mod scripted;

pub use anthropic::{AnthropicClient, AnthropicConfig, AnthropicFactory};
pub use scripted::{ScriptedClient, ScriptedFactory};
