//! Error and retry-policy types for the LangNode domain.
//!
//! [`LlmError`] covers every failure a model client or client factory can
//! report. [`NodeError`] is what a [`crate::Node`] returns to its caller; it
//! carries the failing node's identity and the underlying cause unchanged.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`]. Nodes never
//! retry on their own; the policy is advice for whoever drives them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::NodeId;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: transport failures, rate limiting, provider 5xx.
/// - `NonRetryable` errors: invalid configuration, rejected requests,
///   malformed or empty responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Model client errors
// ---------------------------------------------------------------------------

/// Failures reported by an [`crate::LlmClient`] or [`crate::LlmClientFactory`].
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum LlmError {
    /// The client could not be constructed from its configuration
    /// (missing API key, invalid base URL, ...).
    #[error("LLM configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The request never produced an HTTP response (connection refused,
    /// timeout, TLS failure).
    #[error("LLM transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The provider rejected the request because of rate limiting.
    #[error("LLM provider rate limited the request")]
    RateLimited {
        /// Delay requested by the provider, when it sent one.
        retry_after: Option<Duration>,
    },

    /// The provider answered with a non-success status.
    #[error("LLM provider returned status {status}: {message}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// The provider's response body could not be decoded.
    #[error("LLM response could not be decoded: {message}")]
    InvalidResponse {
        /// Decoder error description.
        message: String,
    },

    /// The provider answered successfully but produced no text.
    #[error("LLM response contained no text content")]
    EmptyResponse,
}

impl LlmError {
    /// Classifies this error for retry decisions.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Transport { .. } => RetryPolicy::Retryable { after: None },
            Self::RateLimited { retry_after } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Provider { status, .. } if *status >= 500 => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Configuration { .. }
            | Self::Provider { .. }
            | Self::InvalidResponse { .. }
            | Self::EmptyResponse => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Node errors
// ---------------------------------------------------------------------------

/// Errors returned by a [`crate::Node`].
#[derive(Debug, Error)]
pub enum NodeError {
    /// Creating or invoking the model client failed. The cause is passed
    /// through unchanged.
    #[error("Node '{node}' failed calling the model: {source}")]
    Llm {
        /// The node that was running.
        node: NodeId,
        /// The client or factory failure.
        #[source]
        source: LlmError,
    },
}

impl NodeError {
    /// Delegates to the wrapped cause's [`RetryPolicy`].
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Llm { source, .. } => source.retry_policy(),
        }
    }
}

// ---------------------------------------------------------------------------
// State document errors
// ---------------------------------------------------------------------------

/// A conversation state document could not be decoded or encoded.
#[derive(Debug, Error)]
pub enum StateError {
    /// The document is not valid JSON or does not match the state schema
    /// (missing `messages`, unknown or misspelt keys, wrong value types).
    #[error("Invalid conversation state: {0}")]
    Decode(#[source] serde_json::Error),

    /// The state could not be serialised.
    #[error("Conversation state could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}
