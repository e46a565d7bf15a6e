//! The LLM node.

use async_trait::async_trait;
use pipeline::{
    ConversationState, LlmClientFactory, MessageSource, Node, NodeError, NodeId, RunId,
};
use tracing::Instrument;

/// Asks a model for an answer and folds it into the conversation state.
///
/// Each [`Node::run`] calls the factory exactly once and the resulting client
/// exactly once. On success `state.answer` holds the response text and the
/// same text is appended to `state.messages` as an AI message. On failure the
/// error is returned unchanged (wrapped in [`NodeError::Llm`]) and the state
/// is not touched.
pub struct LlmNode<F> {
    id: NodeId,
    factory: F,
    message_source: MessageSource,
}

impl<F: LlmClientFactory> LlmNode<F> {
    /// Creates a node that sends `state.messages` to the model.
    pub fn new(id: NodeId, factory: F) -> Self {
        Self {
            id,
            factory,
            message_source: MessageSource::default(),
        }
    }

    /// Selects which message list is sent to the model (builder).
    pub fn with_message_source(mut self, message_source: MessageSource) -> Self {
        self.message_source = message_source;
        self
    }

    fn llm_error(&self, source: pipeline::LlmError) -> NodeError {
        NodeError::Llm {
            node: self.id.clone(),
            source,
        }
    }
}

#[async_trait]
impl<F: LlmClientFactory> Node for LlmNode<F> {
    fn id(&self) -> &NodeId {
        &self.id
    }

    async fn run(&self, state: &mut ConversationState) -> Result<(), NodeError> {
        let run_id = RunId::new_random();
        let span = tracing::info_span!(
            "llm_node",
            node = %self.id,
            run_id = %run_id,
            message_source = %self.message_source,
        );

        async {
            let client = self.factory.create().map_err(|e| {
                tracing::warn!(error = %e, "Model client could not be created");
                self.llm_error(e)
            })?;

            let messages = self.message_source.select(state);
            tracing::debug!(messages = messages.len(), "Invoking model");

            let response = client.invoke(messages).await.map_err(|e| {
                tracing::warn!(error = %e, retry = ?e.retry_policy(), "Model invocation failed");
                self.llm_error(e)
            })?;

            if let Some(usage) = response.usage {
                tracing::info!(
                    input_tokens = usage.input_tokens.as_u64(),
                    output_tokens = usage.output_tokens.as_u64(),
                    "Model usage"
                );
            }
            tracing::info!(answer_len = response.content.len(), "Model answered");

            state.record_answer(response.content);
            Ok::<(), NodeError>(())
        }
        .instrument(span)
        .await
    }
}

/// Runs an [`LlmNode`] named [`NodeId::DEFAULT_LLM`] over `state` and returns
/// the updated state.
pub async fn llm_node<F>(
    factory: &F,
    mut state: ConversationState,
) -> Result<ConversationState, NodeError>
where
    F: LlmClientFactory + ?Sized,
{
    LlmNode::new(NodeId::default_llm(), factory)
        .run(&mut state)
        .await?;
    Ok(state)
}
