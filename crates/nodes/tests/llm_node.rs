//! Integration tests for the LLM node, driven through fake factories and clients.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nodes::{llm_node, LlmNode};
use pipeline::{
    ConversationState, LlmClient, LlmClientFactory, LlmError, LlmResponse, Message,
    MessageSource, Node, NodeError, NodeId, Prompt, Usage,
};

const MOCKED: &str = "Mocked AI response";

/// Call records shared between a fake factory, its clients, and the test.
#[derive(Clone, Default)]
struct Calls {
    created: Arc<AtomicUsize>,
    invocations: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl Calls {
    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn invocations(&self) -> Vec<Vec<Message>> {
        self.invocations.lock().unwrap().clone()
    }
}

struct RecordingClient {
    response: Result<LlmResponse, LlmError>,
    calls: Calls,
}

#[async_trait]
impl LlmClient for RecordingClient {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, LlmError> {
        self.calls.invocations.lock().unwrap().push(messages.to_vec());
        self.response.clone()
    }
}

struct FakeFactory {
    response: Result<LlmResponse, LlmError>,
    create_error: Option<LlmError>,
    calls: Calls,
}

impl FakeFactory {
    fn answering(content: &str) -> Self {
        Self {
            response: Ok(LlmResponse::new(content)),
            create_error: None,
            calls: Calls::default(),
        }
    }

    fn failing_invoke(error: LlmError) -> Self {
        Self {
            response: Err(error),
            create_error: None,
            calls: Calls::default(),
        }
    }

    fn failing_create(error: LlmError) -> Self {
        Self {
            response: Ok(LlmResponse::new(MOCKED)),
            create_error: Some(error),
            calls: Calls::default(),
        }
    }
}

impl LlmClientFactory for FakeFactory {
    fn create(&self) -> Result<Box<dyn LlmClient>, LlmError> {
        self.calls.created.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.create_error {
            return Err(err.clone());
        }
        Ok(Box::new(RecordingClient {
            response: self.response.clone(),
            calls: self.calls.clone(),
        }))
    }
}

fn fixture_state() -> ConversationState {
    ConversationState::new(vec![Message::human("hi")])
        .with_prompt(Prompt::from_text("unused-string"))
}

#[tokio::test]
async fn mocked_answer_is_recorded_in_state() {
    let factory = FakeFactory::answering(MOCKED);
    let state = fixture_state();
    let sent = state.messages.clone();

    let updated = llm_node(&factory, state).await.unwrap();

    assert_eq!(updated.answer.as_deref(), Some(MOCKED));
    assert_eq!(updated.messages.last(), Some(&Message::ai(MOCKED)));
    assert_eq!(updated.messages.len(), 2);

    assert_eq!(factory.calls.created(), 1);
    assert_eq!(factory.calls.invocations(), vec![sent]);
}

#[tokio::test]
async fn prompt_content_does_not_affect_the_answer() {
    for prompt in [
        Prompt::default(),
        Prompt::from_text("something else entirely"),
        Prompt::new(vec![Message::system("be terse"), Message::human("ignored")]),
    ] {
        let factory = FakeFactory::answering(MOCKED);
        let state = ConversationState::new(vec![Message::human("hi")]).with_prompt(prompt);

        let updated = llm_node(&factory, state).await.unwrap();

        assert_eq!(updated.answer.as_deref(), Some(MOCKED));
        assert_eq!(updated.messages.last(), Some(&Message::ai(MOCKED)));
        assert_eq!(factory.calls.invocations(), vec![vec![Message::human("hi")]]);
    }
}

#[tokio::test]
async fn prompt_message_source_sends_prompt_messages() {
    let factory = FakeFactory::answering(MOCKED);
    let node = LlmNode::new(NodeId::default_llm(), &factory)
        .with_message_source(MessageSource::PromptMessages);
    let mut state = fixture_state();

    node.run(&mut state).await.unwrap();

    assert_eq!(
        factory.calls.invocations(),
        vec![vec![Message::human("unused-string")]]
    );
    assert_eq!(state.answer.as_deref(), Some(MOCKED));
    assert_eq!(state.messages, vec![Message::human("hi"), Message::ai(MOCKED)]);
}

#[tokio::test]
async fn factory_failure_leaves_state_untouched() {
    let factory = FakeFactory::failing_create(LlmError::Configuration {
        message: "ANTHROPIC_API_KEY is not set".into(),
    });
    let node = LlmNode::new(NodeId::new("answer").unwrap(), &factory);
    let mut state = fixture_state();
    let before = state.clone();

    let err = node.run(&mut state).await.unwrap_err();

    match err {
        NodeError::Llm { node, source } => {
            assert_eq!(node.as_str(), "answer");
            assert!(matches!(source, LlmError::Configuration { .. }));
        }
    }
    assert_eq!(state, before);
    assert_eq!(factory.calls.created(), 1);
    assert!(factory.calls.invocations().is_empty());
}

#[tokio::test]
async fn invocation_failure_propagates_unchanged() {
    let cause = LlmError::Provider {
        status: 529,
        message: "overloaded".into(),
    };
    let factory = FakeFactory::failing_invoke(cause.clone());
    let state = fixture_state();

    let err = llm_node(&factory, state).await.unwrap_err();

    let NodeError::Llm { source, .. } = err;
    assert_eq!(source, cause);
    assert_eq!(factory.calls.created(), 1);
    assert_eq!(factory.calls.invocations().len(), 1);
}

#[tokio::test]
async fn each_run_creates_a_fresh_client() {
    let factory = FakeFactory::answering(MOCKED);
    let node = LlmNode::new(NodeId::default_llm(), &factory);
    let mut state = fixture_state();

    node.run(&mut state).await.unwrap();
    node.run(&mut state).await.unwrap();

    assert_eq!(factory.calls.created(), 2);
    let invocations = factory.calls.invocations();
    assert_eq!(invocations.len(), 2);
    assert_eq!(invocations[1], vec![Message::human("hi"), Message::ai(MOCKED)]);
    assert_eq!(state.messages.len(), 3);
}

#[tokio::test]
async fn node_runs_behind_trait_objects() {
    let factory: Box<dyn LlmClientFactory> = Box::new(FakeFactory {
        response: Ok(LlmResponse::new(MOCKED).with_usage(Usage::new(3, 4))),
        create_error: None,
        calls: Calls::default(),
    });
    let node: Box<dyn Node> = Box::new(LlmNode::new(NodeId::default_llm(), factory));
    let mut state = fixture_state();

    node.run(&mut state).await.unwrap();

    assert_eq!(node.id().as_str(), NodeId::DEFAULT_LLM);
    assert_eq!(state.answer.as_deref(), Some(MOCKED));
}
