//! The reusable LLM-delegated stage.
//!
//! Every model-backed role in the pipeline (scraper, processor, summarizer,
//! generator, refiner) is an [`LlmStage`] instance: role instructions, a
//! model id, a declared state contract, and one output key. `run` renders
//! the declared reads into a context block, drives a bounded tool-call
//! exchange with the provider, and writes the final text to the output key.
//!
//! An LlmStage always returns [`StageSignal::Continue`]; loop termination
//! is the business of gates.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use newsloom_core::error::StageError;
use newsloom_core::event::{EventBus, PipelineEvent};
use newsloom_core::message::Message;
use newsloom_core::provider::{Provider, ProviderRequest};
use newsloom_core::stage::{Stage, StageSignal};
use newsloom_core::state::{ScopedState, StateAccess};
use newsloom_core::tool::{ToolCall, ToolRegistry};
use serde_json::Value;
use tracing::{debug, warn};

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOOL_ROUNDS: u32 = 4;

/// A pipeline stage that delegates its work to an LLM provider.
pub struct LlmStage {
    name: String,
    instruction: String,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    tool_names: Vec<String>,
    access: StateAccess,
    output_key: String,
    max_tool_rounds: u32,
    event_bus: EventBus,
}

impl LlmStage {
    /// Create a new LLM stage.
    ///
    /// `output_key` must be one of the keys declared writable in `access`;
    /// otherwise the write is rejected at run time.
    pub fn new(
        name: impl Into<String>,
        instruction: impl Into<String>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        access: StateAccess,
        output_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            provider,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            tools: Arc::new(ToolRegistry::new()),
            tool_names: Vec::new(),
            access,
            output_key: output_key.into(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            event_bus: EventBus::default(),
        }
    }

    /// Offer a named subset of registry tools to this stage.
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>, names: &[&str]) -> Self {
        self.tools = tools;
        self.tool_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the max tokens per completion.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the maximum number of provider calls per invocation.
    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    /// Attach an event bus for tool execution events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }
}

/// Render the declared read keys into the context block the model sees.
fn render_context(pairs: &[(String, Value)]) -> String {
    if pairs.is_empty() {
        return "(no input available)".into();
    }
    pairs
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => serde_json::to_string_pretty(other).unwrap_or_default(),
            };
            format!("## {key}\n{rendered}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Stage for LlmStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn access(&self) -> StateAccess {
        self.access.clone()
    }

    async fn run(&self, state: ScopedState) -> Result<StageSignal, StageError> {
        let context = render_context(&state.read_declared().await);
        let mut messages = vec![Message::system(&self.instruction), Message::user(context)];

        let tool_names: Vec<&str> = self.tool_names.iter().map(String::as_str).collect();
        let tool_definitions = self.tools.definitions_for(&tool_names);

        let mut round = 0u32;
        let content = loop {
            round += 1;

            debug!(stage = %self.name, round, "LLM stage round");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response =
                self.provider
                    .complete(request)
                    .await
                    .map_err(|source| StageError::Provider {
                        stage: self.name.clone(),
                        source,
                    })?;

            if response.message.tool_calls.is_empty() {
                break response.message.content;
            }

            if round >= self.max_tool_rounds {
                warn!(
                    stage = %self.name,
                    rounds = round,
                    "Max tool rounds reached, using last response"
                );
                break response.message.content;
            }

            let tool_calls = response.message.tool_calls.clone();
            messages.push(response.message);

            for tc in &tool_calls {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: serde_json::from_str(&tc.arguments).unwrap_or_default(),
                };

                let start = Instant::now();
                let result = self.tools.execute(&call).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                match result {
                    Ok(tool_result) => {
                        self.event_bus.publish(PipelineEvent::ToolExecuted {
                            stage: self.name.clone(),
                            tool_name: tc.name.clone(),
                            success: tool_result.success,
                            duration_ms,
                            timestamp: Utc::now(),
                        });
                        messages.push(Message::tool_result(&tc.id, &tool_result.output));
                    }
                    Err(e) => {
                        warn!(stage = %self.name, tool = %tc.name, error = %e, "Tool execution failed");
                        self.event_bus.publish(PipelineEvent::ToolExecuted {
                            stage: self.name.clone(),
                            tool_name: tc.name.clone(),
                            success: false,
                            duration_ms,
                            timestamp: Utc::now(),
                        });
                        // Report the error to the model so it can recover.
                        messages.push(Message::tool_result(&tc.id, format!("Error: {e}")));
                    }
                }
            }
        };

        // Degraded output (including empty text) still lands in state.
        state.write(&self.output_key, Value::String(content)).await?;

        Ok(StageSignal::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use newsloom_core::error::{ProviderError, ToolError};
    use newsloom_core::provider::ProviderResponse;
    use newsloom_core::state::{SessionState, keys};
    use newsloom_core::tool::{Tool, ToolResult};
    use serde_json::json;

    /// Registry with a single echo tool, for tool-round tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
        ) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            Ok(ToolResult::success(format!("echo: {text}")))
        }
    }

    fn echo_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        Arc::new(registry)
    }

    fn scoped(state: &SessionState, stage: &LlmStage) -> ScopedState {
        ScopedState::new(state.clone(), stage.name().to_string(), stage.access())
    }

    #[tokio::test]
    async fn writes_text_response_to_output_key() {
        let provider = Arc::new(SequentialMockProvider::single_text("three fine summaries"));
        let state = SessionState::new();
        state.set(keys::PROCESSED_ARTICLES, json!("body text")).await;

        let stage = LlmStage::new(
            "summarizer",
            "Summarize the articles.",
            provider,
            "mock-model",
            StateAccess::new(&[keys::PROCESSED_ARTICLES], &[keys::SUMMARIES]),
            keys::SUMMARIES,
        );

        let signal = stage.run(scoped(&state, &stage)).await.unwrap();
        assert_eq!(signal, StageSignal::Continue);
        assert_eq!(
            state.get_str(keys::SUMMARIES).await.as_deref(),
            Some("three fine summaries")
        );
    }

    #[tokio::test]
    async fn renders_declared_reads_into_user_context() {
        let provider = Arc::new(SequentialMockProvider::single_text("a digest"));
        let state = SessionState::new();
        state.set(keys::TOPIC, json!("rust releases")).await;
        state.set(keys::SUMMARIES, json!(["s1", "s2"])).await;

        let stage = LlmStage::new(
            "digest_generator",
            "Write the digest.",
            provider.clone(),
            "mock-model",
            StateAccess::new(&[keys::TOPIC, keys::SUMMARIES], &[keys::CURRENT_DIGEST]),
            keys::CURRENT_DIGEST,
        );

        stage.run(scoped(&state, &stage)).await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let user_msg = &requests[0].messages[1];
        assert!(user_msg.content.contains("## topic"));
        assert!(user_msg.content.contains("rust releases"));
        assert!(user_msg.content.contains("## summaries"));
        // Declaration order is preserved in the rendered block.
        let topic_pos = user_msg.content.find("## topic").unwrap();
        let summaries_pos = user_msg.content.find("## summaries").unwrap();
        assert!(topic_pos < summaries_pos);
    }

    #[tokio::test]
    async fn empty_context_renders_placeholder() {
        let provider = Arc::new(SequentialMockProvider::single_text("done"));
        let state = SessionState::new();

        let stage = LlmStage::new(
            "scraper",
            "Find articles.",
            provider.clone(),
            "mock-model",
            StateAccess::new(&[keys::TOPIC], &[keys::ARTICLES]),
            keys::ARTICLES,
        );

        stage.run(scoped(&state, &stage)).await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests[0].messages[1].content, "(no input available)");
    }

    #[tokio::test]
    async fn executes_tool_round_then_writes_final_text() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(
                vec![make_tool_call("echo", json!({"text": "hello"}))],
                "",
            ),
            make_text_response("final answer"),
        ]));
        let state = SessionState::new();
        state.set(keys::TOPIC, json!("anything")).await;

        let stage = LlmStage::new(
            "scraper",
            "Find articles.",
            provider.clone(),
            "mock-model",
            StateAccess::new(&[keys::TOPIC], &[keys::ARTICLES]),
            keys::ARTICLES,
        )
        .with_tools(echo_registry(), &["echo"]);

        stage.run(scoped(&state, &stage)).await.unwrap();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(
            state.get_str(keys::ARTICLES).await.as_deref(),
            Some("final answer")
        );

        // Second request carries the tool result back to the model.
        let requests = provider.requests();
        let tool_msg = requests[1]
            .messages
            .iter()
            .find(|m| m.role == newsloom_core::message::Role::Tool)
            .unwrap();
        assert!(tool_msg.content.contains("echo: hello"));
    }

    #[tokio::test]
    async fn publishes_tool_executed_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(vec![make_tool_call("echo", json!({"text": "x"}))], ""),
            make_text_response("done"),
        ]));
        let state = SessionState::new();

        let stage = LlmStage::new(
            "scraper",
            "Find articles.",
            provider,
            "mock-model",
            StateAccess::new(&[], &[keys::ARTICLES]),
            keys::ARTICLES,
        )
        .with_tools(echo_registry(), &["echo"])
        .with_event_bus(bus);

        stage.run(scoped(&state, &stage)).await.unwrap();

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            PipelineEvent::ToolExecuted {
                stage, tool_name, success, ..
            } => {
                assert_eq!(stage, "scraper");
                assert_eq!(tool_name, "echo");
                assert!(success);
            }
            other => panic!("Expected ToolExecuted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stops_at_max_tool_rounds_and_writes_last_content() {
        // The model keeps asking for tools; the stage gives up after the cap.
        let responses = (0..3)
            .map(|_| {
                make_tool_call_response(
                    vec![make_tool_call("echo", json!({"text": "again"}))],
                    "still working",
                )
            })
            .collect();

        let provider = Arc::new(SequentialMockProvider::new(responses));
        let state = SessionState::new();

        let stage = LlmStage::new(
            "processor",
            "Extract articles.",
            provider.clone(),
            "mock-model",
            StateAccess::new(&[], &[keys::PROCESSED_ARTICLES]),
            keys::PROCESSED_ARTICLES,
        )
        .with_tools(echo_registry(), &["echo"])
        .with_max_tool_rounds(3);

        stage.run(scoped(&state, &stage)).await.unwrap();

        assert_eq!(provider.call_count(), 3);
        assert_eq!(
            state.get_str(keys::PROCESSED_ARTICLES).await.as_deref(),
            Some("still working")
        );
    }

    #[tokio::test]
    async fn tool_error_is_reported_to_model_not_raised() {
        // "vanish" is not registered, so the registry errors; the stage
        // reports it back and the model recovers with a final answer.
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(vec![make_tool_call("vanish", json!({}))], ""),
            make_text_response("recovered"),
        ]));
        let state = SessionState::new();

        let stage = LlmStage::new(
            "scraper",
            "Find articles.",
            provider.clone(),
            "mock-model",
            StateAccess::new(&[], &[keys::ARTICLES]),
            keys::ARTICLES,
        )
        .with_tools(echo_registry(), &["echo"]);

        stage.run(scoped(&state, &stage)).await.unwrap();

        let requests = provider.requests();
        let tool_msg = requests[1]
            .messages
            .iter()
            .find(|m| m.role == newsloom_core::message::Role::Tool)
            .unwrap();
        assert!(tool_msg.content.starts_with("Error:"));
        assert_eq!(
            state.get_str(keys::ARTICLES).await.as_deref(),
            Some("recovered")
        );
    }

    #[tokio::test]
    async fn provider_error_names_the_stage() {
        struct FailingProvider;

        #[async_trait]
        impl Provider for FailingProvider {
            fn name(&self) -> &str {
                "failing"
            }
            async fn complete(
                &self,
                _request: ProviderRequest,
            ) -> std::result::Result<ProviderResponse, ProviderError> {
                Err(ProviderError::Timeout("deadline exceeded".into()))
            }
        }

        let state = SessionState::new();
        let stage = LlmStage::new(
            "digest_generator",
            "Write the digest.",
            Arc::new(FailingProvider),
            "mock-model",
            StateAccess::new(&[], &[keys::CURRENT_DIGEST]),
            keys::CURRENT_DIGEST,
        );

        let err = stage.run(scoped(&state, &stage)).await.unwrap_err();
        match err {
            StageError::Provider { stage, source } => {
                assert_eq!(stage, "digest_generator");
                assert!(matches!(source, ProviderError::Timeout(_)));
            }
            other => panic!("Expected provider stage error, got {other:?}"),
        }
        // Nothing was written.
        assert!(!state.contains(keys::CURRENT_DIGEST).await);
    }

    #[tokio::test]
    async fn undeclared_output_key_is_rejected() {
        let provider = Arc::new(SequentialMockProvider::single_text("text"));
        let state = SessionState::new();

        // Contract allows writing summaries, but the stage targets final_digest.
        let stage = LlmStage::new(
            "summarizer",
            "Summarize.",
            provider,
            "mock-model",
            StateAccess::new(&[], &[keys::SUMMARIES]),
            keys::FINAL_DIGEST,
        );

        let err = stage.run(scoped(&state, &stage)).await.unwrap_err();
        assert!(matches!(err, StageError::State(_)));
    }

    #[test]
    fn render_context_pretty_prints_structured_values() {
        let pairs = vec![
            ("topic".to_string(), json!("ai chips")),
            ("articles".to_string(), json!([{"title": "A", "url": "u"}])),
        ];
        let block = render_context(&pairs);
        assert!(block.contains("## topic\nai chips"));
        assert!(block.contains("\"title\": \"A\""));
    }
}
