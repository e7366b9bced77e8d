//! The digest pipeline orchestrator.
//!
//! Wires the staged pipeline together from a validated config: scrape,
//! process, summarize, then the bounded quality refinement loop, then
//! promotion of the surviving draft to the finished digest. The promotion
//! is unconditional. When the loop gives up without approval the caller
//! still gets the best draft produced, flagged as unapproved in the
//! report.

use std::sync::Arc;

use chrono::Utc;
use newsloom_config::DigestConfig;
use newsloom_core::error::Error;
use newsloom_core::event::{EventBus, PipelineEvent};
use newsloom_core::provider::Provider;
use newsloom_core::stage::Stage;
use newsloom_core::state::{SessionState, StateAccess, keys};
use newsloom_core::tool::{ToolCall, ToolRegistry};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::gate::QualityGate;
use crate::llm_stage::LlmStage;
use crate::prompts;
use crate::quality::QualityChecker;
use crate::refine::{LoopOutcome, RefinementLoop, dispatch};

/// What one pipeline run produced.
#[derive(Debug, Clone)]
pub struct DigestReport {
    /// The topic the run was asked for.
    pub topic: String,
    /// The finished digest text. May be empty if every stage degraded.
    pub digest: String,
    /// The critic's last score, when a verdict was recorded.
    pub quality_score: Option<f64>,
    /// Whether the critic approved the final draft.
    pub quality_approved: bool,
    /// How many refinement passes ran.
    pub passes: usize,
    /// Whether the loop stopped before its iteration cap.
    pub terminated_early: bool,
    /// The gate's reason, when it terminated the loop.
    pub termination_reason: Option<String>,
}

/// The result of saving a digest through the save tool.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub success: bool,
    pub message: String,
}

/// Orchestrates a full digest run against one provider and tool registry.
pub struct DigestPipeline {
    config: DigestConfig,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    event_bus: EventBus,
}

impl DigestPipeline {
    /// Build a pipeline from a validated config.
    ///
    /// Validation happens here, before any stage exists, so a bad config
    /// can never produce a half-built pipeline.
    pub fn new(
        config: DigestConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self, Error> {
        config.validate().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        Ok(Self {
            config,
            provider,
            tools,
            event_bus: EventBus::default(),
        })
    }

    /// Attach an event bus for progress reporting.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// A handle to the pipeline's event bus, for subscribing before a run.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn worker_stage(
        &self,
        name: &str,
        instruction: impl Into<String>,
        access: StateAccess,
        output_key: &str,
    ) -> LlmStage {
        LlmStage::new(
            name,
            instruction,
            self.provider.clone(),
            &self.config.worker_model,
            access,
            output_key,
        )
        .with_event_bus(self.event_bus.clone())
    }

    /// Run the full pipeline for `topic` and return the report.
    pub async fn run(&self, topic: &str) -> Result<DigestReport, Error> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(Error::InvalidInput("topic must not be empty".into()));
        }

        info!(topic, "Starting digest pipeline");

        let state = SessionState::new();
        state.set(keys::TOPIC, Value::String(topic.to_string())).await;

        let scraper = self
            .worker_stage(
                "news_scraper",
                prompts::scraper_instruction(self.config.max_articles),
                StateAccess::new(&[keys::TOPIC], &[keys::ARTICLES]),
                keys::ARTICLES,
            )
            .with_tools(self.tools.clone(), &["search_news"]);

        let processor = self
            .worker_stage(
                "article_processor",
                prompts::PROCESSOR_INSTRUCTION,
                StateAccess::new(&[keys::ARTICLES], &[keys::PROCESSED_ARTICLES]),
                keys::PROCESSED_ARTICLES,
            )
            .with_tools(self.tools.clone(), &["extract_article_text"])
            .with_max_tool_rounds(extraction_round_cap(self.config.max_articles));

        let summarizer = self.worker_stage(
            "article_summarizer",
            prompts::SUMMARIZER_INSTRUCTION,
            StateAccess::new(&[keys::PROCESSED_ARTICLES], &[keys::SUMMARIES]),
            keys::SUMMARIES,
        );

        for stage in [&scraper, &processor, &summarizer] {
            let signal = dispatch(stage, &state, Some(&self.event_bus)).await?;
            if signal.is_terminate() {
                // Sequential stages have no loop to stop.
                warn!(stage = stage.name(), "Ignoring termination signal outside the loop");
            }
        }

        let generator = self.worker_stage(
            "digest_generator",
            prompts::generator_instruction(self.config.target_reading_time),
            StateAccess::new(&[keys::TOPIC, keys::SUMMARIES], &[keys::CURRENT_DIGEST]),
            keys::CURRENT_DIGEST,
        );

        let checker = QualityChecker::new(
            self.provider.clone(),
            &self.config.critic_model,
            self.config.quality_threshold,
        );

        let refiner = self.worker_stage(
            "digest_refiner",
            prompts::REFINER_INSTRUCTION,
            StateAccess::new(
                &[keys::CURRENT_DIGEST, keys::QUALITY_FEEDBACK, keys::QUALITY_SCORE],
                &[keys::CURRENT_DIGEST],
            ),
            keys::CURRENT_DIGEST,
        );

        let refinement = RefinementLoop::new(
            "robust_digest_generator",
            vec![
                Arc::new(generator) as Arc<dyn Stage>,
                Arc::new(checker),
                Arc::new(refiner),
                Arc::new(QualityGate::new()),
            ],
            self.config.max_quality_iterations,
        )?
        .with_event_bus(self.event_bus.clone());

        let outcome = refinement.run(&state).await?;

        // Promote whatever draft survived the loop. An unapproved draft is
        // still the run's product; the report says so.
        let digest = state.get_str(keys::CURRENT_DIGEST).await.unwrap_or_default();
        state
            .set(keys::FINAL_DIGEST, Value::String(digest.clone()))
            .await;

        let quality_score = state.get_f64(keys::QUALITY_SCORE).await;
        let quality_approved = state.get_bool(keys::QUALITY_APPROVED).await.unwrap_or(false);

        let mut session_keys: Vec<String> = state.snapshot().await.into_keys().collect();
        session_keys.sort();
        debug!(?session_keys, passes = outcome.passes(), "Pipeline session finished");

        if !quality_approved {
            warn!(
                passes = outcome.passes(),
                score = quality_score,
                "Digest finished without quality approval"
            );
        }

        Ok(DigestReport {
            topic: topic.to_string(),
            digest,
            quality_score,
            quality_approved,
            passes: outcome.passes(),
            terminated_early: outcome.terminated(),
            termination_reason: match outcome {
                LoopOutcome::Terminated { reason, .. } => Some(reason),
                LoopOutcome::CapExhausted { .. } => None,
            },
        })
    }

    /// Save a digest to `path` through the registered save tool.
    ///
    /// Write failures come back as an unsuccessful [`SaveOutcome`], not an
    /// error; only a missing or misconfigured tool is an [`Error`].
    pub async fn save_to(&self, digest: &str, path: &str) -> Result<SaveOutcome, Error> {
        let call = ToolCall {
            id: format!("call_{}", Uuid::new_v4()),
            name: "save_digest_to_file".into(),
            arguments: json!({ "digest": digest, "filename": path }),
        };

        let result = self.tools.execute(&call).await?;

        if result.success {
            self.event_bus.publish(PipelineEvent::DigestSaved {
                path: path.to_string(),
                timestamp: Utc::now(),
            });
        }

        let message = result
            .data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| result.output.clone());

        Ok(SaveOutcome {
            success: result.success,
            message,
        })
    }
}

/// One extraction round per article, plus slack for the final answer.
fn extraction_round_cap(max_articles: usize) -> u32 {
    u32::try_from(max_articles)
        .unwrap_or(u32::MAX)
        .saturating_add(2)
}
