//! The quality checker stage.
//!
//! Asks the critic model for a JSON verdict over the current draft and
//! writes `quality_score`, `quality_feedback`, and `quality_approved`
//! fresh on every pass. Approval is computed in code from the configured
//! threshold, never taken from the model's own claim.

use std::sync::Arc;

use async_trait::async_trait;
use newsloom_core::error::StageError;
use newsloom_core::message::Message;
use newsloom_core::provider::{Provider, ProviderRequest};
use newsloom_core::stage::{Stage, StageSignal};
use newsloom_core::state::{ScopedState, StateAccess, keys};
use serde_json::{Value, json};
use tracing::debug;

use crate::prompts;

/// Critic temperature. Verdicts are structured output, so sample low.
const CHECKER_TEMPERATURE: f32 = 0.3;

/// The critic stage that scores the current draft.
pub struct QualityChecker {
    name: String,
    provider: Arc<dyn Provider>,
    model: String,
    threshold: u8,
    max_tokens: Option<u32>,
}

impl QualityChecker {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, threshold: u8) -> Self {
        Self {
            name: "quality_checker".into(),
            provider,
            model: model.into(),
            threshold,
            max_tokens: None,
        }
    }

    /// Set the max tokens per verdict.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

#[async_trait]
impl Stage for QualityChecker {
    fn name(&self) -> &str {
        &self.name
    }

    fn access(&self) -> StateAccess {
        StateAccess::new(
            &[keys::CURRENT_DIGEST],
            &[
                keys::QUALITY_SCORE,
                keys::QUALITY_FEEDBACK,
                keys::QUALITY_APPROVED,
            ],
        )
    }

    async fn run(&self, state: ScopedState) -> Result<StageSignal, StageError> {
        let digest = state
            .read_string(keys::CURRENT_DIGEST)
            .await?
            .unwrap_or_default();

        let user_content = if digest.is_empty() {
            "(no digest available)".to_string()
        } else {
            digest
        };

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(prompts::checker_instruction(self.threshold)),
                Message::user(user_content),
            ],
            temperature: CHECKER_TEMPERATURE,
            max_tokens: self.max_tokens,
            tools: Vec::new(),
        };

        let response =
            self.provider
                .complete(request)
                .await
                .map_err(|source| StageError::Provider {
                    stage: self.name.clone(),
                    source,
                })?;

        let verdict = parse_verdict(&response.message.content);
        let approved = verdict.score >= self.threshold;

        debug!(
            score = verdict.score,
            threshold = self.threshold,
            approved,
            "Quality verdict"
        );

        state.write(keys::QUALITY_SCORE, json!(verdict.score)).await?;
        state
            .write(keys::QUALITY_FEEDBACK, Value::String(verdict.feedback))
            .await?;
        state
            .write(keys::QUALITY_APPROVED, Value::Bool(approved))
            .await?;

        Ok(StageSignal::Continue)
    }
}

#[derive(Debug, PartialEq)]
struct Verdict {
    score: u8,
    feedback: String,
}

/// Parse the critic's verdict out of its response text.
///
/// Accepts a bare JSON object, an object embedded in surrounding prose or a
/// code fence, and numeric scores given as strings. Anything unparseable
/// scores zero with the raw text as feedback.
fn parse_verdict(content: &str) -> Verdict {
    if let Some(verdict) = try_parse(content) {
        return verdict;
    }

    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}'))
        && start < end
        && let Some(verdict) = try_parse(&content[start..=end])
    {
        return verdict;
    }

    Verdict {
        score: 0,
        feedback: content.trim().to_string(),
    }
}

fn try_parse(text: &str) -> Option<Verdict> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    let obj = value.as_object()?;
    let score = parse_score(obj.get("score")?)?;
    let feedback = obj
        .get("feedback")
        .and_then(|f| f.as_str())
        .unwrap_or("")
        .to_string();
    Some(Verdict { score, feedback })
}

fn parse_score(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(n.clamp(0.0, 100.0).round() as u8)
}
