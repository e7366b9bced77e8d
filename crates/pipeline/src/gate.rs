//! Gate stages: pure predicates over shared state.
//!
//! Gates never call a provider and never write. They read one key and
//! answer with [`StageSignal::Continue`] or [`StageSignal::Terminate`], so
//! the refinement driver's stop decision is a plain value it can switch on.
//! Both gates fail closed: a missing or mistyped key means another pass,
//! never an accidental stop.

use async_trait::async_trait;
use newsloom_core::error::StageError;
use newsloom_core::stage::{Stage, StageSignal};
use newsloom_core::state::{ScopedState, StateAccess, keys};
use serde_json::Value;
use tracing::debug;

/// Stops the refinement loop once the checker has approved the draft.
///
/// Reads only `quality_approved`, the flag the checker rewrites fresh on
/// every pass. Anything other than a literal `true` keeps the loop going.
pub struct QualityGate {
    name: String,
}

impl QualityGate {
    pub fn new() -> Self {
        Self {
            name: "quality_gate".into(),
        }
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for QualityGate {
    fn name(&self) -> &str {
        &self.name
    }

    fn access(&self) -> StateAccess {
        StateAccess::read_only(&[keys::QUALITY_APPROVED])
    }

    async fn run(&self, state: ScopedState) -> Result<StageSignal, StageError> {
        match state.read(keys::QUALITY_APPROVED).await? {
            Some(Value::Bool(true)) => {
                debug!("Quality approved, signalling termination");
                Ok(StageSignal::Terminate("quality approved".into()))
            }
            _ => Ok(StageSignal::Continue),
        }
    }
}

/// Stops a loop as soon as a finished digest exists.
///
/// Not part of the default refinement loop (the quality gate is). It is the
/// building block for pipelines that only need "produce something, then
/// stop" rather than a quality bar. An empty string does not count as a
/// digest.
pub struct DigestPresenceGate {
    name: String,
}

impl DigestPresenceGate {
    pub fn new() -> Self {
        Self {
            name: "digest_presence_gate".into(),
        }
    }
}

impl Default for DigestPresenceGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for DigestPresenceGate {
    fn name(&self) -> &str {
        &self.name
    }

    fn access(&self) -> StateAccess {
        StateAccess::read_only(&[keys::FINAL_DIGEST])
    }

    async fn run(&self, state: ScopedState) -> Result<StageSignal, StageError> {
        match state.read(keys::FINAL_DIGEST).await? {
            Some(Value::String(s)) if !s.is_empty() => {
                Ok(StageSignal::Terminate("digest present".into()))
            }
            _ => Ok(StageSignal::Continue),
        }
    }
}
