//! Stage trait: the abstraction over pipeline roles.
//!
//! A stage is one role in the digest pipeline: find articles, extract text,
//! summarize, draft, critique, refine, or gate. Most stages delegate to an
//! LLM provider; gates are pure predicates over shared state. Either way the
//! driver only sees this trait, so the whole pipeline can run against
//! deterministic stand-ins in tests.

use async_trait::async_trait;

use crate::error::StageError;
use crate::state::{ScopedState, StateAccess};

/// What a stage tells the driver after running.
///
/// Termination is an explicit return value, not a side-channel event: the
/// driver switches on this directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageSignal {
    /// Keep going. The overwhelmingly common case.
    Continue,
    /// Stop loop progression now, with a human-readable reason.
    Terminate(String),
}

impl StageSignal {
    pub fn is_terminate(&self) -> bool {
        matches!(self, StageSignal::Terminate(_))
    }
}

/// The core Stage trait.
///
/// `access()` declares the shared-state keys the stage reads and writes.
/// The dispatcher scopes the state view it hands to `run` accordingly, so a
/// stage can never quietly touch keys outside its contract.
#[async_trait]
pub trait Stage: Send + Sync {
    /// The unique name of this stage (e.g. "digest_generator").
    fn name(&self) -> &str;

    /// The declared read/write contract for this stage.
    fn access(&self) -> StateAccess;

    /// Run the stage against its scoped view of shared state.
    async fn run(&self, state: ScopedState) -> Result<StageSignal, StageError>;
}
