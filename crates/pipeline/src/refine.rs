//! The bounded refinement loop.
//!
//! Runs its stages in order, over and over, until a stage returns
//! [`StageSignal::Terminate`] or the iteration cap runs out. Every stage in
//! the roster runs on every pass, gate included, so termination is decided
//! by a fresh verdict each time round. The cap is a hard guarantee: the
//! loop finishes in at most `max_iterations` passes no matter what the
//! stages do.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use newsloom_core::error::Error;
use newsloom_core::event::{EventBus, PipelineEvent};
use newsloom_core::stage::{Stage, StageSignal};
use newsloom_core::state::{ScopedState, SessionState, StateAccess};
use tracing::{debug, info, warn};

/// How a refinement loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// A stage signalled termination on pass `passes`.
    Terminated { passes: usize, reason: String },
    /// The iteration cap ran out with no stage signalling termination.
    CapExhausted { passes: usize },
}

impl LoopOutcome {
    /// Number of passes that actually ran.
    pub fn passes(&self) -> usize {
        match self {
            LoopOutcome::Terminated { passes, .. } => *passes,
            LoopOutcome::CapExhausted { passes } => *passes,
        }
    }

    /// Whether a stage stopped the loop before the cap.
    pub fn terminated(&self) -> bool {
        matches!(self, LoopOutcome::Terminated { .. })
    }

    /// The termination reason, when a stage supplied one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            LoopOutcome::Terminated { reason, .. } => Some(reason),
            LoopOutcome::CapExhausted { .. } => None,
        }
    }
}

/// Run one stage against a freshly scoped view of the session state,
/// publishing start/complete events around it. Shared by the loop and the
/// sequential part of the pipeline so every stage is dispatched the same
/// way.
pub(crate) async fn dispatch(
    stage: &dyn Stage,
    state: &SessionState,
    event_bus: Option<&EventBus>,
) -> Result<StageSignal, Error> {
    if let Some(bus) = event_bus {
        bus.publish(PipelineEvent::StageStarted {
            stage: stage.name().to_string(),
            timestamp: Utc::now(),
        });
    }

    let started = Instant::now();
    let scoped = ScopedState::new(state.clone(), stage.name().to_string(), stage.access());
    let signal = stage.run(scoped).await?;

    if let Some(bus) = event_bus {
        bus.publish(PipelineEvent::StageCompleted {
            stage: stage.name().to_string(),
            terminated: signal.is_terminate(),
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
    }

    Ok(signal)
}

/// A bounded loop driver over a fixed roster of stages.
pub struct RefinementLoop {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    max_iterations: usize,
    event_bus: Option<EventBus>,
}

impl RefinementLoop {
    /// Build a loop over `stages` capped at `max_iterations` passes.
    ///
    /// Rejects an empty roster and a zero cap up front: both would make the
    /// loop's guarantees meaningless.
    pub fn new(
        name: impl Into<String>,
        stages: Vec<Arc<dyn Stage>>,
        max_iterations: usize,
    ) -> Result<Self, Error> {
        let name = name.into();
        if stages.is_empty() {
            return Err(Error::Config {
                message: format!("refinement loop '{name}' has no stages"),
            });
        }
        if max_iterations == 0 {
            return Err(Error::Config {
                message: format!("refinement loop '{name}' needs max_iterations >= 1"),
            });
        }
        Ok(Self {
            name,
            stages,
            max_iterations,
            event_bus: None,
        })
    }

    /// Attach an event bus for progress reporting.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// The union of the sub-stages' state contracts, for hosts that want to
    /// know what the loop as a whole touches.
    pub fn access(&self) -> StateAccess {
        self.stages
            .iter()
            .fold(StateAccess::default(), |acc, stage| {
                acc.union(&stage.access())
            })
    }

    /// Drive the loop to completion.
    ///
    /// A pass runs the stages strictly in roster order. The first
    /// `Terminate` stops everything at once: the rest of that pass is
    /// skipped and no further pass starts. A stage error aborts the loop
    /// and propagates.
    pub async fn run(&self, state: &SessionState) -> Result<LoopOutcome, Error> {
        for pass in 1..=self.max_iterations {
            if let Some(bus) = &self.event_bus {
                bus.publish(PipelineEvent::PassStarted {
                    pass,
                    max_passes: self.max_iterations,
                    timestamp: Utc::now(),
                });
            }
            debug!(loop_name = %self.name, pass, max = self.max_iterations, "Refinement pass");

            for stage in &self.stages {
                let signal = dispatch(stage.as_ref(), state, self.event_bus.as_ref()).await?;
                if let StageSignal::Terminate(reason) = signal {
                    info!(
                        loop_name = %self.name,
                        pass,
                        reason = %reason,
                        "Refinement loop terminated"
                    );
                    if let Some(bus) = &self.event_bus {
                        bus.publish(PipelineEvent::LoopFinished {
                            passes: pass,
                            reason: Some(reason.clone()),
                            timestamp: Utc::now(),
                        });
                    }
                    return Ok(LoopOutcome::Terminated { passes: pass, reason });
                }
            }
        }

        warn!(
            loop_name = %self.name,
            max = self.max_iterations,
            "Iteration cap exhausted without termination"
        );
        if let Some(bus) = &self.event_bus {
            bus.publish(PipelineEvent::LoopFinished {
                passes: self.max_iterations,
                reason: None,
                timestamp: Utc::now(),
            });
        }
        Ok(LoopOutcome::CapExhausted {
            passes: self.max_iterations,
        })
    }
}
