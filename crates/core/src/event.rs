//! Pipeline event system: progress reporting without coupling.
//!
//! Drivers publish an event when a stage, pass, or save completes; the CLI
//! (or any other host) subscribes to render progress. Events are strictly
//! observational: loop termination travels through [`crate::stage::StageSignal`]
//! return values, never through this bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All pipeline events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A stage began running
    StageStarted {
        stage: String,
        timestamp: DateTime<Utc>,
    },

    /// A stage finished (with either signal)
    StageCompleted {
        stage: String,
        terminated: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A refinement pass began
    PassStarted {
        pass: usize,
        max_passes: usize,
        timestamp: DateTime<Utc>,
    },

    /// The refinement loop finished
    LoopFinished {
        passes: usize,
        /// Populated when a gate terminated the loop; `None` means the
        /// iteration cap was exhausted.
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed on behalf of a stage
    ToolExecuted {
        stage: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The digest was written to disk
    DigestSaved {
        path: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for pipeline events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Clones share
/// the same channel, so the orchestrator can hand one handle to each driver.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<PipelineEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: PipelineEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PipelineEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
