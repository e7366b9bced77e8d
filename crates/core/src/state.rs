//! Session-scoped shared state: the key-value store every pipeline stage
//! reads from and writes to.
//!
//! Stages never touch [`SessionState`] directly. The dispatcher hands each
//! stage a [`ScopedState`] view built from the stage's declared
//! [`StateAccess`], so an undeclared read or write fails loudly instead of
//! silently corrupting a key another stage depends on.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::StateError;

/// Well-known state keys shared across the digest pipeline.
pub mod keys {
    /// The user's topic request, seeded by the orchestrator.
    pub const TOPIC: &str = "topic";
    /// Articles found by the scraper (title/url/snippet records).
    pub const ARTICLES: &str = "articles";
    /// Articles with extracted body text.
    pub const PROCESSED_ARTICLES: &str = "processed_articles";
    /// Per-article summaries.
    pub const SUMMARIES: &str = "summaries";
    /// The live draft. A single mutable slot, overwritten every pass.
    pub const CURRENT_DIGEST: &str = "current_digest";
    /// Critic score, 0–100.
    pub const QUALITY_SCORE: &str = "quality_score";
    /// Critic feedback consumed by the refiner on the next pass.
    pub const QUALITY_FEEDBACK: &str = "quality_feedback";
    /// Approval flag. Re-written fresh every pass; never carried over.
    pub const QUALITY_APPROVED: &str = "quality_approved";
    /// The finished digest, promoted from the draft after the loop ends.
    pub const FINAL_DIGEST: &str = "final_digest";
}

/// The session's shared key-value store.
///
/// Cheap to clone (all clones share the same map). Stages run strictly
/// sequentially, so the lock is there to make handles `Send`, not to
/// arbitrate contention.
#[derive(Clone, Default)]
pub struct SessionState {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl SessionState {
    /// Create an empty session store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key).await {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub async fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key).await {
            Some(Value::Bool(b)) => Some(b),
            _ => None,
        }
    }

    pub async fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key).await {
            Some(Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.write().await.insert(key.into(), value);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.read().await.contains_key(key)
    }

    /// Clone the whole map. Used for reporting, never on the hot path.
    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.inner.read().await.clone()
    }
}

/// A stage's declared state contract: the keys it may read and the keys it
/// may write. Declarations are plain data, available to the dispatcher at
/// construction time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateAccess {
    reads: Vec<String>,
    writes: Vec<String>,
}

impl StateAccess {
    pub fn new(reads: &[&str], writes: &[&str]) -> Self {
        Self {
            reads: reads.iter().map(|k| k.to_string()).collect(),
            writes: writes.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// A contract with no write permission at all, for gate stages.
    pub fn read_only(reads: &[&str]) -> Self {
        Self::new(reads, &[])
    }

    pub fn reads(&self) -> &[String] {
        &self.reads
    }

    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    pub fn allows_read(&self, key: &str) -> bool {
        self.reads.iter().any(|k| k == key)
    }

    pub fn allows_write(&self, key: &str) -> bool {
        self.writes.iter().any(|k| k == key)
    }

    /// Merge two contracts (used by composite drivers to advertise the union
    /// of their sub-stages' access).
    pub fn union(&self, other: &StateAccess) -> StateAccess {
        let mut merged = self.clone();
        for key in &other.reads {
            if !merged.allows_read(key) {
                merged.reads.push(key.clone());
            }
        }
        for key in &other.writes {
            if !merged.allows_write(key) {
                merged.writes.push(key.clone());
            }
        }
        merged
    }
}

/// The view of [`SessionState`] a single stage invocation receives.
///
/// Every access is checked against the stage's declared [`StateAccess`];
/// violations surface as [`StateError`] naming the stage and the key.
pub struct ScopedState {
    state: SessionState,
    access: StateAccess,
    stage: String,
}

impl ScopedState {
    pub fn new(state: SessionState, stage: impl Into<String>, access: StateAccess) -> Self {
        Self {
            state,
            access,
            stage: stage.into(),
        }
    }

    pub async fn read(&self, key: &str) -> Result<Option<Value>, StateError> {
        if !self.access.allows_read(key) {
            return Err(StateError::UndeclaredRead {
                stage: self.stage.clone(),
                key: key.to_string(),
            });
        }
        Ok(self.state.get(key).await)
    }

    pub async fn read_string(&self, key: &str) -> Result<Option<String>, StateError> {
        Ok(match self.read(key).await? {
            Some(Value::String(s)) => Some(s),
            _ => None,
        })
    }

    pub async fn write(&self, key: &str, value: Value) -> Result<(), StateError> {
        if !self.access.allows_write(key) {
            return Err(StateError::UndeclaredWrite {
                stage: self.stage.clone(),
                key: key.to_string(),
            });
        }
        self.state.set(key, value).await;
        Ok(())
    }

    /// Snapshot of the declared read keys that are currently present, in
    /// declaration order. This is what gets rendered into an LLM stage's
    /// context block.
    pub async fn read_declared(&self) -> Vec<(String, Value)> {
        let mut pairs = Vec::new();
        for key in self.access.reads() {
            if let Some(value) = self.state.get(key).await {
                pairs.push((key.clone(), value));
            }
        }
        pairs
    }
}
