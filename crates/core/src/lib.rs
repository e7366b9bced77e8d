//! # Newsloom Core
//!
//! Domain types, traits, and error definitions for the newsloom digest
//! pipeline. This crate has **zero framework dependencies**; it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Running the whole pipeline against deterministic fakes in tests
//! - Swapping the model backend without touching stage logic
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod stage;
pub mod state;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{EventBus, PipelineEvent};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use stage::{Stage, StageSignal};
pub use state::{ScopedState, SessionState, StateAccess};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
