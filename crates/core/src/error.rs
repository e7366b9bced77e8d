//! Error types for the newsloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all newsloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Shared-state contract errors ---
    #[error("State error: {0}")]
    State(#[from] StateError),

    // --- Stage errors ---
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Orchestrator input validation ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Violations of a stage's declared read/write contract on shared state.
#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("stage '{stage}' read key '{key}' without declaring it")]
    UndeclaredRead { stage: String, key: String },

    #[error("stage '{stage}' wrote key '{key}' without declaring it")]
    UndeclaredWrite { stage: String, key: String },
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("state contract violation: {0}")]
    State(#[from] StateError),

    #[error("provider call failed in stage '{stage}': {source}")]
    Provider {
        stage: String,
        #[source]
        source: ProviderError,
    },
}
