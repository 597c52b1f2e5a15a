//! Error types for the Lumeo domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; all of them fold into
//! [`Error`], which is what a failed turn surfaces to the caller.

use thiserror::Error;

/// The top-level error type for all Lumeo operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model service ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Search tool ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- History trimming ---
    #[error("Trim error: {0}")]
    Trim(#[from] TrimError),

    // --- Checkpoint storage ---
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// A workflow contract was violated (empty state, busy thread,
    /// orphaned tool result).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Search provider {provider} failed: {reason}")]
    SearchFailed { provider: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrimError {
    /// The newest message that must be kept does not fit on its own.
    #[error("Message requires {required} tokens but the budget is {budget}")]
    BudgetExceeded { required: usize, budget: usize },

    /// No suffix of the history starts on a user message and ends on a
    /// user or tool message.
    #[error("No trim window starts on a user message and ends on a user or tool message")]
    NoValidWindow,
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted checkpoint for thread {thread_id}: {reason}")]
    Corrupted { thread_id: String, reason: String },
}
