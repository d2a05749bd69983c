//! Error types for the page agent.

use nuggit::NuggitError;

/// All errors that can occur at the agent boundary.
///
/// None of these escape a page session: the session logs them and degrades
/// to doing nothing for that page.
#[derive(thiserror::Error, Debug)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend responded {status}: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Status { status: u16, reason: Option<String> },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine error: {0}")]
    Engine(#[from] NuggitError),

    #[error("config error: {0}")]
    Config(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
