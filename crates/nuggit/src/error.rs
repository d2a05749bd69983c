//! Error types for plan construction and execution.

/// Errors raised while building actions or validating plans.
///
/// Runtime shape mismatches never surface here: actions log and yield
/// null instead, so a single bad node cannot abort a pass.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum NuggitError {
    #[error("action {action}: missing required field `{field}`")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    #[error("action is missing its tag")]
    MissingTag,

    #[error("unknown action tag: {0}")]
    UnknownAction(String),

    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("node {0} is not part of the document")]
    DetachedNode(String),

    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}

pub type NuggitResult<T> = Result<T, NuggitError>;
