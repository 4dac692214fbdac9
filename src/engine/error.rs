use thiserror::Error;

/// Boundary validation failures. "Nothing bookable" is never an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("malformed time {0:?}, expected HH:mm")]
    MalformedTime(String),
    #[error("chain has no services")]
    EmptyChain,
    #[error("unknown service: {0}")]
    UnknownService(String),
    #[error("service is disabled: {0}")]
    ServiceDisabled(String),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
}
