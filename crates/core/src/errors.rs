use thiserror::Error;

/// Failures surfaced to the dispatcher loop boundary. Each variant names the
/// layer that failed so per-post log lines stay diagnosable.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("platform call failure: {0}")]
    PlatformCall(String),
}
