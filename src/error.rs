use thiserror::Error;

/// Why a request could not be served. Every variant reaches the wire as the
/// same generic error status; the distinction only shows up in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("workspace scope '{0}' does not match the open session")]
    UnauthorizedScope(String),
    #[error("not handled: {0}")]
    Unhandled(String),
    #[error("malformed: {0}")]
    Malformed(String),
    #[error("no session is open")]
    NoSession,
}
