use pedal_protocol::{ErrorCode, StateError};
use thiserror::Error;

/// Failure of a request sent to the engine. Never leaves local state half-applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("engine rejected request ({code:?}): {msg}")]
    Engine { code: ErrorCode, msg: String },
    #[error("not connected to the engine")]
    Disconnected,
    #[error("engine did not answer in time")]
    Timeout,
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
