use thiserror::Error;

use super::phase::SessionPhase;

/// Rejected state-store operations.
///
/// Only the session controller drives the store, so these indicate a
/// contract violation on the caller's side rather than a user-facing failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },

    #[error("output paths can only be assigned while preparing (phase: {0})")]
    NotPreparing(SessionPhase),

    #[error("output paths already assigned for this session")]
    OutputPathsAlreadyAssigned,
}

/// Errors raised by the per-track writers and the writer coordinator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriterError {
    #[error("cannot create writer: {0}")]
    CannotCreate(String),

    #[error("writer failed to start: {0}")]
    StartFailed(String),

    #[error("append failed: {0}")]
    AppendFailed(String),

    #[error("append timed out waiting for the sink")]
    AppendTimedOut,

    #[error("finish failed: {0}")]
    FinishFailed(String),

    #[error("writers not prepared")]
    NotPrepared,

    #[error("writers already prepared")]
    AlreadyPrepared,
}

/// Failures reported by the external capture capability, either
/// synchronously from `configure`/`start` or asynchronously mid-session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("stream configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("stream failed to start: {0}")]
    StartFailed(String),

    #[error("stream interrupted: {0}")]
    Interrupted(String),

    #[error("capture permission revoked")]
    PermissionRevoked,

    #[error("capture source disconnected")]
    SourceDisconnected,

    #[error("writer failure: {0}")]
    Writer(WriterError),

    #[error("unknown stream error: {0}")]
    Unknown(String),
}

/// Command-time errors returned by the session controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("capture not authorized")]
    NotAuthorized,

    #[error("invalid recording options: {0}")]
    InvalidOptions(String),

    #[error("a session is already active")]
    AlreadyActive,

    #[error("failed to prepare writers: {0}")]
    WriterPrepareFailed(WriterError),

    #[error("failed to start capture stream: {0}")]
    StreamStartFailed(StreamError),

    #[error(transparent)]
    InvalidTransition(#[from] StateError),

    #[error("failed to finalize recording: {0}")]
    WriterFinishFailed(WriterError),
}
