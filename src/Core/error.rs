// Error taxonomy shared by the managed side and the native runtime boundary.

use crate::Msg::Structs::MsgKind;
use thiserror::Error;

/// Every failure the bridge can surface. None of these are retried; each is
/// either a caller-contract violation or an authoritative runtime failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Bad name, size, field or property argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The buffer already has an outstanding exclusive lock.
    #[error("buffer is already locked")]
    AlreadyLocked,

    /// Unlock requested while no lock is outstanding.
    #[error("buffer is not locked")]
    NotLocked,

    /// Unlock presented a token from a different lock acquisition.
    #[error("lock token does not match the outstanding lock")]
    TokenMismatch,

    /// A message with a locked buffer was handed to the boundary.
    #[error("message buffer is still locked, unlock it before crossing the boundary")]
    LockedAtBoundary,

    /// A command result arrived after the final result of its stream.
    #[error("result for cmd {cmd_id} arrived after its final result")]
    LateResult { cmd_id: u64 },

    /// No constructor registered for this kind.
    #[error("no constructor registered for message kind {0}")]
    UnknownKind(MsgKind),

    /// A constructor for this kind was registered twice.
    #[error("message kind {0} registered twice")]
    DuplicateRegistration(MsgKind),

    /// Opaque failure reported by the native runtime.
    #[error("native runtime failure: {0}")]
    CrossBoundaryFailure(String),
}

impl BridgeError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        BridgeError::InvalidArgument(msg.into())
    }

    pub fn native(msg: impl Into<String>) -> Self {
        BridgeError::CrossBoundaryFailure(msg.into())
    }

    /// Registry misuse means the process was packaged or initialized wrong.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::UnknownKind(_) | BridgeError::DuplicateRegistration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
