//! Error types for the binder module.

use thiserror::Error;

/// Errors that can occur on the client side of a binder boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BinderError {
    /// The session subscribed read-only and tried to write.
    #[error("session is read-only")]
    ReadOnlySession,

    /// The submitted version predates the retained history window; the
    /// client must rejoin for a fresh snapshot.
    #[error("version {submitted} is older than the oldest retained version {oldest}")]
    VersionTooOld { submitted: u64, oldest: u64 },

    /// The submitted version is beyond the next version the document can
    /// produce; the client is confused about server state.
    #[error("version {submitted} is ahead of the document (current version {current})")]
    VersionAhead { submitted: u64, current: u64 },

    /// The command named a session this binder does not know, usually one
    /// that was already dropped or kicked.
    #[error("unknown session")]
    UnknownSession,

    /// The binder is draining and no longer accepts work.
    #[error("binder is closing")]
    Closing,

    /// The binder did not answer within the caller's deadline. The
    /// command may still execute; it is not retracted.
    #[error("binder request timed out")]
    Timeout,
}

impl BinderError {
    /// Check if this error means the binder is gone or going.
    pub fn is_closing(&self) -> bool {
        matches!(self, BinderError::Closing)
    }

    /// Check if this error requires the client to resubscribe.
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            BinderError::VersionTooOld { .. } | BinderError::UnknownSession
        )
    }
}
