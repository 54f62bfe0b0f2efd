//!
//! Folio: a collaborative text-editing engine built on operational
//! transformation.
//!
//! Many clients edit a shared text document concurrently by exchanging
//! small edit operations. Each document has one canonical server-side
//! history; submitted operations are rewritten against whatever was
//! accepted concurrently so every client converges on the same text.
//!
//! ## Core concepts
//!
//! * **Transforms (`transform::Transform`)**: the unit of change: a
//!   position, a deletion count, an insertion string, and the version the
//!   edit produces when applied.
//! * **OT engine (`ot`)**: pure functions that apply a transform to text
//!   and rewrite a pending transform against an already-applied one.
//! * **Documents (`document::Document`)**: an opaque server-assigned id
//!   plus the current text.
//! * **Stores (`store::Store`)**: a pluggable persistence layer for
//!   documents.
//! * **Binders (`binder`)**: one task per open document. The binder owns
//!   the content and version counter, serializes transforms from all
//!   subscribed clients, and fans accepted transforms back out.
//! * **Curator (`curator::Curator`)**: creates and locates binders on
//!   demand, enforces access control at join time, and retires binders
//!   that go idle or fail.

pub mod auth;
pub mod binder;
pub mod config;
pub mod curator;
pub mod document;
pub mod ot;
pub mod store;
pub mod transform;

/// Re-exports for the common joining path.
pub use binder::Subscription;
pub use curator::Curator;

/// Result type used throughout the Folio library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Folio library.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Structured transform validation errors from the OT engine
    #[error(transparent)]
    Ot(#[from] ot::OtError),

    /// Structured persistence errors from the store module
    #[error(transparent)]
    Store(#[from] store::StoreError),

    /// Structured errors from a binder's command loop
    #[error(transparent)]
    Binder(#[from] binder::BinderError),

    /// Structured registry and access-control errors from the curator
    #[error(transparent)]
    Curator(#[from] curator::CuratorError),
}

impl Error {
    /// Check if this error indicates a rejected join or create.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Error::Curator(curator::CuratorError::Unauthorized { .. })
        )
    }

    /// Check if this error indicates a missing document or binder.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Store(err) => err.is_not_found(),
            Error::Curator(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates a write on a read-only session.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Error::Binder(binder::BinderError::ReadOnlySession))
    }

    /// Check if this error indicates a malformed or out-of-bounds transform.
    pub fn is_invalid_transform(&self) -> bool {
        matches!(self, Error::Ot(ot::OtError::InvalidTransform { .. }))
    }

    /// Check if this error means the submitter must resync from a snapshot.
    pub fn is_version_too_old(&self) -> bool {
        matches!(self, Error::Binder(binder::BinderError::VersionTooOld { .. }))
    }

    /// Check if this error means the submitter claimed a future version.
    pub fn is_version_ahead(&self) -> bool {
        matches!(self, Error::Binder(binder::BinderError::VersionAhead { .. }))
    }

    /// Check if this error indicates a deadline expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Binder(binder::BinderError::Timeout))
    }

    /// Check if this error indicates the target binder is draining.
    pub fn is_closing(&self) -> bool {
        match self {
            Error::Binder(err) => err.is_closing(),
            Error::Curator(err) => matches!(err, curator::CuratorError::Closed),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        matches!(self, Error::Store(store::StoreError::Io { .. }))
    }
}
