//! Access control for joining and creating documents.
//!
//! The curator consults an [`Authenticator`] once per join or create and
//! compares the returned [`AccessLevel`] against the level the operation
//! requires. Everything past the join (submitting transforms, presence)
//! is governed by the subscription the join produced, not re-checked.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::DocumentId;

mod open;
mod token;

pub use open::OpenAuthenticator;
pub use token::{TokenAuthenticator, TokenGrant};

/// What a client is allowed to do, ordered from nothing to everything.
///
/// Each operation requires a minimum level: reading a document requires
/// `Read`, joining one for editing requires `Edit`, and creating a new
/// document requires `Create`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// No access at all.
    #[default]
    None,
    /// May subscribe read-only.
    Read,
    /// May subscribe and submit transforms.
    Edit,
    /// May create new documents.
    Create,
}

/// Maps a client's credentials to an access level.
///
/// `document` is `None` for a pre-document create call, where no id
/// exists yet to authorize against.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        user_id: &str,
        token: &str,
        document: Option<&DocumentId>,
    ) -> AccessLevel;
}
