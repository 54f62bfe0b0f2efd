//! The allow-everyone authenticator.

use async_trait::async_trait;

use super::{AccessLevel, Authenticator};
use crate::document::DocumentId;

/// Grants every caller the same configured ceiling, ignoring credentials.
///
/// This is the "no authentication" deployment mode: a ceiling of
/// [`AccessLevel::Create`] makes the server fully open, while
/// [`AccessLevel::Read`] turns it into a public viewer.
#[derive(Debug, Clone, Copy)]
pub struct OpenAuthenticator {
    ceiling: AccessLevel,
}

impl OpenAuthenticator {
    pub fn new(ceiling: AccessLevel) -> Self {
        Self { ceiling }
    }

    /// Everyone may create, edit, and read.
    pub fn allow_all() -> Self {
        Self::new(AccessLevel::Create)
    }
}

#[async_trait]
impl Authenticator for OpenAuthenticator {
    async fn authenticate(
        &self,
        _user_id: &str,
        _token: &str,
        _document: Option<&DocumentId>,
    ) -> AccessLevel {
        self.ceiling
    }
}
