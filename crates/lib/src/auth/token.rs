//! Token-register authenticator.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use super::{AccessLevel, Authenticator};
use crate::document::DocumentId;

/// What a registered token is good for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// Level granted when the token matches.
    pub level: AccessLevel,
    /// Restrict the grant to one document; `None` grants for any
    /// document, including pre-document create calls.
    pub document: Option<DocumentId>,
}

/// Grants access only to explicitly registered tokens.
///
/// Tokens are registered out of band (an admin endpoint, a share link
/// generator) and can be revoked at any time. Unknown tokens get
/// [`AccessLevel::None`].
#[derive(Debug, Default)]
pub struct TokenAuthenticator {
    grants: RwLock<HashMap<String, TokenGrant>>,
}

impl TokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token`, replacing any previous grant for it.
    pub fn register(&self, token: impl Into<String>, grant: TokenGrant) {
        let token = token.into();
        debug!(level = ?grant.level, document = ?grant.document, "registered token");
        self.grants.write().unwrap().insert(token, grant);
    }

    /// Revoke `token`. Returns the grant it carried, if any.
    pub fn revoke(&self, token: &str) -> Option<TokenGrant> {
        self.grants.write().unwrap().remove(token)
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(
        &self,
        _user_id: &str,
        token: &str,
        document: Option<&DocumentId>,
    ) -> AccessLevel {
        let grants = self.grants.read().unwrap();
        match grants.get(token) {
            Some(grant) => match (&grant.document, document) {
                // Unscoped tokens work everywhere, scoped tokens only on
                // their own document.
                (None, _) => grant.level,
                (Some(scope), Some(requested)) if scope == requested => grant.level,
                _ => AccessLevel::None,
            },
            None => AccessLevel::None,
        }
    }
}
