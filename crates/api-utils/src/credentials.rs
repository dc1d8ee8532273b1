use std::sync::RwLock;

use crate::MaybeSendSync;

/// Source of the bearer credential attached to every backend call.
///
/// The dashboard keeps its session token in durable client storage, so
/// senders consult this seam at call time instead of holding a token
/// captured at construction. A token refreshed by the host is picked up
/// by the very next request.
pub trait CredentialStore: MaybeSendSync {
    /// Current access token, if a session exists.
    fn access_token(&self) -> Option<String>;
}

/// In-memory credential store.
///
/// Used by tests and by native embedders that manage the session
/// themselves.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    /// Create a store holding `token`.
    pub fn new(token: impl ToString) -> Self {
        Self {
            token: RwLock::new(Some(token.to_string())),
        }
    }

    /// Create an empty store.
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// Replace the stored token.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap() = token;
    }
}

impl CredentialStore for StaticCredentials {
    fn access_token(&self) -> Option<String> {
        self.token.read().unwrap().clone()
    }
}
