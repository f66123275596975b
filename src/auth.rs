//! Explicit auth context shared by the API client and whoever logs the user in.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

/// Bearer token holder. Cloning shares the same underlying slot.
///
/// The token is stored bare; a `Bearer ` prefix on input is stripped.
#[derive(Clone, Default)]
pub struct AuthContext {
    token: Arc<RwLock<Option<String>>>,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext").field("authenticated", &self.is_authenticated()).finish()
    }
}

fn normalize(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let bare = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    (!bare.is_empty()).then(|| bare.to_string())
}

impl AuthContext {
    pub fn new() -> Self { Self::default() }

    pub fn with_token(token: impl AsRef<str>) -> Self {
        let ctx = Self::new();
        ctx.set_token(token);
        ctx
    }

    pub fn token(&self) -> Option<String> { self.token.read().unwrap_or_else(PoisonError::into_inner).clone() }
    pub fn is_authenticated(&self) -> bool { self.token().is_some() }
    pub fn bearer(&self) -> Option<String> { self.token().map(|t| format!("Bearer {t}")) }

    pub fn set_token(&self, token: impl AsRef<str>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = normalize(token.as_ref());
    }

    pub fn clear(&self) { *self.token.write().unwrap_or_else(PoisonError::into_inner) = None; }

    /// Applies the backend's token rules to a response:
    /// a returned `Authorization` header replaces the token, and a 401 outside
    /// `/auth/` endpoints drops it. A 401 on `/auth/` endpoints keeps it.
    pub(crate) fn observe(&self, path: &str, status: u16, authorization: Option<&str>) {
        if let Some(fresh) = authorization.and_then(normalize) {
            *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(fresh);
            info!(path, "token refreshed from response");
        }
        if status == 401 {
            if path.contains("/auth/") {
                warn!(path, "401 on auth endpoint, keeping token");
            } else {
                warn!(path, "401 unauthorized, clearing token");
                self.clear();
            }
        }
    }
}
