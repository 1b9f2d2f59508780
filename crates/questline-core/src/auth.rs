//! Signed-in user capability.
//!
//! Authentication itself happens outside this crate. Components only ask
//! "who is the signed-in user, if any" through [`AuthProvider`], so the
//! embedding layer can plug in whatever identity source it has.

use std::sync::Arc;

use crate::error::CoreError;

/// Identity of the signed-in user as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: String,
    pub display_name: Option<String>,
}

/// Capability trait answering whether a user is signed in.
pub trait AuthProvider: Send + Sync {
    /// Currently signed-in user, if any.
    fn current_user(&self) -> Option<UserIdentity>;
}

/// Auth provider with a fixed identity, for embeddings that manage
/// sign-in state themselves and for tests.
pub struct FixedAuth {
    user: Option<UserIdentity>,
}

impl FixedAuth {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user: Some(UserIdentity {
                user_id: user_id.into(),
                display_name: None,
            }),
        }
    }

    pub fn signed_in_as(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user: Some(UserIdentity {
                user_id: user_id.into(),
                display_name: Some(display_name.into()),
            }),
        }
    }

    pub fn signed_out() -> Self {
        Self { user: None }
    }
}

impl AuthProvider for FixedAuth {
    fn current_user(&self) -> Option<UserIdentity> {
        self.user.clone()
    }
}

pub(crate) fn require_user(auth: &Arc<dyn AuthProvider>) -> Result<UserIdentity, CoreError> {
    auth.current_user().ok_or(CoreError::Unauthorized)
}
