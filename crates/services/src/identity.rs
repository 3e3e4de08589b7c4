use std::sync::{Arc, PoisonError, RwLock};

use exam_core::model::UserId;

/// Source of the signed-in user, queried at submission time.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

/// Identity held in memory; clones share the same sign-in state.
#[derive(Debug, Clone, Default)]
pub struct SessionIdentity {
    user: Arc<RwLock<Option<UserId>>>,
}

impl SessionIdentity {
    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        Self {
            user: Arc::new(RwLock::new(Some(user))),
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user: UserId) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    pub fn sign_out(&self) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<UserId> {
        *self.user.read().unwrap_or_else(PoisonError::into_inner)
    }
}
