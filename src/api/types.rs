//! Shared types for the HTTP layer.

use std::sync::Arc;

use crate::core_state::{CoreState, Session};

/// Shared context for all routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Authenticated caller, injected into request extensions by the auth
/// middleware.
#[derive(Clone)]
pub struct AuthContext {
    /// The bearer token as presented, kept so sign-out can drop it.
    pub token: String,
    pub session: Session,
}

impl AuthContext {
    pub fn user_id(&self) -> &str {
        &self.session.user.id
    }
}
