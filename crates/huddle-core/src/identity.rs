//! Identity provider contract.
//!
//! The chat core never reads session state from a global. Components receive
//! the viewer's [`UserId`] explicitly, and only the client facade asks an
//! [`IdentityProvider`] for it, so every component can be tested with a fake
//! identity.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::{ids::UserId, model::User};

/// Errors from the identity provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Another account already uses this email.
    #[error("email already in use: {0}")]
    EmailInUse(String),

    /// Password rejected by the provider's policy.
    #[error("password too weak: {0}")]
    WeakPassword(String),

    /// Operation requires a signed-in user.
    #[error("not signed in")]
    NotSignedIn,

    /// Provider could not be reached. Transient.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    /// Returns true if the operation may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Profile captured at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpProfile {
    /// Display name.
    pub username: String,
    /// Profile image reference.
    pub profile_image_ref: String,
}

/// Authentication and session service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Currently signed-in user, if any.
    fn current_identity(&self) -> Option<UserId>;

    /// Receiver that observes sign-in and sign-out.
    ///
    /// The current value is available immediately via `borrow()`;
    /// `changed()` resolves on the next transition.
    fn watch_identity(&self) -> watch::Receiver<Option<UserId>>;

    /// Sign in with email and password.
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, AuthError>;

    /// Register a new account, persist its profile at `users/{userId}`, and
    /// sign it in.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: SignUpProfile,
    ) -> Result<User, AuthError>;

    /// End the current session. Signing out while signed out is a no-op.
    async fn sign_out(&self) -> Result<(), AuthError>;
}
