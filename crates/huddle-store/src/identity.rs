//! In-memory identity provider.
//!
//! Email/password accounts kept in a map, session state published on a
//! `watch` channel. Registration writes the user profile to the shared store
//! exactly like a real backend would, so directory queries see new users.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use huddle_core::{
    AuthError, Environment, IdentityProvider, SignUpProfile, User, UserId,
    store::{CollectionPath, DocumentStore, StoreError, encode},
};
use tokio::sync::watch;
use tracing::{debug, info};

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Length of generated account ids.
const USER_ID_LEN: usize = 28;

struct Account {
    password: String,
    user_id: UserId,
}

/// Identity provider backed by process memory.
///
/// Clones share accounts and session state. Each clone models the same
/// device; use separate instances for separate devices.
#[derive(Clone)]
pub struct MemoryIdentity<S: DocumentStore, E: Environment> {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
    session: Arc<watch::Sender<Option<UserId>>>,
    store: S,
    users: CollectionPath,
    env: E,
}

impl<S: DocumentStore, E: Environment> MemoryIdentity<S, E> {
    /// Provider writing profiles to `users` in `store`.
    pub fn new(store: S, env: E) -> Self {
        Self::with_users_collection(store, env, CollectionPath::root("users"))
    }

    /// Provider writing profiles to a custom collection.
    pub fn with_users_collection(store: S, env: E, users: CollectionPath) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts: Arc::new(Mutex::new(HashMap::new())),
            session: Arc::new(session),
            store,
            users,
            env,
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. Acceptable for test code.
    #[allow(clippy::expect_used)]
    fn accounts(&self) -> MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().expect("Mutex poisoned")
    }

    /// Share another provider's accounts (same backend, different device)
    /// while keeping an independent session.
    pub fn another_device(&self) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts: Arc::clone(&self.accounts),
            session: Arc::new(session),
            store: self.store.clone(),
            users: self.users.clone(),
            env: self.env.clone(),
        }
    }
}

fn store_failure(err: StoreError) -> AuthError {
    match err {
        StoreError::Unavailable(reason) => AuthError::Unavailable(reason),
        other => AuthError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl<S: DocumentStore, E: Environment> IdentityProvider for MemoryIdentity<S, E> {
    fn current_identity(&self) -> Option<UserId> {
        self.session.borrow().clone()
    }

    fn watch_identity(&self) -> watch::Receiver<Option<UserId>> {
        self.session.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let user_id = {
            let accounts = self.accounts();
            let account = accounts.get(email).ok_or(AuthError::InvalidCredentials)?;
            if account.password != password {
                return Err(AuthError::InvalidCredentials);
            }
            account.user_id.clone()
        };

        self.session.send_replace(Some(user_id.clone()));
        debug!(user_id = %user_id, "signed in");
        Ok(user_id)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: SignUpProfile,
    ) -> Result<User, AuthError> {
        if !email.contains('@') {
            return Err(AuthError::InvalidCredentials);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword(format!(
                "at least {MIN_PASSWORD_LEN} characters required"
            )));
        }
        if self.accounts().contains_key(email) {
            return Err(AuthError::EmailInUse(email.to_string()));
        }

        let user_id = UserId::new(self.env.random_token(USER_ID_LEN))
            .map_err(|err| AuthError::Unavailable(err.to_string()))?;
        let user = User {
            user_id: user_id.clone(),
            username: profile.username,
            profile_image_ref: profile.profile_image_ref,
        };

        let fields = encode(&user).map_err(store_failure)?;
        self.store
            .set_document(&self.users, user_id.as_str(), fields)
            .await
            .map_err(store_failure)?;

        {
            // Re-check: another registration may have completed while the
            // profile write was in flight.
            let mut accounts = self.accounts();
            if accounts.contains_key(email) {
                return Err(AuthError::EmailInUse(email.to_string()));
            }
            accounts.insert(
                email.to_string(),
                Account { password: password.to_string(), user_id: user_id.clone() },
            );
        }

        self.session.send_replace(Some(user_id.clone()));
        info!(user_id = %user_id, username = %user.username, "registered");
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(user_id) = self.session.send_replace(None) {
            debug!(user_id = %user_id, "signed out");
        }
        Ok(())
    }
}
