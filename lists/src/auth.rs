//! Session context read from the secure credential store.

use crate::error::CredentialError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// Keys under which the session is persisted.
pub mod keys {
    /// Signed-in user id.
    pub const USER_ID: &str = "userId";
    /// Role of the user.
    pub const ROLE: &str = "role";
    /// Store the user works in.
    pub const STORE: &str = "store";
    /// Bearer token.
    pub const LOGIN_TOKEN: &str = "loginToken";
}

/// The signed-in session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Signed-in user id.
    pub user_id: String,
    /// Role of the user.
    pub role: Option<String>,
    /// Store scoping every list request.
    pub store: Option<String>,
    /// Bearer token.
    pub login_token: String,
}

impl AuthContext {
    /// Session for `user_id` authenticated by `login_token`.
    #[must_use]
    pub fn new(user_id: impl Into<String>, login_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: None,
            store: None,
            login_token: login_token.into(),
        }
    }

    /// Set the role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the store.
    #[must_use]
    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .field("store", &self.store)
            .field("login_token", &"<redacted>")
            .finish()
    }
}

/// Key-value secure storage.
///
/// Implementations: platform keychains in the app, [`EnvCredentialStore`]
/// for the command line and `MemoryCredentialStore` for tests.
pub trait CredentialStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be read.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, CredentialError>> + Send;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), CredentialError>> + Send;
}

/// Load the session, or `None` when the user is not signed in.
///
/// The session exists only when both the user id and the token are present
/// and non-empty.
///
/// # Errors
///
/// Returns error if the store cannot be read.
pub async fn load_auth_context<C: CredentialStore>(
    store: &C,
) -> Result<Option<AuthContext>, CredentialError> {
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    let Some(user_id) = non_empty(store.get(keys::USER_ID).await?) else {
        return Ok(None);
    };
    let Some(login_token) = non_empty(store.get(keys::LOGIN_TOKEN).await?) else {
        return Ok(None);
    };

    Ok(Some(AuthContext {
        user_id,
        role: non_empty(store.get(keys::ROLE).await?),
        store: non_empty(store.get(keys::STORE).await?),
        login_token,
    }))
}

/// Persist a session.
///
/// # Errors
///
/// Returns error if the store cannot be written.
pub async fn save_auth_context<C: CredentialStore>(
    store: &C,
    context: &AuthContext,
) -> Result<(), CredentialError> {
    store.set(keys::USER_ID, &context.user_id).await?;
    store.set(keys::LOGIN_TOKEN, &context.login_token).await?;
    if let Some(role) = &context.role {
        store.set(keys::ROLE, role).await?;
    }
    if let Some(shop) = &context.store {
        store.set(keys::STORE, shop).await?;
    }
    Ok(())
}

/// Read-only store backed by `STOREFRONT_*` environment variables.
///
/// `userId` is read from `STOREFRONT_USER_ID`, `loginToken` from
/// `STOREFRONT_LOGIN_TOKEN`, and so on.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialStore;

impl EnvCredentialStore {
    /// Environment variable for a credential key.
    #[must_use]
    pub fn variable(key: &str) -> String {
        let mut name = String::from("STOREFRONT_");
        for c in key.chars() {
            if c.is_ascii_uppercase() {
                name.push('_');
            }
            name.push(c.to_ascii_uppercase());
        }
        name
    }
}

impl CredentialStore for EnvCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        match std::env::var(Self::variable(key)) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(CredentialError::Unavailable(e.to_string())),
        }
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), CredentialError> {
        Err(CredentialError::ReadOnly)
    }
}
