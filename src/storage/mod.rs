use crate::domain::session::{Credentials, Session};
use crate::domain::user::UserProfile;
use crate::error::ClientError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod file;
pub mod memory;
pub mod redis;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Session storage encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Session storage backend failed: {0}")]
    Backend(#[from] ::redis::RedisError),
}

impl From<StoreError> for ClientError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "Credential store failure");
        Self::unknown(format!("Could not access the saved session: {e}"))
    }
}

/// String-valued key/value storage holding the session keys.
///
/// Every call must be atomic with respect to every other call on the same store:
/// a `get_many` never observes half of a `set_many`.
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Reads the given keys in one snapshot. Absent keys are omitted from the map.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError>;

    /// # Errors
    /// Returns an error if the backend cannot be written.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError>;

    /// # Errors
    /// Returns an error if the backend cannot be written.
    async fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError>;

    /// Removes `keys` only while `guard_key` holds `expected`, where `None`
    /// means the key is absent. Compare and remove are one atomic step.
    /// Returns whether the keys were removed.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read or written.
    async fn remove_if(&self, guard_key: &str, expected: Option<&str>, keys: &[&str]) -> Result<bool, StoreError>;
}

/// Single source of truth for whether a user is signed in, and as whom.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Returns the current session, or `None` when signed out.
    ///
    /// A half-written or unparseable session is cleared and reported as absent.
    ///
    /// # Errors
    /// Returns an error only if the backend itself fails.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get(&self) -> Result<Option<Session>, StoreError> {
        let mut values = self.backend.get_many(&SESSION_KEYS).await?;

        let (access_token, raw_user) = match (values.remove(ACCESS_TOKEN_KEY), values.remove(USER_KEY)) {
            (Some(token), Some(user)) if !token.is_empty() => (token, user),
            (None, None) if !values.contains_key(REFRESH_TOKEN_KEY) => return Ok(None),
            _ => {
                tracing::warn!("Incomplete session in storage, clearing");
                self.clear().await?;
                return Ok(None);
            }
        };

        match serde_json::from_str::<UserProfile>(&raw_user) {
            Ok(user) => Ok(Some(Session { access_token, user })),
            Err(e) => {
                tracing::warn!(error = %e, "Stored user is not valid JSON, clearing session");
                self.clear().await?;
                Ok(None)
            }
        }
    }

    /// Both tokens, when a complete session is stored.
    ///
    /// # Errors
    /// Returns an error only if the backend itself fails.
    pub async fn credentials(&self) -> Result<Option<Credentials>, StoreError> {
        let mut values = self.backend.get_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY]).await?;
        Ok(values
            .remove(ACCESS_TOKEN_KEY)
            .zip(values.remove(REFRESH_TOKEN_KEY))
            .map(|(access, refresh)| Credentials::new(access, refresh)))
    }

    /// Writes the tokens and the profile in one operation.
    ///
    /// # Errors
    /// Returns an error if the profile cannot be encoded or the backend fails.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn set(&self, credentials: &Credentials, user: &UserProfile) -> Result<(), StoreError> {
        let user = serde_json::to_string(user)?;
        self.backend
            .set_many(&[
                (ACCESS_TOKEN_KEY, credentials.access_token.clone()),
                (REFRESH_TOKEN_KEY, credentials.refresh_token.clone()),
                (USER_KEY, user),
            ])
            .await
    }

    /// Replaces the cached profile with a fresher copy.
    ///
    /// # Errors
    /// Returns an error if the profile cannot be encoded or the backend fails.
    pub async fn update_user(&self, user: &UserProfile) -> Result<(), StoreError> {
        let user = serde_json::to_string(user)?;
        self.backend.set_many(&[(USER_KEY, user)]).await
    }

    /// # Errors
    /// Returns an error if the backend fails.
    pub async fn update_tokens(&self, credentials: &Credentials) -> Result<(), StoreError> {
        self.backend
            .set_many(&[
                (ACCESS_TOKEN_KEY, credentials.access_token.clone()),
                (REFRESH_TOKEN_KEY, credentials.refresh_token.clone()),
            ])
            .await
    }

    /// # Errors
    /// Returns an error if the backend fails.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.backend.remove_many(&SESSION_KEYS).await
    }

    /// Clears the session only if it is still the one `access_token` belongs to.
    ///
    /// A rejection that answers an older token must not end a session written
    /// since. `None` matches a store with no access token. Returns whether the
    /// store now reflects the rejection.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn clear_if_token(&self, access_token: Option<&str>) -> Result<bool, StoreError> {
        self.backend.remove_if(ACCESS_TOKEN_KEY, access_token, &SESSION_KEYS).await
    }
}
