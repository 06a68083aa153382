use crate::api::{ApiClient, ApiRequest, decode};
use crate::domain::route::LandingRoute;
use crate::error::{ErrorKind, Result};
use crate::storage::CredentialStore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Executes requests with the stored access token and applies the sign-out
/// reaction to authentication failures in one place.
///
/// When the backend rejects the credentials, the store is cleared and
/// [`LandingRoute::SignIn`] is published to every [`redirects`](Self::redirects)
/// subscriber before the error is returned. A rejection of a token that has
/// since been replaced in the store leaves the newer session alone.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    api: ApiClient,
    store: CredentialStore,
    redirect_tx: watch::Sender<Option<LandingRoute>>,
}

impl AuthenticatedClient {
    #[must_use]
    pub fn new(api: ApiClient, store: CredentialStore) -> Self {
        let (redirect_tx, _) = watch::channel(None);
        Self { api, store, redirect_tx }
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub const fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// The latest forced navigation, `None` until one happens.
    #[must_use]
    pub fn redirects(&self) -> watch::Receiver<Option<LandingRoute>> {
        self.redirect_tx.subscribe()
    }

    /// # Errors
    /// Returns the executor's error. Authentication errors also end the session.
    pub async fn execute(&self, request: ApiRequest) -> Result<Option<Value>> {
        let token = self.access_token().await?;
        let result = self.api.execute(request, token.as_deref()).await;
        self.react(result, token.as_deref()).await
    }

    /// # Errors
    /// Returns the executor's error. Authentication errors also end the session.
    pub async fn execute_with_cancel(&self, request: ApiRequest, cancel: &CancellationToken) -> Result<Option<Value>> {
        let token = self.access_token().await?;
        let result = self.api.execute_with_cancel(request, token.as_deref(), cancel).await;
        self.react(result, token.as_deref()).await
    }

    /// # Errors
    /// As [`execute`](Self::execute), plus an unknown-kind error when the body does not match `T`.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let token = self.access_token().await?;
        let result = self.api.execute_json::<Value>(request, token.as_deref()).await;
        self.react(result, token.as_deref()).await.and_then(decode)
    }

    async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.store.credentials().await?.map(|credentials| credentials.access_token))
    }

    /// Applies the sign-out reaction if `result` is an authentication failure
    /// of the request that carried `sent_token`.
    pub(crate) async fn react<T>(&self, result: Result<T>, sent_token: Option<&str>) -> Result<T> {
        if let Err(e) = &result
            && e.kind() == ErrorKind::Authentication
        {
            match self.store.clear_if_token(sent_token).await {
                Ok(true) => {
                    tracing::info!(status = ?e.status(), "Credentials rejected, ending session");
                    self.redirect_tx.send_replace(Some(LandingRoute::SignIn));
                }
                Ok(false) => {
                    tracing::debug!(status = ?e.status(), "Rejected token was already replaced, keeping current session");
                }
                Err(clear_err) => tracing::error!(error = %clear_err, "Failed to clear rejected session"),
            }
        }
        result
    }
}
