use crate::api::schemas::auth::{AuthSession, Login, Refresh, RefreshedTokens, Registered, Registration};
use crate::api::{ApiRequest, routes};
use crate::domain::auth::{LoginForm, SignupForm};
use crate::domain::session::{Credentials, Session};
use crate::domain::user::UserProfile;
use crate::error::{ClientError, Result};
use crate::services::guard::AuthenticatedClient;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::time::Duration;

/// Deadline applied to the sign-in and sign-up calls.
pub const SIGN_IN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct Metrics {
    login_total: Counter<u64>,
    signup_total: Counter<u64>,
    logout_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("mission-client");
        Self {
            login_total: meter.u64_counter("auth_login_total").with_description("Sign-in attempts by outcome").build(),
            signup_total: meter.u64_counter("auth_signup_total").with_description("Sign-up attempts by outcome").build(),
            logout_total: meter.u64_counter("auth_logout_total").with_description("Sign-outs").build(),
        }
    }
}

fn outcome<T>(result: &Result<T>) -> KeyValue {
    KeyValue::new("outcome", result.as_ref().map_or_else(|e| e.kind().as_str(), |_| "ok"))
}

/// Account operations: sign-in, sign-up, sign-out, and refreshing what the
/// store holds.
#[derive(Clone)]
pub struct AuthService {
    client: AuthenticatedClient,
    metrics: Metrics,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").field("client", &self.client).finish_non_exhaustive()
    }
}

impl AuthService {
    #[must_use]
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client, metrics: Metrics::new() }
    }

    #[must_use]
    pub const fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    /// Signs in and stores the returned tokens and profile together.
    ///
    /// # Errors
    /// Local validation failures are returned before any request is made.
    #[tracing::instrument(skip_all, fields(user.role = tracing::field::Empty), err(level = "warn"))]
    pub async fn login(&self, form: &LoginForm) -> Result<Session> {
        let result = self.login_inner(form).await;
        self.metrics.login_total.add(1, &[outcome(&result)]);
        result
    }

    async fn login_inner(&self, form: &LoginForm) -> Result<Session> {
        form.validate()?;

        let request = ApiRequest::post(routes::LOGIN).serialize(&Login::from(form))?.timeout(SIGN_IN_TIMEOUT).account_lookup();
        // Unauthenticated call: a rejected password must not go through the sign-out reaction.
        let session: AuthSession = self.client.api().execute_json(request, None).await?;

        self.establish(session.tokens.into(), session.user).await
    }

    /// Creates an account. When the backend does not sign the user in as part of
    /// registration, a sign-in with the same credentials follows.
    ///
    /// # Errors
    /// Local validation failures are returned before any request is made.
    #[tracing::instrument(skip_all, fields(user.role = tracing::field::Empty), err(level = "warn"))]
    pub async fn signup(&self, form: &SignupForm) -> Result<Session> {
        let result = self.signup_inner(form).await;
        self.metrics.signup_total.add(1, &[outcome(&result)]);
        result
    }

    async fn signup_inner(&self, form: &SignupForm) -> Result<Session> {
        form.validate()?;

        let request = ApiRequest::post(routes::REGISTER).serialize(&Registration::from(form))?.timeout(SIGN_IN_TIMEOUT);
        let registered: Registered = self.client.api().execute_json(request, None).await?;

        match registered {
            Registered::Session { user, tokens: Some(tokens) } => self.establish(tokens.into(), user).await,
            Registered::Session { tokens: None, .. } | Registered::Profile(_) => {
                tracing::debug!("Registration returned no tokens, signing in");
                self.login_inner(&form.login_form()).await
            }
        }
    }

    async fn establish(&self, credentials: Credentials, user: UserProfile) -> Result<Session> {
        if credentials.access_token.is_empty() {
            return Err(ClientError::unknown("The server returned an empty access token"));
        }

        self.client.store().set(&credentials, &user).await?;
        tracing::Span::current().record("user.role", tracing::field::display(user.role()));
        tracing::info!("Signed in");

        Ok(Session { access_token: credentials.access_token, user })
    }

    /// Ends the session. The backend is told on a best-effort basis; the local
    /// session is cleared whatever it answers.
    ///
    /// # Errors
    /// Returns an error only if the store cannot be cleared.
    #[tracing::instrument(skip_all)]
    pub async fn logout(&self) -> Result<()> {
        if let Some(credentials) = self.client.store().credentials().await? {
            let request = ApiRequest::post(routes::LOGOUT).serialize(&Refresh { refresh: &credentials.refresh_token })?;
            if let Err(e) = self.client.api().execute(request, Some(&credentials.access_token)).await {
                tracing::warn!(kind = %e.kind(), error = %e, "Backend sign-out failed, clearing local session anyway");
            }
        }

        self.client.store().clear().await?;
        self.metrics.logout_total.add(1, &[]);
        tracing::info!("Signed out");
        Ok(())
    }

    /// Fetches the current user and replaces the cached profile.
    ///
    /// # Errors
    /// Authentication failures also end the session.
    #[tracing::instrument(skip_all, err(level = "warn"))]
    pub async fn refresh_profile(&self) -> Result<UserProfile> {
        let user: UserProfile = self.client.execute_json(ApiRequest::get(routes::ME).account_lookup()).await?;
        self.client.store().update_user(&user).await?;
        Ok(user)
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// Never called implicitly; callers decide when a refresh is worth trying.
    ///
    /// # Errors
    /// Returns an authentication error when no session is stored or the refresh
    /// token is rejected; a rejection also ends the session.
    #[tracing::instrument(skip_all, err(level = "warn"))]
    pub async fn refresh_tokens(&self) -> Result<Credentials> {
        let current = self.client.store().credentials().await?.ok_or_else(|| ClientError::Authentication {
            status: None,
            message: "You are not signed in".to_string(),
        })?;

        let request = ApiRequest::post(routes::TOKEN_REFRESH).serialize(&Refresh { refresh: &current.refresh_token })?;
        // Sent without the access token, which is likely the one that expired.
        let result = self.client.api().execute_json::<RefreshedTokens>(request, None).await;
        let refreshed = self.client.react(result, Some(&current.access_token)).await?;

        let credentials = Credentials::new(refreshed.access, refreshed.refresh.unwrap_or(current.refresh_token));
        self.client.store().update_tokens(&credentials).await?;
        tracing::info!("Access token refreshed");
        Ok(credentials)
    }
}
