use crate::domain::route::{LandingRoute, SessionState};
use crate::domain::session::AccessClaims;
use crate::storage::CredentialStore;
use serde::Serialize;

/// Where the application lands after the stored session has been examined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bootstrap {
    #[serde(flatten)]
    pub state: SessionState,
    pub route: LandingRoute,
}

impl From<SessionState> for Bootstrap {
    fn from(state: SessionState) -> Self {
        Self { state, route: state.landing_route() }
    }
}

/// Resolves the stored session into exactly one landing route when the
/// application starts.
#[derive(Debug, Clone)]
pub struct SessionBootstrapper {
    store: CredentialStore,
}

impl SessionBootstrapper {
    #[must_use]
    pub const fn new(store: CredentialStore) -> Self {
        Self { store }
    }

    /// Reads the store once and decides.
    ///
    /// Never fails: an unreadable store, a missing or partial session, and an
    /// access token whose expiry has passed all resolve to the sign-in route.
    /// No request is made.
    #[tracing::instrument(skip_all, fields(session.state = tracing::field::Empty))]
    pub async fn resolve(&self) -> Bootstrap {
        let state = self.resolve_state().await;
        tracing::Span::current().record("session.state", tracing::field::debug(state));
        state.into()
    }

    async fn resolve_state(&self) -> SessionState {
        let session = match self.store.get().await {
            Ok(Some(session)) => session,
            Ok(None) => return SessionState::Unauthenticated,
            Err(e) => {
                tracing::warn!(error = %e, "Session store unreadable, treating as signed out");
                return SessionState::Unauthenticated;
            }
        };

        if AccessClaims::peek(&session.access_token).is_some_and(|claims| claims.is_expired()) {
            tracing::info!("Stored access token has expired, clearing session");
            if let Err(e) = self.store.clear().await {
                tracing::error!(error = %e, "Failed to clear expired session");
            }
            return SessionState::Unauthenticated;
        }

        let role = session.user.role();
        tracing::debug!(role = %role, "Restored session");
        SessionState::Authenticated(role)
    }
}
