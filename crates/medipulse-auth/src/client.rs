//! The authenticated request pipeline.
//!
//! Every call goes through [`ApiClient::execute`]: the request is sent with
//! the current access token, and a 401 is recovered by a single shared
//! token refresh followed by one retry. Callers that hit a 401 while a
//! refresh is in flight wait for it instead of starting their own.

use medipulse_config_and_utils::Config;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::coordinator::{RefreshCoordinator, RefreshLease, Ticket};
use crate::dispatcher::RequestDispatcher;
use crate::refresh::TokenRefresher;
use crate::refresh_fsm::RefreshState;
use crate::request::{ApiRequest, ApiResponse};
use crate::token_store::TokenStore;
use crate::transport::{HttpTransport, Transport};
use crate::{AuthError, AuthResult, RefreshError};

/// Invoked once per failed refresh, after the session has been cleared.
pub type UnauthenticatedHandler = Box<dyn Fn(&RefreshError) + Send + Sync>;

/// Tokens returned by login and registration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Point-in-time view of the client's auth state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSnapshot {
    pub is_authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub refresh_state: RefreshState,
}

struct ClientInner {
    tokens: TokenStore,
    dispatcher: RequestDispatcher,
    refresher: TokenRefresher,
    coordinator: Arc<RefreshCoordinator>,
    on_unauthenticated: RwLock<Option<UnauthenticatedHandler>>,
}

/// API client with transparent token refresh. Cheap to clone; clones share
/// the token store and the refresh state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Client over HTTP using the configured base URL and timeouts.
    pub fn new(config: &Config, tokens: TokenStore) -> AuthResult<Self> {
        let transport = HttpTransport::from_config(config)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            tokens,
            config.refresh_timeout(),
        ))
    }

    /// Client over an arbitrary transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        tokens: TokenStore,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                tokens,
                dispatcher: RequestDispatcher::new(Arc::clone(&transport)),
                refresher: TokenRefresher::new(transport, refresh_timeout),
                coordinator: Arc::new(RefreshCoordinator::new()),
                on_unauthenticated: RwLock::new(None),
            }),
        }
    }

    /// Replace the handler notified when the session is lost.
    pub fn set_unauthenticated_handler(&self, handler: UnauthenticatedHandler) {
        *self.inner.on_unauthenticated.write() = Some(handler);
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.inner.coordinator.state()
    }

    /// Callers currently waiting on the in-flight refresh.
    pub fn pending_refresh_waiters(&self) -> usize {
        self.inner.coordinator.queued()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        let session = self.inner.tokens.snapshot();
        AuthSnapshot {
            is_authenticated: session.is_authenticated,
            user: session.user,
            has_access_token: session.access_token.is_some(),
            has_refresh_token: session.refresh_token.is_some(),
            refresh_state: self.refresh_state(),
        }
    }

    /// Send `request`, recovering from one 401 by refreshing the token.
    pub async fn execute(&self, request: ApiRequest) -> AuthResult<ApiResponse> {
        let span = tracing::debug_span!(
            "api_request",
            request_id = %Uuid::new_v4(),
            method = %request.method,
            path = %request.path,
        );
        self.execute_inner(request).instrument(span).await
    }

    async fn execute_inner(&self, mut request: ApiRequest) -> AuthResult<ApiResponse> {
        let sent_with = self.inner.tokens.get_access_token();

        let error = match self
            .inner
            .dispatcher
            .send(&request, sent_with.as_deref())
            .await
        {
            Err(e) if e.is_unauthorized_status() => e,
            other => return other,
        };

        if !request.refreshes_on_unauthorized() {
            return Err(error);
        }
        request.mark_retried();

        let tokens = &self.inner.tokens;
        let ticket = self
            .inner
            .coordinator
            .acquire(sent_with.as_deref(), || tokens.get_access_token());

        let token = match ticket {
            Ticket::Current(token) => token,
            Ticket::Leader(lease) => self.lead_refresh(lease).await?,
            Ticket::Follower(rx) => match rx.await {
                Ok(Ok(token)) => token,
                Ok(Err(e)) => return Err(AuthError::RefreshFailed(e)),
                Err(_) => return Err(AuthError::RefreshFailed(RefreshError::Abandoned)),
            },
        };

        self.retry(&request, &token).await
    }

    async fn retry(&self, request: &ApiRequest, token: &str) -> AuthResult<ApiResponse> {
        match self.inner.dispatcher.send(request, Some(token)).await {
            Err(e) if e.is_unauthorized_status() => Err(unauthorized(e)),
            other => other,
        }
    }

    async fn lead_refresh(&self, lease: RefreshLease) -> AuthResult<String> {
        let Some(refresh_token) = self.inner.tokens.get_refresh_token() else {
            return Err(self.end_session(lease, RefreshError::NoRefreshToken));
        };

        match self.inner.refresher.refresh(&refresh_token).await {
            Ok(access_token) => {
                self.inner.tokens.set_access_token(&access_token);
                let released = lease.succeed(&access_token);
                info!(released_waiters = released, "Access token refreshed");
                Ok(access_token)
            }
            Err(e) => Err(self.end_session(lease, e)),
        }
    }

    /// Clear the session, fail the queue, then notify the handler.
    fn end_session(&self, lease: RefreshLease, error: RefreshError) -> AuthError {
        // Clear while still Refreshing; a new leader must not see the rejected token.
        self.inner.tokens.clear();
        let rejected = lease.fail(error.clone());
        warn!(error = %error, rejected_waiters = rejected, "Token refresh failed, session cleared");

        match self.inner.on_unauthenticated.read().as_ref() {
            Some(handler) => handler(&error),
            None => warn!("Session ended; login required"),
        }

        AuthError::RefreshFailed(error)
    }

    pub async fn get(&self, path: &str) -> AuthResult<ApiResponse> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> AuthResult<ApiResponse> {
        self.execute(with_body(ApiRequest::post(path), body)).await
    }

    pub async fn put(&self, path: &str, body: Option<Value>) -> AuthResult<ApiResponse> {
        self.execute(with_body(ApiRequest::put(path), body)).await
    }

    pub async fn delete(&self, path: &str, body: Option<Value>) -> AuthResult<ApiResponse> {
        self.execute(with_body(ApiRequest::delete(path), body)).await
    }

    /// Log in with email and password and install the returned session.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        let response = self
            .auth()
            .login(&json!({ "email": email, "password": password }))
            .await
            .map_err(credentials_error)?;

        let session: AuthSession = response.json()?;
        let (Some(access_token), Some(refresh_token)) =
            (&session.access_token, &session.refresh_token)
        else {
            return Err(AuthError::InvalidCredentials(
                "login response did not include tokens".to_string(),
            ));
        };

        self.inner
            .tokens
            .set_session(session.user.clone(), access_token, refresh_token);
        info!("Logged in");
        Ok(session)
    }

    /// Register an account. A response carrying tokens also logs in.
    pub async fn register(&self, data: &Value) -> AuthResult<AuthSession> {
        let response = self
            .auth()
            .register(data)
            .await
            .map_err(credentials_error)?;

        let body = response.json_value()?;
        let session: AuthSession = if body.is_null() {
            AuthSession::default()
        } else {
            serde_json::from_value(body)?
        };

        if let (Some(access_token), Some(refresh_token)) =
            (&session.access_token, &session.refresh_token)
        {
            self.inner
                .tokens
                .set_session(session.user.clone(), access_token, refresh_token);
            info!("Registered and logged in");
        } else {
            info!("Registered");
        }
        Ok(session)
    }

    /// Tell the server the session is over, then clear it locally whatever
    /// the server said.
    pub async fn logout(&self) {
        if let Err(e) = self.auth().logout().await {
            warn!(error = %e, "Logout request failed, clearing local session anyway");
        }
        self.inner.tokens.clear();
        info!("Logged out");
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("tokens", &self.inner.tokens)
            .field("refresh_state", &self.refresh_state())
            .finish()
    }
}

fn with_body(request: ApiRequest, body: Option<Value>) -> ApiRequest {
    match body {
        Some(body) => request.body(body),
        None => request,
    }
}

fn unauthorized(error: AuthError) -> AuthError {
    match error {
        AuthError::Http { body, .. } => AuthError::Unauthorized { body },
        other => other,
    }
}

fn credentials_error(error: AuthError) -> AuthError {
    match error {
        AuthError::Http { status: 400 | 401, body } => AuthError::InvalidCredentials(body),
        other => other,
    }
}
