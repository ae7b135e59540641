//! Attaches the bearer token and sends requests through the transport.

use std::sync::Arc;
use tracing::debug;

use crate::request::{ApiRequest, ApiResponse, TransportRequest};
use crate::transport::Transport;
use crate::{AuthError, AuthResult};

/// Sends [`ApiRequest`]s, turning non-2xx responses into
/// [`AuthError::Http`]. It has no knowledge of refresh.
#[derive(Clone)]
pub struct RequestDispatcher {
    transport: Arc<dyn Transport>,
}

impl RequestDispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send `request` with `Authorization: Bearer <token>` when a token is
    /// given, and without the header otherwise.
    pub async fn send(&self, request: &ApiRequest, token: Option<&str>) -> AuthResult<ApiResponse> {
        let outgoing = build_outgoing(request, token);
        let response = self.transport.execute(&outgoing).await?;

        if response.is_success() {
            return Ok(response);
        }

        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            retried = request.is_retried(),
            "Request returned error status"
        );
        Err(AuthError::Http {
            status: response.status,
            body: response.text(),
        })
    }
}

fn build_outgoing(request: &ApiRequest, token: Option<&str>) -> TransportRequest {
    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("authorization"))
        .cloned()
        .collect();
    if let Some(token) = token {
        headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
    }

    TransportRequest {
        method: request.method.clone(),
        path: request.path.clone(),
        query: request.query.clone(),
        headers,
        body: request.body.clone(),
    }
}
