//! The refresh endpoint call.
//!
//! Sent straight to the transport so it never passes through the 401
//! handling it serves.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::request::TransportRequest;
use crate::transport::Transport;
use crate::RefreshError;

/// Path of the refresh endpoint, relative to the API base URL.
pub const REFRESH_PATH: &str = "auth/refresh";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

/// Exchanges a refresh token for a new access token.
#[derive(Clone)]
pub struct TokenRefresher {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl TokenRefresher {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `POST auth/refresh` with `{"refreshToken": ...}`, bounded by the
    /// configured timeout. The response must carry a non-empty `accessToken`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, RefreshError> {
        let mut request = TransportRequest::new(reqwest::Method::POST, REFRESH_PATH);
        request.body = Some(
            serde_json::to_value(RefreshRequest { refresh_token })
                .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?,
        );

        debug!(timeout_ms = self.timeout.as_millis() as u64, "Calling refresh endpoint");

        let response = match tokio::time::timeout(self.timeout, self.transport.execute(&request)).await {
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Refresh timed out");
                return Err(RefreshError::TimedOut {
                    after_ms: self.timeout.as_millis() as u64,
                });
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Refresh request failed");
                return Err(RefreshError::Network(e.to_string()));
            }
            Ok(Ok(response)) => response,
        };

        if !response.is_success() {
            warn!(status = response.status, "Refresh rejected");
            return Err(RefreshError::Rejected {
                status: response.status,
                body: response.text(),
            });
        }

        let data: RefreshResponse = response
            .json()
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        if data.access_token.trim().is_empty() {
            return Err(RefreshError::InvalidResponse(
                "accessToken is empty".to_string(),
            ));
        }

        Ok(data.access_token)
    }
}
