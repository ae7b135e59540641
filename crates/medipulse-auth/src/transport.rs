//! HTTP transport seam.
//!
//! The pipeline only ever talks to a [`Transport`]. Production code uses
//! [`HttpTransport`] over reqwest; tests substitute scripted transports.

use async_trait::async_trait;
use medipulse_config_and_utils::Config;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::request::{ApiResponse, TransportRequest};
use crate::{AuthError, AuthResult};

/// Sends one request and returns whatever status came back.
///
/// Implementations must not interpret HTTP statuses: a 401 or a 500 is an
/// `Ok(ApiResponse)`. Errors are reserved for requests that produced no
/// response at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &TransportRequest) -> AuthResult<ApiResponse>;
}

/// reqwest-backed transport bound to the API base URL.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport for `base_url` with a per-request timeout.
    pub fn new(base_url: Url, timeout: Duration) -> AuthResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Create a transport from the client configuration.
    pub fn from_config(config: &Config) -> AuthResult<Self> {
        let base_url = config
            .api_url()
            .map_err(|e| AuthError::Config(e.to_string()))?;
        Self::new(base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> AuthResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &TransportRequest) -> AuthResult<ApiResponse> {
        let url = self.url_for(&request.path)?;
        debug!(method = %request.method, url = %url, "Sending HTTP request");

        let mut builder = self.client.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(classify)?.to_vec();

        debug!(status = status, bytes = body.len(), "Received HTTP response");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify(error: reqwest::Error) -> AuthError {
    if error.is_timeout() {
        AuthError::Timeout
    } else if error.is_connect() {
        AuthError::NetworkUnavailable(error.to_string())
    } else {
        AuthError::Request(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Head and body of a request seen by the stub server.
    struct Captured {
        request_line: String,
        headers: Vec<String>,
        body: String,
    }

    /// Accept one connection, record the request, answer with `status` and `body`.
    async fn serve_once(
        status_line: &'static str,
        response_body: &'static str,
    ) -> (Url, oneshot::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);

            let mut request_line = String::new();
            reader.read_line(&mut request_line).await.unwrap();

            let mut headers = Vec::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                let line = line.trim_end().to_string();
                if line.is_empty() {
                    break;
                }
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
                headers.push(line);
            }

            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).await.unwrap();

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                response_body.len(),
                response_body
            );
            reader.get_mut().write_all(response.as_bytes()).await.unwrap();
            reader.get_mut().flush().await.unwrap();

            let _ = tx.send(Captured {
                request_line: request_line.trim_end().to_string(),
                headers,
                body: String::from_utf8(body).unwrap(),
            });
        });

        let base = Url::parse(&format!("http://{}/api/", addr)).unwrap();
        (base, rx)
    }

    #[tokio::test]
    async fn test_http_transport_sends_headers_query_and_body() {
        let (base, captured) = serve_once("200 OK", r#"{"ok":true}"#).await;
        let transport = HttpTransport::new(base, Duration::from_secs(5)).unwrap();

        let mut request = TransportRequest::new(Method::POST, "medications/7/log");
        request.query.push(("source".to_string(), "cli".to_string()));
        request
            .headers
            .push(("Authorization".to_string(), "Bearer A1".to_string()));
        request.body = Some(json!({ "taken": true }));

        let response = transport.execute(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.json_value().unwrap(), json!({ "ok": true }));

        let captured = captured.await.unwrap();
        assert_eq!(
            captured.request_line,
            "POST /api/medications/7/log?source=cli HTTP/1.1"
        );
        assert!(captured
            .headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case("authorization: Bearer A1")));
        assert!(captured
            .headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case("content-type: application/json")));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&captured.body).unwrap(),
            json!({ "taken": true })
        );
    }

    #[tokio::test]
    async fn test_http_transport_returns_error_statuses_as_responses() {
        let (base, captured) = serve_once("401 Unauthorized", r#"{"message":"expired"}"#).await;
        let transport = HttpTransport::new(base, Duration::from_secs(5)).unwrap();

        let request = TransportRequest::new(Method::GET, "/users/profile");
        let response = transport.execute(&request).await.unwrap();

        assert_eq!(response.status, 401);
        assert!(!response.is_success());
        assert!(response.text().contains("expired"));

        let captured = captured.await.unwrap();
        assert_eq!(captured.request_line, "GET /api/users/profile HTTP/1.1");
    }

    #[tokio::test]
    async fn test_http_transport_connection_refused_is_network_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = Url::parse(&format!("http://{}/api/", addr)).unwrap();
        let transport = HttpTransport::new(base, Duration::from_secs(5)).unwrap();

        let request = TransportRequest::new(Method::GET, "doctors");
        let err = transport.execute(&request).await.unwrap_err();
        assert!(matches!(err, AuthError::NetworkUnavailable(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_from_config_uses_api_url() {
        let mut config = Config::new();
        config.api_url = "https://api.medipulse.test/v1".to_string();

        let transport = HttpTransport::from_config(&config).unwrap();
        assert_eq!(transport.base_url().as_str(), "https://api.medipulse.test/v1/");
        assert_eq!(
            transport.url_for("/appointments/3").unwrap().as_str(),
            "https://api.medipulse.test/v1/appointments/3"
        );
    }
}
