//! Request and response values passed through the pipeline.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::AuthResult;

/// A logical API call, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, e.g. `appointments/42`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Extra headers. `Authorization` is always set by the dispatcher.
    pub headers: Vec<(String, String)>,
    retried: bool,
    refresh_on_unauthorized: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
            retried: false,
            refresh_on_unauthorized: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> AuthResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Surface a 401 as-is instead of refreshing. Used for the endpoints
    /// that establish a session.
    pub fn without_refresh(mut self) -> Self {
        self.refresh_on_unauthorized = false;
        self
    }

    /// True once the request has been re-sent after a 401.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn refreshes_on_unauthorized(&self) -> bool {
        self.refresh_on_unauthorized
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// What actually goes on the wire: the request after header injection.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl TransportRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Bearer token from the `Authorization` header, if present.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// A response as returned by a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Response carrying a serialized JSON body.
    pub fn json_body(status: u16, body: &Value) -> Self {
        let mut response = Self::new(status, body.to_string());
        response
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        response
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> AuthResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body decoded as JSON, `Value::Null` when empty.
    pub fn json_value(&self) -> AuthResult<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        self.json()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults() {
        let request = ApiRequest::get("appointments");
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path, "appointments");
        assert!(!request.is_retried());
        assert!(request.refreshes_on_unauthorized());
        assert!(request.body.is_none());
    }

    #[test]
    fn test_request_builders() {
        let request = ApiRequest::post("medications")
            .json(&json!({ "name": "Aspirin" }))
            .unwrap()
            .query("page", "2")
            .header("X-Request-Source", "cli")
            .without_refresh();

        assert_eq!(request.body, Some(json!({ "name": "Aspirin" })));
        assert_eq!(request.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(request.headers.len(), 1);
        assert!(!request.refreshes_on_unauthorized());
    }

    #[test]
    fn test_mark_retried() {
        let mut request = ApiRequest::delete("notifications/1");
        request.mark_retried();
        assert!(request.is_retried());
    }

    #[test]
    fn test_bearer_token_lookup_is_case_insensitive() {
        let mut request = TransportRequest::new(Method::GET, "users/profile");
        request
            .headers
            .push(("authorization".to_string(), "Bearer A1".to_string()));
        assert_eq!(request.bearer_token(), Some("A1"));
        assert_eq!(request.header("Authorization"), Some("Bearer A1"));

        let request = TransportRequest::new(Method::GET, "users/profile");
        assert_eq!(request.bearer_token(), None);
    }

    #[test]
    fn test_response_json() {
        let response = ApiResponse::json_body(200, &json!({ "accessToken": "A2" }));
        assert!(response.is_success());
        assert_eq!(
            response.json_value().unwrap(),
            json!({ "accessToken": "A2" })
        );
        assert_eq!(
            response.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn test_empty_body_is_null() {
        let response = ApiResponse::new(204, Vec::new());
        assert!(response.is_success());
        assert_eq!(response.json_value().unwrap(), Value::Null);
    }

    #[test]
    fn test_non_success_statuses() {
        assert!(!ApiResponse::new(401, "expired").is_success());
        assert!(!ApiResponse::new(500, "").is_success());
        assert!(!ApiResponse::new(302, "").is_success());
        assert_eq!(ApiResponse::new(401, "expired").text(), "expired");
    }
}
