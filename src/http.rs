//! HTTP request and response types.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// A request as seen by handlers.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub path_params: HashMap<String, String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Parse the body as JSON. Malformed bodies are a bad request.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::BadRequest(format!("invalid JSON body: {}", e)))
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Header lookup, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A response produced by handlers.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = Bytes::from(serde_json::to_vec(value)?);
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// `200` with a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Self::ok().with_json(value)
    }

    /// Render an error as its JSON body.
    pub fn from_error(err: &Error) -> Self {
        Self::new(err.status_code())
            .with_json(&err.to_body())
            .unwrap_or_else(|_| Self::internal_server_error())
    }

    /// Parse the body as JSON.
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_request_json() {
        let req = HttpRequest::new("POST", "/api/bootstrap").with_body(r#"{"key": "u"}"#);
        let value: Value = req.json().unwrap();
        assert_eq!(value["key"], "u");

        let bad = HttpRequest::new("POST", "/api/bootstrap").with_body("{nope");
        assert!(matches!(bad.json::<Value>(), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let mut req = HttpRequest::new("GET", "/");
        req.headers.insert("content-type".into(), "application/json".into());
        assert_eq!(req.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_json_response() {
        let resp = HttpResponse::json(&json!({"status": "ok"})).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.headers["Content-Type"], "application/json");
        assert_eq!(resp.body_json::<Value>().unwrap()["status"], "ok");
    }

    #[test]
    fn test_error_response() {
        let resp = HttpResponse::from_error(&Error::BadRequest("missing body".into()));
        assert_eq!(resp.status, 400);
        let body: Value = resp.body_json().unwrap();
        assert_eq!(body["error"], "Bad Request: missing body");
    }
}
