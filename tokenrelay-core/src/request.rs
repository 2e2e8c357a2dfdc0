//! Request and response types passed through the coordinator.
//!
//! This module defines:
//! - [`Method`] - HTTP verb
//! - [`ApiRequest`] - Verb, path, headers and optional JSON body
//! - [`ApiResponse`] - Status and JSON body of a successful call
//! - [`RequestContext`] - Per-call auth flags kept beside the request

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Header the coordinator writes the credential into.
pub const AUTHORIZATION: &str = "authorization";

/// HTTP verb of an outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

/// An outbound API call.
///
/// Header names are stored lowercased so that setting `Authorization` twice
/// replaces rather than duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the transport's base URL, e.g. `posts/42/comments`.
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` when the response had no body.
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    /// Deserialize the body into a typed value.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }
}

/// Per-call auth flags.
///
/// Kept next to the request rather than written into it, so the same
/// [`ApiRequest`] can be replayed with a different context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Do not attach the stored credential.
    pub skip_auth: bool,
    /// This call is already the replay after a refresh.
    pub is_retry: bool,
}

impl RequestContext {
    /// Context for a call that must go out without a credential.
    pub fn anonymous() -> Self {
        Self {
            skip_auth: true,
            is_retry: false,
        }
    }

    /// The same context, marked as a replay.
    pub fn retried(self) -> Self {
        Self {
            is_retry: true,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parse() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("PATCH".parse::<Method>().unwrap(), Method::Patch);
        assert!("TRACE".parse::<Method>().is_err());
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_header_replaced_case_insensitively() {
        let request = ApiRequest::get("feed")
            .with_header("Authorization", "Bearer old")
            .with_header("AUTHORIZATION", "Bearer new");

        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("authorization"), Some("Bearer new"));
    }

    #[test]
    fn test_response_json() {
        #[derive(Deserialize)]
        struct Booking {
            id: u32,
        }

        let response = ApiResponse::new(200, json!({ "id": 7 }));
        let booking: Booking = response.json().unwrap();
        assert_eq!(booking.id, 7);
    }

    #[test]
    fn test_context_retried_keeps_skip_auth() {
        let ctx = RequestContext::anonymous().retried();
        assert!(ctx.skip_auth);
        assert!(ctx.is_retry);

        let ctx = RequestContext::default();
        assert!(!ctx.skip_auth);
        assert!(!ctx.is_retry);
    }
}
