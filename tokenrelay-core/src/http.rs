//! `reqwest`-backed transport and identity endpoint.
//!
//! Both share one cookie-enabled [`reqwest::Client`], so the long-lived
//! session cookie set at login is sent along with every refresh call.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::credential::AccessCredential;
use crate::error::TokenrelayError;
use crate::identity::{IdentityEndpoint, IdentityError};
use crate::request::{ApiRequest, ApiResponse, Method};
use crate::transport::{Transport, TransportError};

/// Transport that resolves request paths against a base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` under the base URL.
    ///
    /// The joined URL must keep the base URL's origin: an absolute URL as
    /// the path would otherwise carry the credential to another host.
    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::InvalidRequest {
                message: format!("invalid request path {:?}: {}", path, e),
            })?;

        if url.origin() != self.base_url.origin() {
            return Err(TransportError::InvalidRequest {
                message: format!("request path {:?} leaves the API origin", path),
            });
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(&request.path)?;

        let mut builder = self.client.request(to_reqwest_method(request.method), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::NoResponse {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::MalformedResponse {
                status,
                message: format!("failed to read response body: {}", e),
            })?;
        let body = parse_body(&text);

        if (200..300).contains(&status) {
            Ok(ApiResponse::new(status, body))
        } else {
            Err(TransportError::Status { status, body })
        }
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token", rename = "accessToken")]
    access_token: String,
}

/// Identity endpoint that `POST`s to a refresh URL with no body.
#[derive(Debug, Clone)]
pub struct HttpIdentityEndpoint {
    client: reqwest::Client,
    refresh_url: Url,
}

impl HttpIdentityEndpoint {
    pub fn new(client: reqwest::Client, refresh_url: Url) -> Self {
        Self {
            client,
            refresh_url,
        }
    }

    pub fn refresh_url(&self) -> &Url {
        &self.refresh_url
    }
}

#[async_trait]
impl IdentityEndpoint for HttpIdentityEndpoint {
    async fn refresh(&self) -> Result<AccessCredential, IdentityError> {
        let response = self
            .client
            .post(self.refresh_url.clone())
            .send()
            .await
            .map_err(|e| IdentityError::Unreachable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Rejected {
                status: status.as_u16(),
            });
        }

        let parsed: RefreshResponse =
            response
                .json()
                .await
                .map_err(|e| IdentityError::MalformedResponse {
                    message: e.to_string(),
                })?;

        if parsed.access_token.is_empty() {
            return Err(IdentityError::MalformedResponse {
                message: "empty access token".to_string(),
            });
        }

        Ok(AccessCredential::new(parsed.access_token))
    }
}

/// Build a transport and identity endpoint sharing one cookie-enabled client.
///
/// `base_url` should end with `/` so that relative paths append to it rather
/// than replace its last segment; a missing trailing slash is added.
pub fn http_stack(
    base_url: &str,
    refresh_path: &str,
    timeout: Duration,
) -> Result<(HttpTransport, HttpIdentityEndpoint), TokenrelayError> {
    let base_url = parse_base_url(base_url)?;
    let refresh_url = base_url
        .join(refresh_path.trim_start_matches('/'))
        .map_err(|e| TokenrelayError::Config {
            message: format!("invalid refresh path {:?}: {}", refresh_path, e),
        })?;

    let client = reqwest::Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .build()
        .map_err(|e| TokenrelayError::Config {
            message: format!("failed to build HTTP client: {}", e),
        })?;

    tracing::debug!(%base_url, %refresh_url, "built HTTP stack");

    Ok((
        HttpTransport::new(client.clone(), base_url),
        HttpIdentityEndpoint::new(client, refresh_url),
    ))
}

/// Parse a base URL, making sure it ends with `/`.
pub fn parse_base_url(raw: &str) -> Result<Url, TokenrelayError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };

    Url::parse(&normalized).map_err(|e| TokenrelayError::Config {
        message: format!("invalid base URL {:?}: {}", raw, e),
    })
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// JSON if it parses, the raw text as a JSON string otherwise, `Null` when empty.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_base_url_adds_slash() {
        let url = parse_base_url("https://api.example.com/v1").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/");
        assert_eq!(url.join("feed").unwrap().as_str(), "https://api.example.com/v1/feed");
    }

    #[test]
    fn test_parse_base_url_rejects_garbage() {
        assert!(matches!(
            parse_base_url("not a url"),
            Err(TokenrelayError::Config { .. })
        ));
    }

    #[test]
    fn test_url_for_stays_on_origin() {
        let transport = HttpTransport::new(
            reqwest::Client::new(),
            parse_base_url("https://api.example.com/v1").unwrap(),
        );

        assert_eq!(
            transport.url_for("/posts/7").unwrap().as_str(),
            "https://api.example.com/v1/posts/7"
        );

        for path in [
            "https://evil.example.net/collect",
            "//evil.example.net/collect",
            "http://api.example.com/v1/feed",
            "https://api.example.com:8443/v1/feed",
        ] {
            assert!(
                matches!(
                    transport.url_for(path),
                    Err(TransportError::InvalidRequest { .. })
                ),
                "{path} should be refused"
            );
        }
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"ok\":true}"), json!({ "ok": true }));
        assert_eq!(parse_body("Bad Gateway"), json!("Bad Gateway"));
    }

    #[test]
    fn test_refresh_response_accepts_both_spellings() {
        let camel: RefreshResponse = serde_json::from_str(r#"{"accessToken":"a"}"#).unwrap();
        let snake: RefreshResponse = serde_json::from_str(r#"{"access_token":"b"}"#).unwrap();
        assert_eq!(camel.access_token, "a");
        assert_eq!(snake.access_token, "b");
    }

    #[test]
    fn test_http_stack_joins_refresh_path() {
        let (transport, identity) =
            http_stack("http://localhost:8080/api", "/auth/refresh", Duration::from_secs(5))
                .unwrap();
        assert_eq!(transport.base_url().as_str(), "http://localhost:8080/api/");
        assert_eq!(
            identity.refresh_url().as_str(),
            "http://localhost:8080/api/auth/refresh"
        );
    }
}
