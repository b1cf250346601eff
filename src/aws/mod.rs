//! AWS clients for the cloud service traits.
//!
//! Each service talks to the public HTTP API directly with SigV4-signed
//! `reqwest` requests; there is no AWS SDK dependency.
//!
//! | Module | Service | Protocol |
//! |--------|---------|----------|
//! | [`sts`] | STS `GetCallerIdentity` | query, XML response |
//! | [`aoss`] | OpenSearch Serverless control plane | JSON 1.0 (`X-Amz-Target`) |
//! | [`opensearch`] | collection data plane (index create) | REST JSON |
//! | [`bedrock`] | Bedrock Agent and Agent Runtime | REST JSON |
//!
//! Failures come back as [`ApiError`] with an [`ErrorKind`] decoded from the
//! service error code and HTTP status; network failures are
//! [`ErrorKind::Transient`].
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID` (required)
//! - `AWS_SECRET_ACCESS_KEY` (required)
//! - `AWS_SESSION_TOKEN` (optional, for temporary credentials)

pub mod aoss;
pub mod bedrock;
pub mod opensearch;
pub mod sigv4;
pub mod sts;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use kb_sync_core::error::{ApiError, ErrorKind};

use sigv4::{SignableRequest, Signer};

/// Static credentials read from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

/// Base URL for a service: the override if set, else the public regional
/// endpoint `https://{prefix}.{region}.amazonaws.com`.
pub fn endpoint(override_url: Option<&str>, prefix: &str, region: &str) -> String {
    match override_url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => format!("https://{}.{}.amazonaws.com", prefix, region),
    }
}

/// A signed HTTP channel to one AWS service.
pub struct ServiceClient {
    http: reqwest::Client,
    signer: Signer,
    /// Service label used in errors and logs.
    service: &'static str,
}

impl ServiceClient {
    pub fn new(http: reqwest::Client, signer: Signer, service: &'static str) -> Self {
        Self {
            http,
            signer,
            service,
        }
    }

    /// Send a signed request and return the response body on 2xx.
    pub async fn send(
        &self,
        operation: &'static str,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<String, ApiError> {
        let parsed = Url::parse(url).map_err(|e| {
            ApiError::new(
                self.service,
                operation,
                ErrorKind::Validation,
                format!("invalid endpoint URL {}: {}", url, e),
            )
        })?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(h), Some(port)) => format!("{}:{}", h, port),
            (Some(h), None) => h.to_string(),
            (None, _) => {
                return Err(ApiError::new(
                    self.service,
                    operation,
                    ErrorKind::Validation,
                    format!("endpoint URL {} has no host", url),
                ))
            }
        };
        let query: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let signed = self.signer.sign(
            &SignableRequest {
                method: method.as_str(),
                host: &host,
                path: parsed.path(),
                query: &query,
                headers,
                body: &body,
            },
            Utc::now(),
        );

        let mut req = self.http.request(method.clone(), parsed.clone());
        for (name, value) in headers.iter() {
            req = req.header(*name, *value);
        }
        for (name, value) in &signed {
            req = req.header(name.as_str(), value.as_str());
        }

        debug!(service = self.service, operation, %method, url, "sending request");
        let resp = req.body(body).send().await.map_err(|e| {
            ApiError::new(
                self.service,
                operation,
                ErrorKind::Transient,
                format!("request to {} failed: {}", host, e),
            )
        })?;

        let status = resp.status();
        let error_type = resp
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = resp.text().await.map_err(|e| {
            ApiError::new(
                self.service,
                operation,
                ErrorKind::Transient,
                format!("failed to read response body: {}", e),
            )
        })?;

        if !status.is_success() {
            return Err(decode_error(
                self.service,
                operation,
                status.as_u16(),
                error_type.as_deref(),
                &text,
            ));
        }
        Ok(text)
    }

    /// Send a JSON body (if any) and decode a JSON response.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: Method,
        url: &str,
        extra_headers: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<T, ApiError> {
        let bytes = match body {
            Some(v) => serde_json::to_vec(v).map_err(|e| {
                ApiError::new(self.service, operation, ErrorKind::Validation, e.to_string())
            })?,
            None => Vec::new(),
        };
        let mut headers: Vec<(&str, &str)> = extra_headers.to_vec();
        if body.is_some() && !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
            headers.push(("content-type", "application/json"));
        }
        let text = self.send(operation, method, url, &headers, bytes).await?;
        parse_json(self.service, operation, &text)
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(
    service: &'static str,
    operation: &'static str,
    text: &str,
) -> Result<T, ApiError> {
    serde_json::from_str(text).map_err(|e| {
        ApiError::new(
            service,
            operation,
            ErrorKind::Other,
            format!("unexpected response ({}): {}", e, truncate(text)),
        )
    })
}

/// Build an [`ApiError`] from a non-2xx response.
///
/// The error code is taken from the first of: the `x-amzn-ErrorType`
/// header, a JSON `__type`, an OpenSearch `error.type`, an XML `<Code>`.
pub fn decode_error(
    service: &'static str,
    operation: &'static str,
    status: u16,
    error_type_header: Option<&str>,
    body: &str,
) -> ApiError {
    let json: Option<serde_json::Value> = serde_json::from_str(body).ok();

    let code = error_type_header
        .and_then(|h| h.split(':').next())
        .map(str::to_string)
        .or_else(|| {
            let json = json.as_ref()?;
            json.get("__type")
                .and_then(|t| t.as_str())
                .and_then(|t| t.rsplit('#').next())
                .or_else(|| json.pointer("/error/type").and_then(|t| t.as_str()))
                .map(str::to_string)
        })
        .or_else(|| extract_xml_value(body, "Code"));

    let message = json
        .as_ref()
        .and_then(|j| {
            j.get("message")
                .or_else(|| j.get("Message"))
                .or_else(|| j.pointer("/error/reason"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .or_else(|| extract_xml_value(body, "Message"))
        .unwrap_or_else(|| truncate(body));

    let kind = ErrorKind::classify(code.as_deref(), Some(status));
    let message = match code {
        Some(code) => format!("{} (HTTP {}): {}", code, status, message),
        None => format!("HTTP {}: {}", status, message),
    };
    ApiError::new(service, operation, kind, message)
}

fn truncate(body: &str) -> String {
    body.chars().take(500).collect()
}

/// Text content of the first `<tag>` (simple, non-nested).
pub(crate) fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)?;
    Some(xml[start..start + end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_type_is_decoded() {
        let err = decode_error(
            "aoss",
            "CreateCollection",
            400,
            None,
            r#"{"__type":"com.amazonaws.aoss#ConflictException","message":"exists"}"#,
        );
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert!(err.message.contains("exists"));
    }

    #[test]
    fn error_type_header_wins() {
        let err = decode_error(
            "bedrock-agent",
            "CreateKnowledgeBase",
            400,
            Some("ThrottlingException:http://internal.amazon.com/"),
            r#"{"message":"Rate exceeded"}"#,
        );
        assert_eq!(err.kind, ErrorKind::Throttling);
        assert!(err.is_retryable());
        assert!(err.message.contains("Rate exceeded"));
    }

    #[test]
    fn opensearch_exists_is_conflict() {
        let body = r#"{"error":{"root_cause":[],"type":"resource_already_exists_exception","reason":"index [x/abc] already exists"},"status":400}"#;
        let err = decode_error("opensearch", "CreateIndex", 400, None, body);
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert!(err.message.contains("already exists"));
    }

    #[test]
    fn xml_code_is_decoded() {
        let body = "<ErrorResponse><Error><Type>Sender</Type><Code>InvalidClientTokenId</Code>\
                    <Message>The security token included in the request is invalid.</Message>\
                    </Error></ErrorResponse>";
        let err = decode_error("sts", "GetCallerIdentity", 403, None, body);
        assert_eq!(err.kind, ErrorKind::AccessDenied);
        assert!(err.message.contains("security token"));
    }

    #[test]
    fn unparseable_body_falls_back_to_status() {
        let err = decode_error("bedrock-agent", "GetKnowledgeBase", 503, None, "Service Unavailable");
        assert_eq!(err.kind, ErrorKind::Transient);
        assert!(err.message.contains("Service Unavailable"));
    }

    #[test]
    fn endpoint_override() {
        assert_eq!(
            endpoint(None, "aoss", "eu-west-1"),
            "https://aoss.eu-west-1.amazonaws.com"
        );
        assert_eq!(
            endpoint(Some("http://localhost:4566/"), "aoss", "eu-west-1"),
            "http://localhost:4566"
        );
    }
}
