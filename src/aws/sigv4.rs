//! AWS Signature Version 4.
//!
//! Pure-Rust signing with `hmac` + `sha2`. A [`Signer`] is bound to one
//! region and signing service (`sts`, `aoss`, `bedrock`) and produces the
//! headers that must accompany a request: `x-amz-date`, the optional
//! `x-amz-content-sha256` and `x-amz-security-token`, and `authorization`.
//!
//! The caller sends every header it passed in [`SignableRequest::headers`]
//! unchanged; `host` is signed but left for the HTTP client to set.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::Credentials;

type HmacSha256 = Hmac<Sha256>;

/// The parts of an HTTP request covered by the signature.
pub struct SignableRequest<'a> {
    pub method: &'a str,
    /// `host[:port]` exactly as the HTTP client will send it.
    pub host: &'a str,
    /// Already percent-encoded path, `/` when empty.
    pub path: &'a str,
    pub query: &'a [(String, String)],
    /// Extra headers to sign, names in lowercase.
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a [u8],
}

#[derive(Clone)]
pub struct Signer {
    credentials: Credentials,
    region: String,
    service: &'static str,
    /// Sign and send `x-amz-content-sha256`; the OpenSearch data plane
    /// rejects requests without it.
    content_sha256: bool,
}

impl Signer {
    pub fn new(credentials: Credentials, region: &str, service: &'static str) -> Self {
        Self {
            credentials,
            region: region.to_string(),
            service,
            content_sha256: false,
        }
    }

    pub fn with_content_sha256(mut self) -> Self {
        self.content_sha256 = true;
        self
    }

    /// Headers to add to `req`, `authorization` last.
    pub fn sign(&self, req: &SignableRequest<'_>, now: DateTime<Utc>) -> Vec<(String, String)> {
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = hex_sha256(req.body);

        let mut added = vec![("x-amz-date".to_string(), amz_date.clone())];
        if self.content_sha256 {
            added.push(("x-amz-content-sha256".to_string(), payload_hash.clone()));
        }
        if let Some(ref token) = self.credentials.session_token {
            added.push(("x-amz-security-token".to_string(), token.clone()));
        }

        let mut headers: Vec<(String, String)> = vec![("host".to_string(), req.host.to_string())];
        headers.extend(
            req.headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string())),
        );
        headers.extend(added.iter().cloned());
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let mut sorted_query = req.query.to_vec();
        sorted_query.sort();
        let canonical_querystring: String = sorted_query
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let path = if req.path.is_empty() { "/" } else { req.path };
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            req.method, path, canonical_querystring, canonical_headers, signed_headers, payload_hash
        );

        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.credentials.secret_access_key,
            &date_stamp,
            &self.region,
            self.service,
        );
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        added.push((
            "authorization".to_string(),
            format!(
                "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
                self.credentials.access_key_id, credential_scope, signed_headers, signature
            ),
        ));
        added
    }
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the signing key for a date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// RFC 3986 encoding of everything but `A-Z a-z 0-9 - _ . ~`.
pub fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}
