//! Collection data plane: vector index creation.

use async_trait::async_trait;
use reqwest::Method;

use kb_sync_core::cloud::IndexApi;
use kb_sync_core::error::ApiError;

use super::sigv4::uri_encode;
use super::ServiceClient;

/// Signs with service `aoss` and `x-amz-content-sha256`.
pub struct OpenSearchClient {
    client: ServiceClient,
}

impl OpenSearchClient {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

pub(crate) fn index_url(host: &str, index_name: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}/{}", host.trim_end_matches('/'), uri_encode(index_name))
    } else {
        format!("https://{}/{}", host, uri_encode(index_name))
    }
}

#[async_trait]
impl IndexApi for OpenSearchClient {
    async fn create_index(
        &self,
        host: &str,
        index_name: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        self.client
            .send_json(
                "CreateIndex",
                Method::PUT,
                &index_url(host, index_name),
                &[],
                Some(body),
            )
            .await
    }
}
