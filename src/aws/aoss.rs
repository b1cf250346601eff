//! OpenSearch Serverless control plane: collections.
//!
//! AWS JSON 1.0 protocol: every call is a `POST /` with the operation named
//! in `X-Amz-Target: OpenSearchServerless.<Operation>`.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use kb_sync_core::cloud::CollectionApi;
use kb_sync_core::error::ApiError;
use kb_sync_core::models::{CollectionSummary, Page};

use super::ServiceClient;

const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

pub struct AossClient {
    client: ServiceClient,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct CollectionDetail {
    id: String,
    name: String,
    arn: String,
}

impl From<CollectionDetail> for CollectionSummary {
    fn from(d: CollectionDetail) -> Self {
        CollectionSummary {
            id: d.id,
            name: d.name,
            arn: d.arn,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCollectionResponse {
    create_collection_detail: CollectionDetail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCollectionsResponse {
    #[serde(default)]
    collection_summaries: Vec<CollectionDetail>,
    #[serde(default)]
    next_token: Option<String>,
}

impl AossClient {
    pub fn new(client: ServiceClient, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        target: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let url = format!("{}/", self.endpoint);
        self.client
            .send_json(
                operation,
                Method::POST,
                &url,
                &[("content-type", CONTENT_TYPE), ("x-amz-target", target)],
                Some(body),
            )
            .await
    }
}

pub(crate) fn create_collection_body(name: &str, client_token: &str) -> serde_json::Value {
    json!({
        "name": name,
        "type": "VECTORSEARCH",
        "clientToken": client_token,
    })
}

pub(crate) fn list_collections_body(
    name_filter: Option<&str>,
    max_results: u32,
    next_token: Option<&str>,
) -> serde_json::Value {
    let mut body = json!({ "maxResults": max_results });
    if let Some(name) = name_filter {
        body["collectionFilters"] = json!({ "name": name });
    }
    if let Some(token) = next_token {
        body["nextToken"] = json!(token);
    }
    body
}

#[async_trait]
impl CollectionApi for AossClient {
    async fn create_collection(&self, name: &str) -> Result<CollectionSummary, ApiError> {
        let body = create_collection_body(name, &Uuid::new_v4().to_string());
        let resp: CreateCollectionResponse = self
            .call(
                "CreateCollection",
                "OpenSearchServerless.CreateCollection",
                &body,
            )
            .await?;
        Ok(resp.create_collection_detail.into())
    }

    async fn list_collections(
        &self,
        name_filter: Option<&str>,
        max_results: u32,
        next_token: Option<&str>,
    ) -> Result<Page<CollectionSummary>, ApiError> {
        let body = list_collections_body(name_filter, max_results, next_token);
        let resp: ListCollectionsResponse = self
            .call(
                "ListCollections",
                "OpenSearchServerless.ListCollections",
                &body,
            )
            .await?;
        Ok(Page {
            items: resp
                .collection_summaries
                .into_iter()
                .map(Into::into)
                .collect(),
            next_token: resp.next_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_body_requests_vector_search() {
        let body = create_collection_body("bedrock-vectordb-rag-392", "tok");
        assert_eq!(body["type"], "VECTORSEARCH");
        assert_eq!(body["name"], "bedrock-vectordb-rag-392");
    }

    #[test]
    fn list_body_includes_filter_and_token() {
        let body = list_collections_body(Some("coll"), 15, Some("next"));
        assert_eq!(body["maxResults"], 15);
        assert_eq!(body["collectionFilters"]["name"], "coll");
        assert_eq!(body["nextToken"], "next");

        let body = list_collections_body(None, 15, None);
        assert!(body.get("collectionFilters").is_none());
        assert!(body.get("nextToken").is_none());
    }

    #[test]
    fn parses_list_response() {
        let resp: ListCollectionsResponse = serde_json::from_str(
            r#"{"collectionSummaries":[{"arn":"arn:aws:aoss:us-east-1:1:collection/abc","id":"abc","name":"coll","status":"ACTIVE"}],"nextToken":"t2"}"#,
        )
        .unwrap();
        assert_eq!(resp.collection_summaries[0].id, "abc");
        assert_eq!(resp.next_token.as_deref(), Some("t2"));
    }
}
