//! Bedrock Agent (knowledge bases, data sources, ingestion jobs) and
//! Bedrock Agent Runtime (`Retrieve`).
//!
//! Both are REST JSON APIs signed with service name `bedrock`.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | CreateKnowledgeBase | `PUT /knowledgebases/` |
//! | ListKnowledgeBases | `POST /knowledgebases/` |
//! | GetKnowledgeBase | `GET /knowledgebases/{kb}` |
//! | CreateDataSource | `PUT /knowledgebases/{kb}/datasources/` |
//! | ListDataSources | `POST /knowledgebases/{kb}/datasources/` |
//! | GetDataSource | `GET /knowledgebases/{kb}/datasources/{ds}` |
//! | StartIngestionJob | `PUT /knowledgebases/{kb}/datasources/{ds}/ingestionjobs/` |
//! | GetIngestionJob | `GET /knowledgebases/{kb}/datasources/{ds}/ingestionjobs/{job}` |
//! | Retrieve | `POST /knowledgebases/{kb}/retrieve` (runtime endpoint) |

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use kb_sync_core::cloud::KnowledgeBaseApi;
use kb_sync_core::error::ApiError;
use kb_sync_core::models::{
    DataSource, DataSourceSpec, IngestionJob, IngestionStatistics, IngestionStatus, KnowledgeBase,
    KnowledgeBaseSpec, Page,
};

use super::sigv4::uri_encode;
use super::ServiceClient;

const LIST_PAGE_SIZE: u32 = 100;

// ═══════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KnowledgeBaseWire {
    knowledge_base_id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    role_arn: Option<String>,
    #[serde(default)]
    status: String,
}

impl From<KnowledgeBaseWire> for KnowledgeBase {
    fn from(w: KnowledgeBaseWire) -> Self {
        KnowledgeBase {
            id: w.knowledge_base_id,
            name: w.name,
            description: w.description,
            role_arn: w.role_arn,
            status: w.status,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KnowledgeBaseEnvelope {
    knowledge_base: KnowledgeBaseWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KnowledgeBaseList {
    #[serde(default)]
    knowledge_base_summaries: Vec<KnowledgeBaseWire>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataSourceWire {
    data_source_id: String,
    knowledge_base_id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: String,
}

impl From<DataSourceWire> for DataSource {
    fn from(w: DataSourceWire) -> Self {
        DataSource {
            id: w.data_source_id,
            knowledge_base_id: w.knowledge_base_id,
            name: w.name,
            description: w.description,
            status: w.status,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataSourceEnvelope {
    data_source: DataSourceWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataSourceList {
    #[serde(default)]
    data_source_summaries: Vec<DataSourceWire>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatisticsWire {
    #[serde(default)]
    number_of_documents_scanned: u64,
    #[serde(default)]
    number_of_new_documents_indexed: u64,
    #[serde(default)]
    number_of_modified_documents_indexed: u64,
    #[serde(default)]
    number_of_documents_deleted: u64,
    #[serde(default)]
    number_of_documents_failed: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionJobWire {
    ingestion_job_id: String,
    knowledge_base_id: String,
    data_source_id: String,
    status: String,
    #[serde(default)]
    statistics: Option<StatisticsWire>,
    #[serde(default)]
    failure_reasons: Vec<String>,
}

impl From<IngestionJobWire> for IngestionJob {
    fn from(w: IngestionJobWire) -> Self {
        IngestionJob {
            id: w.ingestion_job_id,
            knowledge_base_id: w.knowledge_base_id,
            data_source_id: w.data_source_id,
            status: IngestionStatus::parse(&w.status),
            statistics: w.statistics.map(|s| IngestionStatistics {
                documents_scanned: s.number_of_documents_scanned,
                new_documents_indexed: s.number_of_new_documents_indexed,
                modified_documents_indexed: s.number_of_modified_documents_indexed,
                documents_deleted: s.number_of_documents_deleted,
                documents_failed: s.number_of_documents_failed,
            }),
            failure_reasons: w.failure_reasons,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionJobEnvelope {
    ingestion_job: IngestionJobWire,
}

// ═══════════════════════════════════════════════════════════════════════
// Request bodies
// ═══════════════════════════════════════════════════════════════════════

pub(crate) fn create_knowledge_base_body(
    spec: &KnowledgeBaseSpec,
    client_token: &str,
) -> serde_json::Value {
    json!({
        "clientToken": client_token,
        "name": spec.name,
        "description": spec.description,
        "roleArn": spec.role_arn,
        "knowledgeBaseConfiguration": {
            "type": "VECTOR",
            "vectorKnowledgeBaseConfiguration": {
                "embeddingModelArn": spec.embedding_model_arn,
            },
        },
        "storageConfiguration": {
            "type": "OPENSEARCH_SERVERLESS",
            "opensearchServerlessConfiguration": {
                "collectionArn": spec.collection_arn,
                "vectorIndexName": spec.vector_index_name,
                "fieldMapping": spec.field_mapping,
            },
        },
    })
}

pub(crate) fn create_data_source_body(spec: &DataSourceSpec, client_token: &str) -> serde_json::Value {
    let mut s3 = json!({ "bucketArn": spec.bucket_arn });
    if !spec.inclusion_prefixes.is_empty() {
        s3["inclusionPrefixes"] = json!(spec.inclusion_prefixes);
    }
    json!({
        "clientToken": client_token,
        "name": spec.name,
        "description": spec.description,
        "dataDeletionPolicy": spec.deletion_policy,
        "dataSourceConfiguration": {
            "type": "S3",
            "s3Configuration": s3,
        },
        "vectorIngestionConfiguration": {
            "chunkingConfiguration": spec.chunking.to_request(),
        },
    })
}

fn list_body(next_token: Option<&str>) -> serde_json::Value {
    let mut body = json!({ "maxResults": LIST_PAGE_SIZE });
    if let Some(token) = next_token {
        body["nextToken"] = json!(token);
    }
    body
}

// ═══════════════════════════════════════════════════════════════════════
// Bedrock Agent
// ═══════════════════════════════════════════════════════════════════════

pub struct BedrockAgentClient {
    client: ServiceClient,
    endpoint: String,
}

impl BedrockAgentClient {
    pub fn new(client: ServiceClient, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}

fn kb_path(knowledge_base_id: &str) -> String {
    format!("/knowledgebases/{}", uri_encode(knowledge_base_id))
}

fn ds_path(knowledge_base_id: &str, data_source_id: &str) -> String {
    format!(
        "{}/datasources/{}",
        kb_path(knowledge_base_id),
        uri_encode(data_source_id)
    )
}

#[async_trait]
impl KnowledgeBaseApi for BedrockAgentClient {
    async fn create_knowledge_base(
        &self,
        spec: &KnowledgeBaseSpec,
        client_token: &str,
    ) -> Result<KnowledgeBase, ApiError> {
        let body = create_knowledge_base_body(spec, client_token);
        let resp: KnowledgeBaseEnvelope = self
            .client
            .send_json(
                "CreateKnowledgeBase",
                Method::PUT,
                &self.url("/knowledgebases/"),
                &[],
                Some(&body),
            )
            .await?;
        Ok(resp.knowledge_base.into())
    }

    async fn list_knowledge_bases(
        &self,
        next_token: Option<&str>,
    ) -> Result<Page<KnowledgeBase>, ApiError> {
        let resp: KnowledgeBaseList = self
            .client
            .send_json(
                "ListKnowledgeBases",
                Method::POST,
                &self.url("/knowledgebases/"),
                &[],
                Some(&list_body(next_token)),
            )
            .await?;
        Ok(Page {
            items: resp
                .knowledge_base_summaries
                .into_iter()
                .map(Into::into)
                .collect(),
            next_token: resp.next_token,
        })
    }

    async fn get_knowledge_base(
        &self,
        knowledge_base_id: &str,
    ) -> Result<KnowledgeBase, ApiError> {
        let resp: KnowledgeBaseEnvelope = self
            .client
            .send_json(
                "GetKnowledgeBase",
                Method::GET,
                &self.url(&kb_path(knowledge_base_id)),
                &[],
                None,
            )
            .await?;
        Ok(resp.knowledge_base.into())
    }

    async fn create_data_source(&self, spec: &DataSourceSpec) -> Result<DataSource, ApiError> {
        let body = create_data_source_body(spec, &Uuid::new_v4().to_string());
        let path = format!("{}/datasources/", kb_path(&spec.knowledge_base_id));
        let resp: DataSourceEnvelope = self
            .client
            .send_json(
                "CreateDataSource",
                Method::PUT,
                &self.url(&path),
                &[],
                Some(&body),
            )
            .await?;
        Ok(resp.data_source.into())
    }

    async fn list_data_sources(
        &self,
        knowledge_base_id: &str,
        next_token: Option<&str>,
    ) -> Result<Page<DataSource>, ApiError> {
        let path = format!("{}/datasources/", kb_path(knowledge_base_id));
        let resp: DataSourceList = self
            .client
            .send_json(
                "ListDataSources",
                Method::POST,
                &self.url(&path),
                &[],
                Some(&list_body(next_token)),
            )
            .await?;
        Ok(Page {
            items: resp
                .data_source_summaries
                .into_iter()
                .map(Into::into)
                .collect(),
            next_token: resp.next_token,
        })
    }

    async fn get_data_source(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<DataSource, ApiError> {
        let resp: DataSourceEnvelope = self
            .client
            .send_json(
                "GetDataSource",
                Method::GET,
                &self.url(&ds_path(knowledge_base_id, data_source_id)),
                &[],
                None,
            )
            .await?;
        Ok(resp.data_source.into())
    }

    async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<IngestionJob, ApiError> {
        let path = format!(
            "{}/ingestionjobs/",
            ds_path(knowledge_base_id, data_source_id)
        );
        let body = json!({ "clientToken": Uuid::new_v4().to_string() });
        let resp: IngestionJobEnvelope = self
            .client
            .send_json(
                "StartIngestionJob",
                Method::PUT,
                &self.url(&path),
                &[],
                Some(&body),
            )
            .await?;
        Ok(resp.ingestion_job.into())
    }

    async fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        ingestion_job_id: &str,
    ) -> Result<IngestionJob, ApiError> {
        let path = format!(
            "{}/ingestionjobs/{}",
            ds_path(knowledge_base_id, data_source_id),
            uri_encode(ingestion_job_id)
        );
        let resp: IngestionJobEnvelope = self
            .client
            .send_json("GetIngestionJob", Method::GET, &self.url(&path), &[], None)
            .await?;
        Ok(resp.ingestion_job.into())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Bedrock Agent Runtime
// ═══════════════════════════════════════════════════════════════════════

/// One ranked passage returned by `Retrieve`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub score: Option<f64>,
    /// Source document URI, when the service reports one.
    pub location: Option<String>,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    retrieval_results: Vec<RetrievalResultWire>,
}

#[derive(Debug, Deserialize)]
struct RetrievalResultWire {
    content: ContentWire,
    #[serde(default)]
    location: Option<serde_json::Value>,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ContentWire {
    text: String,
}

/// Pull a URI out of a `location` object of any supported type.
fn location_uri(location: &serde_json::Value) -> Option<String> {
    ["/s3Location/uri", "/webLocation/url", "/confluenceLocation/url"]
        .iter()
        .find_map(|p| location.pointer(p).and_then(|v| v.as_str()))
        .map(str::to_string)
}

pub(crate) fn retrieve_body(query: &str, limit: u32) -> serde_json::Value {
    json!({
        "retrievalQuery": { "text": query },
        "retrievalConfiguration": {
            "vectorSearchConfiguration": { "numberOfResults": limit },
        },
    })
}

pub struct BedrockRuntimeClient {
    client: ServiceClient,
    endpoint: String,
}

impl BedrockRuntimeClient {
    pub fn new(client: ServiceClient, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    pub async fn retrieve(
        &self,
        knowledge_base_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<RetrievalResult>, ApiError> {
        let url = format!("{}{}/retrieve", self.endpoint, kb_path(knowledge_base_id));
        let resp: RetrieveResponse = self
            .client
            .send_json(
                "Retrieve",
                Method::POST,
                &url,
                &[],
                Some(&retrieve_body(query, limit)),
            )
            .await?;
        Ok(resp
            .retrieval_results
            .into_iter()
            .map(|r| RetrievalResult {
                score: r.score,
                location: r.location.as_ref().and_then(location_uri),
                text: r.content.text,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_sync_core::models::{ChunkingConfig, FieldMapping};

    fn kb_spec() -> KnowledgeBaseSpec {
        KnowledgeBaseSpec {
            name: "bedrock-sample-knowledge-base-392".into(),
            description: "Bedrock RAG".into(),
            role_arn: "arn:aws:iam::1:role/kb".into(),
            embedding_model_arn:
                "arn:aws:bedrock:us-east-1::foundation-model/amazon.titan-embed-text-v1".into(),
            collection_arn: "arn:aws:aoss:us-east-1:1:collection/abc".into(),
            vector_index_name: "bedrock-vectordb-rag-index-392".into(),
            field_mapping: FieldMapping::default(),
        }
    }

    #[test]
    fn knowledge_base_body_uses_index_and_field_mapping() {
        let body = create_knowledge_base_body(&kb_spec(), "tok");
        let oss = &body["storageConfiguration"]["opensearchServerlessConfiguration"];
        assert_eq!(body["storageConfiguration"]["type"], "OPENSEARCH_SERVERLESS");
        assert_eq!(oss["vectorIndexName"], "bedrock-vectordb-rag-index-392");
        assert_eq!(oss["fieldMapping"]["vectorField"], "vector");
        assert_eq!(oss["fieldMapping"]["metadataField"], "text-metadata");
        assert_eq!(
            body["knowledgeBaseConfiguration"]["vectorKnowledgeBaseConfiguration"]
                ["embeddingModelArn"],
            "arn:aws:bedrock:us-east-1::foundation-model/amazon.titan-embed-text-v1"
        );
        assert_eq!(body["clientToken"], "tok");
    }

    #[test]
    fn data_source_body_carries_chunking() {
        let spec = DataSourceSpec {
            knowledge_base_id: "KB1".into(),
            name: "ds".into(),
            description: "d".into(),
            bucket_arn: "arn:aws:s3:::bedrock-zenml-rag-docs".into(),
            inclusion_prefixes: vec![],
            chunking: ChunkingConfig::default(),
            deletion_policy: "DELETE".into(),
        };
        let body = create_data_source_body(&spec, "tok");
        let s3 = &body["dataSourceConfiguration"]["s3Configuration"];
        assert_eq!(s3["bucketArn"], "arn:aws:s3:::bedrock-zenml-rag-docs");
        assert!(s3.get("inclusionPrefixes").is_none());
        assert_eq!(body["dataDeletionPolicy"], "DELETE");
        let chunking = &body["vectorIngestionConfiguration"]["chunkingConfiguration"];
        assert_eq!(chunking["chunkingStrategy"], "FIXED_SIZE");
        assert_eq!(chunking["fixedSizeChunkingConfiguration"]["maxTokens"], 512);
        assert_eq!(chunking["fixedSizeChunkingConfiguration"]["overlapPercentage"], 20);
    }

    #[test]
    fn parses_ingestion_job() {
        let env: IngestionJobEnvelope = serde_json::from_str(
            r#"{"ingestionJob":{"ingestionJobId":"J1","knowledgeBaseId":"KB1","dataSourceId":"DS1",
                "status":"FAILED","startedAt":"2024-01-01T00:00:00Z",
                "statistics":{"numberOfDocumentsScanned":12,"numberOfDocumentsFailed":2},
                "failureReasons":["Access denied to s3://bucket"]}}"#,
        )
        .unwrap();
        let job: IngestionJob = env.ingestion_job.into();
        assert_eq!(job.status, IngestionStatus::Failed);
        let stats = job.statistics.unwrap();
        assert_eq!(stats.documents_scanned, 12);
        assert_eq!(stats.documents_failed, 2);
        assert_eq!(job.failure_reasons.len(), 1);
    }

    #[test]
    fn parses_knowledge_base_summaries() {
        let list: KnowledgeBaseList = serde_json::from_str(
            r#"{"knowledgeBaseSummaries":[{"knowledgeBaseId":"KB1","name":"kb","status":"ACTIVE","updatedAt":"2024-01-01T00:00:00Z"}]}"#,
        )
        .unwrap();
        assert!(list.next_token.is_none());
        let kb: KnowledgeBase = list.knowledge_base_summaries.into_iter().next().unwrap().into();
        assert_eq!(kb.id, "KB1");
        assert_eq!(kb.description, None);
    }

    #[test]
    fn parses_retrieve_results() {
        let resp: RetrieveResponse = serde_json::from_str(
            r#"{"retrievalResults":[{"content":{"text":"ZenML pipelines"},
                "location":{"type":"S3","s3Location":{"uri":"s3://docs/a.md"}},"score":0.71}]}"#,
        )
        .unwrap();
        let r = &resp.retrieval_results[0];
        assert_eq!(r.content.text, "ZenML pipelines");
        assert_eq!(
            r.location.as_ref().and_then(location_uri).as_deref(),
            Some("s3://docs/a.md")
        );
        assert_eq!(retrieve_body("q", 5)["retrievalConfiguration"]["vectorSearchConfiguration"]["numberOfResults"], 5);
    }
}
