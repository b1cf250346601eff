//! Core data models for the provisioning and sync workflow.
//!
//! Every entity here mirrors a remote cloud resource identified by name or
//! id. The workflow holds no state of its own beyond these values, which are
//! passed from one stage to the next.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Name of the knn vector field in the index and knowledge-base mapping.
pub const VECTOR_FIELD: &str = "vector";
/// Name of the raw text field.
pub const TEXT_FIELD: &str = "text";
/// Name of the metadata field.
pub const METADATA_FIELD: &str = "text-metadata";

/// Key under which the run record is handed to a metadata sink.
pub const METADATA_KEY: &str = "bedrock_rag";

/// The principal the workflow is authenticated as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
    pub user_id: String,
}

/// A vector-search collection as reported by the collection API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub id: String,
    pub name: String,
    pub arn: String,
}

/// A provisioned vector store: collection identifiers plus the index host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VectorStore {
    pub name: String,
    pub id: String,
    pub arn: String,
    pub host: String,
    pub index_name: String,
}

/// Data-plane host for a collection id in a region.
pub fn collection_host(collection_id: &str, region: &str) -> String {
    format!("{}.{}.aoss.amazonaws.com", collection_id, region)
}

/// Fixed-schema vector index definition.
///
/// Produces the `{settings, mappings}` body for the index-create call with
/// the `vector`, `text` and `text-metadata` fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub dimension: u32,
    pub engine: String,
    pub space_type: String,
    pub ef_construction: u32,
    pub m: u32,
}

impl Default for IndexSchema {
    fn default() -> Self {
        Self {
            dimension: 1536,
            engine: "faiss".to_string(),
            space_type: "l2".to_string(),
            ef_construction: 200,
            m: 16,
        }
    }
}

impl IndexSchema {
    /// Request body for the index-create call.
    pub fn to_body(&self) -> serde_json::Value {
        json!({
            "settings": { "index.knn": "true" },
            "mappings": {
                "properties": {
                    VECTOR_FIELD: {
                        "type": "knn_vector",
                        "dimension": self.dimension,
                        "method": {
                            "name": "hnsw",
                            "engine": self.engine,
                            "space_type": self.space_type,
                            "parameters": {
                                "ef_construction": self.ef_construction,
                                "m": self.m,
                            },
                        },
                    },
                    TEXT_FIELD: { "type": "text" },
                    METADATA_FIELD: { "type": "text" },
                }
            }
        })
    }
}

/// Field mapping the knowledge base uses to read the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub vector_field: String,
    pub text_field: String,
    pub metadata_field: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            vector_field: VECTOR_FIELD.to_string(),
            text_field: TEXT_FIELD.to_string(),
            metadata_field: METADATA_FIELD.to_string(),
        }
    }
}

/// Everything needed to create a knowledge base over a vector store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBaseSpec {
    pub name: String,
    pub description: String,
    pub role_arn: String,
    pub embedding_model_arn: String,
    pub collection_arn: String,
    pub vector_index_name: String,
    pub field_mapping: FieldMapping,
}

/// Foundation-model ARN for an embedding model id in a region.
pub fn embedding_model_arn(region: &str, model_id: &str) -> String {
    format!("arn:aws:bedrock:{}::foundation-model/{}", region, model_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub role_arn: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkingStrategy {
    FixedSize,
    None,
}

impl ChunkingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkingStrategy::FixedSize => "FIXED_SIZE",
            ChunkingStrategy::None => "NONE",
        }
    }
}

impl fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chunking policy applied by the ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub strategy: ChunkingStrategy,
    pub max_tokens: u32,
    pub overlap_percentage: u32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::FixedSize,
            max_tokens: 512,
            overlap_percentage: 20,
        }
    }
}

impl ChunkingConfig {
    /// The `chunkingConfiguration` object of a data-source request.
    pub fn to_request(&self) -> serde_json::Value {
        match self.strategy {
            ChunkingStrategy::FixedSize => json!({
                "chunkingStrategy": self.strategy.as_str(),
                "fixedSizeChunkingConfiguration": {
                    "maxTokens": self.max_tokens,
                    "overlapPercentage": self.overlap_percentage,
                },
            }),
            ChunkingStrategy::None => json!({ "chunkingStrategy": self.strategy.as_str() }),
        }
    }
}

/// An object-storage data source to attach to a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceSpec {
    pub knowledge_base_id: String,
    pub name: String,
    pub description: String,
    pub bucket_arn: String,
    pub inclusion_prefixes: Vec<String>,
    pub chunking: ChunkingConfig,
    pub deletion_policy: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub id: String,
    pub knowledge_base_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
}

/// Lifecycle of an ingestion job.
///
/// `Complete` is the only success state. `Failed` and `Stopped` end the job
/// without success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionStatus {
    Starting,
    InProgress,
    Complete,
    Failed,
    Stopping,
    Stopped,
    Unknown(String),
}

impl IngestionStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "STARTING" => IngestionStatus::Starting,
            "IN_PROGRESS" => IngestionStatus::InProgress,
            "COMPLETE" => IngestionStatus::Complete,
            "FAILED" => IngestionStatus::Failed,
            "STOPPING" => IngestionStatus::Stopping,
            "STOPPED" => IngestionStatus::Stopped,
            other => IngestionStatus::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IngestionStatus::Starting => "STARTING",
            IngestionStatus::InProgress => "IN_PROGRESS",
            IngestionStatus::Complete => "COMPLETE",
            IngestionStatus::Failed => "FAILED",
            IngestionStatus::Stopping => "STOPPING",
            IngestionStatus::Stopped => "STOPPED",
            IngestionStatus::Unknown(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IngestionStatus::Complete | IngestionStatus::Failed | IngestionStatus::Stopped
        )
    }

    pub fn is_success(&self) -> bool {
        *self == IngestionStatus::Complete
    }
}

impl fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document counters reported by a running or finished ingestion job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionStatistics {
    pub documents_scanned: u64,
    pub new_documents_indexed: u64,
    pub modified_documents_indexed: u64,
    pub documents_deleted: u64,
    pub documents_failed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionJob {
    pub id: String,
    pub knowledge_base_id: String,
    pub data_source_id: String,
    pub status: IngestionStatus,
    pub statistics: Option<IngestionStatistics>,
    pub failure_reasons: Vec<String>,
}

/// One page of a paginated list call.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// Structured record of a completed sync run.
///
/// Recorded under [`METADATA_KEY`] once the ingestion job reaches
/// `COMPLETE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRecord {
    pub knowledge_base_id: String,
    pub knowledge_base_name: String,
    pub knowledge_base_description: String,
    pub data_source_id: String,
    pub data_source_name: String,
    pub data_source_description: String,
    pub ingestion_job_id: String,
    pub ingestion_job_status: String,
    pub vector_store_name: String,
    pub vector_store_id: String,
    pub chunking_strategy: String,
    pub max_tokens: u32,
    pub overlap_percentage: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_body_has_fixed_fields() {
        let body = IndexSchema::default().to_body();
        let props = &body["mappings"]["properties"];
        assert_eq!(body["settings"]["index.knn"], "true");
        assert_eq!(props["vector"]["type"], "knn_vector");
        assert_eq!(props["vector"]["dimension"], 1536);
        assert_eq!(props["vector"]["method"]["name"], "hnsw");
        assert_eq!(props["vector"]["method"]["engine"], "faiss");
        assert_eq!(props["vector"]["method"]["space_type"], "l2");
        assert_eq!(props["vector"]["method"]["parameters"]["ef_construction"], 200);
        assert_eq!(props["vector"]["method"]["parameters"]["m"], 16);
        assert_eq!(props["text"]["type"], "text");
        assert_eq!(props["text-metadata"]["type"], "text");
    }

    #[test]
    fn status_round_trips_known_values() {
        for s in ["STARTING", "IN_PROGRESS", "COMPLETE", "FAILED", "STOPPING", "STOPPED"] {
            assert_eq!(IngestionStatus::parse(s).as_str(), s);
        }
        assert_eq!(
            IngestionStatus::parse("PAUSED"),
            IngestionStatus::Unknown("PAUSED".to_string())
        );
    }

    #[test]
    fn only_complete_is_success() {
        assert!(IngestionStatus::Complete.is_terminal());
        assert!(IngestionStatus::Complete.is_success());
        assert!(IngestionStatus::Failed.is_terminal());
        assert!(!IngestionStatus::Failed.is_success());
        assert!(IngestionStatus::Stopped.is_terminal());
        assert!(!IngestionStatus::Stopping.is_terminal());
        assert!(!IngestionStatus::InProgress.is_terminal());
        assert!(!IngestionStatus::Unknown("X".into()).is_terminal());
    }

    #[test]
    fn fixed_size_chunking_request() {
        let req = ChunkingConfig::default().to_request();
        assert_eq!(req["chunkingStrategy"], "FIXED_SIZE");
        assert_eq!(req["fixedSizeChunkingConfiguration"]["maxTokens"], 512);
        assert_eq!(req["fixedSizeChunkingConfiguration"]["overlapPercentage"], 20);
    }

    #[test]
    fn field_mapping_serializes_camel_case() {
        let v = serde_json::to_value(FieldMapping::default()).unwrap();
        assert_eq!(v["vectorField"], "vector");
        assert_eq!(v["textField"], "text");
        assert_eq!(v["metadataField"], "text-metadata");
    }

    #[test]
    fn host_and_model_arn() {
        assert_eq!(
            collection_host("abc123", "us-east-1"),
            "abc123.us-east-1.aoss.amazonaws.com"
        );
        assert_eq!(
            embedding_model_arn("us-east-1", "amazon.titan-embed-text-v1"),
            "arn:aws:bedrock:us-east-1::foundation-model/amazon.titan-embed-text-v1"
        );
    }
}
