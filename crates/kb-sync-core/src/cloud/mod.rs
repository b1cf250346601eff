//! Cloud service abstraction for the provisioning workflow.
//!
//! One trait per remote service the workflow calls. Implementations must be
//! `Send + Sync`; the HTTP clients live in the `kb-sync` crate and the
//! [`memory`] backend serves the tests.
//!
//! | Trait | Remote service |
//! |-------|----------------|
//! | [`IdentityApi`] | caller identity |
//! | [`CollectionApi`] | vector-search collection control plane |
//! | [`IndexApi`] | vector index data plane |
//! | [`KnowledgeBaseApi`] | knowledge bases, data sources, ingestion jobs |
//! | [`MetadataSink`] | run metadata recording |
//! | [`IngestionProgress`] | ingestion polling observer |

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ApiError, SinkError};
use crate::models::{
    CallerIdentity, CollectionSummary, DataSource, DataSourceSpec, IngestionJob, KnowledgeBase,
    KnowledgeBaseSpec, Page,
};

#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn caller_identity(&self) -> Result<CallerIdentity, ApiError>;
}

#[async_trait]
pub trait CollectionApi: Send + Sync {
    /// Create a `VECTORSEARCH` collection. Fails with
    /// [`ErrorKind::Conflict`](crate::error::ErrorKind::Conflict) if the name
    /// is taken.
    async fn create_collection(&self, name: &str) -> Result<CollectionSummary, ApiError>;

    /// List collections, optionally filtered by exact name.
    async fn list_collections(
        &self,
        name_filter: Option<&str>,
        max_results: u32,
        next_token: Option<&str>,
    ) -> Result<Page<CollectionSummary>, ApiError>;
}

#[async_trait]
pub trait IndexApi: Send + Sync {
    /// Create `index_name` on the collection served at `host`, returning the
    /// service's acknowledgement body.
    async fn create_index(
        &self,
        host: &str,
        index_name: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError>;
}

#[async_trait]
pub trait KnowledgeBaseApi: Send + Sync {
    /// Create a knowledge base. `client_token` makes repeated attempts of
    /// the same logical create idempotent on the service side.
    async fn create_knowledge_base(
        &self,
        spec: &KnowledgeBaseSpec,
        client_token: &str,
    ) -> Result<KnowledgeBase, ApiError>;

    async fn list_knowledge_bases(
        &self,
        next_token: Option<&str>,
    ) -> Result<Page<KnowledgeBase>, ApiError>;

    async fn get_knowledge_base(&self, knowledge_base_id: &str)
        -> Result<KnowledgeBase, ApiError>;

    async fn create_data_source(&self, spec: &DataSourceSpec) -> Result<DataSource, ApiError>;

    async fn list_data_sources(
        &self,
        knowledge_base_id: &str,
        next_token: Option<&str>,
    ) -> Result<Page<DataSource>, ApiError>;

    async fn get_data_source(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<DataSource, ApiError>;

    async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<IngestionJob, ApiError>;

    async fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        ingestion_job_id: &str,
    ) -> Result<IngestionJob, ApiError>;
}

/// Destination for structured run metadata.
pub trait MetadataSink: Send + Sync {
    fn record(&self, key: &str, value: &serde_json::Value) -> Result<(), SinkError>;
}

/// Observer for ingestion polling. Called once with the job as started and
/// once per status fetch.
pub trait IngestionProgress: Send + Sync {
    fn report(&self, job: &IngestionJob, elapsed: Duration);
}

/// No-op observer.
pub struct NoProgress;

impl IngestionProgress for NoProgress {
    fn report(&self, _job: &IngestionJob, _elapsed: Duration) {}
}
