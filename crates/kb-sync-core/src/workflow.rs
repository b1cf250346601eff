//! The staged provisioning-and-sync workflow.
//!
//! ```text
//! identity ─▶ collection ─▶ index ─▶ knowledge base ─▶ data source ─▶ ingestion ─▶ record
//! ```
//!
//! Stages run strictly in order and every one of them is safe to rerun:
//! a second [`Workflow::run`] against the same account reuses what the
//! first created instead of failing on duplicates.
//!
//! Service clients are injected through [`CloudServices`] for the lifetime
//! of one run.

use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::cloud::{
    CollectionApi, IdentityApi, IndexApi, IngestionProgress, KnowledgeBaseApi, MetadataSink,
};
use crate::error::{SinkError, WorkflowError};
use crate::ingest::{ensure_data_source, ensure_knowledge_base, wait_for_ingestion, PollSettings};
use crate::models::{
    embedding_model_arn, CallerIdentity, ChunkingConfig, DataSource, DataSourceSpec, FieldMapping,
    IndexSchema, IngestionJob, KnowledgeBase, KnowledgeBaseSpec, SyncRecord, VectorStore,
    METADATA_KEY,
};
use crate::naming::ResourceNames;
use crate::provision::{ensure_collection, ensure_index};
use crate::retry::RetryPolicy;

/// The object-storage side of the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceSettings {
    pub bucket: String,
    pub inclusion_prefixes: Vec<String>,
    pub description: String,
    pub chunking: ChunkingConfig,
    pub deletion_policy: String,
}

impl DataSourceSettings {
    pub fn bucket_arn(&self) -> String {
        format!("arn:aws:s3:::{}", self.bucket)
    }
}

/// Everything a run needs besides the service clients.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub region: String,
    pub names: ResourceNames,
    pub index_schema: IndexSchema,
    /// `maxResults` for the collection lookup after a conflict.
    pub collection_page_size: u32,
    /// Delay before calls whose target was just created.
    pub settle: Duration,
    pub knowledge_base_description: String,
    pub role_arn: String,
    pub embedding_model: String,
    pub data_source: DataSourceSettings,
    pub poll: PollSettings,
    pub retry: RetryPolicy,
}

impl WorkflowSettings {
    /// The knowledge-base create request for a provisioned store.
    pub fn knowledge_base_spec(&self, store: &VectorStore) -> KnowledgeBaseSpec {
        KnowledgeBaseSpec {
            name: self.names.knowledge_base.clone(),
            description: self.knowledge_base_description.clone(),
            role_arn: self.role_arn.clone(),
            embedding_model_arn: embedding_model_arn(&self.region, &self.embedding_model),
            collection_arn: store.arn.clone(),
            vector_index_name: store.index_name.clone(),
            field_mapping: FieldMapping::default(),
        }
    }

    /// The data-source create request for a knowledge base.
    pub fn data_source_spec(&self, knowledge_base_id: &str) -> DataSourceSpec {
        DataSourceSpec {
            knowledge_base_id: knowledge_base_id.to_string(),
            name: self.names.data_source.clone(),
            description: self.data_source.description.clone(),
            bucket_arn: self.data_source.bucket_arn(),
            inclusion_prefixes: self.data_source.inclusion_prefixes.clone(),
            chunking: self.data_source.chunking,
            deletion_policy: self.data_source.deletion_policy.clone(),
        }
    }
}

/// Borrowed service clients for one run.
#[derive(Clone, Copy)]
pub struct CloudServices<'a> {
    pub identity: &'a dyn IdentityApi,
    pub collections: &'a dyn CollectionApi,
    pub indexes: &'a dyn IndexApi,
    pub knowledge_bases: &'a dyn KnowledgeBaseApi,
}

impl<'a> CloudServices<'a> {
    /// Use one backend for every service.
    pub fn uniform<B>(backend: &'a B) -> Self
    where
        B: IdentityApi + CollectionApi + IndexApi + KnowledgeBaseApi,
    {
        Self {
            identity: backend,
            collections: backend,
            indexes: backend,
            knowledge_bases: backend,
        }
    }
}

/// Result of the knowledge-base and ingestion stage.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub knowledge_base: KnowledgeBase,
    pub data_source: DataSource,
    pub job: IngestionJob,
    pub record: SyncRecord,
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub identity: CallerIdentity,
    pub store: VectorStore,
    /// `false` when the index already existed.
    pub index_created: bool,
    pub sync: SyncOutcome,
}

/// Summary of the provisioning stages, for display.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub store: VectorStore,
    pub index_created: bool,
}

pub struct Workflow<'a> {
    services: CloudServices<'a>,
    settings: &'a WorkflowSettings,
    sink: &'a dyn MetadataSink,
    progress: &'a dyn IngestionProgress,
}

impl<'a> Workflow<'a> {
    pub fn new(
        services: CloudServices<'a>,
        settings: &'a WorkflowSettings,
        sink: &'a dyn MetadataSink,
        progress: &'a dyn IngestionProgress,
    ) -> Self {
        Self {
            services,
            settings,
            sink,
            progress,
        }
    }

    /// Stage 1: who are we running as.
    pub async fn resolve_identity(&self) -> Result<CallerIdentity, WorkflowError> {
        let identity = self.services.identity.caller_identity().await?;
        info!(account = %identity.account, arn = %identity.arn, "resolved caller identity");
        Ok(identity)
    }

    /// Stages 2 and 3: collection and index.
    pub async fn provision(&self) -> Result<ProvisionReport, WorkflowError> {
        let s = self.settings;
        let store = ensure_collection(
            self.services.collections,
            &s.names.vector_store,
            &s.names.index,
            &s.region,
            s.collection_page_size,
        )
        .await?;
        let created = ensure_index(self.services.indexes, &store, &s.index_schema, s.settle).await?;
        Ok(ProvisionReport {
            store,
            index_created: created.is_some(),
        })
    }

    /// Stage 4: knowledge base, data source, ingestion, metadata.
    pub async fn sync(&self, store: &VectorStore) -> Result<SyncOutcome, WorkflowError> {
        let s = self.settings;
        let api = self.services.knowledge_bases;

        info!("setting up knowledge base configuration");
        let kb = ensure_knowledge_base(api, &s.knowledge_base_spec(store), &s.retry).await?;

        let ds_spec = s.data_source_spec(&kb.id);
        let ds = ensure_data_source(api, &ds_spec).await?;

        if !s.settle.is_zero() {
            tokio::time::sleep(s.settle).await;
        }

        info!(knowledge_base = %kb.id, data_source = %ds.id, "starting ingestion job");
        let job = api.start_ingestion_job(&kb.id, &ds.id).await?;
        let job = wait_for_ingestion(api, job, &s.poll, &s.retry, self.progress).await?;

        let record = SyncRecord {
            knowledge_base_id: kb.id.clone(),
            knowledge_base_name: kb.name.clone(),
            knowledge_base_description: kb
                .description
                .clone()
                .unwrap_or_else(|| s.knowledge_base_description.clone()),
            data_source_id: ds.id.clone(),
            data_source_name: ds.name.clone(),
            data_source_description: ds_spec.description.clone(),
            ingestion_job_id: job.id.clone(),
            ingestion_job_status: job.status.to_string(),
            vector_store_name: store.name.clone(),
            vector_store_id: store.id.clone(),
            chunking_strategy: ds_spec.chunking.strategy.to_string(),
            max_tokens: ds_spec.chunking.max_tokens,
            overlap_percentage: ds_spec.chunking.overlap_percentage,
        };
        let value = serde_json::to_value(&record).map_err(SinkError::from)?;
        self.sink.record(METADATA_KEY, &value)?;

        Ok(SyncOutcome {
            knowledge_base: kb,
            data_source: ds,
            job,
            record,
        })
    }

    /// All stages in order.
    pub async fn run(&self) -> Result<RunReport, WorkflowError> {
        info!("starting creation of knowledge base and synchronization");
        let identity = self.resolve_identity().await?;
        let provisioned = self.provision().await?;
        let sync = self.sync(&provisioned.store).await?;
        Ok(RunReport {
            identity,
            store: provisioned.store,
            index_created: provisioned.index_created,
            sync,
        })
    }
}
