//! In-memory cloud backend for tests.
//!
//! Implements every service trait over `HashMap`s and `Vec`s behind
//! `std::sync::RwLock`. Behaves like the real services where the workflow
//! depends on it: duplicate names conflict, lists paginate, and ingestion
//! jobs walk through a scripted status sequence.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use serde_json::json;

use crate::error::{ApiError, ErrorKind, SinkError};
use crate::models::{
    CallerIdentity, CollectionSummary, DataSource, DataSourceSpec, IngestionJob, IngestionStatus,
    KnowledgeBase, KnowledgeBaseSpec, Page,
};

use super::{CollectionApi, IdentityApi, IndexApi, KnowledgeBaseApi, MetadataSink};

/// Number of calls made to each operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create_collection: u32,
    pub list_collections: u32,
    pub create_index: u32,
    pub create_knowledge_base: u32,
    pub list_knowledge_bases: u32,
    pub create_data_source: u32,
    pub start_ingestion_job: u32,
    pub get_ingestion_job: u32,
}

struct StoredJob {
    job: IngestionJob,
    pending: VecDeque<IngestionStatus>,
}

#[derive(Default)]
struct State {
    collections: Vec<CollectionSummary>,
    indexes: HashMap<String, HashMap<String, serde_json::Value>>,
    knowledge_bases: Vec<KnowledgeBase>,
    data_sources: Vec<DataSource>,
    jobs: HashMap<String, StoredJob>,
    knowledge_base_failures: VecDeque<ErrorKind>,
    ingestion_fetch_failures: VecDeque<ErrorKind>,
    calls: CallCounts,
}

/// In-memory stand-in for the whole cloud account.
pub struct InMemoryCloud {
    region: String,
    account: String,
    ingestion_script: Vec<IngestionStatus>,
    state: RwLock<State>,
}

impl InMemoryCloud {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            account: "000000000000".to_string(),
            ingestion_script: vec![
                IngestionStatus::Starting,
                IngestionStatus::InProgress,
                IngestionStatus::Complete,
            ],
            state: RwLock::new(State::default()),
        }
    }

    /// Statuses every new ingestion job reports: the first is returned by
    /// the start call, each later one by a status fetch. The last status
    /// repeats once the script is exhausted.
    pub fn with_ingestion_statuses(mut self, statuses: Vec<IngestionStatus>) -> Self {
        if !statuses.is_empty() {
            self.ingestion_script = statuses;
        }
        self
    }

    /// Make the next knowledge-base creations fail with these kinds, in order.
    pub fn fail_knowledge_base_creation(&self, kinds: &[ErrorKind]) {
        let mut state = self.state.write().unwrap();
        state.knowledge_base_failures.extend(kinds.iter().copied());
    }

    /// Make the next ingestion status fetches fail with these kinds, in order.
    pub fn fail_ingestion_fetches(&self, kinds: &[ErrorKind]) {
        let mut state = self.state.write().unwrap();
        state.ingestion_fetch_failures.extend(kinds.iter().copied());
    }

    /// Register a collection as if an earlier deployment created it.
    pub fn seed_collection(&self, name: &str) -> CollectionSummary {
        let mut state = self.state.write().unwrap();
        self.insert_collection(&mut state, name)
    }

    pub fn calls(&self) -> CallCounts {
        self.state.read().unwrap().calls.clone()
    }

    pub fn collections(&self) -> Vec<CollectionSummary> {
        self.state.read().unwrap().collections.clone()
    }

    /// Index names created on the collection served at `host`.
    pub fn indexes(&self, host: &str) -> Vec<String> {
        let state = self.state.read().unwrap();
        let mut names: Vec<String> = state
            .indexes
            .get(host)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn knowledge_bases(&self) -> Vec<KnowledgeBase> {
        self.state.read().unwrap().knowledge_bases.clone()
    }

    pub fn data_sources(&self) -> Vec<DataSource> {
        self.state.read().unwrap().data_sources.clone()
    }

    fn insert_collection(&self, state: &mut State, name: &str) -> CollectionSummary {
        let id = format!("memcoll{:04}", state.collections.len() + 1);
        let summary = CollectionSummary {
            arn: format!(
                "arn:aws:aoss:{}:{}:collection/{}",
                self.region, self.account, id
            ),
            id,
            name: name.to_string(),
        };
        state.collections.push(summary.clone());
        summary
    }
}

fn paginate<T: Clone>(items: &[T], max_results: usize, next_token: Option<&str>) -> Page<T> {
    let start = next_token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
    let end = (start + max_results.max(1)).min(items.len());
    let slice = items.get(start..end).unwrap_or(&[]).to_vec();
    let next_token = (end < items.len()).then(|| end.to_string());
    Page {
        items: slice,
        next_token,
    }
}

fn not_found(operation: &'static str, what: &str) -> ApiError {
    ApiError::new(
        "memory",
        operation,
        ErrorKind::NotFound,
        format!("{} does not exist", what),
    )
}

#[async_trait]
impl IdentityApi for InMemoryCloud {
    async fn caller_identity(&self) -> Result<CallerIdentity, ApiError> {
        Ok(CallerIdentity {
            account: self.account.clone(),
            arn: format!("arn:aws:iam::{}:user/memory", self.account),
            user_id: "AIDAMEMORY".to_string(),
        })
    }
}

#[async_trait]
impl CollectionApi for InMemoryCloud {
    async fn create_collection(&self, name: &str) -> Result<CollectionSummary, ApiError> {
        let mut state = self.state.write().unwrap();
        state.calls.create_collection += 1;
        if state.collections.iter().any(|c| c.name == name) {
            return Err(ApiError::new(
                "memory",
                "CreateCollection",
                ErrorKind::Conflict,
                format!("collection {} already exists", name),
            ));
        }
        Ok(self.insert_collection(&mut state, name))
    }

    async fn list_collections(
        &self,
        name_filter: Option<&str>,
        max_results: u32,
        next_token: Option<&str>,
    ) -> Result<Page<CollectionSummary>, ApiError> {
        let mut state = self.state.write().unwrap();
        state.calls.list_collections += 1;
        let matching: Vec<CollectionSummary> = state
            .collections
            .iter()
            .filter(|c| name_filter.map_or(true, |n| c.name == n))
            .cloned()
            .collect();
        Ok(paginate(&matching, max_results as usize, next_token))
    }
}

#[async_trait]
impl IndexApi for InMemoryCloud {
    async fn create_index(
        &self,
        host: &str,
        index_name: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let mut state = self.state.write().unwrap();
        state.calls.create_index += 1;
        let indexes = state.indexes.entry(host.to_string()).or_default();
        if indexes.contains_key(index_name) {
            return Err(ApiError::new(
                "memory",
                "CreateIndex",
                ErrorKind::Conflict,
                format!(
                    "resource_already_exists_exception: index [{}] already exists",
                    index_name
                ),
            ));
        }
        indexes.insert(index_name.to_string(), body.clone());
        Ok(json!({
            "acknowledged": true,
            "shards_acknowledged": true,
            "index": index_name,
        }))
    }
}

#[async_trait]
impl KnowledgeBaseApi for InMemoryCloud {
    async fn create_knowledge_base(
        &self,
        spec: &KnowledgeBaseSpec,
        _client_token: &str,
    ) -> Result<KnowledgeBase, ApiError> {
        let mut state = self.state.write().unwrap();
        state.calls.create_knowledge_base += 1;
        if let Some(kind) = state.knowledge_base_failures.pop_front() {
            return Err(ApiError::new(
                "memory",
                "CreateKnowledgeBase",
                kind,
                "injected failure",
            ));
        }
        if state.knowledge_bases.iter().any(|kb| kb.name == spec.name) {
            return Err(ApiError::new(
                "memory",
                "CreateKnowledgeBase",
                ErrorKind::Conflict,
                format!("knowledge base {} already exists", spec.name),
            ));
        }
        let kb = KnowledgeBase {
            id: format!("MEMKB{:05}", state.knowledge_bases.len() + 1),
            name: spec.name.clone(),
            description: Some(spec.description.clone()),
            role_arn: Some(spec.role_arn.clone()),
            status: "ACTIVE".to_string(),
        };
        state.knowledge_bases.push(kb.clone());
        Ok(kb)
    }

    async fn list_knowledge_bases(
        &self,
        next_token: Option<&str>,
    ) -> Result<Page<KnowledgeBase>, ApiError> {
        let mut state = self.state.write().unwrap();
        state.calls.list_knowledge_bases += 1;
        Ok(paginate(&state.knowledge_bases, 10, next_token))
    }

    async fn get_knowledge_base(
        &self,
        knowledge_base_id: &str,
    ) -> Result<KnowledgeBase, ApiError> {
        let state = self.state.read().unwrap();
        state
            .knowledge_bases
            .iter()
            .find(|kb| kb.id == knowledge_base_id)
            .cloned()
            .ok_or_else(|| not_found("GetKnowledgeBase", knowledge_base_id))
    }

    async fn create_data_source(&self, spec: &DataSourceSpec) -> Result<DataSource, ApiError> {
        let mut state = self.state.write().unwrap();
        state.calls.create_data_source += 1;
        if !state
            .knowledge_bases
            .iter()
            .any(|kb| kb.id == spec.knowledge_base_id)
        {
            return Err(not_found("CreateDataSource", &spec.knowledge_base_id));
        }
        if state
            .data_sources
            .iter()
            .any(|ds| ds.knowledge_base_id == spec.knowledge_base_id && ds.name == spec.name)
        {
            return Err(ApiError::new(
                "memory",
                "CreateDataSource",
                ErrorKind::Conflict,
                format!("data source {} already exists", spec.name),
            ));
        }
        let ds = DataSource {
            id: format!("MEMDS{:05}", state.data_sources.len() + 1),
            knowledge_base_id: spec.knowledge_base_id.clone(),
            name: spec.name.clone(),
            description: Some(spec.description.clone()),
            status: "AVAILABLE".to_string(),
        };
        state.data_sources.push(ds.clone());
        Ok(ds)
    }

    async fn list_data_sources(
        &self,
        knowledge_base_id: &str,
        next_token: Option<&str>,
    ) -> Result<Page<DataSource>, ApiError> {
        let state = self.state.read().unwrap();
        let matching: Vec<DataSource> = state
            .data_sources
            .iter()
            .filter(|ds| ds.knowledge_base_id == knowledge_base_id)
            .cloned()
            .collect();
        Ok(paginate(&matching, 10, next_token))
    }

    async fn get_data_source(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<DataSource, ApiError> {
        let state = self.state.read().unwrap();
        state
            .data_sources
            .iter()
            .find(|ds| ds.knowledge_base_id == knowledge_base_id && ds.id == data_source_id)
            .cloned()
            .ok_or_else(|| not_found("GetDataSource", data_source_id))
    }

    async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<IngestionJob, ApiError> {
        let mut state = self.state.write().unwrap();
        state.calls.start_ingestion_job += 1;
        if !state
            .data_sources
            .iter()
            .any(|ds| ds.knowledge_base_id == knowledge_base_id && ds.id == data_source_id)
        {
            return Err(not_found("StartIngestionJob", data_source_id));
        }
        let mut pending: VecDeque<IngestionStatus> = self.ingestion_script.iter().cloned().collect();
        let first = pending.pop_front().unwrap_or(IngestionStatus::Complete);
        let job = IngestionJob {
            id: format!("MEMJOB{:05}", state.jobs.len() + 1),
            knowledge_base_id: knowledge_base_id.to_string(),
            data_source_id: data_source_id.to_string(),
            failure_reasons: failure_reasons(&first),
            status: first,
            statistics: None,
        };
        state.jobs.insert(
            job.id.clone(),
            StoredJob {
                job: job.clone(),
                pending,
            },
        );
        Ok(job)
    }

    async fn get_ingestion_job(
        &self,
        _knowledge_base_id: &str,
        _data_source_id: &str,
        ingestion_job_id: &str,
    ) -> Result<IngestionJob, ApiError> {
        let mut state = self.state.write().unwrap();
        state.calls.get_ingestion_job += 1;
        if let Some(kind) = state.ingestion_fetch_failures.pop_front() {
            return Err(ApiError::new(
                "memory",
                "GetIngestionJob",
                kind,
                "injected failure",
            ));
        }
        let stored = state
            .jobs
            .get_mut(ingestion_job_id)
            .ok_or_else(|| not_found("GetIngestionJob", ingestion_job_id))?;
        if let Some(next) = stored.pending.pop_front() {
            stored.job.failure_reasons = failure_reasons(&next);
            stored.job.status = next;
        }
        Ok(stored.job.clone())
    }
}

fn failure_reasons(status: &IngestionStatus) -> Vec<String> {
    match status {
        IngestionStatus::Failed => vec!["simulated ingestion failure".to_string()],
        _ => Vec::new(),
    }
}

/// Metadata sink that keeps every record in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, serde_json::Value)> {
        self.records.lock().unwrap().clone()
    }
}

impl MetadataSink for MemorySink {
    fn record(&self, key: &str, value: &serde_json::Value) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap()
            .push((key.to_string(), value.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_collection_conflicts() {
        let cloud = InMemoryCloud::new("us-east-1");
        cloud.create_collection("alpha").await.unwrap();
        let err = cloud.create_collection("alpha").await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(cloud.collections().len(), 1);
    }

    #[tokio::test]
    async fn list_collections_paginates() {
        let cloud = InMemoryCloud::new("us-east-1");
        for name in ["a-one", "a-two", "a-three"] {
            cloud.seed_collection(name);
        }
        let first = cloud.list_collections(None, 2, None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        let token = first.next_token.expect("second page");
        let second = cloud.list_collections(None, 2, Some(&token)).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn ingestion_script_repeats_last_status() {
        let cloud = InMemoryCloud::new("us-east-1")
            .with_ingestion_statuses(vec![IngestionStatus::Starting, IngestionStatus::Complete]);
        let spec = KnowledgeBaseSpec {
            name: "kb".into(),
            description: "d".into(),
            role_arn: "arn:aws:iam::0:role/r".into(),
            embedding_model_arn: "m".into(),
            collection_arn: "c".into(),
            vector_index_name: "i".into(),
            field_mapping: Default::default(),
        };
        let kb = cloud.create_knowledge_base(&spec, "t").await.unwrap();
        let ds = cloud
            .create_data_source(&DataSourceSpec {
                knowledge_base_id: kb.id.clone(),
                name: "ds".into(),
                description: "d".into(),
                bucket_arn: "arn:aws:s3:::b".into(),
                inclusion_prefixes: vec![],
                chunking: Default::default(),
                deletion_policy: "DELETE".into(),
            })
            .await
            .unwrap();
        let job = cloud.start_ingestion_job(&kb.id, &ds.id).await.unwrap();
        assert_eq!(job.status, IngestionStatus::Starting);
        for _ in 0..3 {
            let job = cloud.get_ingestion_job(&kb.id, &ds.id, &job.id).await.unwrap();
            assert_eq!(job.status, IngestionStatus::Complete);
        }
    }
}
