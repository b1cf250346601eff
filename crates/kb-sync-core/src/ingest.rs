//! Knowledge base, data source and ingestion orchestration.
//!
//! The knowledge base is always create-or-reuse: it is looked up by name
//! first and only created when absent, through the retry policy. Data
//! sources are created per run and reused by name when the service reports
//! a conflict. Ingestion jobs are polled on a fixed interval until they
//! reach a terminal status or the wait budget runs out.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::cloud::{IngestionProgress, KnowledgeBaseApi};
use crate::error::WorkflowError;
use crate::models::{DataSource, DataSourceSpec, IngestionJob, KnowledgeBase, KnowledgeBaseSpec};
use crate::retry::RetryPolicy;

/// Polling cadence and budget for an ingestion job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(3600),
        }
    }
}

/// Find a knowledge base by exact name, following every page.
pub async fn find_knowledge_base(
    api: &dyn KnowledgeBaseApi,
    name: &str,
) -> Result<Option<KnowledgeBase>, WorkflowError> {
    let mut next_token: Option<String> = None;
    loop {
        let page = api.list_knowledge_bases(next_token.as_deref()).await?;
        if let Some(found) = page.items.into_iter().find(|kb| kb.name == name) {
            return Ok(Some(found));
        }
        match page.next_token {
            Some(token) => next_token = Some(token),
            None => return Ok(None),
        }
    }
}

/// Return the knowledge base named in `spec`, creating it if absent.
///
/// Creation goes through `retry`; every attempt carries the same client
/// token so a retried create cannot produce a second knowledge base.
pub async fn ensure_knowledge_base(
    api: &dyn KnowledgeBaseApi,
    spec: &KnowledgeBaseSpec,
    retry: &RetryPolicy,
) -> Result<KnowledgeBase, WorkflowError> {
    let existing = match find_knowledge_base(api, &spec.name).await? {
        Some(kb) => {
            info!(knowledge_base = %kb.name, id = %kb.id, "reusing existing knowledge base");
            kb
        }
        None => {
            info!(knowledge_base = %spec.name, "creating knowledge base");
            let client_token = Uuid::new_v4().to_string();
            let created = retry
                .run("CreateKnowledgeBase", |_| {
                    api.create_knowledge_base(spec, &client_token)
                })
                .await;
            match created {
                Ok(kb) => kb,
                Err(err) if err.is_conflict() => find_knowledge_base(api, &spec.name)
                    .await?
                    .ok_or_else(|| WorkflowError::KnowledgeBaseNotFound {
                        name: spec.name.clone(),
                    })?,
                Err(err) => {
                    error!(knowledge_base = %spec.name, error = %err, "error creating knowledge base");
                    return Err(err.into());
                }
            }
        }
    };

    info!(id = %existing.id, "retrieving knowledge base");
    Ok(api.get_knowledge_base(&existing.id).await?)
}

/// Attach the data source in `spec`, reusing a same-named one on conflict.
pub async fn ensure_data_source(
    api: &dyn KnowledgeBaseApi,
    spec: &DataSourceSpec,
) -> Result<DataSource, WorkflowError> {
    info!(data_source = %spec.name, bucket = %spec.bucket_arn, "creating S3 data source");
    let ds = match api.create_data_source(spec).await {
        Ok(ds) => ds,
        Err(err) if err.is_conflict() => {
            info!(data_source = %spec.name, "data source already exists, reusing it");
            find_data_source(api, &spec.knowledge_base_id, &spec.name)
                .await?
                .ok_or_else(|| WorkflowError::DataSourceNotFound {
                    name: spec.name.clone(),
                    knowledge_base_id: spec.knowledge_base_id.clone(),
                })?
        }
        Err(err) => {
            error!(data_source = %spec.name, error = %err, "error creating data source");
            return Err(err.into());
        }
    };

    info!(id = %ds.id, "retrieving data source");
    Ok(api.get_data_source(&spec.knowledge_base_id, &ds.id).await?)
}

async fn find_data_source(
    api: &dyn KnowledgeBaseApi,
    knowledge_base_id: &str,
    name: &str,
) -> Result<Option<DataSource>, WorkflowError> {
    let mut next_token: Option<String> = None;
    loop {
        let page = api
            .list_data_sources(knowledge_base_id, next_token.as_deref())
            .await?;
        if let Some(found) = page.items.into_iter().find(|ds| ds.name == name) {
            return Ok(Some(found));
        }
        match page.next_token {
            Some(token) => next_token = Some(token),
            None => return Ok(None),
        }
    }
}

/// Poll `job` until it reaches a terminal status.
///
/// Fetches status once per `poll.interval` while the job is not terminal,
/// so a job that starts `STARTING` and then reports `IN_PROGRESS`,
/// `IN_PROGRESS`, `COMPLETE` is fetched exactly three times. Each fetch
/// goes through `retry`, so a throttled status call does not abandon the
/// job.
///
/// # Errors
///
/// - [`WorkflowError::IngestionFailed`] on `FAILED` or `STOPPED`.
/// - [`WorkflowError::IngestionTimedOut`] if the job is still running once
///   `poll.max_wait` has elapsed.
pub async fn wait_for_ingestion(
    api: &dyn KnowledgeBaseApi,
    mut job: IngestionJob,
    poll: &PollSettings,
    retry: &RetryPolicy,
    progress: &dyn IngestionProgress,
) -> Result<IngestionJob, WorkflowError> {
    let started = Instant::now();
    info!(job = %job.id, "monitoring ingestion job status");
    progress.report(&job, Duration::ZERO);

    loop {
        if job.status.is_success() {
            info!(job = %job.id, "ingestion job completed successfully");
            return Ok(job);
        }
        if job.status.is_terminal() {
            error!(
                job = %job.id,
                status = %job.status,
                reasons = ?job.failure_reasons,
                "ingestion job did not complete"
            );
            return Err(WorkflowError::IngestionFailed {
                job_id: job.id,
                status: job.status,
                reasons: job.failure_reasons,
            });
        }

        let elapsed = started.elapsed();
        if elapsed >= poll.max_wait {
            return Err(WorkflowError::IngestionTimedOut {
                job_id: job.id,
                status: job.status,
                waited: elapsed,
            });
        }
        tokio::time::sleep(poll.interval.min(poll.max_wait - elapsed)).await;

        let kb_id = job.knowledge_base_id.as_str();
        let ds_id = job.data_source_id.as_str();
        let job_id = job.id.as_str();
        let fetched = retry
            .run("GetIngestionJob", move |_| {
                api.get_ingestion_job(kb_id, ds_id, job_id)
            })
            .await?;
        job = fetched;
        info!(job = %job.id, status = %job.status, "ingestion job status");
        progress.report(&job, started.elapsed());
    }
}
