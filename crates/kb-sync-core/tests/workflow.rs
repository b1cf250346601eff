//! End-to-end runs of the provisioning and sync workflow against the
//! in-memory cloud backend.

use std::sync::Mutex;
use std::time::Duration;

use kb_sync_core::cloud::memory::{InMemoryCloud, MemorySink};
use kb_sync_core::cloud::{IngestionProgress, NoProgress};
use kb_sync_core::error::{ErrorKind, WorkflowError};
use kb_sync_core::ingest::PollSettings;
use kb_sync_core::models::{ChunkingConfig, IndexSchema, IngestionJob, IngestionStatus};
use kb_sync_core::naming::ResourceNames;
use kb_sync_core::retry::RetryPolicy;
use kb_sync_core::workflow::{CloudServices, DataSourceSettings, Workflow, WorkflowSettings};

const REGION: &str = "us-east-1";

fn settings() -> WorkflowSettings {
    WorkflowSettings {
        region: REGION.to_string(),
        names: ResourceNames::from_suffix("392"),
        index_schema: IndexSchema::default(),
        collection_page_size: 15,
        settle: Duration::ZERO,
        knowledge_base_description: "Bedrock RAG".to_string(),
        role_arn: "arn:aws:iam::000000000000:role/AmazonBedrockExecutionRoleForKnowledgeBase_392"
            .to_string(),
        embedding_model: "amazon.titan-embed-text-v1".to_string(),
        data_source: DataSourceSettings {
            bucket: "bedrock-zenml-rag-docs".to_string(),
            inclusion_prefixes: vec![],
            description: "Bedrock Knowledge Bases for Web URL and S3 Connector".to_string(),
            chunking: ChunkingConfig::default(),
            deletion_policy: "DELETE".to_string(),
        },
        poll: PollSettings {
            interval: Duration::ZERO,
            max_wait: Duration::from_secs(60),
        },
        retry: RetryPolicy {
            max_attempts: 3,
            min_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        },
    }
}

/// Records every status the workflow observes.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<IngestionStatus>>,
}

impl IngestionProgress for Recorder {
    fn report(&self, job: &IngestionJob, _elapsed: Duration) {
        self.seen.lock().unwrap().push(job.status.clone());
    }
}

#[tokio::test]
async fn full_run_records_metadata() {
    let cloud = InMemoryCloud::new(REGION).with_ingestion_statuses(vec![
        IngestionStatus::Starting,
        IngestionStatus::InProgress,
        IngestionStatus::InProgress,
        IngestionStatus::Complete,
    ]);
    let sink = MemorySink::new();
    let recorder = Recorder::default();
    let settings = settings();
    let workflow = Workflow::new(CloudServices::uniform(&cloud), &settings, &sink, &recorder);

    let report = workflow.run().await.unwrap();

    assert_eq!(report.identity.account, "000000000000");
    assert!(report.index_created);
    assert_eq!(report.sync.job.status, IngestionStatus::Complete);

    // One fetch per non-terminal status, none after COMPLETE.
    assert_eq!(cloud.calls().get_ingestion_job, 3);
    assert_eq!(
        *recorder.seen.lock().unwrap(),
        vec![
            IngestionStatus::Starting,
            IngestionStatus::InProgress,
            IngestionStatus::InProgress,
            IngestionStatus::Complete,
        ]
    );

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let (key, value) = &records[0];
    assert_eq!(key, "bedrock_rag");
    assert_eq!(value["ingestion_job_status"], "COMPLETE");
    assert_eq!(value["max_tokens"], 512);
    assert_eq!(value["overlap_percentage"], 20);
    assert_eq!(value["chunking_strategy"], "FIXED_SIZE");
    assert_eq!(value["vector_store_name"], "bedrock-vectordb-rag-392");
    assert_eq!(value["vector_store_id"], report.store.id.as_str());
    assert_eq!(value["knowledge_base_id"], report.sync.knowledge_base.id.as_str());
    assert_eq!(value["knowledge_base_name"], "bedrock-sample-knowledge-base-392");
    assert_eq!(value["data_source_id"], report.sync.data_source.id.as_str());
    assert_eq!(
        value["data_source_description"],
        "Bedrock Knowledge Bases for Web URL and S3 Connector"
    );
}

#[tokio::test]
async fn second_run_reuses_every_resource() {
    let cloud = InMemoryCloud::new(REGION);
    let sink = MemorySink::new();
    let settings = settings();
    let workflow = Workflow::new(CloudServices::uniform(&cloud), &settings, &sink, &NoProgress);

    let first = workflow.run().await.unwrap();
    let second = workflow.run().await.unwrap();

    assert_eq!(first.store, second.store);
    assert!(first.index_created);
    assert!(!second.index_created);
    assert_eq!(cloud.collections().len(), 1);
    assert_eq!(cloud.indexes(&first.store.host).len(), 1);
    assert_eq!(cloud.knowledge_bases().len(), 1);
    assert_eq!(cloud.data_sources().len(), 1);
    assert_eq!(
        first.sync.knowledge_base.id,
        second.sync.knowledge_base.id
    );

    let calls = cloud.calls();
    assert_eq!(calls.create_collection, 2);
    assert_eq!(calls.list_collections, 1);
    assert_eq!(calls.create_index, 2);
    assert_eq!(calls.create_knowledge_base, 1);
    assert_eq!(calls.start_ingestion_job, 2);
    assert_eq!(sink.records().len(), 2);
}

#[tokio::test]
async fn precreated_collection_is_discovered() {
    let cloud = InMemoryCloud::new(REGION);
    let seeded = cloud.seed_collection("bedrock-vectordb-rag-392");
    let sink = MemorySink::new();
    let settings = settings();
    let workflow = Workflow::new(CloudServices::uniform(&cloud), &settings, &sink, &NoProgress);

    let provisioned = workflow.provision().await.unwrap();

    assert_eq!(provisioned.store.id, seeded.id);
    assert_eq!(provisioned.store.arn, seeded.arn);
    assert_eq!(
        provisioned.store.host,
        format!("{}.{}.aoss.amazonaws.com", seeded.id, REGION)
    );
    assert_eq!(cloud.collections().len(), 1);
}

#[tokio::test]
async fn knowledge_base_survives_two_throttled_attempts() {
    let cloud = InMemoryCloud::new(REGION);
    cloud.fail_knowledge_base_creation(&[ErrorKind::Throttling, ErrorKind::Throttling]);
    let sink = MemorySink::new();
    let settings = settings();
    let workflow = Workflow::new(CloudServices::uniform(&cloud), &settings, &sink, &NoProgress);

    let report = workflow.run().await.unwrap();

    assert_eq!(cloud.calls().create_knowledge_base, 3);
    assert_eq!(report.sync.record.ingestion_job_status, "COMPLETE");
}

#[tokio::test]
async fn failed_ingestion_records_nothing() {
    let cloud = InMemoryCloud::new(REGION)
        .with_ingestion_statuses(vec![IngestionStatus::Starting, IngestionStatus::Failed]);
    let sink = MemorySink::new();
    let settings = settings();
    let workflow = Workflow::new(CloudServices::uniform(&cloud), &settings, &sink, &NoProgress);

    let err = workflow.run().await.unwrap_err();

    assert!(matches!(err, WorkflowError::IngestionFailed { .. }));
    assert!(sink.records().is_empty());
    // Partial resources stay in place for the next run.
    assert_eq!(cloud.collections().len(), 1);
    assert_eq!(cloud.knowledge_bases().len(), 1);
}

#[tokio::test]
async fn custom_chunking_reaches_the_record_unmodified() {
    let cloud = InMemoryCloud::new(REGION);
    let sink = MemorySink::new();
    let mut settings = settings();
    settings.data_source.chunking = ChunkingConfig {
        max_tokens: 300,
        overlap_percentage: 10,
        ..ChunkingConfig::default()
    };
    let workflow = Workflow::new(CloudServices::uniform(&cloud), &settings, &sink, &NoProgress);

    let report = workflow.run().await.unwrap();

    assert_eq!(report.sync.record.max_tokens, 300);
    assert_eq!(report.sync.record.overlap_percentage, 10);
    let (_, value) = &sink.records()[0];
    assert_eq!(value["max_tokens"], 300);
    assert_eq!(value["overlap_percentage"], 10);
}
