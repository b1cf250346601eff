//! Configuration parsing and validation.
//!
//! kb-sync is configured with a single TOML file (default
//! `./config/kbsync.toml`). Every section is optional; a missing section or
//! key takes the default listed below. The only key without a usable default
//! is `knowledge_base.role_arn`, which only `sync` requires (and not for
//! `--dry-run`).
//!
//! ```toml
//! [aws]
//! region = "us-east-1"
//! # sts_endpoint = "http://localhost:4566"
//!
//! [naming]
//! suffix = "392"
//!
//! [collection]
//! settle_secs = 10
//! list_page_size = 15
//!
//! [index]
//! dimension = 1536
//!
//! [knowledge_base]
//! role_arn = "arn:aws:iam::123456789012:role/AmazonBedrockExecutionRoleForKnowledgeBase_392"
//!
//! [data_source]
//! bucket = "bedrock-zenml-rag-docs"
//! max_tokens = 512
//! overlap_percentage = 20
//!
//! [ingestion]
//! poll_interval_secs = 10
//! max_wait_secs = 3600
//!
//! [retry]
//! max_attempts = 3
//!
//! [metadata]
//! path = "./data/kbsync-runs.jsonl"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kb_sync_core::ingest::PollSettings;
use kb_sync_core::models::{ChunkingConfig, ChunkingStrategy, IndexSchema};
use kb_sync_core::naming::{validate_collection_name, ResourceNames};
use kb_sync_core::retry::RetryPolicy;
use kb_sync_core::workflow::{DataSourceSettings, WorkflowSettings};

const DEFAULT_DESCRIPTION: &str = "Bedrock Knowledge Bases for Web URL and S3 Connector";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub data_source: DataSourceConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

/// Region, endpoint overrides, and HTTP timeout.
///
/// Endpoint overrides point a single service at an emulator such as
/// LocalStack; unset services use the public AWS endpoints for `region`.
#[derive(Debug, Deserialize, Clone)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub sts_endpoint: Option<String>,
    #[serde(default)]
    pub aoss_endpoint: Option<String>,
    #[serde(default)]
    pub bedrock_agent_endpoint: Option<String>,
    #[serde(default)]
    pub bedrock_runtime_endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            sts_endpoint: None,
            aoss_endpoint: None,
            bedrock_agent_endpoint: None,
            bedrock_runtime_endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct NamingConfig {
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
        }
    }
}

fn default_suffix() -> String {
    "392".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    /// Seconds to wait for access rules before index creation and before
    /// starting ingestion.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    #[serde(default = "default_list_page_size")]
    pub list_page_size: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            settle_secs: default_settle_secs(),
            list_page_size: default_list_page_size(),
        }
    }
}

fn default_settle_secs() -> u64 {
    10
}
fn default_list_page_size() -> u32 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_dimension")]
    pub dimension: u32,
    #[serde(default = "default_ef_construction")]
    pub ef_construction: u32,
    #[serde(default = "default_m")]
    pub m: u32,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_space_type")]
    pub space_type: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            ef_construction: default_ef_construction(),
            m: default_m(),
            engine: default_engine(),
            space_type: default_space_type(),
        }
    }
}

fn default_dimension() -> u32 {
    1536
}
fn default_ef_construction() -> u32 {
    200
}
fn default_m() -> u32 {
    16
}
fn default_engine() -> String {
    "faiss".to_string()
}
fn default_space_type() -> String {
    "l2".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeBaseConfig {
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default)]
    pub role_arn: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            description: default_description(),
            role_arn: String::new(),
            embedding_model: default_embedding_model(),
        }
    }
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}
fn default_embedding_model() -> String {
    "amazon.titan-embed-text-v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSourceConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default)]
    pub inclusion_prefixes: Vec<String>,
    #[serde(default = "default_chunking_strategy")]
    pub chunking_strategy: ChunkingStrategy,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_overlap_percentage")]
    pub overlap_percentage: u32,
    #[serde(default = "default_deletion_policy")]
    pub deletion_policy: String,
    #[serde(default = "default_description")]
    pub description: String,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            inclusion_prefixes: Vec::new(),
            chunking_strategy: default_chunking_strategy(),
            max_tokens: default_max_tokens(),
            overlap_percentage: default_overlap_percentage(),
            deletion_policy: default_deletion_policy(),
            description: default_description(),
        }
    }
}

fn default_bucket() -> String {
    "bedrock-zenml-rag-docs".to_string()
}
fn default_chunking_strategy() -> ChunkingStrategy {
    ChunkingStrategy::FixedSize
}
fn default_max_tokens() -> u32 {
    512
}
fn default_overlap_percentage() -> u32 {
    20
}
fn default_deletion_policy() -> String {
    "DELETE".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestionConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    10
}
fn default_max_wait_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_min_backoff_ms")]
    pub min_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_backoff_ms: default_min_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_min_backoff_ms() -> u64 {
    1000
}
fn default_max_backoff_ms() -> u64 {
    2000
}

/// Where run records go. Without a `path` they are only logged.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetadataConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            min_backoff: Duration::from_millis(self.min_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

impl Config {
    pub fn names(&self) -> ResourceNames {
        ResourceNames::from_suffix(&self.naming.suffix)
    }

    /// Fail unless the execution role is configured.
    ///
    /// Only commands that create a knowledge base need it, so `load_config`
    /// does not enforce it.
    pub fn require_role_arn(&self) -> Result<()> {
        if self.knowledge_base.role_arn.trim().is_empty() {
            bail!(
                "knowledge_base.role_arn must be set (the IAM role Bedrock assumes, e.g. {})",
                self.names().execution_role
            );
        }
        Ok(())
    }

    /// Settings handed to the core workflow.
    pub fn workflow_settings(&self) -> WorkflowSettings {
        let ds = &self.data_source;
        WorkflowSettings {
            region: self.aws.region.clone(),
            names: self.names(),
            index_schema: IndexSchema {
                dimension: self.index.dimension,
                engine: self.index.engine.clone(),
                space_type: self.index.space_type.clone(),
                ef_construction: self.index.ef_construction,
                m: self.index.m,
            },
            collection_page_size: self.collection.list_page_size,
            settle: Duration::from_secs(self.collection.settle_secs),
            knowledge_base_description: self.knowledge_base.description.clone(),
            role_arn: self.knowledge_base.role_arn.clone(),
            embedding_model: self.knowledge_base.embedding_model.clone(),
            data_source: DataSourceSettings {
                bucket: ds.bucket.clone(),
                inclusion_prefixes: ds.inclusion_prefixes.clone(),
                description: ds.description.clone(),
                chunking: ChunkingConfig {
                    strategy: ds.chunking_strategy,
                    max_tokens: ds.max_tokens,
                    overlap_percentage: ds.overlap_percentage,
                },
                deletion_policy: ds.deletion_policy.clone(),
            },
            poll: PollSettings {
                interval: Duration::from_secs(self.ingestion.poll_interval_secs),
                max_wait: Duration::from_secs(self.ingestion.max_wait_secs),
            },
            retry: self.retry.policy(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.aws.region.trim().is_empty() {
        bail!("aws.region must not be empty");
    }

    let names = config.names();
    if let Err(reason) = validate_collection_name(&names.vector_store) {
        bail!("naming.suffix '{}' is invalid: {}", config.naming.suffix, reason);
    }

    if config.collection.list_page_size == 0 {
        bail!("collection.list_page_size must be >= 1");
    }

    if config.index.dimension == 0 {
        bail!("index.dimension must be > 0");
    }

    let ds = &config.data_source;
    if ds.bucket.trim().is_empty() {
        bail!("data_source.bucket must not be empty");
    }
    if ds.max_tokens == 0 {
        bail!("data_source.max_tokens must be > 0");
    }
    if !(1..=99).contains(&ds.overlap_percentage) {
        bail!("data_source.overlap_percentage must be in [1, 99]");
    }
    match ds.deletion_policy.as_str() {
        "DELETE" | "RETAIN" => {}
        other => bail!(
            "Unknown data_source.deletion_policy: '{}'. Must be DELETE or RETAIN.",
            other
        ),
    }

    if config.ingestion.poll_interval_secs == 0 {
        bail!("ingestion.poll_interval_secs must be >= 1");
    }

    if config.retry.max_attempts == 0 {
        bail!("retry.max_attempts must be >= 1");
    }
    if config.retry.min_backoff_ms > config.retry.max_backoff_ms {
        bail!("retry.min_backoff_ms must be <= retry.max_backoff_ms");
    }

    Ok(())
}
