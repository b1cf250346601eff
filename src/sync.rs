//! `kbsync sync`: the full provisioning and ingestion run.
//!
//! Runs every stage in order, reporting ingestion progress on stderr and a
//! summary on stdout. With `--dry-run` it prints the plan derived from the
//! configuration and exits without reading credentials or calling AWS.

use anyhow::Result;

use kb_sync_core::models::embedding_model_arn;
use kb_sync_core::workflow::{RunReport, Workflow, WorkflowSettings};

use crate::clients::ClientFactory;
use crate::config::Config;
use crate::progress::ProgressMode;
use crate::sink::build_sink;

pub async fn run_sync(config: &Config, dry_run: bool, progress: ProgressMode) -> Result<()> {
    let settings = config.workflow_settings();

    if dry_run {
        print_plan(config, &settings);
        return Ok(());
    }

    config.require_role_arn()?;
    let factory = ClientFactory::from_config(config)?;
    let clients = factory.workflow_clients();
    let sink = build_sink(&config.metadata);
    let reporter = progress.reporter();

    let workflow = Workflow::new(clients.services(), &settings, &sink, reporter.as_ref());
    let report = workflow.run().await?;

    print_summary(config, &report);
    Ok(())
}

fn print_plan(config: &Config, settings: &WorkflowSettings) {
    let names = &settings.names;
    let ds = &settings.data_source;
    let schema = &settings.index_schema;

    println!("sync {} (dry-run)", names.knowledge_base);
    println!("  region: {}", settings.region);
    println!("  collection: {}", names.vector_store);
    println!(
        "  index: {} (dimension {}, {}/{}, ef_construction {}, m {})",
        names.index,
        schema.dimension,
        schema.engine,
        schema.space_type,
        schema.ef_construction,
        schema.m
    );
    println!("  knowledge base: {}", names.knowledge_base);
    println!(
        "  embedding model: {}",
        embedding_model_arn(&settings.region, &settings.embedding_model)
    );
    if settings.role_arn.is_empty() {
        println!("  role: (not set)");
    } else {
        println!("  role: {}", settings.role_arn);
    }
    println!("  data source: {} -> {}", names.data_source, ds.bucket_arn());
    if !ds.inclusion_prefixes.is_empty() {
        println!("  prefixes: {}", ds.inclusion_prefixes.join(", "));
    }
    println!(
        "  chunking: {} max_tokens={} overlap={}%",
        ds.chunking.strategy, ds.chunking.max_tokens, ds.chunking.overlap_percentage
    );
    println!("  deletion policy: {}", ds.deletion_policy);
    println!(
        "  polling: every {}s, up to {}s",
        settings.poll.interval.as_secs(),
        settings.poll.max_wait.as_secs()
    );
    match config.metadata.path {
        Some(ref path) => println!("  metadata: {}", path.display()),
        None => println!("  metadata: log only"),
    }
}

fn print_summary(config: &Config, report: &RunReport) {
    let sync = &report.sync;

    println!("sync {}", sync.knowledge_base.name);
    println!("  account: {}", report.identity.account);
    println!("  collection: {} ({})", report.store.name, report.store.id);
    println!(
        "  index: {} ({})",
        report.store.index_name,
        if report.index_created {
            "created"
        } else {
            "existing"
        }
    );
    println!(
        "  knowledge base: {} ({})",
        sync.knowledge_base.name, sync.knowledge_base.id
    );
    println!(
        "  data source: {} ({})",
        sync.data_source.name, sync.data_source.id
    );
    println!("  ingestion job: {} {}", sync.job.id, sync.job.status);
    if let Some(ref stats) = sync.job.statistics {
        println!("  documents scanned: {}", stats.documents_scanned);
        println!(
            "  documents indexed: {}",
            stats.new_documents_indexed + stats.modified_documents_indexed
        );
        println!("  documents deleted: {}", stats.documents_deleted);
        println!("  documents failed: {}", stats.documents_failed);
    }
    if let Some(ref path) = config.metadata.path {
        println!("  metadata: {}", path.display());
    }
    println!("ok");
}
