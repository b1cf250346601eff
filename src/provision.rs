//! `kbsync provision`: create or find the collection and its index.

use anyhow::Result;

use kb_sync_core::cloud::NoProgress;
use kb_sync_core::workflow::Workflow;

use crate::clients::ClientFactory;
use crate::config::Config;
use crate::sink::LogSink;

pub async fn run_provision(config: &Config) -> Result<()> {
    let factory = ClientFactory::from_config(config)?;
    let clients = factory.workflow_clients();
    let settings = config.workflow_settings();
    let workflow = Workflow::new(clients.services(), &settings, &LogSink, &NoProgress);

    let identity = workflow.resolve_identity().await?;
    let report = workflow.provision().await?;
    let store = &report.store;

    println!("provision {}", store.name);
    println!("  account: {}", identity.account);
    println!("  collection id: {}", store.id);
    println!("  collection arn: {}", store.arn);
    println!("  host: {}", store.host);
    println!(
        "  index: {} ({})",
        store.index_name,
        if report.index_created {
            "created"
        } else {
            "already exists"
        }
    );
    println!("ok");
    Ok(())
}
