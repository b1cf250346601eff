//! `kbsync query`: retrieve passages from the synced knowledge base.
//!
//! Resolves the knowledge base by its derived name, then calls the runtime
//! `Retrieve` API and prints results in rank order.

use anyhow::{anyhow, bail, Result};

use kb_sync_core::ingest::find_knowledge_base;

use crate::aws::bedrock::RetrievalResult;
use crate::clients::ClientFactory;
use crate::config::Config;

pub async fn run_query(config: &Config, query: &str, limit: u32) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    if limit == 0 {
        bail!("--limit must be >= 1");
    }

    let factory = ClientFactory::from_config(config)?;
    let name = config.names().knowledge_base;
    let kb = find_knowledge_base(&factory.knowledge_bases(), &name)
        .await?
        .ok_or_else(|| anyhow!("Knowledge base {} not found; run `kbsync sync` first", name))?;

    let results = factory.retrieval().retrieve(&kb.id, query, limit).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!("Results from {} ({}):\n", kb.name, kb.id);
    for (i, result) in results.iter().enumerate() {
        println!("{}", heading(i + 1, result));
        println!("    excerpt: \"{}\"", excerpt(&result.text));
        println!();
    }
    Ok(())
}

fn heading(rank: usize, result: &RetrievalResult) -> String {
    let source = result.location.as_deref().unwrap_or("(unknown source)");
    match result.score {
        Some(score) => format!("{}. [{:.2}] {}", rank, score, source),
        None => format!("{}. {}", rank, source),
    }
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() > 280 {
        format!("{}...", flat.chars().take(280).collect::<String>())
    } else {
        flat.to_string()
    }
}
