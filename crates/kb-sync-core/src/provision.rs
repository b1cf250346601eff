//! Vector-store provisioning: collection and index.
//!
//! Both stages are create-if-absent. A conflict on create is not a failure;
//! the collection stage resolves it by looking the collection up by name,
//! the index stage by skipping creation.

use std::time::Duration;

use tracing::{error, info};

use crate::cloud::{CollectionApi, IndexApi};
use crate::error::WorkflowError;
use crate::models::{collection_host, CollectionSummary, IndexSchema, VectorStore};

/// Create the collection, or find the existing one with the same name.
///
/// Returns the provisioned store with its data-plane host. `page_size` is
/// the `maxResults` used for the name lookup; every page is followed until
/// the name is found or the listing ends.
///
/// # Errors
///
/// - [`WorkflowError::CollectionNotFound`] if creation conflicted but no
///   collection with that name is listed.
/// - [`WorkflowError::Api`] for any non-conflict creation failure.
pub async fn ensure_collection(
    api: &dyn CollectionApi,
    name: &str,
    index_name: &str,
    region: &str,
    page_size: u32,
) -> Result<VectorStore, WorkflowError> {
    info!(collection = name, "creating vector-search collection");
    let summary = match api.create_collection(name).await {
        Ok(created) => created,
        Err(err) if err.is_conflict() => {
            info!(collection = name, "collection already exists, looking it up");
            find_collection(api, name, page_size)
                .await?
                .ok_or_else(|| WorkflowError::CollectionNotFound {
                    name: name.to_string(),
                })?
        }
        Err(err) => {
            error!(collection = name, error = %err, "collection creation failed");
            return Err(err.into());
        }
    };

    Ok(VectorStore {
        host: collection_host(&summary.id, region),
        name: summary.name,
        id: summary.id,
        arn: summary.arn,
        index_name: index_name.to_string(),
    })
}

async fn find_collection(
    api: &dyn CollectionApi,
    name: &str,
    page_size: u32,
) -> Result<Option<CollectionSummary>, WorkflowError> {
    let mut next_token: Option<String> = None;
    loop {
        let page = api
            .list_collections(Some(name), page_size, next_token.as_deref())
            .await?;
        if let Some(found) = page.items.into_iter().find(|c| c.name == name) {
            return Ok(Some(found));
        }
        match page.next_token {
            Some(token) => next_token = Some(token),
            None => return Ok(None),
        }
    }
}

/// Create the vector index on a provisioned collection.
///
/// Waits `settle` first: access rules for a new collection take effect
/// asynchronously and there is no readiness signal to poll.
///
/// Returns the service acknowledgement, or `None` if the index already
/// existed.
pub async fn ensure_index(
    api: &dyn IndexApi,
    store: &VectorStore,
    schema: &IndexSchema,
    settle: Duration,
) -> Result<Option<serde_json::Value>, WorkflowError> {
    if !settle.is_zero() {
        info!(
            wait_secs = settle.as_secs_f64(),
            "waiting for data access rules to be enforced"
        );
        tokio::time::sleep(settle).await;
    }

    info!(index = %store.index_name, host = %store.host, "creating vector index");
    match api
        .create_index(&store.host, &store.index_name, &schema.to_body())
        .await
    {
        Ok(response) => Ok(Some(response)),
        Err(err) if err.is_conflict() => {
            info!(
                index = %store.index_name,
                "index already exists, continuing with existing index"
            );
            Ok(None)
        }
        Err(err) => {
            error!(index = %store.index_name, error = %err, "index creation failed");
            Err(err.into())
        }
    }
}
