// Connector Framework (C5, spec §4.5, §9): a single capability trait
// replaces the inheritance-hierarchy-per-source-type pattern the spec calls
// out as an anti-pattern, grounded in the teacher's trait-object plugin
// registries (`services/indexing_service.rs`).

pub mod folder;
pub mod nostr;
pub mod rss;
pub mod sql;
pub mod web;

use crate::enrichment::{self, IdfModel};
use crate::index_store::IndexStore;
use crate::types::{Connector, Run};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as Json;
use std::collections::HashMap;
use uuid::Uuid;

/// One document worth of connector output, pre-embedding.
#[derive(Debug, Clone)]
pub struct ConnectorItem {
    pub external_id: String,
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
    pub attributes: serde_json::Value,
    pub permission_groups: std::collections::HashSet<String>,
    /// Pre-computed quality score (spec §4.4), when the source connector
    /// already derives one (e.g. the Nostr Extractor); `None` leaves the
    /// Index Store's default.
    pub quality_score: Option<f32>,
}

/// `Connector` capability set (spec §4.5): `ValidateConfig`, `Run`, `Stop`.
/// Each backing connector type implements this directly rather than
/// inheriting from a shared base class.
#[async_trait]
pub trait ConnectorRuntime: Send + Sync {
    fn validate_config(&self) -> Result<(), Vec<String>>;

    /// Fetch current source metadata: `{external_id -> last_modified}`,
    /// the cheap side of the incremental sync algorithm (spec §4.5 step 1).
    async fn list_metadata(&self) -> Result<HashMap<String, Option<chrono::DateTime<chrono::Utc>>>>;

    /// Fetch full content for the given external ids (spec §4.5 step 3).
    async fn fetch_items(&self, external_ids: &[String]) -> Result<Vec<ConnectorItem>>;
}

pub fn build_runtime(connector: &Connector) -> Result<Box<dyn ConnectorRuntime>> {
    use crate::types::ConnectorConfig;
    match &connector.config {
        ConnectorConfig::Sql { .. } => Ok(Box::new(sql::SqlConnector::new(connector.config.clone())?)),
        ConnectorConfig::Web { .. } => Ok(Box::new(web::WebConnector::new(connector.config.clone())?)),
        ConnectorConfig::Folder { .. } => Ok(Box::new(folder::FolderConnector::new(connector.config.clone())?)),
        ConnectorConfig::Nostr { .. } => Ok(Box::new(nostr::NostrConnector::new(connector.config.clone())?)),
        ConnectorConfig::Rss { .. } => Ok(Box::new(rss::RssConnector::new(connector.config.clone())?)),
    }
}

/// Incremental sync (spec §4.5 steps 1-6): metadata-first left-join against
/// the index, fetch only what changed, upsert, then sweep deletions.
pub async fn sync_connector(
    connector: &Connector,
    store: &IndexStore,
    run: &mut Run,
    stop: &tokio::sync::watch::Receiver<bool>,
    idf: &IdfModel,
) -> Result<()> {
    let runtime = build_runtime(connector)?;
    runtime.validate_config().map_err(|errs| anyhow::anyhow!(errs.join("; ")))?;

    // Step 1: cheap metadata listing from the source.
    let source_metadata = runtime.list_metadata().await?;
    run.log(format!("listed {} source items", source_metadata.len()));

    // Step 2: left-join against what's already indexed for this source.
    let indexed = store.list_since_for_source(connector.id).await?;
    let mut last_modified_by_external: HashMap<String, Option<chrono::DateTime<chrono::Utc>>> = HashMap::new();
    let mut existing_id_by_external: HashMap<String, Uuid> = HashMap::new();
    for meta in indexed {
        existing_id_by_external.insert(meta.external_id.clone(), meta.id);
        last_modified_by_external.insert(meta.external_id, meta.last_modified);
    }

    let mut changed: Vec<String> = Vec::new();
    for (external_id, last_modified) in &source_metadata {
        match last_modified_by_external.get(external_id) {
            None => changed.push(external_id.clone()),
            Some(prev) => {
                if prev != last_modified {
                    changed.push(external_id.clone());
                }
            }
        }
    }

    // Step 3: fetch full content only for changed/new items.
    if *stop.borrow() {
        run.log("stop requested before fetch");
        return Ok(());
    }
    let items = runtime.fetch_items(&changed).await?;
    run.log(format!("fetched {} changed items", items.len()));

    // Step 4/5: upsert each item, tracking created vs updated counts.
    for item in items {
        if *stop.borrow() {
            run.log("stop requested mid-run");
            break;
        }
        idf.observe(&item.content);
        let enrichment = enrichment::process(&item.title, &item.content, idf);
        let mut attributes = item.attributes;
        if let Json::Object(map) = &mut attributes {
            map.insert("tags".to_string(), serde_json::to_value(&enrichment.tags)?);
            map.insert("entities".to_string(), serde_json::to_value(&enrichment.entities)?);
            map.insert("content_metadata".to_string(), serde_json::to_value(&enrichment.metadata)?);
        }

        // Reuse the existing row's id for a known (source_id, external_id)
        // pair so `upsert`'s `ON CONFLICT (id)` actually fires; otherwise a
        // fresh random id collides with nothing on `id` but still trips the
        // `UNIQUE (source_id, external_id)` constraint with no arbiter.
        let mut builder = crate::types::DocumentBuilder::new();
        if let Some(existing_id) = existing_id_by_external.get(&item.external_id) {
            builder = builder.id(*existing_id);
        }

        let entities = enrichment.entities;
        let doc = builder
            .source(connector.id, item.external_id.clone())
            .title(item.title)
            .content(item.content)
            .url(item.url.unwrap_or_default())
            .document_type(connector.config.kind())
            .attributes(attributes)
            .permission_groups(item.permission_groups)
            .last_modified(item.last_modified.unwrap_or_else(chrono::Utc::now))
            .quality_score(item.quality_score.unwrap_or(0.5))
            .build()?;
        match store.upsert(&doc).await? {
            crate::index_store::UpsertOutcome::Created => run.added += 1,
            crate::index_store::UpsertOutcome::Updated => run.updated += 1,
        }

        // Spec §4.6: fold this document's entities into the persisted
        // entity-relationship table, set-unioning document ids per
        // (entity_type, normalized_value).
        for entity in &entities {
            store.upsert_entity_relationship(entity.entity_type.as_str(), &entity.normalized, doc.id).await?;
        }
    }

    // Step 6: sweep documents whose external id is no longer present
    // upstream (spec §4.5 step 5 — full crawl only, not incremental probes).
    let kept: Vec<String> = source_metadata.keys().cloned().collect();
    if !kept.is_empty() {
        let removed = store.delete_by_source(connector.id, &kept).await?;
        run.removed += removed;
    }

    Ok(())
}

pub fn new_run_id() -> Uuid {
    Uuid::new_v4()
}
