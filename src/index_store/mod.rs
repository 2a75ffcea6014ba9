// Index Store (C2, spec §4.2): a relational store with an inverted index on
// tokenized `(title || content)` and an approximate-nearest-neighbor vector
// index over `embedding` (cosine). Backed by Postgres, matching the
// teacher's `sqlx` usage in `supabase_repository`; the cosine/bm25 scoring
// itself runs in-process over rows fetched from Postgres rather than
// depending on a Postgres extension, so the store works against a plain
// Postgres instance.

mod filter;
mod lexical;
mod vector;

pub use filter::DocumentFilter;

use crate::types::Document;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Row shape used when comparing source metadata to the index for
/// incremental sync (spec §4.2 `ListSinceForSource`, §4.5 step 2).
#[derive(Debug, Clone)]
pub struct IndexedMetadata {
    pub id: Uuid,
    pub external_id: String,
    pub last_modified: Option<DateTime<Utc>>,
}

pub struct IndexStore {
    pool: PgPool,
    embedding_dim: usize,
}

impl IndexStore {
    pub async fn connect(database_url: &str, embedding_dim: usize) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await
            .context("failed to connect to index store database")?;
        let store = Self { pool, embedding_dim };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool, embedding_dim: usize) -> Self {
        Self { pool, embedding_dim }
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id UUID PRIMARY KEY,
                source_id UUID,
                external_id TEXT,
                title TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                url TEXT,
                document_type TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                indexed_at TIMESTAMPTZ NOT NULL,
                last_modified TIMESTAMPTZ,
                embedding REAL[],
                attributes JSONB NOT NULL DEFAULT '{}'::jsonb,
                permission_groups TEXT[] NOT NULL DEFAULT '{}',
                quality_score REAL NOT NULL DEFAULT 0.5,
                content_hash TEXT,
                UNIQUE (source_id, external_id)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_type ON documents (document_type);
            CREATE INDEX IF NOT EXISTS idx_documents_source ON documents (source_id);
            CREATE INDEX IF NOT EXISTS idx_documents_perm ON documents USING GIN (permission_groups);

            CREATE TABLE IF NOT EXISTS connectors (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                config JSONB NOT NULL,
                portal_url TEXT,
                item_url_template TEXT,
                is_active BOOLEAN NOT NULL DEFAULT true,
                schedule_expression TEXT,
                last_run_at TIMESTAMPTZ,
                last_run_status TEXT
            );

            CREATE TABLE IF NOT EXISTS runs (
                id UUID PRIMARY KEY,
                connector_id UUID NOT NULL REFERENCES connectors (id) ON DELETE CASCADE,
                status TEXT NOT NULL,
                started_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ,
                added BIGINT NOT NULL DEFAULT 0,
                updated BIGINT NOT NULL DEFAULT 0,
                removed BIGINT NOT NULL DEFAULT 0,
                log JSONB NOT NULL DEFAULT '[]'::jsonb,
                error_message TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_runs_connector ON runs (connector_id, started_at DESC);

            CREATE TABLE IF NOT EXISTS entity_relationships (
                entity_type TEXT NOT NULL,
                normalized_value TEXT NOT NULL,
                document_ids UUID[] NOT NULL DEFAULT '{}',
                document_count BIGINT NOT NULL DEFAULT 0,
                PRIMARY KEY (entity_type, normalized_value)
            );

            CREATE TABLE IF NOT EXISTS frpei_feedback (
                id UUID PRIMARY KEY,
                request_id UUID NOT NULL,
                candidate_id UUID NOT NULL,
                relevance_label SMALLINT NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE INDEX IF NOT EXISTS idx_frpei_feedback_candidate ON frpei_feedback (candidate_id);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to migrate documents table")?;
        Ok(())
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// `Upsert(doc) -> {created|updated}` (spec §4.2). Atomic write of
    /// document + attributes + permissions; content-hash comparison skips
    /// recomputation work and matches spec §8 "embedding recomputed only on
    /// content change".
    #[instrument(skip(self, doc))]
    pub async fn upsert(&self, doc: &Document) -> Result<UpsertOutcome> {
        let content_hash = content_hash(&doc.title, &doc.content);
        let permission_groups: Vec<String> = doc.permission_groups.iter().cloned().collect();
        let embedding: Option<Vec<f32>> = doc.embedding.clone();

        let existing = sqlx::query("SELECT id FROM documents WHERE id = $1")
            .bind(doc.id)
            .fetch_optional(&self.pool)
            .await?;
        let outcome = if existing.is_some() { UpsertOutcome::Updated } else { UpsertOutcome::Created };

        sqlx::query(
            r#"
            INSERT INTO documents (
                id, source_id, external_id, title, content, url, document_type,
                created_at, updated_at, indexed_at, last_modified, embedding,
                attributes, permission_groups, quality_score, content_hash
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                content = EXCLUDED.content,
                url = EXCLUDED.url,
                document_type = EXCLUDED.document_type,
                updated_at = EXCLUDED.updated_at,
                indexed_at = EXCLUDED.indexed_at,
                last_modified = EXCLUDED.last_modified,
                attributes = EXCLUDED.attributes,
                permission_groups = EXCLUDED.permission_groups,
                quality_score = EXCLUDED.quality_score,
                content_hash = EXCLUDED.content_hash
            "#,
        )
        .bind(doc.id)
        .bind(doc.source_id)
        .bind(&doc.external_id)
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(&doc.url)
        .bind(doc.document_type.0.clone())
        .bind(doc.created_at)
        .bind(Utc::now())
        .bind(Utc::now())
        .bind(doc.last_modified)
        .bind(&embedding)
        .bind(&doc.attributes)
        .bind(&permission_groups)
        .bind(doc.quality_score.value())
        .bind(&content_hash)
        .execute(&self.pool)
        .await
        .context("failed to upsert document")?;

        Ok(outcome)
    }

    /// Separate embedding write, allowing pre- and post-vectorization
    /// storage (spec §4.2).
    pub async fn set_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.embedding_dim {
            anyhow::bail!(
                "embedding dimension mismatch: expected {}, got {}",
                self.embedding_dim,
                embedding.len()
            );
        }
        sqlx::query("UPDATE documents SET embedding = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(embedding)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    /// `DeleteBySource(source_id, external_ids_kept)`: sweep used by
    /// incremental sync (spec §4.2, §4.5 step 5).
    #[instrument(skip(self, external_ids_kept))]
    pub async fn delete_by_source(&self, source_id: Uuid, external_ids_kept: &[String]) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM documents WHERE source_id = $1 AND NOT (external_id = ANY($2))",
        )
        .bind(source_id)
        .bind(external_ids_kept)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// `ListSinceForSource(source_id) -> [(external_id, last_modified)]`
    /// (spec §4.2, §4.5 step 2): the cheap metadata query used by
    /// incremental sync's left-join.
    pub async fn list_since_for_source(&self, source_id: Uuid) -> Result<Vec<IndexedMetadata>> {
        let rows = sqlx::query(
            "SELECT id, external_id, last_modified FROM documents WHERE source_id = $1 AND external_id IS NOT NULL",
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let external_id: Option<String> = r.try_get("external_id").ok();
                external_id.map(|external_id| IndexedMetadata {
                    id: r.try_get("id").unwrap_or_else(|_| Uuid::nil()),
                    external_id,
                    last_modified: r.try_get("last_modified").ok(),
                })
            })
            .collect())
    }

    /// `FetchByIds(ids) -> [doc]` preserving input order (spec §4.2).
    pub async fn fetch_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT * FROM documents WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        let mut by_id = std::collections::HashMap::new();
        for row in rows {
            let doc = row_to_document(&row)?;
            by_id.insert(doc.id, doc);
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS c FROM documents").fetch_one(&self.pool).await?;
        Ok(row.try_get("c")?)
    }

    /// `VectorSearch(query_vec, k, filter) -> [(id, cos_sim)]` (spec §4.2).
    /// Fetches the filtered candidate pool and scores in-process; swappable
    /// for an HNSW-backed index behind the `advanced-search` feature
    /// without changing the call contract.
    #[instrument(skip(self, query_vec, filter))]
    pub async fn vector_search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<(Uuid, f32)>> {
        let rows = self.filtered_rows(filter).await?;
        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let embedding: Option<Vec<f32>> = row.try_get("embedding").ok();
            if let Some(embedding) = embedding {
                let id: Uuid = row.try_get("id")?;
                let sim = vector::cosine_similarity(query_vec, &embedding);
                scored.push((id, sim));
            }
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// `LexicalSearch(query_text, k, filter) -> [(id, bm25_rank)]` (spec §4.2).
    #[instrument(skip(self, query_text, filter))]
    pub async fn lexical_search(
        &self,
        query_text: &str,
        k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<(Uuid, f32)>> {
        let rows = self.filtered_rows(filter).await?;
        let terms = lexical::tokenize(query_text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut corpus = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: Uuid = row.try_get("id")?;
            let title: String = row.try_get("title").unwrap_or_default();
            let content: String = row.try_get("content").unwrap_or_default();
            corpus.push((id, format!("{title} {content}")));
        }
        let ranked = lexical::bm25_rank(&terms, &corpus);
        Ok(ranked.into_iter().take(k).collect())
    }

    async fn filtered_rows(&self, filter: &DocumentFilter) -> Result<Vec<sqlx::postgres::PgRow>> {
        let (clause, binds) = filter.to_sql();
        let sql = format!("SELECT * FROM documents WHERE {clause}");
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = bind.apply(query);
        }
        let rows = query.fetch_all(&self.pool).await.context("failed to fetch filtered documents")?;
        Ok(rows)
    }

    /// Most-recent documents matching `filter` (spec §4.8 edge case: empty
    /// query with filters returns recency-ordered results instead of an
    /// empty/error response).
    pub async fn recent_documents(&self, filter: &DocumentFilter, limit: usize) -> Result<Vec<Document>> {
        let rows = self.filtered_rows(filter).await?;
        let mut docs: Vec<Document> = rows.iter().map(row_to_document).collect::<Result<_>>()?;
        docs.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at).then_with(|| a.id.cmp(&b.id)));
        docs.truncate(limit);
        Ok(docs)
    }

    /// Aggregate facets over a pre-truncation candidate pool (spec §4.8 step 9).
    pub async fn facets(&self, filter: &DocumentFilter) -> Result<Facets> {
        let rows = self.filtered_rows(filter).await?;
        let mut kinds = std::collections::HashMap::new();
        let mut authors = std::collections::HashMap::new();
        for row in &rows {
            let dt: String = row.try_get("document_type").unwrap_or_default();
            *kinds.entry(dt).or_insert(0u64) += 1;
            let attrs: Json = row.try_get("attributes").unwrap_or(Json::Null);
            if let Some(pubkey) = attrs.get("pubkey").and_then(|v| v.as_str()) {
                *authors.entry(pubkey.to_string()).or_insert(0u64) += 1;
            }
        }
        Ok(Facets { document_types: kinds, authors })
    }

    /// Tag cloud (spec §4.12 `/api/tags/cloud`): frequency of each tag
    /// across the filtered corpus, read from the enrichment-populated
    /// `attributes.tags` array.
    pub async fn tag_frequencies(&self, filter: &DocumentFilter) -> Result<std::collections::HashMap<String, u64>> {
        let rows = self.filtered_rows(filter).await?;
        let mut counts = std::collections::HashMap::new();
        for row in &rows {
            for tag in tags_of(row) {
                *counts.entry(tag).or_insert(0u64) += 1;
            }
        }
        Ok(counts)
    }

    /// Tag co-occurrence (spec §4.12 `/api/tags/cooccurrence`): counts of
    /// unordered tag pairs appearing together on the same document.
    pub async fn tag_cooccurrence(&self, filter: &DocumentFilter) -> Result<std::collections::HashMap<(String, String), u64>> {
        let rows = self.filtered_rows(filter).await?;
        let mut counts = std::collections::HashMap::new();
        for row in &rows {
            let mut tags = tags_of(row);
            tags.sort();
            tags.dedup();
            for i in 0..tags.len() {
                for j in (i + 1)..tags.len() {
                    *counts.entry((tags[i].clone(), tags[j].clone())).or_insert(0u64) += 1;
                }
            }
        }
        Ok(counts)
    }

    /// `ListConnectors() -> [Connector]` (spec §4.11), used by the scheduler
    /// tick to find due schedules.
    pub async fn list_connectors(&self) -> Result<Vec<crate::types::Connector>> {
        let rows = sqlx::query("SELECT * FROM connectors ORDER BY name").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_connector).collect()
    }

    pub async fn get_connector(&self, id: Uuid) -> Result<Option<crate::types::Connector>> {
        let row = sqlx::query("SELECT * FROM connectors WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_connector).transpose()
    }

    pub async fn upsert_connector(&self, connector: &crate::types::Connector) -> Result<()> {
        let config = serde_json::to_value(&connector.config)?;
        sqlx::query(
            r#"
            INSERT INTO connectors (id, name, config, portal_url, item_url_template, is_active, schedule_expression, last_run_at, last_run_status)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name, config = EXCLUDED.config, portal_url = EXCLUDED.portal_url,
                item_url_template = EXCLUDED.item_url_template, is_active = EXCLUDED.is_active,
                schedule_expression = EXCLUDED.schedule_expression
            "#,
        )
        .bind(connector.id)
        .bind(&connector.name)
        .bind(config)
        .bind(&connector.portal_url)
        .bind(&connector.item_url_template)
        .bind(connector.is_active)
        .bind(&connector.schedule_expression)
        .bind(connector.last_run_at)
        .bind(connector.last_run_status.map(|s| format!("{s:?}").to_lowercase()))
        .execute(&self.pool)
        .await
        .context("failed to upsert connector")?;
        Ok(())
    }

    pub async fn delete_connector(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM connectors WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn record_connector_run_result(&self, connector_id: Uuid, status: crate::types::RunStatus) -> Result<()> {
        sqlx::query("UPDATE connectors SET last_run_at = now(), last_run_status = $2 WHERE id = $1")
            .bind(connector_id)
            .bind(format!("{status:?}").to_lowercase())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// `SaveRun(run)` (spec §4.11): insert-or-update the run's full state.
    pub async fn save_run(&self, run: &crate::types::Run) -> Result<()> {
        let log = serde_json::to_value(&run.log)?;
        sqlx::query(
            r#"
            INSERT INTO runs (id, connector_id, status, started_at, completed_at, added, updated, removed, log, error_message)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status, completed_at = EXCLUDED.completed_at, added = EXCLUDED.added,
                updated = EXCLUDED.updated, removed = EXCLUDED.removed, log = EXCLUDED.log,
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(run.id)
        .bind(run.connector_id)
        .bind(format!("{:?}", run.status).to_lowercase())
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.added as i64)
        .bind(run.updated as i64)
        .bind(run.removed as i64)
        .bind(log)
        .bind(&run.error_message)
        .execute(&self.pool)
        .await
        .context("failed to save run")?;
        Ok(())
    }

    pub async fn get_run(&self, id: Uuid) -> Result<Option<crate::types::Run>> {
        let row = sqlx::query("SELECT * FROM runs WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_run).transpose()
    }

    pub async fn list_runs_for_connector(&self, connector_id: Uuid, limit: i64) -> Result<Vec<crate::types::Run>> {
        let rows = sqlx::query("SELECT * FROM runs WHERE connector_id = $1 ORDER BY started_at DESC LIMIT $2")
            .bind(connector_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_run).collect()
    }

    /// Crash recovery at process start (spec §4.11): any run still `running`
    /// from a prior process is marked `failed` with reason `"crash"`.
    pub async fn fail_orphaned_running_runs(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE runs SET status = 'failed', completed_at = now(), error_message = 'crash' WHERE status = 'running'",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Fold one document's entity into the persisted `entity_relationships`
    /// table (spec §4.6): `document_ids` is set-unioned, `document_count`
    /// kept in lockstep.
    pub async fn upsert_entity_relationship(&self, entity_type: &str, normalized_value: &str, document_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entity_relationships (entity_type, normalized_value, document_ids, document_count)
            VALUES ($1, $2, ARRAY[$3], 1)
            ON CONFLICT (entity_type, normalized_value) DO UPDATE SET
                document_ids = ARRAY(
                    SELECT DISTINCT unnest(entity_relationships.document_ids || EXCLUDED.document_ids)
                ),
                document_count = cardinality(ARRAY(
                    SELECT DISTINCT unnest(entity_relationships.document_ids || EXCLUDED.document_ids)
                ))
            "#,
        )
        .bind(entity_type)
        .bind(normalized_value)
        .bind(document_id)
        .execute(&self.pool)
        .await
        .context("failed to upsert entity relationship")?;
        Ok(())
    }

    /// `RecordFeedback(candidate_id, relevance_label)` (spec §4.10 step 6).
    pub async fn record_frpei_feedback(&self, request_id: Uuid, candidate_id: Uuid, relevance_label: i8) -> Result<()> {
        sqlx::query(
            "INSERT INTO frpei_feedback (id, request_id, candidate_id, relevance_label) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(request_id)
        .bind(candidate_id)
        .bind(relevance_label as i16)
        .execute(&self.pool)
        .await
        .context("failed to record frpei feedback")?;
        Ok(())
    }
}

fn row_to_connector(row: &sqlx::postgres::PgRow) -> Result<crate::types::Connector> {
    let config: Json = row.try_get("config")?;
    let last_run_status: Option<String> = row.try_get("last_run_status")?;
    Ok(crate::types::Connector {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        config: serde_json::from_value(config).context("failed to deserialize connector config")?,
        portal_url: row.try_get("portal_url")?,
        item_url_template: row.try_get("item_url_template")?,
        is_active: row.try_get("is_active")?,
        schedule_expression: row.try_get("schedule_expression")?,
        last_run_at: row.try_get("last_run_at")?,
        last_run_status: last_run_status.and_then(|s| match s.as_str() {
            "running" => Some(crate::types::RunStatus::Running),
            "completed" => Some(crate::types::RunStatus::Completed),
            "failed" => Some(crate::types::RunStatus::Failed),
            "stopped" => Some(crate::types::RunStatus::Stopped),
            _ => None,
        }),
    })
}

fn row_to_run(row: &sqlx::postgres::PgRow) -> Result<crate::types::Run> {
    let status: String = row.try_get("status")?;
    let status = match status.as_str() {
        "running" => crate::types::RunStatus::Running,
        "completed" => crate::types::RunStatus::Completed,
        "stopped" => crate::types::RunStatus::Stopped,
        _ => crate::types::RunStatus::Failed,
    };
    let log: Json = row.try_get("log").unwrap_or(Json::Array(vec![]));
    Ok(crate::types::Run {
        id: row.try_get("id")?,
        connector_id: row.try_get("connector_id")?,
        status,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        added: row.try_get::<i64, _>("added")? as u64,
        updated: row.try_get::<i64, _>("updated")? as u64,
        removed: row.try_get::<i64, _>("removed")? as u64,
        log: serde_json::from_value(log).unwrap_or_default(),
        error_message: row.try_get("error_message")?,
    })
}

#[derive(Debug, Default, serde::Serialize)]
pub struct Facets {
    pub document_types: std::collections::HashMap<String, u64>,
    pub authors: std::collections::HashMap<String, u64>,
}

fn row_to_document(row: &sqlx::postgres::PgRow) -> Result<Document> {
    use crate::types::DocumentType;
    let permission_groups: Vec<String> = row.try_get("permission_groups").unwrap_or_default();
    Ok(Document {
        id: row.try_get("id")?,
        source_id: row.try_get("source_id").ok(),
        external_id: row.try_get("external_id").ok(),
        title: row.try_get("title").unwrap_or_default(),
        content: row.try_get("content").unwrap_or_default(),
        url: row.try_get("url").ok(),
        document_type: DocumentType(row.try_get("document_type").unwrap_or_default()),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        indexed_at: row.try_get("indexed_at")?,
        last_modified: row.try_get("last_modified").ok(),
        embedding: row.try_get("embedding").ok(),
        attributes: row.try_get("attributes").unwrap_or(Json::Null),
        permission_groups: permission_groups.into_iter().collect::<HashSet<_>>(),
        quality_score: crate::types::QualityScore::new(row.try_get("quality_score").unwrap_or(0.5)),
    })
}

fn tags_of(row: &sqlx::postgres::PgRow) -> Vec<String> {
    let attrs: Json = row.try_get("attributes").unwrap_or(Json::Null);
    attrs
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn content_hash(title: &str, content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\0");
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_for_identical_input() {
        assert_eq!(content_hash("a", "b"), content_hash("a", "b"));
        assert_ne!(content_hash("a", "b"), content_hash("a", "c"));
    }
}
