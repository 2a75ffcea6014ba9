// Nostr Connector (spec §4.5): wires the Relay Pool (C3) and the
// Classifier/Extractor/Spam Filter pipeline (C4) into the generic connector
// contract. `strategy` picks the filter shape fed to `RelayPool::query`.

use super::{ConnectorItem, ConnectorRuntime};
use crate::config::SpamFilterConfig;
use crate::nostr::spam_filter::{evaluate_spam, SpamFilterState};
use crate::nostr::{classifier, extractor, RelayPool, RelayPoolConfig};
use crate::types::{ConnectorConfig, NostrFilter, NostrIngestionStrategy};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub struct NostrConnector {
    config: ConnectorConfig,
    pool: RelayPool,
    spam_state: SpamFilterState,
    spam_config: SpamFilterConfig,
}

impl NostrConnector {
    pub fn new(config: ConnectorConfig) -> Result<Self> {
        Ok(Self {
            config,
            pool: RelayPool::new(RelayPoolConfig::default()),
            spam_state: SpamFilterState::new(),
            spam_config: SpamFilterConfig::default(),
        })
    }

    fn fields(&self) -> (&NostrIngestionStrategy, &[String]) {
        match &self.config {
            ConnectorConfig::Nostr { strategy, relay_urls } => (strategy, relay_urls),
            _ => unreachable!("NostrConnector built from non-Nostr config"),
        }
    }

    fn strategy_filter(&self) -> NostrFilter {
        let (strategy, _) = self.fields();
        let kinds = vec![1, 30023, 30024, 31922, 31923, 30311, 54, 30402];
        match strategy {
            NostrIngestionStrategy::RecentQuality => NostrFilter {
                kinds,
                since: Some(Utc::now() - chrono::Duration::hours(24)),
                limit: Some(500),
                ..Default::default()
            },
            NostrIngestionStrategy::PopularContent => {
                NostrFilter { kinds, limit: Some(200), ..Default::default() }
            }
            NostrIngestionStrategy::ComprehensiveCrawl => {
                NostrFilter { kinds, limit: Some(5000), ..Default::default() }
            }
        }
    }

    async fn discover_relays(&self) -> Result<()> {
        let (_, relay_urls) = self.fields();
        for url in relay_urls {
            let _ = self.pool.discover(url).await;
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectorRuntime for NostrConnector {
    fn validate_config(&self) -> Result<(), Vec<String>> {
        self.config.validate()
    }

    async fn list_metadata(&self) -> Result<HashMap<String, Option<DateTime<Utc>>>> {
        self.discover_relays().await?;
        let filter = self.strategy_filter();
        let (_, relay_urls) = self.fields();
        let events = self.pool.query(&filter, relay_urls.len().max(1)).await?;
        Ok(events
            .into_iter()
            .map(|e| (e.id, DateTime::<Utc>::from_timestamp(e.created_at, 0)))
            .collect())
    }

    async fn fetch_items(&self, external_ids: &[String]) -> Result<Vec<ConnectorItem>> {
        self.discover_relays().await?;
        let filter = self.strategy_filter();
        let (_, relay_urls) = self.fields();
        let events = self.pool.query(&filter, relay_urls.len().max(1)).await?;
        let wanted: std::collections::HashSet<&String> = external_ids.iter().collect();

        let mut items = Vec::new();
        for event in events {
            if !wanted.contains(&event.id) {
                continue;
            }
            let classification = classifier::classify(event.kind);
            if !classifier::should_index(&classification) {
                continue;
            }
            let verdict = evaluate_spam(&event, &self.spam_state, &self.spam_config, Utc::now());
            if verdict.is_spam {
                continue;
            }
            let extracted = extractor::extract(&event, classification.priority);
            items.push(ConnectorItem {
                external_id: event.id.clone(),
                title: extracted.title,
                content: extracted.content,
                url: None,
                last_modified: DateTime::<Utc>::from_timestamp(event.created_at, 0),
                attributes: serde_json::json!({
                    "event_id": event.id,
                    "pubkey": event.pubkey,
                    "kind": event.kind,
                    "quality_score": extracted.quality_score,
                    "addressable": extracted.addressable,
                    "mentions": extracted.mentions,
                }),
                permission_groups: Default::default(),
                quality_score: Some(extracted.quality_score),
            });
        }
        Ok(items)
    }
}
