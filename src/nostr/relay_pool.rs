// Relay Pool (C3, spec §4.3): Discover / Select / Query / Subscribe over a
// set of Nostr relays, with per-relay rate limiting and circuit breaking.

use crate::types::{NostrFilter, RawNostrEvent, Relay, RelayHealth, RelayPolicy};
use anyhow::{Context, Result};
use chrono::Utc;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde_json::Value as Json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_tungstenite::tungstenite::Message;
use tracing::{instrument, warn};

const CIRCUIT_BASE_COOLDOWN_SECS: i64 = 2;
const CIRCUIT_MAX_COOLDOWN_SECS: i64 = 600;
const CIRCUIT_TRIP_THRESHOLD: u32 = 3;

#[derive(Debug, Clone)]
pub struct RelayPoolConfig {
    /// Token-bucket capacity per relay per `refill_interval`.
    pub rate_limit_per_relay: usize,
    pub refill_interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for RelayPoolConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_relay: 20,
            refill_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// `RelayPool` (spec §4.3): tracks discovered relays and their health, and
/// exposes the `Discover`/`Select`/`Query`/`Subscribe` operations.
pub struct RelayPool {
    relays: DashMap<String, Relay>,
    limiters: DashMap<String, Arc<Semaphore>>,
    config: RelayPoolConfig,
    http: reqwest::Client,
}

impl RelayPool {
    pub fn new(config: RelayPoolConfig) -> Self {
        Self {
            relays: DashMap::new(),
            limiters: DashMap::new(),
            config,
            http: reqwest::Client::new(),
        }
    }

    fn limiter_for(&self, url: &str) -> Arc<Semaphore> {
        self.limiters
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.rate_limit_per_relay)))
            .clone()
    }

    /// `Discover` (spec §4.3): fetch and memoize a relay's NIP-11 document.
    #[instrument(skip(self))]
    pub async fn discover(&self, url: &str) -> Result<()> {
        let http_url = url.replacen("wss://", "https://", 1).replacen("ws://", "http://", 1);
        let policy = match self
            .http
            .get(&http_url)
            .header("Accept", "application/nostr+json")
            .send()
            .await
        {
            Ok(resp) => resp.json::<Json>().await.ok().map(|doc| parse_nip11_policy(&doc)).unwrap_or_default(),
            Err(e) => {
                warn!(relay = url, error = %e, "NIP-11 discovery failed, using default policy");
                RelayPolicy::default()
            }
        };

        self.relays.entry(url.to_string()).or_insert_with(|| Relay {
            url: url.to_string(),
            policy: None,
            health: RelayHealth::default(),
        });
        if let Some(mut relay) = self.relays.get_mut(url) {
            relay.policy = Some(policy);
        }
        Ok(())
    }

    /// `Select` (spec §4.3): health-score ranked relays, excluding any with
    /// an open circuit breaker.
    pub fn select(&self, max: usize) -> Vec<String> {
        let now = Utc::now();
        let mut candidates: Vec<(String, f64)> = self
            .relays
            .iter()
            .filter(|r| !r.health.is_circuit_open(now))
            .map(|r| (r.url.clone(), r.health.score()))
            .collect();
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        candidates.into_iter().take(max).map(|(url, _)| url).collect()
    }

    fn record_success(&self, url: &str, latency_ms: f64) {
        if let Some(mut relay) = self.relays.get_mut(url) {
            let h = &mut relay.health;
            h.avg_latency_ms = h.avg_latency_ms * 0.8 + latency_ms * 0.2;
            h.success_rate = h.success_rate * 0.9 + 0.1;
            h.consecutive_failures = 0;
            h.last_ok = Some(Utc::now());
            h.circuit_open_until = None;
        }
    }

    fn record_failure(&self, url: &str) {
        if let Some(mut relay) = self.relays.get_mut(url) {
            let h = &mut relay.health;
            h.success_rate = (h.success_rate * 0.9).max(0.0);
            h.consecutive_failures += 1;
            if h.consecutive_failures >= CIRCUIT_TRIP_THRESHOLD {
                let exponent = h.consecutive_failures - CIRCUIT_TRIP_THRESHOLD;
                let cooldown = (CIRCUIT_BASE_COOLDOWN_SECS * 2i64.saturating_pow(exponent))
                    .min(CIRCUIT_MAX_COOLDOWN_SECS);
                h.circuit_open_until = Some(Utc::now() + chrono::Duration::seconds(cooldown));
            }
        }
    }

    /// `Query` (spec §4.3): one-shot REQ/EOSE fetch across selected relays,
    /// deduplicated by event id.
    #[instrument(skip(self, filter))]
    pub async fn query(&self, filter: &NostrFilter, relay_count: usize) -> Result<Vec<RawNostrEvent>> {
        let relays = self.select(relay_count);
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for url in relays {
            let permit = self.limiter_for(&url).acquire_owned().await;
            let started = std::time::Instant::now();
            match self.fetch_once(&url, filter).await {
                Ok(events) => {
                    self.record_success(&url, started.elapsed().as_millis() as f64);
                    for e in events {
                        if seen.insert(e.id.clone()) {
                            out.push(e);
                        }
                    }
                }
                Err(e) => {
                    warn!(relay = %url, error = %e, "relay query failed");
                    self.record_failure(&url);
                }
            }
            drop(permit);
        }
        Ok(out)
    }

    async fn fetch_once(&self, url: &str, filter: &NostrFilter) -> Result<Vec<RawNostrEvent>> {
        let (mut ws, _) = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(url),
        )
        .await
        .context("relay connect timed out")??;

        let sub_id = uuid::Uuid::new_v4().to_string();
        let req = serde_json::json!(["REQ", sub_id, nostr_filter_to_json(filter)]);
        ws.send(Message::Text(req.to_string())).await?;

        let mut events = Vec::new();
        while let Some(msg) = ws.next().await {
            let msg = msg?;
            if let Message::Text(text) = msg {
                let parsed: Json = serde_json::from_str(&text)?;
                let arr = parsed.as_array().cloned().unwrap_or_default();
                match arr.first().and_then(|v| v.as_str()) {
                    Some("EVENT") => {
                        if let Some(event_json) = arr.get(2) {
                            if let Ok(event) = serde_json::from_value::<RawNostrEvent>(event_json.clone()) {
                                events.push(event);
                            }
                        }
                    }
                    Some("EOSE") => break,
                    _ => {}
                }
            }
        }
        let _ = ws.close(None).await;
        Ok(events)
    }

    /// `Subscribe` (spec §4.3): a live stream of events from a single relay
    /// until the returned receiver is dropped or `cancel` fires.
    #[instrument(skip(self, filter, cancel))]
    pub async fn subscribe(
        &self,
        url: String,
        filter: NostrFilter,
        mut cancel: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<mpsc::Receiver<RawNostrEvent>> {
        let (tx, rx) = mpsc::channel(256);
        let (mut ws, _) = tokio_tungstenite::connect_async(&url).await?;
        let sub_id = uuid::Uuid::new_v4().to_string();
        let req = serde_json::json!(["REQ", sub_id, nostr_filter_to_json(&filter)]);
        ws.send(Message::Text(req.to_string())).await?;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut cancel => break,
                    msg = ws.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if let Ok(parsed) = serde_json::from_str::<Json>(&text) {
                                    let arr = parsed.as_array().cloned().unwrap_or_default();
                                    if arr.first().and_then(|v| v.as_str()) == Some("EVENT") {
                                        if let Some(event_json) = arr.get(2) {
                                            if let Ok(event) = serde_json::from_value::<RawNostrEvent>(event_json.clone()) {
                                                if tx.send(event).await.is_err() {
                                                    break;
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                            Some(Ok(_)) => continue,
                            Some(Err(_)) | None => break,
                        }
                    }
                }
            }
            let _ = ws.close(None).await;
        });

        Ok(rx)
    }
}

fn parse_nip11_policy(doc: &Json) -> RelayPolicy {
    let mut policy = RelayPolicy::default();
    if let Some(limits) = doc.get("limitation") {
        if let Some(v) = limits.get("max_limit").and_then(|v| v.as_u64()) {
            policy.max_limit = v as u32;
        }
        if let Some(v) = limits.get("max_message_length").and_then(|v| v.as_u64()) {
            policy.max_message_length = v;
        }
        if let Some(v) = limits.get("max_subscriptions").and_then(|v| v.as_u64()) {
            policy.max_subscriptions = v as u32;
        }
    }
    if let Some(nips) = doc.get("supported_nips").and_then(|v| v.as_array()) {
        policy.supported_nips = nips.iter().filter_map(|n| n.as_u64()).map(|n| n as u32).collect();
    }
    policy
}

fn nostr_filter_to_json(filter: &NostrFilter) -> Json {
    let mut obj = serde_json::Map::new();
    if !filter.ids.is_empty() {
        obj.insert("ids".into(), serde_json::json!(filter.ids));
    }
    if !filter.authors.is_empty() {
        obj.insert("authors".into(), serde_json::json!(filter.authors));
    }
    if !filter.kinds.is_empty() {
        obj.insert("kinds".into(), serde_json::json!(filter.kinds));
    }
    for (tag, values) in &filter.tags {
        obj.insert(format!("#{tag}"), serde_json::json!(values));
    }
    if let Some(since) = filter.since {
        obj.insert("since".into(), serde_json::json!(since.timestamp()));
    }
    if let Some(until) = filter.until {
        obj.insert("until".into(), serde_json::json!(until.timestamp()));
    }
    if let Some(limit) = filter.limit {
        obj.insert("limit".into(), serde_json::json!(limit));
    }
    Json::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_excludes_circuit_open_relays() {
        let pool = RelayPool::new(RelayPoolConfig::default());
        pool.relays.insert(
            "wss://open.example".to_string(),
            Relay { url: "wss://open.example".into(), policy: None, health: RelayHealth::default() },
        );
        let mut tripped_health = RelayHealth::default();
        tripped_health.circuit_open_until = Some(Utc::now() + chrono::Duration::seconds(60));
        pool.relays.insert(
            "wss://tripped.example".to_string(),
            Relay { url: "wss://tripped.example".into(), policy: None, health: tripped_health },
        );

        let selected = pool.select(10);
        assert_eq!(selected, vec!["wss://open.example".to_string()]);
    }

    #[test]
    fn repeated_failures_trip_the_circuit_breaker() {
        let pool = RelayPool::new(RelayPoolConfig::default());
        pool.relays.insert(
            "wss://flaky.example".to_string(),
            Relay { url: "wss://flaky.example".into(), policy: None, health: RelayHealth::default() },
        );
        for _ in 0..CIRCUIT_TRIP_THRESHOLD {
            pool.record_failure("wss://flaky.example");
        }
        let relay = pool.relays.get("wss://flaky.example").unwrap();
        assert!(relay.health.is_circuit_open(Utc::now()));
    }

    #[test]
    fn nip11_policy_parses_limitation_fields() {
        let doc = serde_json::json!({
            "limitation": {"max_limit": 500, "max_message_length": 131072, "max_subscriptions": 5},
            "supported_nips": [1, 9, 11]
        });
        let policy = parse_nip11_policy(&doc);
        assert_eq!(policy.max_limit, 500);
        assert_eq!(policy.supported_nips, vec![1, 9, 11]);
    }
}
