// Web of Trust Plugin (C9, spec §4.9): score fusion over a pluggable
// `{GetScore, BatchGetScores}` provider interface, with external
// (remote HTTP, LRU-cached) and local (BFS over kind-3 follow graph)
// implementations.

use super::{PluginContext, SearchPlugin};
use crate::types::Document;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use lru::LruCache;
use std::collections::{HashMap, HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const CACHE_TTL: Duration = Duration::from_secs(3600);
const CACHE_CAP: usize = 10_000;
const EXTERNAL_BATCH_SIZE: usize = 100;
const EXTERNAL_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_HOPS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterMode {
    Strict,
    Moderate,
    Open,
}

impl FilterMode {
    pub fn threshold(self) -> f32 {
        match self {
            FilterMode::Strict => 0.7,
            FilterMode::Moderate => 0.3,
            FilterMode::Open => 0.0,
        }
    }
}

#[async_trait]
pub trait WotProvider: Send + Sync {
    async fn get_score(&self, viewer: &str, target: &str) -> Result<f32>;
    async fn batch_get_scores(&self, viewer: &str, targets: &[String]) -> Result<HashMap<String, f32>>;
}

/// External WoT provider: a remote scoring service, batched and cached.
pub struct ExternalWotProvider {
    http: reqwest::Client,
    base_url: String,
    cache: Mutex<LruCache<(String, String), (f32, Instant)>>,
}

impl ExternalWotProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::builder().timeout(EXTERNAL_TIMEOUT).build().unwrap_or_default(),
            base_url,
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAP).unwrap())),
        }
    }

    fn cached(&self, viewer: &str, target: &str) -> Option<f32> {
        let mut cache = self.cache.lock().unwrap();
        let key = (viewer.to_string(), target.to_string());
        match cache.get(&key) {
            Some((score, at)) if at.elapsed() < CACHE_TTL => Some(*score),
            _ => None,
        }
    }

    fn store(&self, viewer: &str, target: &str, score: f32) {
        self.cache.lock().unwrap().put((viewer.to_string(), target.to_string()), (score, Instant::now()));
    }
}

#[async_trait]
impl WotProvider for ExternalWotProvider {
    async fn get_score(&self, viewer: &str, target: &str) -> Result<f32> {
        if let Some(score) = self.cached(viewer, target) {
            return Ok(score);
        }
        let url = format!("{}/wot/score?viewer={}&target={}", self.base_url, viewer, target);
        let resp = self.http.get(&url).send().await?.json::<serde_json::Value>().await?;
        let score = resp.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
        self.store(viewer, target, score);
        Ok(score)
    }

    async fn batch_get_scores(&self, viewer: &str, targets: &[String]) -> Result<HashMap<String, f32>> {
        let mut out = HashMap::new();
        for chunk in targets.chunks(EXTERNAL_BATCH_SIZE) {
            for target in chunk {
                if let Some(score) = self.cached(viewer, target) {
                    out.insert(target.clone(), score);
                    continue;
                }
                if let Ok(score) = self.get_score(viewer, target).await {
                    out.insert(target.clone(), score);
                }
            }
        }
        Ok(out)
    }
}

/// Local WoT provider: BFS over a follow graph built from ingested kind-3
/// contact-list events, memoized per `(viewer, target)` within one snapshot.
pub struct LocalWotProvider {
    follows: DashMap<String, HashSet<String>>,
    memo: DashMap<(String, String), f32>,
}

impl LocalWotProvider {
    pub fn new() -> Self {
        Self { follows: DashMap::new(), memo: DashMap::new() }
    }

    pub fn record_follow_list(&self, pubkey: &str, followed: Vec<String>) {
        self.follows.insert(pubkey.to_string(), followed.into_iter().collect());
        self.memo.clear();
    }

    fn bfs_score(&self, viewer: &str, target: &str) -> f32 {
        if viewer == target {
            return 1.0;
        }
        let mut visited = HashSet::from([viewer.to_string()]);
        let mut queue = VecDeque::from([(viewer.to_string(), 0u8)]);

        while let Some((current, hop)) = queue.pop_front() {
            if hop >= MAX_HOPS {
                continue;
            }
            let Some(followed) = self.follows.get(&current) else { continue };
            for next in followed.iter() {
                if next == target {
                    return match hop + 1 {
                        1 => 1.0,
                        2 => 0.5,
                        3 => 0.25,
                        _ => 0.1,
                    };
                }
                if visited.insert(next.clone()) {
                    queue.push_back((next.clone(), hop + 1));
                }
            }
        }
        0.1
    }
}

impl Default for LocalWotProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WotProvider for LocalWotProvider {
    async fn get_score(&self, viewer: &str, target: &str) -> Result<f32> {
        let key = (viewer.to_string(), target.to_string());
        if let Some(score) = self.memo.get(&key) {
            return Ok(*score);
        }
        let score = self.bfs_score(viewer, target);
        self.memo.insert(key, score);
        Ok(score)
    }

    async fn batch_get_scores(&self, viewer: &str, targets: &[String]) -> Result<HashMap<String, f32>> {
        let mut out = HashMap::new();
        for target in targets {
            out.insert(target.clone(), self.get_score(viewer, target).await?);
        }
        Ok(out)
    }
}

/// Search plugin wiring a `WotProvider` into the scoring pipeline (spec
/// §4.9): `adjusted = base * (1 + weight * wot)`, `weight` clamped so the
/// maximum amplification stays at 2x.
pub struct WotPlugin {
    provider: Box<dyn WotProvider>,
    weight: f32,
    filter_mode: Option<FilterMode>,
}

impl WotPlugin {
    pub fn new(provider: Box<dyn WotProvider>, weight: f32, filter_mode: Option<FilterMode>) -> Self {
        Self { provider, weight: weight.clamp(0.0, 1.0), filter_mode }
    }
}

#[async_trait]
impl SearchPlugin for WotPlugin {
    fn name(&self) -> &str {
        "wot"
    }

    async fn apply(&self, document: &Document, context: &PluginContext, base_score: f32) -> Result<f32> {
        let Some(viewer) = &context.user_pubkey else { return Ok(base_score) };
        let Some(target) = document.attributes.get("pubkey").and_then(|v| v.as_str()) else {
            return Ok(base_score);
        };
        let wot = self.provider.get_score(viewer, target).await?;

        if let Some(mode) = self.filter_mode {
            if wot < mode.threshold() {
                return Ok(0.0);
            }
        }

        Ok(base_score * (1.0 + self.weight * wot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_follow_scores_full_trust() {
        let provider = LocalWotProvider::new();
        provider.record_follow_list("alice", vec!["bob".to_string()]);
        assert_eq!(provider.bfs_score("alice", "bob"), 1.0);
    }

    #[test]
    fn two_hop_follow_decays_to_half() {
        let provider = LocalWotProvider::new();
        provider.record_follow_list("alice", vec!["bob".to_string()]);
        provider.record_follow_list("bob", vec!["carol".to_string()]);
        assert_eq!(provider.bfs_score("alice", "carol"), 0.5);
    }

    #[test]
    fn unreached_target_scores_floor() {
        let provider = LocalWotProvider::new();
        provider.record_follow_list("alice", vec!["bob".to_string()]);
        assert_eq!(provider.bfs_score("alice", "zzz"), 0.1);
    }

    #[tokio::test]
    async fn amplification_is_bounded_to_2x() {
        let provider = LocalWotProvider::new();
        provider.record_follow_list("alice", vec!["bob".to_string()]);
        let plugin = WotPlugin::new(Box::new(provider), 1.0, None);
        let mut doc = crate::types::DocumentBuilder::new().content("x").build().unwrap();
        doc.attributes = serde_json::json!({"pubkey": "bob"});
        let context = PluginContext { user_pubkey: Some("alice".to_string()), query: "q".into() };
        let adjusted = plugin.apply(&doc, &context, 1.0).await.unwrap();
        assert!(adjusted <= 2.0 + 1e-6);
    }

    #[tokio::test]
    async fn strict_filter_mode_drops_low_trust_candidates() {
        let provider = LocalWotProvider::new();
        let plugin = WotPlugin::new(Box::new(provider), 1.0, Some(FilterMode::Strict));
        let mut doc = crate::types::DocumentBuilder::new().content("x").build().unwrap();
        doc.attributes = serde_json::json!({"pubkey": "stranger"});
        let context = PluginContext { user_pubkey: Some("alice".to_string()), query: "q".into() };
        let adjusted = plugin.apply(&doc, &context, 1.0).await.unwrap();
        assert_eq!(adjusted, 0.0);
    }
}
