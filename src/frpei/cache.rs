// Read-through result cache (spec §4.10 caching): keyed by
// `(normalized_query, providers, filters)` with a TTL; cache hits bypass
// provider calls but still re-run Rank so weight changes take effect.

use crate::types::{FrpeiCandidate, FrpeiRequest};
use dashmap::DashMap;
use std::time::{Duration, Instant};

const CACHE_TTL: Duration = Duration::from_secs(300);
const CACHE_CAP: usize = 5_000;

pub fn cache_key(request: &FrpeiRequest) -> String {
    let mut providers = request.providers.clone().unwrap_or_default();
    providers.sort();
    let mut types = request.types.clone().unwrap_or_default();
    types.sort();
    format!("{}|{}|{}", request.query.trim().to_lowercase(), providers.join(","), types.join(","))
}

pub struct ResultCache {
    entries: DashMap<String, (Vec<FrpeiCandidate>, Instant)>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    pub fn get(&self, key: &str) -> Option<Vec<FrpeiCandidate>> {
        let hit = self.entries.get(key)?;
        let (candidates, inserted_at) = hit.value();
        if inserted_at.elapsed() > CACHE_TTL {
            drop(hit);
            self.entries.remove(key);
            return None;
        }
        Some(candidates.clone())
    }

    pub fn put(&self, key: String, value: Vec<FrpeiCandidate>) {
        if self.entries.len() >= CACHE_CAP {
            if let Some(oldest_key) = self.entries.iter().min_by_key(|e| e.value().1).map(|e| e.key().clone()) {
                self.entries.remove(&oldest_key);
            }
        }
        self.entries.insert(key, (value, Instant::now()));
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawCandidate, SearchMode};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn request(query: &str) -> FrpeiRequest {
        FrpeiRequest {
            query: query.to_string(),
            limit: 10,
            providers: None,
            types: None,
            mode: SearchMode::Hybrid,
            expand: false,
            explain: false,
            dedupe: true,
            timeout_ms: None,
        }
    }

    fn candidate() -> FrpeiCandidate {
        FrpeiCandidate {
            id: Uuid::new_v4(),
            provider: "p".into(),
            canonical_url: "https://x.com".into(),
            canonical_domain: "x.com".into(),
            canonical_title: "x".into(),
            content_type: "html".into(),
            raw: RawCandidate {
                provider: "p".into(),
                title: "x".into(),
                url: "https://x.com".into(),
                snippet: None,
                trust_tier: 5,
                relevance: 0.5,
                freshness: 0.5,
                popularity: 0.5,
            },
            entities: vec![],
            topics: vec![],
            score: 0.0,
            signals: HashMap::new(),
        }
    }

    #[test]
    fn cache_key_ignores_query_case_and_whitespace() {
        let a = cache_key(&request("  Rust Async  "));
        let b = cache_key(&request("rust async"));
        assert_eq!(a, b);
    }

    #[test]
    fn put_then_get_returns_the_cached_candidates() {
        let cache = ResultCache::new();
        let key = cache_key(&request("foo"));
        cache.put(key.clone(), vec![candidate()]);
        assert_eq!(cache.get(&key).unwrap().len(), 1);
    }

    #[test]
    fn miss_for_unknown_key_returns_none() {
        let cache = ResultCache::new();
        assert!(cache.get("nonexistent").is_none());
    }
}
