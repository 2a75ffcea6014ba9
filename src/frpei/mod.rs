// FRPEI Orchestrator (C10, spec §4.10): Plan / Canonicalize / Deduplicate /
// Enrich / Rank / Return over multiple federated providers, each behind its
// own circuit breaker, with a read-through result cache and a feedback
// endpoint for future rank tuning.

mod cache;
mod canonicalize;
mod circuit_breaker;
mod provider;
mod rank;

pub use cache::ResultCache;
pub use circuit_breaker::CircuitBreaker;
pub use provider::{FrpeiProvider, LocalSearchProvider, ProviderStats};
pub use rank::{rank as rank_candidates, RankWeights};

use crate::ontology::OntologySnapshot;
use crate::types::{FrpeiCandidate, FrpeiRequest, RankLogEntry};
use anyhow::Result;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct FrpeiWarning {
    pub provider: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct FrpeiResponse {
    pub request_id: Uuid,
    pub results: Vec<FrpeiCandidate>,
    pub provider_stats: HashMap<String, ProviderStats>,
    pub cached: bool,
    pub warnings: Vec<FrpeiWarning>,
    pub rank_log: Vec<RankLogEntry>,
}

pub struct FrpeiOrchestrator {
    providers: HashMap<String, Arc<dyn FrpeiProvider>>,
    breakers: DashMap<String, CircuitBreaker>,
    cache: ResultCache,
    rank_weights: RankWeights,
    default_timeout: Duration,
}

impl FrpeiOrchestrator {
    pub fn new(providers: Vec<(String, Arc<dyn FrpeiProvider>)>, rank_weights: RankWeights, default_timeout: Duration) -> Self {
        let breakers = DashMap::new();
        for (name, _) in &providers {
            breakers.insert(name.clone(), CircuitBreaker::new());
        }
        Self { providers: providers.into_iter().collect(), breakers, cache: ResultCache::new(), rank_weights, default_timeout }
    }

    /// `Retrieve` (spec §4.10 stages 1-6).
    #[instrument(skip(self, request, ontology))]
    pub async fn retrieve(&self, request: &FrpeiRequest, ontology: &OntologySnapshot) -> Result<FrpeiResponse> {
        let cache_key = cache::cache_key(request);
        if let Some(cached) = self.cache.get(&cache_key) {
            // Cache hits bypass provider calls but still re-run Rank
            // (spec §4.10 caching) so weight changes take effect immediately.
            let ranked = rank::rank(cached.clone(), &self.rank_weights, request.explain);
            return Ok(FrpeiResponse {
                request_id: Uuid::new_v4(),
                results: ranked.0.into_iter().take(request.limit).collect(),
                provider_stats: HashMap::new(),
                cached: true,
                warnings: vec![],
                rank_log: ranked.1,
            });
        }

        // Stage 1: Plan.
        let active_providers = self.resolve_providers(request);
        let deadline = Duration::from_millis(request.timeout_ms.unwrap_or(self.default_timeout.as_millis() as u64));

        let mut tasks = Vec::new();
        for name in &active_providers {
            let Some(provider) = self.providers.get(name).cloned() else { continue };
            if self.breakers.get(name).map(|b| b.is_open()).unwrap_or(false) {
                continue;
            }
            let query = request.query.clone();
            let name = name.clone();
            tasks.push(async move {
                let result = tokio::time::timeout(deadline, provider.fetch(&query)).await;
                (name, result)
            });
        }

        let results = futures::future::join_all(tasks).await;

        let mut raw_candidates = Vec::new();
        let mut provider_stats = HashMap::new();
        let mut warnings = Vec::new();
        let mut any_succeeded = false;

        for (name, outcome) in results {
            match outcome {
                Ok(Ok(candidates)) => {
                    any_succeeded = true;
                    if let Some(mut breaker) = self.breakers.get_mut(&name) {
                        breaker.record_success();
                    }
                    provider_stats.insert(name.clone(), ProviderStats { candidate_count: candidates.len(), succeeded: true });
                    raw_candidates.extend(candidates.into_iter().map(|c| (name.clone(), c)));
                }
                Ok(Err(e)) => {
                    if let Some(mut breaker) = self.breakers.get_mut(&name) {
                        breaker.record_failure();
                    }
                    warn!(provider = %name, error = %e, "frpei provider failed");
                    warnings.push(FrpeiWarning { provider: name.clone(), message: e.to_string() });
                    provider_stats.insert(name, ProviderStats { candidate_count: 0, succeeded: false });
                }
                Err(_) => {
                    if let Some(mut breaker) = self.breakers.get_mut(&name) {
                        breaker.record_failure();
                    }
                    warnings.push(FrpeiWarning { provider: name.clone(), message: "provider exceeded its timeout budget".into() });
                    provider_stats.insert(name, ProviderStats { candidate_count: 0, succeeded: false });
                }
            }
        }

        if !any_succeeded && !active_providers.is_empty() {
            anyhow::bail!("all frpei providers failed within the deadline");
        }

        // Stage 2: Canonicalize.
        let canonicalized: Vec<FrpeiCandidate> =
            raw_candidates.into_iter().map(|(provider, raw)| canonicalize::canonicalize(&provider, raw)).collect();

        // Stage 3: Deduplicate by canonical_url, keeping the higher trust tier.
        let deduped = canonicalize::deduplicate(canonicalized);

        // Stage 4: Enrich — attach ontology entities/topics.
        let enriched = enrich_candidates(deduped, ontology);
        self.cache.put(cache_key, enriched.clone());

        // Stage 5: Rank.
        let (ranked, rank_log) = rank::rank(enriched, &self.rank_weights, request.explain);

        // Stage 6: Return top `limit`.
        Ok(FrpeiResponse {
            request_id: Uuid::new_v4(),
            results: ranked.into_iter().take(request.limit).collect(),
            provider_stats,
            cached: false,
            warnings,
            rank_log,
        })
    }

    fn resolve_providers(&self, request: &FrpeiRequest) -> Vec<String> {
        match &request.providers {
            Some(names) if !names.is_empty() => names.clone(),
            _ => self.providers.keys().cloned().collect(),
        }
    }

    /// `GET /api/frpei/metrics` (spec §4.12): current circuit-breaker state
    /// per registered provider.
    pub fn metrics(&self) -> HashMap<String, ProviderMetrics> {
        self.providers
            .keys()
            .map(|name| {
                let breaker = self.breakers.get(name);
                let circuit_open = breaker.as_ref().map(|b| b.is_open()).unwrap_or(false);
                let consecutive_failures = breaker.as_ref().map(|b| b.consecutive_failures()).unwrap_or(0);
                (name.clone(), ProviderMetrics { circuit_open, consecutive_failures })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderMetrics {
    pub circuit_open: bool,
    pub consecutive_failures: u32,
}

/// Stage 4 (Enrich, spec §4.10): attach ontology entities/topics to each
/// candidate using the same rule-based extractor ingestion runs.
pub fn enrich_candidates(candidates: Vec<FrpeiCandidate>, ontology: &OntologySnapshot) -> Vec<FrpeiCandidate> {
    candidates
        .into_iter()
        .map(|mut candidate| {
            let text = format!("{} {}", candidate.canonical_title, candidate.raw.snippet.as_deref().unwrap_or(""));
            candidate.entities = crate::enrichment::extract_entities(&text).into_iter().map(|e| e.normalized).collect();
            candidate.topics = ontology.matching_term_names(&text);
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawCandidate;

    #[test]
    fn enrich_attaches_matching_ontology_topics() {
        let term = crate::types::OntologyTerm {
            id: Uuid::new_v4(),
            term: "bitcoin".to_string(),
            parent: None,
            synonyms: vec![],
            relations: vec![],
        };
        let snapshot = OntologySnapshot::new(vec![term], vec![], vec![]);
        let candidate = FrpeiCandidate {
            id: Uuid::new_v4(),
            provider: "p".into(),
            canonical_url: "https://x.com".into(),
            canonical_domain: "x.com".into(),
            canonical_title: "Bitcoin price surges".into(),
            content_type: "html".into(),
            raw: RawCandidate {
                provider: "p".into(),
                title: "Bitcoin price surges".into(),
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
        };
        let enriched = enrich_candidates(vec![candidate], &snapshot);
        assert_eq!(enriched[0].topics, vec!["bitcoin".to_string()]);
    }
}
