// Rank (spec §4.10 stage 5): linear combination over signals with
// configurable weights, emitting a per-candidate rank log row when
// `explain=true`.

use crate::types::{FrpeiCandidate, RankLogEntry};

#[derive(Debug, Clone, Copy)]
pub struct RankWeights {
    pub provider_trust: f32,
    pub relevance: f32,
    pub freshness: f32,
    pub popularity: f32,
    pub entity_match: f32,
    pub user_affinity: f32,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self { provider_trust: 0.2, relevance: 0.35, freshness: 0.15, popularity: 0.1, entity_match: 0.1, user_affinity: 0.1 }
    }
}

fn signal(candidate: &FrpeiCandidate, key: &str) -> f32 {
    candidate.signals.get(key).cloned().unwrap_or(0.0)
}

/// Score every candidate and sort descending; returns the ranked list and,
/// when requested, a rank log row per candidate citing each signal's
/// weighted contribution.
pub fn rank(mut candidates: Vec<FrpeiCandidate>, weights: &RankWeights, explain: bool) -> (Vec<FrpeiCandidate>, Vec<RankLogEntry>) {
    let mut log = Vec::new();

    for candidate in &mut candidates {
        let contributions = [
            ("provider_trust", weights.provider_trust * signal(candidate, "provider_trust")),
            ("relevance", weights.relevance * signal(candidate, "relevance")),
            ("freshness", weights.freshness * signal(candidate, "freshness")),
            ("popularity", weights.popularity * signal(candidate, "popularity")),
            ("entity_match", weights.entity_match * signal(candidate, "entity_match")),
            ("user_affinity", weights.user_affinity * signal(candidate, "user_affinity")),
        ];
        candidate.score = contributions.iter().map(|(_, v)| v).sum();

        if explain {
            log.push(RankLogEntry {
                candidate_id: candidate.id,
                signal_contributions: contributions.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                final_score: candidate.score,
            });
        }
    }

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    (candidates, log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawCandidate;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn candidate(relevance: f32) -> FrpeiCandidate {
        let mut signals = HashMap::new();
        signals.insert("relevance".to_string(), relevance);
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
                relevance,
                freshness: 0.0,
                popularity: 0.0,
            },
            entities: vec![],
            topics: vec![],
            score: 0.0,
            signals,
        }
    }

    #[test]
    fn higher_relevance_ranks_first() {
        let (ranked, _) = rank(vec![candidate(0.2), candidate(0.9)], &RankWeights::default(), false);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn explain_emits_one_log_row_per_candidate() {
        let (_, log) = rank(vec![candidate(0.5), candidate(0.5)], &RankWeights::default(), true);
        assert_eq!(log.len(), 2);
    }
}
