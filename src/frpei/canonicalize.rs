// Canonicalize + Deduplicate (spec §4.10 stages 2-3): normalize candidate
// URLs/titles and collapse collisions to the higher trust-tier provider.

use crate::types::{FrpeiCandidate, RawCandidate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use url::Url;
use uuid::Uuid;

static TRACKING_PARAMS: &[&str] = &["utm_source", "utm_medium", "utm_campaign", "utm_term", "utm_content", "fbclid", "gclid"];
static TITLE_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[-|–]\s*(Home|Official Site|Wikipedia)\s*$").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn normalize_url(raw: &str) -> (String, String) {
    match Url::parse(raw) {
        Ok(mut url) => {
            let _ = url.set_host(url.host_str().map(|h| h.to_lowercase()).as_deref());
            url.set_fragment(None);
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            url.set_query(None);
            if !kept.is_empty() {
                let qs = kept.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
                url.set_query(Some(&qs));
            }
            let domain = url.domain().unwrap_or_default().to_string();
            (url.to_string(), domain)
        }
        Err(_) => (raw.to_string(), String::new()),
    }
}

fn normalize_title(raw: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
    TITLE_SUFFIX_RE.replace(&collapsed, "").trim().to_string()
}

fn detect_content_type(url: &str) -> String {
    let lower = url.to_lowercase();
    if lower.ends_with(".pdf") {
        "pdf".to_string()
    } else if lower.contains("/video/") || lower.contains("youtube.com/watch") {
        "video".to_string()
    } else if lower.contains("/podcast/") || lower.ends_with(".mp3") {
        "audio".to_string()
    } else {
        "html".to_string()
    }
}

pub fn canonicalize(provider: &str, raw: RawCandidate) -> FrpeiCandidate {
    let (canonical_url, canonical_domain) = normalize_url(&raw.url);
    let canonical_title = normalize_title(&raw.title);
    let content_type = detect_content_type(&canonical_url);

    let mut signals = HashMap::new();
    signals.insert("provider_trust".to_string(), raw.trust_tier as f32 / 10.0);
    signals.insert("relevance".to_string(), raw.relevance);
    signals.insert("freshness".to_string(), raw.freshness);
    signals.insert("popularity".to_string(), raw.popularity);

    FrpeiCandidate {
        id: Uuid::new_v4(),
        provider: provider.to_string(),
        canonical_url,
        canonical_domain,
        canonical_title,
        content_type,
        raw,
        entities: Vec::new(),
        topics: Vec::new(),
        score: 0.0,
        signals,
    }
}

/// Key by `canonical_url`; on collision keep the higher trust-tier provider
/// and union the two candidates' signals (spec §4.10 stage 3).
pub fn deduplicate(candidates: Vec<FrpeiCandidate>) -> Vec<FrpeiCandidate> {
    let mut by_url: HashMap<String, FrpeiCandidate> = HashMap::new();
    for candidate in candidates {
        match by_url.get_mut(&candidate.canonical_url) {
            Some(existing) if existing.raw.trust_tier >= candidate.raw.trust_tier => {
                for (k, v) in candidate.signals {
                    existing.signals.entry(k).or_insert(v);
                }
            }
            Some(existing) => {
                let mut merged_signals = candidate.signals.clone();
                for (k, v) in &existing.signals {
                    merged_signals.entry(k.clone()).or_insert(*v);
                }
                let mut winner = candidate;
                winner.signals = merged_signals;
                *existing = winner;
            }
            None => {
                by_url.insert(candidate.canonical_url.clone(), candidate);
            }
        }
    }
    by_url.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(url: &str, trust_tier: u8) -> RawCandidate {
        RawCandidate {
            provider: "p".into(),
            title: "  Example -  Home  ".into(),
            url: url.into(),
            snippet: None,
            trust_tier,
            relevance: 0.5,
            freshness: 0.5,
            popularity: 0.5,
        }
    }

    #[test]
    fn normalizes_host_case_and_strips_tracking_params() {
        let (url, domain) = normalize_url("https://EXAMPLE.com/page?utm_source=x&id=5#frag");
        assert_eq!(domain, "example.com");
        assert!(url.contains("id=5"));
        assert!(!url.contains("utm_source"));
        assert!(!url.contains('#'));
    }

    #[test]
    fn normalizes_title_suffix_and_whitespace() {
        assert_eq!(normalize_title("  Example -  Home  "), "Example");
    }

    #[test]
    fn dedup_keeps_higher_trust_tier() {
        let a = canonicalize("provider-a", raw("https://x.com/page", 2));
        let b = canonicalize("provider-b", raw("https://x.com/page", 8));
        let deduped = deduplicate(vec![a, b]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].provider, "provider-b");
    }
}
