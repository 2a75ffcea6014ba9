// Content Extractor (C4, spec §4.4): produces `{title, content, tags,
// metadata, mentions, urls, quality_score}` with a kind-specific strategy.

use crate::types::RawNostrEvent;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value as Json};

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"nostr:(npub1\w+|nprofile1\w+)").unwrap());
static HASHTAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+)").unwrap());

#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub metadata: Json,
    pub mentions: Vec<String>,
    pub urls: Vec<String>,
    pub quality_score: f32,
    pub addressable: Option<String>,
}

fn tag_value<'a>(tags: &'a [Vec<String>], key: &str) -> Option<&'a str> {
    tags.iter().find(|t| t.first().map(|k| k == key).unwrap_or(false)).and_then(|t| t.get(1)).map(|s| s.as_str())
}

fn tag_values<'a>(tags: &'a [Vec<String>], key: &str) -> Vec<&'a str> {
    tags.iter()
        .filter(|t| t.first().map(|k| k == key).unwrap_or(false))
        .filter_map(|t| t.get(1))
        .map(|s| s.as_str())
        .collect()
}

/// `Extractor` (spec §4.4): kind-specific strategy over a fetched event.
pub fn extract(event: &RawNostrEvent, category_priority: u8) -> ExtractedContent {
    let hashtags: Vec<String> = tag_values(&event.tags, "t").into_iter().map(|s| s.to_string()).collect();
    let urls: Vec<String> = URL_RE.find_iter(&event.content).map(|m| m.as_str().to_string()).collect();
    let mentions: Vec<String> = MENTION_RE.captures_iter(&event.content).map(|c| c[1].to_string()).collect();
    let d_tag = tag_value(&event.tags, "d");

    let (title, content) = match event.kind {
        30023 | 30024 => {
            let title = tag_value(&event.tags, "title").unwrap_or("Untitled").to_string();
            (title, event.content.clone())
        }
        31922 | 31923 => {
            let title = tag_value(&event.tags, "title")
                .or_else(|| event.content.lines().next())
                .unwrap_or("Question")
                .to_string();
            (title, event.content.clone())
        }
        30311 | 54 => {
            let title = tag_value(&event.tags, "title").unwrap_or("Episode").to_string();
            (title, event.content.clone())
        }
        30402 => {
            let title = tag_value(&event.tags, "title").unwrap_or("Listing").to_string();
            (title, event.content.clone())
        }
        _ => {
            let first_line = event.content.lines().next().unwrap_or("").to_string();
            let title = if first_line.len() > 80 { first_line[..80].to_string() } else { first_line };
            (title, event.content.clone())
        }
    };

    let quality_score = compute_quality_score(&content, &urls, hashtags.len(), mentions.len(), event.kind);

    let metadata = json!({
        "kind": event.kind,
        "hashtags": hashtags,
    });

    ExtractedContent {
        title,
        content,
        tags: hashtags,
        metadata,
        mentions,
        urls,
        quality_score,
        addressable: d_tag.map(|d| format!("{}:{}:{}", event.kind, event.pubkey, d)),
    }
}

/// Quality score formula (spec §4.4): 0.5 base + length tiers + moderate
/// mention/hashtag bonus - excessive URL penalty + long-form bonus, clamped
/// to `[0,1]`.
fn compute_quality_score(content: &str, urls: &[String], hashtag_count: usize, mention_count: usize, kind: u32) -> f32 {
    let len = content.chars().count();
    let mut score = 0.5f32;

    for tier in [100, 500, 2000] {
        if len >= tier {
            score += 0.1;
        }
    }

    if (1..=5).contains(&mention_count) {
        score += 0.05;
    }
    if (1..=5).contains(&hashtag_count) {
        score += 0.05;
    }

    let word_count = content.split_whitespace().count().max(1);
    if urls.len() as f32 / word_count as f32 > 0.1 {
        score -= 0.2;
    }

    if matches!(kind, 30023 | 30024) {
        score += 0.1;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: u32, content: &str, tags: Vec<Vec<String>>) -> RawNostrEvent {
        RawNostrEvent {
            id: "id1".into(),
            pubkey: "pk1".into(),
            created_at: 0,
            kind,
            tags,
            content: content.to_string(),
            sig: "sig".into(),
        }
    }

    #[test]
    fn note_extraction_uses_first_line_as_title() {
        let e = event(1, "Lightning privacy matters\nmore text", vec![]);
        let extracted = extract(&e, 10);
        assert_eq!(extracted.title, "Lightning privacy matters");
    }

    #[test]
    fn long_form_uses_title_tag() {
        let e = event(30023, "body text", vec![vec!["title".into(), "My Article".into()]]);
        let extracted = extract(&e, 9);
        assert_eq!(extracted.title, "My Article");
        assert!(extracted.quality_score > 0.5);
    }

    #[test]
    fn addressable_event_identity_is_kind_pubkey_d() {
        let e = event(30023, "body", vec![vec!["d".into(), "slug-1".into()]]);
        let extracted = extract(&e, 9);
        assert_eq!(extracted.addressable.as_deref(), Some("30023:pk1:slug-1"));
    }

    #[test]
    fn excessive_urls_penalize_quality() {
        let content = "a b http://x.com http://y.com http://z.com http://w.com";
        let e = event(1, content, vec![]);
        let extracted = extract(&e, 10);
        assert!(extracted.quality_score < 0.5);
    }
}
