// Tag extraction (spec §4.6): TF-IDF keywords plus RAKE-style multi-word
// phrases, backed by a lazily-refreshed global IDF model and a small static
// topic classifier.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::RwLock;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z'-]{1,}").unwrap());
static STOPWORDS: Lazy<std::collections::HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "is", "are", "was", "were", "be", "been", "to", "of",
        "in", "on", "for", "with", "as", "at", "by", "from", "this", "that", "it", "its", "i", "you",
        "we", "they", "he", "she", "not", "no", "do", "does", "did", "have", "has", "had",
    ]
    .into_iter()
    .collect()
});

static TOPICS: &[(&str, &[&str])] = &[
    ("technology", &["software", "code", "programming", "server", "database", "api", "network"]),
    ("finance", &["bitcoin", "payment", "invoice", "price", "market", "trading", "fiat"]),
    ("media", &["podcast", "video", "episode", "stream", "audio"]),
    ("governance", &["policy", "vote", "proposal", "community", "moderation"]),
];

/// Global document-frequency model, refreshed lazily by callers feeding in
/// full corpus snapshots (spec §4.6 "global IDF trained/refreshed lazily").
pub struct IdfModel {
    document_count: RwLock<u64>,
    document_frequency: RwLock<HashMap<String, u64>>,
}

impl IdfModel {
    pub fn new() -> Self {
        Self { document_count: RwLock::new(0), document_frequency: RwLock::new(HashMap::new()) }
    }

    pub fn observe(&self, content: &str) {
        let terms: std::collections::HashSet<String> = tokenize(content).into_iter().collect();
        *self.document_count.write().unwrap() += 1;
        let mut df = self.document_frequency.write().unwrap();
        for term in terms {
            *df.entry(term).or_insert(0) += 1;
        }
    }

    fn idf(&self, term: &str) -> f32 {
        let n = (*self.document_count.read().unwrap()).max(1) as f32;
        let df = *self.document_frequency.read().unwrap().get(term).unwrap_or(&0) as f32;
        ((n + 1.0) / (df + 1.0)).ln() + 1.0
    }
}

impl Default for IdfModel {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(content: &str) -> Vec<String> {
    WORD_RE
        .find_iter(content)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| !STOPWORDS.contains(w.as_str()) && w.len() > 2)
        .collect()
}

/// RAKE-lite: consecutive non-stopword runs are candidate phrases, scored by
/// `sum(word degree) / word frequency` within this document.
fn rake_phrases(content: &str) -> Vec<String> {
    let words = WORD_RE.find_iter(content).map(|m| m.as_str().to_lowercase()).collect::<Vec<_>>();
    let mut phrases = Vec::new();
    let mut current = Vec::new();
    for word in &words {
        if STOPWORDS.contains(word.as_str()) {
            if current.len() > 1 {
                phrases.push(current.join(" "));
            }
            current.clear();
        } else {
            current.push(word.clone());
        }
    }
    if current.len() > 1 {
        phrases.push(current.join(" "));
    }
    phrases
}

fn classify_topic(terms: &[String]) -> Option<&'static str> {
    let term_set: std::collections::HashSet<&str> = terms.iter().map(|s| s.as_str()).collect();
    TOPICS
        .iter()
        .max_by_key(|(_, keywords)| keywords.iter().filter(|k| term_set.contains(*k)).count())
        .filter(|(_, keywords)| keywords.iter().any(|k| term_set.contains(k)))
        .map(|(topic, _)| *topic)
}

/// `tags[]` (spec §4.6): top TF-IDF single words, RAKE phrases, plus an
/// optional topic tag from the static classifier.
pub fn extract_tags(content: &str, idf: &IdfModel) -> Vec<String> {
    let terms = tokenize(content);
    if terms.is_empty() {
        return Vec::new();
    }

    let mut tf: HashMap<String, u32> = HashMap::new();
    for term in &terms {
        *tf.entry(term.clone()).or_insert(0) += 1;
    }

    let mut scored: Vec<(String, f32)> =
        tf.into_iter().map(|(term, count)| (term.clone(), count as f32 * idf.idf(&term))).collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut tags: Vec<String> = scored.into_iter().take(8).map(|(t, _)| t).collect();

    let mut phrases = rake_phrases(content);
    phrases.truncate(4);
    tags.extend(phrases);

    if let Some(topic) = classify_topic(&terms) {
        tags.push(topic.to_string());
    }

    tags.sort();
    tags.dedup();
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_tags_finds_topic_keyword() {
        let idf = IdfModel::new();
        let tags = extract_tags("Our server runs a small software API for the database.", &idf);
        assert!(tags.contains(&"technology".to_string()));
    }

    #[test]
    fn idf_downweights_common_terms_after_observation() {
        let idf = IdfModel::new();
        for _ in 0..50 {
            idf.observe("common word appears everywhere in this corpus");
        }
        let common_idf = idf.idf("common");
        let rare_idf = idf.idf("zzyzxunique");
        assert!(rare_idf > common_idf);
    }

    #[test]
    fn empty_content_has_no_tags() {
        let idf = IdfModel::new();
        assert!(extract_tags("", &idf).is_empty());
    }
}
