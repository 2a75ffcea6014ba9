// BM25-style lexical ranking over an in-process corpus, the scoring half of
// `LexicalSearch` (spec §4.2). Tokenization lowercases and strips
// punctuation; no stemming, matching the teacher's trigram index's
// "keep it simple, score in-process" approach.

use std::collections::HashMap;
use uuid::Uuid;

const K1: f32 = 1.2;
const B: f32 = 0.75;

pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Rank `corpus` (id, text) pairs against `query_terms` using BM25.
pub fn bm25_rank(query_terms: &[String], corpus: &[(Uuid, String)]) -> Vec<(Uuid, f32)> {
    if corpus.is_empty() {
        return Vec::new();
    }
    let docs: Vec<(Uuid, Vec<String>)> =
        corpus.iter().map(|(id, text)| (*id, tokenize(text))).collect();
    let avg_len: f32 =
        docs.iter().map(|(_, toks)| toks.len() as f32).sum::<f32>() / docs.len().max(1) as f32;

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for term in query_terms {
        let df = docs.iter().filter(|(_, toks)| toks.iter().any(|t| t == term)).count();
        doc_freq.insert(term.as_str(), df);
    }

    let n = docs.len() as f32;
    let mut scored = Vec::with_capacity(docs.len());
    for (id, toks) in &docs {
        let len = toks.len() as f32;
        let mut freq: HashMap<&str, usize> = HashMap::new();
        for t in toks {
            *freq.entry(t.as_str()).or_insert(0) += 1;
        }
        let mut score = 0.0f32;
        for term in query_terms {
            let f = *freq.get(term.as_str()).unwrap_or(&0) as f32;
            if f == 0.0 {
                continue;
            }
            let df = *doc_freq.get(term.as_str()).unwrap_or(&0) as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            let denom = f + K1 * (1.0 - B + B * len / avg_len.max(1.0));
            score += idf * (f * (K1 + 1.0)) / denom.max(1e-6);
        }
        if score > 0.0 {
            scored.push((*id, score));
        }
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_strips_punctuation() {
        assert_eq!(tokenize("Lightning, privacy!"), vec!["lightning", "privacy"]);
    }

    #[test]
    fn bm25_ranks_more_relevant_doc_higher() {
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();
        let corpus = vec![
            (id_a, "bitcoin is the best money the world has ever seen".to_string()),
            (id_b, "the weather today is nice and sunny".to_string()),
        ];
        let ranked = bm25_rank(&["bitcoin".to_string()], &corpus);
        assert_eq!(ranked.first().unwrap().0, id_a);
    }

    #[test]
    fn empty_corpus_returns_no_results() {
        assert!(bm25_rank(&["x".to_string()], &[]).is_empty());
    }
}
