// Content metadata (spec §4.6): reading time, word count, sentiment,
// content features, detected author/language.

use super::entities::{Entity, EntityType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const AVERAGE_WORDS_PER_MINUTE: f32 = 220.0;

static POSITIVE_WORDS: &[&str] =
    &["great", "good", "love", "excellent", "amazing", "thanks", "awesome", "happy", "excited"];
static NEGATIVE_WORDS: &[&str] =
    &["bad", "hate", "terrible", "awful", "scam", "angry", "broken", "worst", "disappointed"];

static CODE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```|`[^`]+`").unwrap());
static TABLE_ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\|.*\|\s*$").unwrap());
static LIST_ITEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[-*+]\s+\S").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub reading_time_minutes: f32,
    pub word_count: u32,
    pub sentiment: Sentiment,
    pub sentiment_confidence: f32,
    pub has_code: bool,
    pub has_table: bool,
    pub has_list: bool,
    pub detected_author: Option<String>,
    pub language: String,
}

fn classify_sentiment(content: &str) -> (Sentiment, f32) {
    let lower = content.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let total = (positive + negative).max(1) as f32;

    if positive == 0 && negative == 0 {
        return (Sentiment::Neutral, 0.5);
    }
    if positive > negative {
        (Sentiment::Positive, positive as f32 / total)
    } else if negative > positive {
        (Sentiment::Negative, negative as f32 / total)
    } else {
        (Sentiment::Neutral, 0.5)
    }
}

/// Crude language id: non-ASCII-letter ratio above a threshold assumes a
/// non-English script; otherwise assumes English. No ML dependency for this
/// heuristic stage.
fn detect_language(content: &str) -> String {
    let letters: Vec<char> = content.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return "und".to_string();
    }
    let non_ascii = letters.iter().filter(|c| !c.is_ascii()).count();
    if non_ascii as f32 / letters.len() as f32 > 0.3 {
        "und".to_string()
    } else {
        "en".to_string()
    }
}

fn detect_author(entities: &[Entity]) -> Option<String> {
    entities.iter().find(|e| matches!(e.entity_type, EntityType::Person)).map(|e| e.value.clone())
}

/// `metadata` (spec §4.6).
pub fn compute_metadata(_title: &str, content: &str, entities: &[Entity]) -> ContentMetadata {
    let word_count = content.split_whitespace().count() as u32;
    let reading_time_minutes = (word_count as f32 / AVERAGE_WORDS_PER_MINUTE).max(0.1);
    let (sentiment, sentiment_confidence) = classify_sentiment(content);

    ContentMetadata {
        reading_time_minutes,
        word_count,
        sentiment,
        sentiment_confidence,
        has_code: CODE_BLOCK_RE.is_match(content),
        has_table: TABLE_ROW_RE.is_match(content),
        has_list: LIST_ITEM_RE.is_match(content),
        detected_author: detect_author(entities),
        language: detect_language(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_time_scales_with_word_count() {
        let words = vec!["word"; 440].join(" ");
        let meta = compute_metadata("t", &words, &[]);
        assert!((meta.reading_time_minutes - 2.0).abs() < 0.1);
    }

    #[test]
    fn positive_sentiment_detected() {
        let meta = compute_metadata("t", "This is great, I love it, awesome work!", &[]);
        assert_eq!(meta.sentiment, Sentiment::Positive);
    }

    #[test]
    fn detects_code_blocks() {
        let meta = compute_metadata("t", "Here is a snippet: ```fn main() {}```", &[]);
        assert!(meta.has_code);
    }
}
