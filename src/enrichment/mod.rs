// NLP Enrichment (C6, spec §4.6): tag extraction, rule-based NER, content
// metadata, and entity-relationship bookkeeping. Runs asynchronously after
// Upsert or in batch, grounded in the teacher's `services/` pure-function
// analysis style (no ML runtime needed for this stage).

mod entities;
mod keywords;
mod metadata;

pub use entities::{extract_entities, Entity, EntityType};
pub use keywords::{extract_tags, IdfModel};
pub use metadata::{compute_metadata, ContentMetadata};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrichment {
    pub tags: Vec<String>,
    pub entities: Vec<Entity>,
    pub metadata: ContentMetadata,
}

/// Per-document enrichment status (spec §4.6 "tracked per document").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Pending,
    Processed { version: u32 },
    Failed,
}

/// `(re)process` (spec §4.6): idempotent given the same `(title, content)`
/// and IDF model snapshot.
pub fn process(title: &str, content: &str, idf: &IdfModel) -> Enrichment {
    let tags = extract_tags(content, idf);
    let entities = extract_entities(content);
    let metadata = compute_metadata(title, content, &entities);
    Enrichment { tags, entities, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_is_idempotent_for_the_same_input() {
        let idf = IdfModel::new();
        let a = process("Title", "Some content about Rust and async programming.", &idf);
        let b = process("Title", "Some content about Rust and async programming.", &idf);
        assert_eq!(a.tags, b.tags);
        assert_eq!(a.metadata.word_count, b.metadata.word_count);
    }
}
