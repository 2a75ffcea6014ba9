// Search Engine (C8, spec §4.8): `Search(request) -> Response`, the fusion
// of Ontology expansion, the Index Store's two retrieval primitives, the
// Plugin Pipeline, and Trigger-driven score adjustments.

use crate::config::HybridWeights;
use crate::embedding::EmbeddingService;
use crate::index_store::{DocumentFilter, Facets, IndexStore};
use crate::ontology::{expand, OntologySnapshot, QueryPlan};
use crate::plugins::{PluginContext, PluginPipeline};
use crate::types::{Document, SearchQueryText};
use anyhow::Result;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Hybrid,
    Vector,
    Text,
}

#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub user_groups: HashSet<String>,
    pub user_pubkey: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: SearchQueryText,
    pub mode: SearchMode,
    pub limit: usize,
    pub offset: usize,
    pub filters: DocumentFilter,
    pub user_context: UserContext,
    pub expand: bool,
    pub explain: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreExplain {
    pub vector_score: f32,
    pub text_score: f32,
    pub boosts: f32,
    pub plugin_adjustment: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
    pub explain: Option<ScoreExplain>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: String,
    pub count: usize,
    pub total: usize,
    pub results: Vec<SearchResult>,
    pub facets: Facets,
}

struct Candidate {
    id: Uuid,
    vector_score: f32,
    text_score: f32,
    boosts: f32,
}

pub struct SearchEngine<'a> {
    store: &'a IndexStore,
    embeddings: &'a EmbeddingService,
    plugins: &'a PluginPipeline,
    weights: HybridWeights,
}

impl<'a> SearchEngine<'a> {
    pub fn new(store: &'a IndexStore, embeddings: &'a EmbeddingService, plugins: &'a PluginPipeline, weights: HybridWeights) -> Self {
        Self { store, embeddings, plugins, weights }
    }

    /// `Search(request) -> Response` (spec §4.8 steps 1-9).
    #[instrument(skip(self, request, snapshot))]
    pub async fn search(&self, request: &SearchRequest, snapshot: &OntologySnapshot) -> Result<SearchResponse> {
        // Edge case (spec §4.8): empty query with filters returns most
        // recent matches rather than an error.
        if request.query.is_empty() {
            return self.recent_documents(request).await;
        }

        // Step 1: ontology expansion.
        let plan = if request.expand {
            expand(request.query.as_str(), snapshot)
        } else {
            QueryPlan { terms: vec![], ..Default::default() }
        };

        // Step 2: permission predicate already folded into `request.filters`
        // by the caller (HTTP layer) via `DocumentFilter::with_user_groups`.
        let k_v = (request.limit * 4).max(50);
        let k_l = k_v;

        let mut vector_hits: HashMap<Uuid, f32> = HashMap::new();
        if matches!(request.mode, SearchMode::Vector | SearchMode::Hybrid) {
            let qvec = self.embeddings.embed(request.query.as_str()).await?;
            for (id, sim) in self.store.vector_search(&qvec, k_v, &request.filters).await? {
                vector_hits.insert(id, sim);
            }
        }

        let mut text_hits: HashMap<Uuid, f32> = HashMap::new();
        if matches!(request.mode, SearchMode::Text | SearchMode::Hybrid) {
            let expanded_query = expanded_query_text(request.query.as_str(), &plan);
            for (id, rank) in self.store.lexical_search(&expanded_query, k_l, &request.filters).await? {
                text_hits.insert(id, rank);
            }
        }

        // Step 5: fuse in hybrid mode, normalizing each side to [0,1].
        let vector_max = vector_hits.values().cloned().fold(0.0f32, f32::max).max(1e-6);
        let text_max = text_hits.values().cloned().fold(0.0f32, f32::max).max(1e-6);

        let mut ids: HashSet<Uuid> = HashSet::new();
        ids.extend(vector_hits.keys().cloned());
        ids.extend(text_hits.keys().cloned());

        let mut candidates: Vec<Candidate> = ids
            .into_iter()
            .map(|id| {
                let v = vector_hits.get(&id).cloned().unwrap_or(0.0) / vector_max;
                let t = text_hits.get(&id).cloned().unwrap_or(0.0) / text_max;
                Candidate { id, vector_score: v, text_score: t, boosts: 0.0 }
            })
            .collect();

        if candidates.is_empty() {
            return Ok(empty_response(request));
        }

        // Step 3/4: fetch documents to apply trigger/plugin scoring against.
        let ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
        let mut documents = self.store.fetch_by_ids(&ids).await?;
        let doc_by_id: HashMap<Uuid, Document> = documents.drain(..).map(|d| (d.id, d)).collect();

        let mut merged: Vec<(Document, f32, ScoreExplain)> = Vec::with_capacity(candidates.len());
        for candidate in &mut candidates {
            let Some(doc) = doc_by_id.get(&candidate.id) else { continue };

            let fused = match request.mode {
                SearchMode::Hybrid => {
                    self.weights.vector * candidate.vector_score + self.weights.lexical * candidate.text_score
                }
                SearchMode::Vector => candidate.vector_score,
                SearchMode::Text => candidate.text_score,
            };

            // Step 6: Trigger actions.
            let doc_type_factor = plan.doc_type_boost.get(doc.document_type.0.as_str()).cloned().unwrap_or(1.0);
            let injection_boost: f32 = plan
                .term_injections
                .iter()
                .filter(|t| doc.content.to_lowercase().contains(&t.term.to_lowercase()))
                .map(|t| t.weight)
                .sum();
            let boosted = fused * doc_type_factor + injection_boost;
            candidate.boosts = boosted - fused;

            merged.push((
                doc.clone(),
                boosted,
                ScoreExplain { vector_score: candidate.vector_score, text_score: candidate.text_score, boosts: candidate.boosts, plugin_adjustment: 0.0 },
            ));
        }

        // Step 7: plugin pipeline.
        let context = PluginContext { user_pubkey: request.user_context.user_pubkey.clone(), query: request.query.as_str().to_string() };
        self.plugins.prefetch(&ids, &context).await;
        let mut adjusted = Vec::with_capacity(merged.len());
        for (doc, base_score, mut explain) in merged {
            let final_score = self.plugins.apply(&doc, &context, base_score).await;
            explain.plugin_adjustment = final_score - base_score;
            adjusted.push((doc, final_score, explain));
        }

        // Step 8: sort, tie-break by indexed_at desc then id asc, truncate.
        adjusted.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.indexed_at.cmp(&a.0.indexed_at))
                .then_with(|| a.0.id.cmp(&b.0.id))
        });

        let total = adjusted.len();
        let page: Vec<SearchResult> = adjusted
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .map(|(document, score, explain)| SearchResult { document, score, explain: request.explain.then_some(explain) })
            .collect();

        // Step 9: facets over the pre-truncation candidate pool.
        let facets = self.store.facets(&request.filters).await?;

        Ok(SearchResponse {
            query: request.query.as_str().to_string(),
            mode: mode_label(request.mode).to_string(),
            count: page.len(),
            total,
            results: page,
            facets,
        })
    }

    async fn recent_documents(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let documents = self.store.recent_documents(&request.filters, request.offset + request.limit).await?;
        let total = documents.len();
        let page: Vec<SearchResult> = documents
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .map(|document| SearchResult { document, score: 0.0, explain: None })
            .collect();
        let facets = self.store.facets(&request.filters).await?;
        Ok(SearchResponse {
            query: String::new(),
            mode: mode_label(request.mode).to_string(),
            count: page.len(),
            total,
            results: page,
            facets,
        })
    }
}

fn mode_label(mode: SearchMode) -> &'static str {
    match mode {
        SearchMode::Hybrid => "hybrid",
        SearchMode::Vector => "vector",
        SearchMode::Text => "text",
    }
}

fn expanded_query_text(original: &str, plan: &QueryPlan) -> String {
    let mut parts: Vec<String> = vec![original.to_string()];
    parts.extend(plan.terms.iter().map(|t| t.term.clone()));
    parts.join(" ")
}

fn empty_response(request: &SearchRequest) -> SearchResponse {
    SearchResponse {
        query: request.query.as_str().to_string(),
        mode: mode_label(request.mode).to_string(),
        count: 0,
        total: 0,
        results: vec![],
        facets: Facets::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_label_matches_wire_format() {
        assert_eq!(mode_label(SearchMode::Hybrid), "hybrid");
        assert_eq!(mode_label(SearchMode::Vector), "vector");
        assert_eq!(mode_label(SearchMode::Text), "text");
    }

    #[test]
    fn expanded_query_includes_original_and_plan_terms() {
        let plan = QueryPlan { terms: vec![crate::ontology::WeightedTerm { term: "btc".into(), weight: 1.0 }], ..Default::default() };
        let expanded = expanded_query_text("bitcoin", &plan);
        assert!(expanded.contains("bitcoin"));
        assert!(expanded.contains("btc"));
    }
}
