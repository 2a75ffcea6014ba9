// Ontology & Dictionary (C7, spec §4.7): `Expand(query_text) -> QueryPlan`,
// deterministic given an ontology snapshot. Aliases and broader/narrower/
// related concepts up to depth 1 feed a disjunctive-normal-form expansion
// consumed by the Search Engine (C8).

pub mod trigger;

use crate::types::{Alias, OntologyRelation, OntologyTerm, RelationKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use uuid::Uuid;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9][A-Za-z0-9'_-]*").unwrap());
static STOPWORDS: Lazy<std::collections::HashSet<&'static str>> =
    Lazy::new(|| ["the", "a", "an", "and", "or", "of", "in", "on", "for", "to", "is"].into_iter().collect());

/// A single weighted term in the expansion's disjunctive-normal-form plan.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTerm {
    pub term: String,
    pub weight: f32,
}

/// `QueryPlan` (spec §4.7): weighted term groups plus boosts/injections
/// contributed by matching Triggers.
#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    pub terms: Vec<WeightedTerm>,
    pub doc_type_boost: HashMap<String, f32>,
    pub term_injections: Vec<WeightedTerm>,
}

/// An immutable snapshot of the ontology/dictionary/trigger tables, taken at
/// the start of an expansion so results stay deterministic (spec §4.7).
pub struct OntologySnapshot {
    terms_by_name: HashMap<String, OntologyTerm>,
    terms_by_id: HashMap<Uuid, OntologyTerm>,
    aliases: HashMap<String, Vec<Alias>>,
    triggers: Vec<crate::types::Trigger>,
}

impl OntologySnapshot {
    pub fn new(terms: Vec<OntologyTerm>, aliases: Vec<Alias>, triggers: Vec<crate::types::Trigger>) -> Self {
        let mut aliases_by_term: HashMap<String, Vec<Alias>> = HashMap::new();
        for alias in aliases {
            aliases_by_term.entry(alias.term.clone()).or_default().push(alias);
        }
        let terms_by_id = terms.iter().map(|t| (t.id, t.clone())).collect();
        let terms_by_name = terms.into_iter().map(|t| (t.term.clone(), t)).collect();
        Self { terms_by_name, terms_by_id, aliases: aliases_by_term, triggers }
    }

    fn relations_for(&self, term: &OntologyTerm) -> Vec<(&OntologyRelation, &OntologyTerm)> {
        term.relations.iter().filter_map(|rel| self.terms_by_id.get(&rel.target).map(|t| (rel, t))).collect()
    }

    fn relation_weight(kind: RelationKind) -> f32 {
        match kind {
            RelationKind::Broader => 0.6,
            RelationKind::Narrower => 0.8,
            RelationKind::Related => 0.5,
        }
    }

    /// Ontology term names that appear as a token in `text` (FRPEI Enrich
    /// stage's "topics", spec §4.10 stage 4).
    pub fn matching_term_names(&self, text: &str) -> Vec<String> {
        let tokens: std::collections::HashSet<String> = tokenize(text).into_iter().collect();
        self.terms_by_name.keys().filter(|name| tokens.contains(name.as_str())).cloned().collect()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| !STOPWORDS.contains(w.as_str()))
        .collect()
}

/// `Expand(query_text) -> QueryPlan` (spec §4.7). Tokenize, case-fold, strip
/// stopwords, then widen each token via aliases and depth-1 relations.
pub fn expand(query_text: &str, snapshot: &OntologySnapshot) -> QueryPlan {
    let tokens = tokenize(query_text);
    let mut terms = Vec::new();

    for token in &tokens {
        terms.push(WeightedTerm { term: token.clone(), weight: 1.0 });

        if let Some(aliases) = snapshot.aliases.get(token) {
            for alias in aliases {
                terms.push(WeightedTerm { term: alias.alias.clone(), weight: alias.weight });
            }
        }

        if let Some(term) = snapshot.terms_by_name.get(token) {
            for synonym in &term.synonyms {
                terms.push(WeightedTerm { term: synonym.clone(), weight: 0.9 });
            }
            for (rel, related_term) in snapshot.relations_for(term) {
                let weight = OntologySnapshot::relation_weight(rel.kind) * rel.weight;
                terms.push(WeightedTerm { term: related_term.term.clone(), weight });
            }
        }
    }

    let mut plan = QueryPlan { terms, ..Default::default() };
    apply_triggers(query_text, &snapshot.triggers, &mut plan);
    plan
}

fn apply_triggers(query_text: &str, triggers: &[crate::types::Trigger], plan: &mut QueryPlan) {
    let mut matched = trigger::match_triggers(query_text, triggers);
    matched.sort_by_key(|t| std::cmp::Reverse(t.priority));
    for matched_trigger in matched {
        for action in &matched_trigger.actions {
            match action {
                crate::types::TriggerAction::BoostDocType { document_type, factor } => {
                    *plan.doc_type_boost.entry(document_type.clone()).or_insert(1.0) *= factor;
                }
                crate::types::TriggerAction::InjectTerms { terms: injected, weight } => {
                    for term in injected {
                        plan.term_injections.push(WeightedTerm { term: term.clone(), weight: *weight });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(id: Uuid, name: &str, synonyms: Vec<&str>, relations: Vec<OntologyRelation>) -> OntologyTerm {
        OntologyTerm { id, term: name.to_string(), parent: None, synonyms: synonyms.into_iter().map(String::from).collect(), relations }
    }

    #[test]
    fn expand_includes_direct_tokens() {
        let snapshot = OntologySnapshot::new(vec![], vec![], vec![]);
        let plan = expand("bitcoin payments", &snapshot);
        let terms: Vec<&str> = plan.terms.iter().map(|t| t.term.as_str()).collect();
        assert!(terms.contains(&"bitcoin"));
        assert!(terms.contains(&"payments"));
    }

    #[test]
    fn expand_widens_via_aliases() {
        let alias = Alias { term: "btc".to_string(), alias: "bitcoin".to_string(), weight: 0.8 };
        let snapshot = OntologySnapshot::new(vec![], vec![alias], vec![]);
        let plan = expand("btc", &snapshot);
        assert!(plan.terms.iter().any(|t| t.term == "bitcoin" && t.weight == 0.8));
    }

    #[test]
    fn expand_follows_relations_one_hop() {
        let target_id = Uuid::new_v4();
        let source_id = Uuid::new_v4();
        let target = term(target_id, "cryptocurrency", vec![], vec![]);
        let relation = OntologyRelation { target: target_id, kind: RelationKind::Broader, weight: 1.0 };
        let source = term(source_id, "bitcoin", vec![], vec![relation]);
        let snapshot = OntologySnapshot::new(vec![source, target], vec![], vec![]);
        let plan = expand("bitcoin", &snapshot);
        assert!(plan.terms.iter().any(|t| t.term == "cryptocurrency"));
    }
}
