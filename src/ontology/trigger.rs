// Trigger compilation (SPEC_FULL.md supplement to C7): compiles a Trigger's
// `pattern` into a regex once and caches it, since `Search` re-evaluates
// every enabled trigger per request and recompiling per call would dominate
// query latency under load.

use crate::types::Trigger;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

static COMPILED: Lazy<RwLock<HashMap<Uuid, Regex>>> = Lazy::new(|| RwLock::new(HashMap::new()));

fn compiled_pattern(trigger: &Trigger) -> Option<Regex> {
    if let Some(re) = COMPILED.read().unwrap().get(&trigger.id) {
        return Some(re.clone());
    }
    let re = Regex::new(&format!("(?i){}", regex::escape(&trigger.pattern).replace("\\*", ".*"))).ok()?;
    COMPILED.write().unwrap().insert(trigger.id, re.clone());
    Some(re)
}

/// Evaluate `trigger.conditions` (spec §3 "Trigger"): currently supports an
/// optional `{"min_query_len": N}` predicate; absent/unrecognized keys pass.
fn conditions_satisfied(conditions: &serde_json::Value, query_text: &str) -> bool {
    match conditions.get("min_query_len").and_then(|v| v.as_u64()) {
        Some(min_len) => query_text.len() as u64 >= min_len,
        None => true,
    }
}

/// Triggers whose compiled pattern matches `query_text` and whose
/// conditions are satisfied, among the enabled set.
pub fn match_triggers<'a>(query_text: &str, triggers: &'a [Trigger]) -> Vec<&'a Trigger> {
    triggers
        .iter()
        .filter(|t| t.enabled)
        .filter(|t| compiled_pattern(t).map(|re| re.is_match(query_text)).unwrap_or(false))
        .filter(|t| conditions_satisfied(&t.conditions, query_text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TriggerAction;

    fn trigger(pattern: &str, conditions: serde_json::Value) -> Trigger {
        Trigger {
            id: Uuid::new_v4(),
            pattern: pattern.to_string(),
            conditions,
            actions: vec![TriggerAction::BoostDocType { document_type: "nostr:note".into(), factor: 1.2 }],
            priority: 0,
            enabled: true,
        }
    }

    #[test]
    fn wildcard_pattern_matches() {
        let t = trigger("bitcoin*", serde_json::json!({}));
        let matched = match_triggers("bitcoin price today", &[t]);
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn disabled_trigger_never_matches() {
        let mut t = trigger("bitcoin*", serde_json::json!({}));
        t.enabled = false;
        let matched = match_triggers("bitcoin price", &[t]);
        assert!(matched.is_empty());
    }

    #[test]
    fn min_query_len_condition_filters_short_queries() {
        let t = trigger("btc", serde_json::json!({"min_query_len": 10}));
        assert!(match_triggers("btc", &[t.clone()]).is_empty());
        assert_eq!(match_triggers("btc price over time", &[t]).len(), 1);
    }
}
