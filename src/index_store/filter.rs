// Filter expression for Index Store reads (spec §4.2): document_type
// equality/IN, tag ANY/ALL, quality >= threshold, date ranges, source IN,
// and the permission predicate.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub document_types: Vec<String>,
    pub sources: Vec<Uuid>,
    pub min_quality: Option<f32>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub tags_any: Vec<String>,
    /// `permission_groups ⊆ user_groups OR permission_groups = ∅` (spec §4.2).
    pub user_groups: Option<HashSet<String>>,
}

pub(super) enum Bind {
    Text(String),
    TextArray(Vec<String>),
    UuidArray(Vec<Uuid>),
    Float(f32),
    Time(DateTime<Utc>),
}

impl Bind {
    pub(super) fn apply<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        match self {
            Bind::Text(v) => query.bind(v),
            Bind::TextArray(v) => query.bind(v),
            Bind::UuidArray(v) => query.bind(v),
            Bind::Float(v) => query.bind(v),
            Bind::Time(v) => query.bind(v),
        }
    }
}

impl DocumentFilter {
    /// Build a parameterized `WHERE` clause body and its ordered bind list.
    /// Always returns at least `TRUE` so an empty filter matches everything.
    pub(super) fn to_sql(&self) -> (String, Vec<Bind>) {
        let mut clauses = Vec::new();
        let mut binds: Vec<Bind> = Vec::new();
        let mut next = 1;
        let mut placeholder = || {
            next += 1;
            format!("${}", next - 1)
        };

        if !self.document_types.is_empty() {
            clauses.push(format!("document_type = ANY({})", placeholder()));
            binds.push(Bind::TextArray(self.document_types.clone()));
        }
        if !self.sources.is_empty() {
            clauses.push(format!("source_id = ANY({})", placeholder()));
            binds.push(Bind::UuidArray(self.sources.clone()));
        }
        if let Some(min_q) = self.min_quality {
            clauses.push(format!("quality_score >= {}", placeholder()));
            binds.push(Bind::Float(min_q));
        }
        if let Some(since) = self.since {
            clauses.push(format!("indexed_at >= {}", placeholder()));
            binds.push(Bind::Time(since));
        }
        if let Some(until) = self.until {
            clauses.push(format!("indexed_at <= {}", placeholder()));
            binds.push(Bind::Time(until));
        }
        if !self.tags_any.is_empty() {
            clauses.push(format!("attributes -> 'tags' ?| {}", placeholder()));
            binds.push(Bind::TextArray(self.tags_any.clone()));
        }
        if let Some(groups) = &self.user_groups {
            let groups_vec: Vec<String> = groups.iter().cloned().collect();
            clauses.push(format!(
                "(cardinality(permission_groups) = 0 OR permission_groups && {})",
                placeholder()
            ));
            binds.push(Bind::TextArray(groups_vec));
        } else {
            // No user context at all: behave as an anonymous viewer (spec
            // §8 boundary behavior: empty user_groups -> only public docs).
            clauses.push("cardinality(permission_groups) = 0".to_string());
        }

        if clauses.is_empty() {
            ("TRUE".to_string(), binds)
        } else {
            (clauses.join(" AND "), binds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        let filter = DocumentFilter { user_groups: Some(HashSet::new()), ..Default::default() };
        let (clause, _binds) = filter.to_sql();
        assert!(clause.contains("cardinality(permission_groups) = 0"));
    }

    #[test]
    fn no_user_context_restricts_to_public_documents() {
        let filter = DocumentFilter::default();
        let (clause, binds) = filter.to_sql();
        assert_eq!(clause, "cardinality(permission_groups) = 0");
        assert!(binds.is_empty());
    }
}
