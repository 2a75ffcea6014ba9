// FRPEI provider contract (spec §4.10): `Fetch(query, ctx, deadline) ->
// [RawCandidate]`. The orchestrator supplies the deadline via
// `tokio::time::timeout`, so providers just implement the fetch itself.

use crate::types::RawCandidate;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait FrpeiProvider: Send + Sync {
    async fn fetch(&self, query: &str) -> Result<Vec<RawCandidate>>;
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ProviderStats {
    pub candidate_count: usize,
    pub succeeded: bool,
}

/// Adapts the in-process Search Engine as an FRPEI provider (spec §4.10:
/// "the local Search Engine" is itself one of the federated providers).
pub struct LocalSearchProvider<F> {
    search_fn: F,
}

impl<F> LocalSearchProvider<F>
where
    F: Fn(&str) -> Result<Vec<RawCandidate>> + Send + Sync,
{
    pub fn new(search_fn: F) -> Self {
        Self { search_fn }
    }
}

#[async_trait]
impl<F> FrpeiProvider for LocalSearchProvider<F>
where
    F: Fn(&str) -> Result<Vec<RawCandidate>> + Send + Sync,
{
    async fn fetch(&self, query: &str) -> Result<Vec<RawCandidate>> {
        (self.search_fn)(query)
    }
}
