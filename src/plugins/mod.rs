// Plugin Pipeline (C9, spec §4.9): an ordered list of pure scoring plugins.
// Errors are non-fatal — a failing plugin logs and contributes nothing.

pub mod wot;

use crate::types::Document;
use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PluginContext {
    pub user_pubkey: Option<String>,
    pub query: String,
}

/// `(document_candidate, request_context, base_score) -> adjusted_score`
/// (spec §4.9). Plugins read but never mutate core state.
#[async_trait]
pub trait SearchPlugin: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, document: &Document, context: &PluginContext, base_score: f32) -> anyhow::Result<f32>;

    /// Optional batch-prefetch hook for cache warming ahead of `apply`.
    async fn prefetch(&self, _candidate_ids: &[Uuid], _context: &PluginContext) {}
}

/// Ordered, runtime-configurable plugin chain.
pub struct PluginPipeline {
    plugins: Vec<Box<dyn SearchPlugin>>,
}

impl PluginPipeline {
    pub fn new(plugins: Vec<Box<dyn SearchPlugin>>) -> Self {
        Self { plugins }
    }

    pub fn empty() -> Self {
        Self { plugins: vec![] }
    }

    pub async fn prefetch(&self, candidate_ids: &[Uuid], context: &PluginContext) {
        for plugin in &self.plugins {
            plugin.prefetch(candidate_ids, context).await;
        }
    }

    /// Run every enabled plugin in order; a plugin error is logged and
    /// leaves the running score untouched (spec §4.9, §7).
    pub async fn apply(&self, document: &Document, context: &PluginContext, base_score: f32) -> f32 {
        let mut score = base_score;
        for plugin in &self.plugins {
            match plugin.apply(document, context, score).await {
                Ok(adjusted) => score = adjusted,
                Err(e) => warn!(plugin = plugin.name(), error = %e, "plugin failed, leaving score unchanged"),
            }
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingPlugin;

    #[async_trait]
    impl SearchPlugin for FailingPlugin {
        fn name(&self) -> &str {
            "failing"
        }

        async fn apply(&self, _document: &Document, _context: &PluginContext, _base_score: f32) -> anyhow::Result<f32> {
            anyhow::bail!("boom")
        }
    }

    #[tokio::test]
    async fn failing_plugin_leaves_score_unchanged() {
        let pipeline = PluginPipeline::new(vec![Box::new(FailingPlugin)]);
        let doc = crate::types::DocumentBuilder::new().content("x").build().unwrap();
        let context = PluginContext { user_pubkey: None, query: "q".into() };
        let score = pipeline.apply(&doc, &context, 0.75).await;
        assert_eq!(score, 0.75);
    }
}
