// Process configuration, loaded once at startup from environment variables
// (with CLI overrides via clap's `env` integration in main.rs).

use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    8080
}

fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WotProviderKind {
    External,
    Local,
}

impl Default for WotProviderKind {
    fn default() -> Self {
        WotProviderKind::Local
    }
}

/// Hybrid fusion weights, spec §4.8 step 5. Fixed default `0.7/0.3`,
/// configurable (spec §9 open question #2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HybridWeights {
    pub vector: f32,
    pub lexical: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self { vector: 0.7, lexical: 0.3 }
    }
}

/// Spam filter tunables, spec §4.4 / §9 open question #3.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpamFilterConfig {
    pub duplicate_window_hours: i64,
    pub max_duplicates_per_window: u32,
    pub max_link_ratio: f32,
    pub max_suspicious_patterns: u32,
    pub max_mentions: u32,
    pub fail_threshold: u32,
}

impl Default for SpamFilterConfig {
    fn default() -> Self {
        Self {
            duplicate_window_hours: 24,
            max_duplicates_per_window: 3,
            max_link_ratio: 0.15,
            max_suspicious_patterns: 2,
            max_mentions: 10,
            fail_threshold: 2,
        }
    }
}

/// Top-level process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database_url: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_true")]
    pub wot_enabled: bool,

    #[serde(default)]
    pub wot_provider: WotProviderKind,

    #[serde(default = "default_wot_weight")]
    pub wot_weight: f32,

    #[serde(default = "default_wot_cache_ttl")]
    pub wot_cache_ttl_secs: u64,

    #[serde(default)]
    pub hybrid_weights: HybridWeights,

    #[serde(default)]
    pub spam_filter: SpamFilterConfig,
}

fn default_wot_weight() -> f32 {
    1.0
}

fn default_wot_cache_ttl() -> u64 {
    3600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            port: default_port(),
            embedding_model: default_embedding_model(),
            wot_enabled: true,
            wot_provider: WotProviderKind::default(),
            wot_weight: default_wot_weight(),
            wot_cache_ttl_secs: default_wot_cache_ttl(),
            hybrid_weights: HybridWeights::default(),
            spam_filter: SpamFilterConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// defaults for anything unset. `DATABASE_URL` is required once a real
    /// Index Store is opened, but is left empty here so unit tests that
    /// never touch storage can construct a `Config` without env setup.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();
        if let Ok(v) = std::env::var("DATABASE_URL") {
            cfg.database_url = v;
        }
        if let Ok(v) = std::env::var("PORT") {
            if let Ok(p) = v.parse() {
                cfg.port = p;
            }
        }
        if let Ok(v) = std::env::var("EMBEDDING_MODEL") {
            cfg.embedding_model = v;
        }
        if let Ok(v) = std::env::var("WOT_ENABLED") {
            cfg.wot_enabled = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Ok(v) = std::env::var("WOT_PROVIDER") {
            cfg.wot_provider = match v.to_lowercase().as_str() {
                "external" => WotProviderKind::External,
                _ => WotProviderKind::Local,
            };
        }
        if let Ok(v) = std::env::var("WOT_WEIGHT") {
            if let Ok(w) = v.parse() {
                cfg.wot_weight = w;
            }
        }
        if let Ok(v) = std::env::var("WOT_CACHE_TTL") {
            if let Ok(ttl) = v.parse() {
                cfg.wot_cache_ttl_secs = ttl;
            }
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.embedding_model, "all-MiniLM-L6-v2");
        assert!(cfg.wot_enabled);
        assert_eq!(cfg.hybrid_weights.vector, 0.7);
        assert_eq!(cfg.hybrid_weights.lexical, 0.3);
        assert_eq!(cfg.spam_filter.fail_threshold, 2);
        assert_eq!(cfg.spam_filter.max_link_ratio, 0.15);
    }
}
