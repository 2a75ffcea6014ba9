// Core data model (spec §3): Document, Connector, Run, Nostr side tables,
// Relay, Ontology/Dictionary/Trigger, FRPEI envelopes, Webhook sink.
//
// Strongly-typed wrappers enforce the invariants that matter across
// component boundaries (quality score range, non-empty search queries)
// the way the teacher's `types.rs` does for its own domain.

use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

/// A quality score clamped to `[0, 1]` (spec §3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore(f32);

impl QualityScore {
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for QualityScore {
    fn default() -> Self {
        Self(0.5)
    }
}

/// A non-empty search query string (spec §4.8 edge case: empty query with
/// no filters returns an empty result set, not an error — so this wrapper
/// only forbids the constructor from being misused with filters absent;
/// callers check emptiness explicitly rather than being blocked here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQueryText(String);

impl SearchQueryText {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The fixed-length embedding vector produced by the Embedding Service.
/// Dimension must be constant across the deployment (spec §3 invariant).
pub type Embedding = Vec<f32>;

pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Taxonomy tag for a document, e.g. `nostr:note`, `github:repo`, `manual`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentType(pub String);

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The universal indexed unit (spec §3 "Document").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub source_id: Option<Uuid>,
    pub external_id: Option<String>,

    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub document_type: DocumentType,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,

    pub embedding: Option<Embedding>,
    pub attributes: Json,
    pub permission_groups: HashSet<String>,
    pub quality_score: QualityScore,
}

impl Document {
    /// `(source_id, external_id)` uniqueness key, when both are present.
    pub fn source_key(&self) -> Option<(Uuid, String)> {
        match (&self.source_id, &self.external_id) {
            (Some(sid), Some(eid)) => Some((*sid, eid.clone())),
            _ => None,
        }
    }

    /// Nostr `attributes.event_id`, when this document originated from a
    /// Nostr event (globally unique per spec §3 invariant).
    pub fn nostr_event_id(&self) -> Option<&str> {
        self.attributes.get("event_id").and_then(|v| v.as_str())
    }

    /// Empty `permission_groups` means the document is public (spec §3).
    pub fn is_public(&self) -> bool {
        self.permission_groups.is_empty()
    }

    pub fn visible_to(&self, user_groups: &HashSet<String>) -> bool {
        self.is_public() || self.permission_groups.iter().any(|g| user_groups.contains(g))
    }
}

/// Builder mirroring the teacher's `DocumentBuilder` convention: fluent,
/// fills in timestamps/defaults, validates on `build()`.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    id: Option<Uuid>,
    source_id: Option<Uuid>,
    external_id: Option<String>,
    title: Option<String>,
    content: Option<String>,
    url: Option<String>,
    document_type: Option<DocumentType>,
    last_modified: Option<DateTime<Utc>>,
    embedding: Option<Embedding>,
    attributes: Json,
    permission_groups: HashSet<String>,
    quality_score: Option<QualityScore>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self { attributes: Json::Object(Default::default()), ..Default::default() }
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn source(mut self, source_id: Uuid, external_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id);
        self.external_id = Some(external_id.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn document_type(mut self, dt: impl Into<DocumentType>) -> Self {
        self.document_type = Some(dt.into());
        self
    }

    pub fn last_modified(mut self, ts: DateTime<Utc>) -> Self {
        self.last_modified = Some(ts);
        self
    }

    pub fn embedding(mut self, v: Embedding) -> Self {
        self.embedding = Some(v);
        self
    }

    pub fn attributes(mut self, attrs: Json) -> Self {
        self.attributes = attrs;
        self
    }

    pub fn permission_groups(mut self, groups: HashSet<String>) -> Self {
        self.permission_groups = groups;
        self
    }

    pub fn quality_score(mut self, q: f32) -> Self {
        self.quality_score = Some(QualityScore::new(q));
        self
    }

    pub fn build(self) -> Result<Document> {
        ensure!(self.content.as_ref().map(|c| !c.is_empty()).unwrap_or(false), "document content must be non-empty");
        let now = Utc::now();
        Ok(Document {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            source_id: self.source_id,
            external_id: self.external_id,
            title: self.title.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            url: self.url,
            document_type: self.document_type.unwrap_or_else(|| DocumentType::from("manual")),
            created_at: now,
            updated_at: now,
            indexed_at: now,
            last_modified: self.last_modified,
            embedding: self.embedding,
            attributes: self.attributes,
            permission_groups: self.permission_groups,
            quality_score: self.quality_score.unwrap_or_default(),
        })
    }
}

/// Connector kind and its tagged-variant configuration (spec §3 "Connector",
/// §9 "duck-typed configs -> tagged-variant structs").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "connector_type", rename_all = "snake_case")]
pub enum ConnectorConfig {
    Sql {
        dialect: SqlDialect,
        connection_string: String,
        metadata_query: String,
        data_query: String,
        permission_query: Option<String>,
    },
    Web {
        seed_urls: Vec<String>,
        max_depth: u32,
        max_pages: u32,
        same_domain_only: bool,
        include_patterns: Vec<String>,
        exclude_patterns: Vec<String>,
        requests_per_second: f32,
    },
    Folder {
        root_path: String,
        allowed_extensions: Vec<String>,
        watch: bool,
        /// Endpoint of the external Text-Extractor service that binary
        /// formats (PDF/DOCX/XLSX) are routed through (spec §4.5).
        #[serde(default)]
        text_extractor_endpoint: Option<String>,
    },
    Nostr {
        strategy: NostrIngestionStrategy,
        relay_urls: Vec<String>,
    },
    Rss {
        feed_url: String,
        chunk_size: usize,
        chunk_overlap: usize,
        transcribe_missing: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Postgres,
    Mysql,
    Mssql,
    Oracle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NostrIngestionStrategy {
    RecentQuality,
    PopularContent,
    ComprehensiveCrawl,
}

impl ConnectorConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectorConfig::Sql { .. } => "sql",
            ConnectorConfig::Web { .. } => "web",
            ConnectorConfig::Folder { .. } => "folder",
            ConnectorConfig::Nostr { .. } => "nostr",
            ConnectorConfig::Rss { .. } => "rss",
        }
    }

    /// `ValidateConfig` (spec §4.5), returning an explicit error list rather
    /// than a single bail so a caller can report every violation at once.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        match self {
            ConnectorConfig::Sql { connection_string, metadata_query, data_query, .. } => {
                if connection_string.is_empty() {
                    errors.push("connection_string must not be empty".to_string());
                }
                if metadata_query.is_empty() {
                    errors.push("metadata_query must not be empty".to_string());
                }
                if !data_query.contains("{IDS}") {
                    errors.push("data_query must contain the {IDS} macro".to_string());
                }
            }
            ConnectorConfig::Web { seed_urls, max_depth, max_pages, .. } => {
                if seed_urls.is_empty() {
                    errors.push("seed_urls must not be empty".to_string());
                }
                if *max_depth == 0 {
                    errors.push("max_depth must be >= 1".to_string());
                }
                if *max_pages == 0 {
                    errors.push("max_pages must be >= 1".to_string());
                }
            }
            ConnectorConfig::Folder { root_path, allowed_extensions, .. } => {
                if root_path.is_empty() {
                    errors.push("root_path must not be empty".to_string());
                }
                if allowed_extensions.is_empty() {
                    errors.push("allowed_extensions must not be empty".to_string());
                }
            }
            ConnectorConfig::Nostr { relay_urls, .. } => {
                if relay_urls.is_empty() {
                    errors.push("relay_urls must not be empty".to_string());
                }
            }
            ConnectorConfig::Rss { feed_url, chunk_size, chunk_overlap, .. } => {
                if feed_url.is_empty() {
                    errors.push("feed_url must not be empty".to_string());
                }
                if *chunk_overlap >= *chunk_size {
                    errors.push("chunk_overlap must be smaller than chunk_size".to_string());
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Resolve `{field_name}` substitutions in a URL template using row
    /// columns (spec §4.5 SQL connector). Missing field ⇒ template rejected.
    pub fn resolve_url_template(template: &str, fields: &HashMap<String, String>) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            let Some(end) = rest[start..].find('}') else {
                out.push_str(rest);
                return Ok(out);
            };
            out.push_str(&rest[..start]);
            let field = &rest[start + 1..start + end];
            let value = fields
                .get(field)
                .ok_or_else(|| anyhow::anyhow!("url template references unknown field `{field}`"))?;
            out.push_str(value);
            rest = &rest[start + end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Connector (spec §3 "Connector").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connector {
    pub id: Uuid,
    pub name: String,
    pub config: ConnectorConfig,
    pub portal_url: Option<String>,
    pub item_url_template: Option<String>,
    pub is_active: bool,
    pub schedule_expression: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_status: Option<RunStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Stopped,
}

/// Run (spec §3 "Run").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub connector_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
    pub log: Vec<RunLogEntry>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl Run {
    pub fn new(connector_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            connector_id,
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            added: 0,
            updated: 0,
            removed: 0,
            log: Vec::new(),
            error_message: None,
        }
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.log.push(RunLogEntry { at: Utc::now(), message: message.into() });
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Testable property (spec §8): `added + updated + removed` bounded by
    /// the metadata count plus the index's prior count for the source.
    pub fn within_bounds(&self, metadata_count: u64, initial_index_count: u64) -> bool {
        self.added + self.updated + self.removed <= metadata_count + initial_index_count
    }
}

/// Nostr event side table (spec §3 "Nostr Event (side table)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NostrEventRecord {
    pub event_id: String,
    pub pubkey: String,
    pub kind: u32,
    pub event_created_at: DateTime<Utc>,
    pub tags: Vec<Vec<String>>,
    pub d_tag: Option<String>,
    pub document_id: Uuid,
}

impl NostrEventRecord {
    /// Addressable event identity `kind:pubkey:d` (spec GLOSSARY).
    pub fn addressable_id(&self) -> Option<String> {
        self.d_tag.as_ref().map(|d| format!("{}:{}:{}", self.kind, self.pubkey, d))
    }
}

/// Relay (spec §3 "Relay").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayPolicy {
    pub max_limit: u32,
    pub max_message_length: u64,
    pub max_subscriptions: u32,
    pub supported_nips: Vec<u32>,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self { max_limit: 10, max_message_length: 65536, max_subscriptions: 20, supported_nips: vec![1, 11] }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayHealth {
    pub avg_latency_ms: f64,
    pub success_rate: f64,
    pub consecutive_failures: u32,
    pub last_ok: Option<DateTime<Utc>>,
    pub circuit_open_until: Option<DateTime<Utc>>,
}

impl Default for RelayHealth {
    fn default() -> Self {
        Self { avg_latency_ms: 100.0, success_rate: 1.0, consecutive_failures: 0, last_ok: None, circuit_open_until: None }
    }
}

impl RelayHealth {
    pub fn is_circuit_open(&self, now: DateTime<Utc>) -> bool {
        self.circuit_open_until.map(|t| t > now).unwrap_or(false)
    }

    /// Weighted health score used by `Relay.Select` (spec §4.3): higher
    /// success rate and lower latency score higher.
    pub fn score(&self) -> f64 {
        let latency_component = 1000.0 / (self.avg_latency_ms.max(1.0) + 1000.0);
        self.success_rate * 0.7 + latency_component * 0.3
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relay {
    pub url: String,
    pub policy: Option<RelayPolicy>,
    pub health: RelayHealth,
}

/// Nostr filter fields honored by `Relay.Query`/`Relay.Subscribe` (spec §4.3,
/// NIP-01 shape).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NostrFilter {
    pub ids: Vec<String>,
    pub authors: Vec<String>,
    pub kinds: Vec<u32>,
    #[serde(rename = "#t")]
    pub tags: HashMap<String, Vec<String>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// Raw Nostr event as received from a relay (NIP-01).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNostrEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

/// Ontology term (spec §3 "Ontology / Dictionary / Ontology Relations /
/// Aliases / Taxonomies").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyTerm {
    pub id: Uuid,
    pub term: String,
    pub parent: Option<Uuid>,
    pub synonyms: Vec<String>,
    pub relations: Vec<OntologyRelation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Broader,
    Narrower,
    Related,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyRelation {
    pub target: Uuid,
    pub kind: RelationKind,
    pub weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alias {
    pub term: String,
    pub alias: String,
    pub weight: f32,
}

/// Trigger (spec §3 "Trigger").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: Uuid,
    pub pattern: String,
    pub conditions: Json,
    pub actions: Vec<TriggerAction>,
    pub priority: i32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TriggerAction {
    BoostDocType { document_type: String, factor: f32 },
    InjectTerms { terms: Vec<String>, weight: f32 },
}

/// FRPEI request envelope (spec §3, §4.10, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrpeiRequest {
    pub query: String,
    pub limit: usize,
    pub providers: Option<Vec<String>>,
    pub types: Option<Vec<String>>,
    pub mode: SearchMode,
    pub expand: bool,
    pub explain: bool,
    pub dedupe: bool,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Hybrid,
    Vector,
    Text,
}

/// FRPEI per-provider raw candidate, before canonicalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    pub provider: String,
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
    pub trust_tier: u8,
    pub relevance: f32,
    pub freshness: f32,
    pub popularity: f32,
}

/// Candidate after canonicalization/enrichment (spec §3 "FRPEI ... Candidate").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrpeiCandidate {
    pub id: Uuid,
    pub provider: String,
    pub canonical_url: String,
    pub canonical_domain: String,
    pub canonical_title: String,
    pub content_type: String,
    pub raw: RawCandidate,
    pub entities: Vec<String>,
    pub topics: Vec<String>,
    pub score: f32,
    pub signals: HashMap<String, f32>,
}

/// Per-candidate explainability row (spec §3 "Rank Log").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankLogEntry {
    pub candidate_id: Uuid,
    pub signal_contributions: HashMap<String, f32>,
    pub final_score: f32,
}

/// FRPEI feedback (spec §3, §4.10 step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrpeiFeedback {
    pub request_id: Uuid,
    pub candidate_id: Uuid,
    pub relevance_label: i8,
}

/// Webhook subscription (spec §3 "Webhook / Webhook Delivery").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: Uuid,
    pub url: String,
    pub events: Vec<String>,
    pub secret: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub event: String,
    pub payload: Json,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_score_clamps_to_unit_interval() {
        assert_eq!(QualityScore::new(-1.0).value(), 0.0);
        assert_eq!(QualityScore::new(2.0).value(), 1.0);
        assert_eq!(QualityScore::new(0.42).value(), 0.42);
    }

    #[test]
    fn document_is_public_iff_permission_groups_empty() {
        let doc = DocumentBuilder::new().content("hello world").build().unwrap();
        assert!(doc.is_public());
        assert!(doc.visible_to(&HashSet::new()));
    }

    #[test]
    fn document_with_permission_groups_requires_membership() {
        let mut groups = HashSet::new();
        groups.insert("team-a".to_string());
        let doc = DocumentBuilder::new()
            .content("secret")
            .permission_groups(groups)
            .build()
            .unwrap();
        assert!(!doc.is_public());
        assert!(!doc.visible_to(&HashSet::new()));
        let mut viewer = HashSet::new();
        viewer.insert("team-a".to_string());
        assert!(doc.visible_to(&viewer));
    }

    #[test]
    fn url_template_resolves_known_fields() {
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), "42".to_string());
        let resolved = ConnectorConfig::resolve_url_template("https://kb.example/{id}", &fields).unwrap();
        assert_eq!(resolved, "https://kb.example/42");
    }

    #[test]
    fn url_template_rejects_missing_field() {
        let fields = HashMap::new();
        assert!(ConnectorConfig::resolve_url_template("https://kb.example/{id}", &fields).is_err());
    }

    #[test]
    fn sql_connector_config_requires_ids_macro() {
        let cfg = ConnectorConfig::Sql {
            dialect: SqlDialect::Postgres,
            connection_string: "postgres://localhost/kb".into(),
            metadata_query: "SELECT id, modified_at FROM kb".into(),
            data_query: "SELECT * FROM kb WHERE id = 1".into(),
            permission_query: None,
        };
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("{IDS}")));
    }

    #[test]
    fn run_bounds_hold_for_valid_counters() {
        let mut run = Run::new(Uuid::new_v4());
        run.added = 2;
        run.updated = 1;
        run.removed = 0;
        assert!(run.within_bounds(5, 10));
        assert!(!run.within_bounds(1, 1));
    }

    #[test]
    fn circuit_open_relay_is_detected() {
        let mut health = RelayHealth::default();
        health.circuit_open_until = Some(Utc::now() + chrono::Duration::seconds(30));
        assert!(health.is_circuit_open(Utc::now()));
    }
}
