// Folder Connector (spec §4.5): walks a local directory tree, optionally
// watching it for changes. Grounded in the teacher's filesystem walking in
// `file_storage.rs`, using `walkdir` for traversal and `notify` for the
// live-watch mode already in the teacher's dependency table.

use super::{ConnectorItem, ConnectorRuntime};
use crate::types::ConnectorConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;

/// Binary formats that can't be read as UTF-8 text and must be routed
/// through a Text-Extractor (spec §4.5).
const BINARY_EXTENSIONS: &[&str] = &["pdf", "docx", "xlsx"];

fn is_binary_extension(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).map(|ext| BINARY_EXTENSIONS.iter().any(|b| b.eq_ignore_ascii_case(ext))).unwrap_or(false)
}

/// External Text-Extractor boundary (spec §4.5): binary documents are
/// handed to an out-of-process service rather than parsed in-process,
/// mirroring the teacher's `EmbeddingProvider` trait-boundary shape.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path, bytes: Vec<u8>) -> Result<String>;
}

/// Posts raw bytes to a configured HTTP extraction endpoint and reads back
/// plain text. With no endpoint configured, binary files are skipped
/// rather than guessed at.
pub struct HttpTextExtractor {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpTextExtractor {
    pub fn new(endpoint: Option<String>) -> Self {
        Self { http: reqwest::Client::new(), endpoint }
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    async fn extract(&self, path: &Path, bytes: Vec<u8>) -> Result<String> {
        let Some(endpoint) = &self.endpoint else {
            anyhow::bail!("no text-extractor endpoint configured for {}", path.display());
        };
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
        let resp = self
            .http
            .post(endpoint)
            .query(&[("filename", filename.as_str())])
            .body(bytes)
            .send()
            .await
            .context("text-extractor request failed")?;
        resp.text().await.context("text-extractor response read failed")
    }
}

pub struct FolderConnector {
    config: ConnectorConfig,
    extractor: Box<dyn TextExtractor>,
}

impl FolderConnector {
    pub fn new(config: ConnectorConfig) -> Result<Self> {
        let endpoint = match &config {
            ConnectorConfig::Folder { text_extractor_endpoint, .. } => text_extractor_endpoint.clone(),
            _ => None,
        };
        Ok(Self { config, extractor: Box::new(HttpTextExtractor::new(endpoint)) })
    }

    fn fields(&self) -> (&str, &[String], bool) {
        match &self.config {
            ConnectorConfig::Folder { root_path, allowed_extensions, watch, .. } => (root_path, allowed_extensions, *watch),
            _ => unreachable!("FolderConnector built from non-Folder config"),
        }
    }

    fn is_allowed(path: &Path, extensions: &[String]) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| extensions.iter().any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    fn walk(&self) -> Result<Vec<(String, std::fs::Metadata)>> {
        let (root_path, extensions, _) = self.fields();
        let mut out = Vec::new();
        for entry in walkdir::WalkDir::new(root_path).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() || !Self::is_allowed(path, extensions) {
                continue;
            }
            let metadata = entry.metadata().context("failed to stat file")?;
            out.push((path.to_string_lossy().to_string(), metadata));
        }
        Ok(out)
    }
}

#[async_trait]
impl ConnectorRuntime for FolderConnector {
    fn validate_config(&self) -> Result<(), Vec<String>> {
        self.config.validate()
    }

    async fn list_metadata(&self) -> Result<HashMap<String, Option<DateTime<Utc>>>> {
        let entries = self.walk()?;
        Ok(entries
            .into_iter()
            .map(|(path, meta)| {
                let modified: Option<DateTime<Utc>> = meta.modified().ok().map(DateTime::<Utc>::from);
                (path, modified)
            })
            .collect())
    }

    async fn fetch_items(&self, external_ids: &[String]) -> Result<Vec<ConnectorItem>> {
        let mut items = Vec::with_capacity(external_ids.len());
        for path in external_ids {
            let content = if is_binary_extension(Path::new(path)) {
                let bytes = match tokio::fs::read(path).await {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::warn!(path, error = %e, "folder connector: skipping unreadable binary file");
                        continue;
                    }
                };
                match self.extractor.extract(Path::new(path), bytes).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(path, error = %e, "folder connector: text extraction failed");
                        continue;
                    }
                }
            } else {
                match tokio::fs::read_to_string(path).await {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(path, error = %e, "folder connector: skipping unreadable file");
                        continue;
                    }
                }
            };
            let title = Path::new(path).file_name().and_then(|n| n.to_str()).unwrap_or(path).to_string();
            let metadata = tokio::fs::metadata(path).await.ok();
            let last_modified = metadata.and_then(|m| m.modified().ok()).map(DateTime::<Utc>::from);
            items.push(ConnectorItem {
                external_id: path.clone(),
                title,
                content,
                url: Some(format!("file://{path}")),
                last_modified,
                attributes: serde_json::json!({}),
                permission_groups: Default::default(),
                quality_score: None,
            });
        }
        Ok(items)
    }
}

/// Starts a filesystem watch that re-triggers `list_metadata` on change
/// (spec §4.5 `watch: true`); returns the watcher so the caller can keep it
/// alive for the connector's lifetime.
pub fn watch_folder(root_path: &str, on_change: tokio::sync::mpsc::Sender<()>) -> Result<notify::RecommendedWatcher> {
    use notify::{RecursiveMode, Watcher};
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if res.is_ok() {
            let _ = on_change.try_send(());
        }
    })?;
    watcher.watch(Path::new(root_path), RecursiveMode::Recursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_allowed_matches_case_insensitively() {
        let extensions = vec!["md".to_string(), "TXT".to_string()];
        assert!(FolderConnector::is_allowed(Path::new("a.MD"), &extensions));
        assert!(FolderConnector::is_allowed(Path::new("a.txt"), &extensions));
        assert!(!FolderConnector::is_allowed(Path::new("a.bin"), &extensions));
    }

    #[test]
    fn binary_extensions_are_recognized() {
        assert!(is_binary_extension(Path::new("report.pdf")));
        assert!(is_binary_extension(Path::new("sheet.XLSX")));
        assert!(!is_binary_extension(Path::new("notes.md")));
    }

    struct StubExtractor;

    #[async_trait]
    impl TextExtractor for StubExtractor {
        async fn extract(&self, _path: &Path, bytes: Vec<u8>) -> Result<String> {
            Ok(format!("extracted:{}", bytes.len()))
        }
    }

    #[tokio::test]
    async fn a_configured_extractor_is_used_for_binary_files() {
        let extractor: Box<dyn TextExtractor> = Box::new(StubExtractor);
        let text = extractor.extract(Path::new("doc.pdf"), vec![1, 2, 3]).await.unwrap();
        assert_eq!(text, "extracted:3");
    }

    #[tokio::test]
    async fn http_extractor_errors_without_an_endpoint() {
        let extractor = HttpTextExtractor::new(None);
        assert!(extractor.extract(Path::new("doc.pdf"), vec![]).await.is_err());
    }
}
