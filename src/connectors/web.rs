// Web Spider Connector (spec §4.5): bounded breadth-first crawl from seed
// URLs, grounded in `other_examples/manifests` usage of `scraper` for HTML
// parsing and `reqwest` for fetches.

use super::{ConnectorItem, ConnectorRuntime};
use crate::types::ConnectorConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

const USER_AGENT: &str = "veridex-web-connector";

/// A parsed `robots.txt` ruleset for one origin, scoped to the `*` group
/// (spec §4.5 "respects robots.txt"). Specific-agent groups aren't
/// distinguished; this connector identifies itself via `USER_AGENT` but
/// honors whatever the wildcard group says.
#[derive(Debug, Clone, Default)]
struct RobotsRules {
    disallow: Vec<String>,
    allow: Vec<String>,
}

impl RobotsRules {
    fn parse(body: &str) -> Self {
        let mut rules = RobotsRules::default();
        let mut in_wildcard_group = false;
        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else { continue };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();
            match directive.as_str() {
                "user-agent" => in_wildcard_group = value == "*",
                "disallow" if in_wildcard_group && !value.is_empty() => rules.disallow.push(value.to_string()),
                "allow" if in_wildcard_group && !value.is_empty() => rules.allow.push(value.to_string()),
                _ => {}
            }
        }
        rules
    }

    /// Longest matching `Allow`/`Disallow` prefix wins, per the de facto
    /// robots exclusion convention.
    fn permits(&self, path: &str) -> bool {
        let longest_disallow = self.disallow.iter().filter(|p| path.starts_with(p.as_str())).map(|p| p.len()).max();
        let longest_allow = self.allow.iter().filter(|p| path.starts_with(p.as_str())).map(|p| p.len()).max();
        match (longest_disallow, longest_allow) {
            (Some(d), Some(a)) => a >= d,
            (Some(_), None) => false,
            _ => true,
        }
    }
}

/// Deterministic content fingerprint (spec §4.5 "emits updates only when
/// content hash changes"), reused as this connector's `last_modified`
/// signal so the generic incremental-sync diff (`sync_connector`) gates
/// on it without needing its own content-hash column.
fn content_fingerprint(content: &str) -> DateTime<Utc> {
    let digest = Sha256::digest(content.as_bytes());
    let raw = u64::from_be_bytes(digest[0..8].try_into().expect("sha256 digest is at least 8 bytes"));
    let seconds = (raw % (50 * 365 * 24 * 3600)) as i64;
    DateTime::<Utc>::from_timestamp(seconds, 0).unwrap_or_else(Utc::now)
}

pub struct WebConnector {
    config: ConnectorConfig,
    http: reqwest::Client,
    robots_cache: Mutex<HashMap<String, RobotsRules>>,
}

impl WebConnector {
    pub fn new(config: ConnectorConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(20)).user_agent(USER_AGENT).build()?;
        Ok(Self { config, http, robots_cache: Mutex::new(HashMap::new()) })
    }

    async fn robots_allows(&self, url: &str) -> bool {
        let Ok(parsed) = url::Url::parse(url) else { return true };
        let origin = format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or_default());

        {
            let cache = self.robots_cache.lock().await;
            if let Some(rules) = cache.get(&origin) {
                return rules.permits(parsed.path());
            }
        }

        let robots_url = format!("{origin}/robots.txt");
        let rules = match self.http.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                RobotsRules::parse(&resp.text().await.unwrap_or_default())
            }
            _ => RobotsRules::default(),
        };
        let permits = rules.permits(parsed.path());
        self.robots_cache.lock().await.insert(origin, rules);
        permits
    }

    fn fields(&self) -> (&[String], u32, u32, bool, &[String], &[String], f32) {
        match &self.config {
            ConnectorConfig::Web {
                seed_urls,
                max_depth,
                max_pages,
                same_domain_only,
                include_patterns,
                exclude_patterns,
                requests_per_second,
            } => (
                seed_urls,
                *max_depth,
                *max_pages,
                *same_domain_only,
                include_patterns,
                exclude_patterns,
                *requests_per_second,
            ),
            _ => unreachable!("WebConnector built from non-Web config"),
        }
    }

    fn matches_patterns(&self, url: &str) -> bool {
        let (_, _, _, _, include, exclude, _) = self.fields();
        if exclude.iter().any(|p| url.contains(p.as_str())) {
            return false;
        }
        include.is_empty() || include.iter().any(|p| url.contains(p.as_str()))
    }

    async fn fetch_page(&self, url: &str) -> Result<(String, Vec<String>)> {
        let resp = self.http.get(url).send().await.context("web fetch failed")?;
        let body = resp.text().await?;
        let doc = Html::parse_document(&body);
        let link_selector = Selector::parse("a[href]").unwrap();
        let base = url::Url::parse(url).ok();
        let links: Vec<String> = doc
            .select(&link_selector)
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| match &base {
                Some(b) => b.join(href).ok().map(|u| u.to_string()),
                None => Some(href.to_string()),
            })
            .collect();
        Ok((body, links))
    }

    fn same_domain(a: &str, b: &str) -> bool {
        match (url::Url::parse(a), url::Url::parse(b)) {
            (Ok(a), Ok(b)) => a.domain() == b.domain(),
            _ => false,
        }
    }

    fn extract_text(body: &str) -> (String, String) {
        let doc = Html::parse_document(body);
        let title_selector = Selector::parse("title").unwrap();
        let title = doc
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        let body_selector = Selector::parse("body").unwrap();
        let text = doc
            .select(&body_selector)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        (title.trim().to_string(), text.trim().to_string())
    }

    async fn crawl(&self) -> Result<HashMap<String, (String, String)>> {
        let (seed_urls, max_depth, max_pages, same_domain_only, ..) = self.fields();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<(String, u32)> = seed_urls.iter().map(|u| (u.clone(), 0)).collect();
        let mut pages = HashMap::new();
        let delay = Duration::from_secs_f32(1.0 / self.fields().6.max(0.1));

        while let Some((url, depth)) = queue.pop_front() {
            if pages.len() as u32 >= max_pages || visited.contains(&url) {
                continue;
            }
            visited.insert(url.clone());
            if !self.matches_patterns(&url) {
                continue;
            }
            if !self.robots_allows(&url).await {
                continue;
            }

            match self.fetch_page(&url).await {
                Ok((body, links)) => {
                    let (title, text) = Self::extract_text(&body);
                    pages.insert(url.clone(), (title, text));
                    if depth < max_depth {
                        for link in links {
                            if same_domain_only && !Self::same_domain(&url, &link) {
                                continue;
                            }
                            if !visited.contains(&link) {
                                queue.push_back((link, depth + 1));
                            }
                        }
                    }
                }
                Err(e) => warn!(url = %url, error = %e, "web connector fetch failed"),
            }
            tokio::time::sleep(delay).await;
        }
        Ok(pages)
    }
}

#[async_trait]
impl ConnectorRuntime for WebConnector {
    fn validate_config(&self) -> Result<(), Vec<String>> {
        self.config.validate()
    }

    async fn list_metadata(&self) -> Result<HashMap<String, Option<DateTime<Utc>>>> {
        let pages = self.crawl().await?;
        Ok(pages.into_iter().map(|(url, (title, text))| (url, Some(content_fingerprint(&format!("{title}\n{text}"))))).collect())
    }

    async fn fetch_items(&self, external_ids: &[String]) -> Result<Vec<ConnectorItem>> {
        let pages = self.crawl().await?;
        let wanted: HashSet<&String> = external_ids.iter().collect();
        Ok(pages
            .into_iter()
            .filter(|(url, _)| wanted.contains(url))
            .map(|(url, (title, content))| ConnectorItem {
                last_modified: Some(content_fingerprint(&format!("{title}\n{content}"))),
                external_id: url.clone(),
                title,
                content,
                url: Some(url),
                attributes: serde_json::json!({}),
                permission_groups: Default::default(),
                quality_score: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disallow_blocks_matching_prefix() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /private/\n");
        assert!(!rules.permits("/private/page"));
        assert!(rules.permits("/public/page"));
    }

    #[test]
    fn allow_overrides_a_narrower_disallow() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /\nAllow: /public/\n");
        assert!(rules.permits("/public/page"));
        assert!(!rules.permits("/private/page"));
    }

    #[test]
    fn ignores_rules_outside_the_wildcard_group() {
        let rules = RobotsRules::parse("User-agent: Googlebot\nDisallow: /only-googlebot/\n");
        assert!(rules.permits("/only-googlebot/page"));
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        assert_eq!(content_fingerprint("same"), content_fingerprint("same"));
        assert_ne!(content_fingerprint("a"), content_fingerprint("b"));
    }
}
