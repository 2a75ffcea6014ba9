// Rule + pattern NER (spec §4.6): regex-driven extraction, adequate for the
// structured entity types the spec lists without pulling in a model runtime.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Org,
    Location,
    Date,
    Money,
    Email,
    Phone,
    Url,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Org => "org",
            EntityType::Location => "location",
            EntityType::Date => "date",
            EntityType::Money => "money",
            EntityType::Email => "email",
            EntityType::Phone => "phone",
            EntityType::Url => "url",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: EntityType,
    pub value: String,
    pub normalized: String,
    pub span: (usize, usize),
}

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d{1,3}[-.\s]?\(?\d{2,4}\)?[-.\s]?\d{3,4}[-.\s]?\d{3,4}").unwrap());
static MONEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$€£]\s?\d[\d,]*(\.\d+)?|\b\d[\d,]*(\.\d+)?\s?(USD|EUR|GBP|sats|BTC)\b").unwrap());
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}/\d{1,2}/\d{2,4}\b").unwrap()
});
static PERSON_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(Mr|Mrs|Ms|Dr|Prof)\.?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?").unwrap());
static ORG_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][A-Za-z0-9&]*(?:\s+[A-Z][A-Za-z0-9&]*)*\s+(Inc|LLC|Ltd|Corp|Foundation|Labs)\.?\b").unwrap());
static LOCATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bin\s+([A-Z][a-z]+(?:\s[A-Z][a-z]+)?)\b").unwrap()
});

fn push_matches(
    re: &Regex,
    text: &str,
    entity_type: EntityType,
    out: &mut Vec<Entity>,
    normalize: impl Fn(&str) -> String,
) {
    for m in re.find_iter(text) {
        out.push(Entity {
            entity_type,
            value: m.as_str().to_string(),
            normalized: normalize(m.as_str()),
            span: (m.start(), m.end()),
        });
    }
}

/// `entities[]` (spec §4.6): `{type, value, normalized, span}`.
pub fn extract_entities(content: &str) -> Vec<Entity> {
    let mut out = Vec::new();

    push_matches(&EMAIL_RE, content, EntityType::Email, &mut out, |s| s.to_lowercase());
    push_matches(&URL_RE, content, EntityType::Url, &mut out, |s| s.trim_end_matches(['.', ',']).to_string());
    push_matches(&PHONE_RE, content, EntityType::Phone, &mut out, |s| {
        s.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect()
    });
    push_matches(&MONEY_RE, content, EntityType::Money, &mut out, |s| s.trim().to_string());
    push_matches(&DATE_RE, content, EntityType::Date, &mut out, |s| s.to_string());
    push_matches(&PERSON_TITLE_RE, content, EntityType::Person, &mut out, |s| s.to_string());
    push_matches(&ORG_SUFFIX_RE, content, EntityType::Org, &mut out, |s| s.to_string());

    for caps in LOCATION_RE.captures_iter(content) {
        if let Some(m) = caps.get(1) {
            out.push(Entity {
                entity_type: EntityType::Location,
                value: m.as_str().to_string(),
                normalized: m.as_str().to_string(),
                span: (m.start(), m.end()),
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_email_and_url() {
        let entities = extract_entities("Contact me at jane@example.com or https://example.com/page.");
        assert!(entities.iter().any(|e| matches!(e.entity_type, EntityType::Email) && e.normalized == "jane@example.com"));
        assert!(entities.iter().any(|e| matches!(e.entity_type, EntityType::Url)));
    }

    #[test]
    fn extracts_money_amounts() {
        let entities = extract_entities("The invoice totals $1,250.00 for this quarter.");
        assert!(entities.iter().any(|e| matches!(e.entity_type, EntityType::Money)));
    }

    #[test]
    fn extracts_person_with_title() {
        let entities = extract_entities("Dr. Alice Smith published a new paper.");
        assert!(entities.iter().any(|e| matches!(e.entity_type, EntityType::Person)));
    }
}
