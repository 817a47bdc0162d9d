//! Shared JSON posting shape for StructuredA/StructuredB: each
//! `PostingRaw` carries `{external_id, title, location, url,
//! description, posted_at?}` mapped from known fields. Aliases cover
//! the handful of field-naming conventions career sites actually use,
//! the way this workspace's `listing_adapter` tolerates a couple of
//! shapes per source rather than demanding one schema.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crawl_core::model::PostingRaw;

#[derive(Debug, Deserialize)]
pub struct RawPostingJson {
    #[serde(alias = "id", alias = "job_id")]
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    #[serde(alias = "link", alias = "apply_url")]
    pub url: Option<String>,
    #[serde(alias = "body", alias = "description_html")]
    pub description: Option<String>,
    #[serde(alias = "date_posted", alias = "published_at")]
    pub posted_at: Option<String>,
}

impl From<RawPostingJson> for PostingRaw {
    fn from(raw: RawPostingJson) -> Self {
        PostingRaw {
            external_id: raw.external_id,
            title: raw.title,
            location: raw.location,
            url: raw.url,
            description: raw.description,
            posted_at: raw.posted_at.as_deref().and_then(parse_posted_at),
        }
    }
}

/// Parses each element of `postings` into a `RawPostingJson`
/// independently, dropping and logging elements that don't match the
/// shape instead of failing the whole page — a career API with no
/// schema validation can easily emit one malformed posting among many
/// good ones, and that shouldn't sink the rest.
pub fn parse_postings_lenient(postings: Vec<serde_json::Value>, source: &str) -> Vec<PostingRaw> {
    postings
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawPostingJson>(value) {
            Ok(raw) => Some(PostingRaw::from(raw)),
            Err(e) => {
                tracing::warn!(source, error = %e, "dropping malformed posting from page");
                None
            }
        })
        .collect()
}

fn parse_posted_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_hms_opt(0, 0, 0).unwrap().and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_aliased_fields() {
        let json = r#"{"id": "42", "title": "Engineer", "link": "https://x.com/1", "body": "desc", "date_posted": "2026-01-05"}"#;
        let raw: RawPostingJson = serde_json::from_str(json).unwrap();
        let posting: PostingRaw = raw.into();
        assert_eq!(posting.external_id.as_deref(), Some("42"));
        assert_eq!(posting.url.as_deref(), Some("https://x.com/1"));
        assert!(posting.posted_at.is_some());
    }

    #[test]
    fn unparseable_posted_at_is_null() {
        assert!(parse_posted_at("not a date").is_none());
    }

    #[test]
    fn rfc3339_posted_at_parses() {
        assert!(parse_posted_at("2026-01-05T12:00:00Z").is_some());
    }
}
