//! Deduper/Normalizer (C4) — canonicalize a raw posting into the shape
//! the Job Store upserts against.
//!
//! Pure functions, no I/O — unit-tested directly rather than through a
//! trait double, the way `kernel::pii` and other pure transforms in
//! this codebase are tested.

use crate::model::{PostingNormalized, PostingRaw};
use url::Url;

const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid"];

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key) || is_session_id_param(key)
}

fn is_session_id_param(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    matches!(
        lower.as_str(),
        "sessionid" | "session_id" | "sid" | "phpsessid" | "jsessionid"
    )
}

/// Canonicalize a URL : lowercase scheme+host, strip
/// default ports, drop tracking params and fragments, sort remaining
/// query keys lexicographically.
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;

    let scheme = url.scheme().to_ascii_lowercase();
    url.set_scheme(&scheme).ok()?;

    if let Some(host) = url.host_str() {
        let host = host.to_ascii_lowercase();
        url.set_host(Some(&host)).ok()?;
    }

    let is_default_port = matches!(
        (scheme.as_str(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    );
    if is_default_port {
        url.set_port(None).ok()?;
    }

    let mut kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    kept.sort_by(|a, b| a.0.cmp(&b.0));

    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query = kept
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    url.set_fragment(None);

    Some(url.to_string())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// NFC-normalize and collapse whitespace, matching the
/// title/location/description cleanup rule.
fn clean_text(s: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    collapse_whitespace(&s.nfc().collect::<String>())
}

fn truncate_description(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_chars).collect();
    match truncated.rfind(char::is_whitespace) {
        Some(idx) => truncated[..idx].trim_end().to_string(),
        None => truncated,
    }
}

/// Normalize a raw posting. Returns `None` when the posting is missing
/// fields required for a valid Job row (title, URL) — a partial or
/// malformed posting is *dropped*, not failed.
pub fn normalize(raw: &PostingRaw, max_description_chars: usize) -> Option<PostingNormalized> {
    let url = raw.url.as_deref()?;
    let canonical_url = canonicalize_url(url)?;

    let title = raw.title.as_deref().map(clean_text).filter(|t| !t.is_empty())?;

    let location = raw
        .location
        .as_deref()
        .map(clean_text)
        .filter(|l| !l.is_empty());

    let description = raw
        .description
        .as_deref()
        .map(clean_text)
        .map(|d| truncate_description(&d, max_description_chars))
        .unwrap_or_default();

    let external_id = raw
        .external_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some(PostingNormalized {
        external_id,
        title,
        location,
        canonical_url,
        description,
        // Unparseable/absent posted_at stays null, never "now" .
        posted_at: raw.posted_at,
    })
}

/// `normalize ∘ normalize = normalize` : re-running
/// normalize over an already-normalized posting is a no-op. Used by
/// the orchestrator when it needs to re-derive a `PostingRaw` from a
/// stored `PostingNormalized` (e.g. idempotent re-crawl comparisons).
impl From<&PostingNormalized> for PostingRaw {
    fn from(n: &PostingNormalized) -> Self {
        PostingRaw {
            external_id: n.external_id.clone(),
            title: Some(n.title.clone()),
            location: n.location.clone(),
            url: Some(n.canonical_url.clone()),
            description: Some(n.description.clone()),
            posted_at: n.posted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_scheme_and_host_case() {
        let got = canonicalize_url("HTTPS://Example.COM/jobs/42").unwrap();
        assert_eq!(got, "https://example.com/jobs/42");
    }

    #[test]
    fn strips_default_ports() {
        assert_eq!(
            canonicalize_url("https://example.com:443/jobs").unwrap(),
            "https://example.com/jobs"
        );
        assert_eq!(
            canonicalize_url("http://example.com:80/jobs").unwrap(),
            "http://example.com/jobs"
        );
    }

    #[test]
    fn drops_tracking_params_and_sorts_rest() {
        let got = canonicalize_url(
            "https://example.com/jobs?utm_source=x&b=2&gclid=abc&a=1&sessionid=zzz",
        )
        .unwrap();
        assert_eq!(got, "https://example.com/jobs?a=1&b=2");
    }

    #[test]
    fn drops_fragment() {
        let got = canonicalize_url("https://example.com/jobs#apply").unwrap();
        assert_eq!(got, "https://example.com/jobs");
    }

    #[test]
    fn two_urls_with_same_canonical_form_collapse() {
        let a = canonicalize_url("https://Example.com/jobs/42?utm_source=linkedin").unwrap();
        let b = canonicalize_url("https://example.com:443/jobs/42").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_drops_posting_without_title() {
        let raw = PostingRaw {
            url: Some("https://example.com/jobs/1".into()),
            title: None,
            ..Default::default()
        };
        assert!(normalize(&raw, 500).is_none());
    }

    #[test]
    fn normalize_drops_posting_without_url() {
        let raw = PostingRaw {
            title: Some("Engineer".into()),
            ..Default::default()
        };
        assert!(normalize(&raw, 500).is_none());
    }

    #[test]
    fn normalize_treats_empty_external_id_as_null() {
        let raw = PostingRaw {
            url: Some("https://example.com/jobs/1".into()),
            title: Some("Engineer".into()),
            external_id: Some("   ".into()),
            ..Default::default()
        };
        let n = normalize(&raw, 500).unwrap();
        assert_eq!(n.external_id, None);
    }

    #[test]
    fn normalize_collapses_whitespace() {
        let raw = PostingRaw {
            url: Some("https://example.com/jobs/1".into()),
            title: Some("  Senior   Engineer \n".into()),
            ..Default::default()
        };
        let n = normalize(&raw, 500).unwrap();
        assert_eq!(n.title, "Senior Engineer");
    }

    #[test]
    fn normalize_truncates_description_at_whitespace() {
        let description = "word ".repeat(20);
        let raw = PostingRaw {
            url: Some("https://example.com/jobs/1".into()),
            title: Some("Engineer".into()),
            description: Some(description),
            ..Default::default()
        };
        let n = normalize(&raw, 12).unwrap();
        assert!(n.description.len() <= 12);
        assert!(!n.description.ends_with(' '));
    }

    #[test]
    fn normalize_leaves_unparseable_posted_at_null() {
        let raw = PostingRaw {
            url: Some("https://example.com/jobs/1".into()),
            title: Some("Engineer".into()),
            posted_at: None,
            ..Default::default()
        };
        let n = normalize(&raw, 500).unwrap();
        assert!(n.posted_at.is_none());
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = PostingRaw {
            url: Some("https://Example.com/jobs/1?utm_source=x&b=2".into()),
            title: Some("  Senior  Engineer ".into()),
            description: Some("  Build  things  ".into()),
            ..Default::default()
        };
        let once = normalize(&raw, 500).unwrap();
        let raw_again: PostingRaw = (&once).into();
        let twice = normalize(&raw_again, 500).unwrap();
        assert_eq!(once.canonical_url, twice.canonical_url);
        assert_eq!(once.title, twice.title);
        assert_eq!(once.description, twice.description);
    }
}
