//! StructuredA adapter: paginated JSON endpoint. Iterates
//! `{career_endpoint}?page=N` until a page comes back empty or
//! `has_more` is false, whichever comes first.

use async_trait::async_trait;
use serde::Deserialize;

use crawl_core::adapter::{AdapterError, ListAdapter};
use crawl_core::fetcher::HttpFetcher;
use crawl_core::model::{Company, PostingRaw};

use crate::json_mapping::parse_postings_lenient;

/// Hard ceiling on pages fetched per crawl, independent of what the
/// source claims about `has_more` — protects against a misbehaving
/// endpoint that never stops paginating.
const MAX_PAGES: u32 = 200;

#[derive(Debug, Deserialize)]
struct StructuredAPage {
    // Deserialized as raw JSON values, not `Vec<RawPostingJson>`
    // directly: one posting with a wrong-typed field must not fail
    // deserialization of the whole page.
    #[serde(alias = "jobs", alias = "results")]
    postings: Vec<serde_json::Value>,
    #[serde(default, alias = "hasMore")]
    has_more: bool,
}

pub struct StructuredAAdapter;

impl StructuredAAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StructuredAAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn paginated_url(base: &str, page: u32) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}page={page}")
}

#[async_trait]
impl ListAdapter for StructuredAAdapter {
    async fn list_jobs(
        &self,
        company: &Company,
        fetcher: &dyn HttpFetcher,
    ) -> Result<Vec<PostingRaw>, AdapterError> {
        let mut postings = Vec::new();

        for page_number in 1..=MAX_PAGES {
            let url = paginated_url(&company.career_endpoint, page_number);
            let fetched = fetcher.fetch(&url).await?;

            let page: StructuredAPage = serde_json::from_str(&fetched.body).map_err(|e| {
                AdapterError::UnexpectedStructure(format!("page {page_number}: {e}"))
            })?;

            if page.postings.is_empty() {
                break;
            }

            let has_more = page.has_more;
            postings.extend(parse_postings_lenient(page.postings, &company.career_endpoint));

            if !has_more {
                break;
            }
        }

        Ok(postings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginated_url_appends_query_param() {
        assert_eq!(paginated_url("https://x.com/jobs", 2), "https://x.com/jobs?page=2");
        assert_eq!(
            paginated_url("https://x.com/jobs?dept=eng", 2),
            "https://x.com/jobs?dept=eng&page=2"
        );
    }

    #[test]
    fn parses_page_with_aliased_keys() {
        let json = r#"{"jobs": [{"id": "1", "title": "Engineer"}], "hasMore": false}"#;
        let page: StructuredAPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.postings.len(), 1);
        assert!(!page.has_more);
    }

    #[test]
    fn a_wrong_typed_field_on_one_posting_does_not_sink_the_page() {
        let json = r#"{"jobs": [
            {"id": "1", "title": "Engineer"},
            {"id": "2", "title": {"not": "a string"}},
            {"id": "3", "title": "Designer"}
        ], "hasMore": false}"#;
        let page: StructuredAPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.postings.len(), 3);

        let postings = parse_postings_lenient(page.postings, "https://x.com/jobs");
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].external_id.as_deref(), Some("1"));
        assert_eq!(postings[1].external_id.as_deref(), Some("3"));
    }
}
