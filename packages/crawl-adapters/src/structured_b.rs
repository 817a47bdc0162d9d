//! StructuredB adapter: a single JSON document, no pagination —
//! otherwise identical semantics to StructuredA.

use async_trait::async_trait;
use serde::Deserialize;

use crawl_core::adapter::{AdapterError, ListAdapter};
use crawl_core::fetcher::HttpFetcher;
use crawl_core::model::{Company, PostingRaw};

use crate::json_mapping::parse_postings_lenient;

#[derive(Debug, Deserialize)]
struct StructuredBDocument {
    // Raw JSON values, not `Vec<RawPostingJson>` directly — one
    // wrong-typed posting must not fail deserialization of the whole
    // document.
    #[serde(alias = "jobs", alias = "results", alias = "openings")]
    postings: Vec<serde_json::Value>,
}

pub struct StructuredBAdapter;

impl StructuredBAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StructuredBAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListAdapter for StructuredBAdapter {
    async fn list_jobs(
        &self,
        company: &Company,
        fetcher: &dyn HttpFetcher,
    ) -> Result<Vec<PostingRaw>, AdapterError> {
        let fetched = fetcher.fetch(&company.career_endpoint).await?;

        let document: StructuredBDocument = serde_json::from_str(&fetched.body)
            .map_err(|e| AdapterError::UnexpectedStructure(e.to_string()))?;

        Ok(parse_postings_lenient(document.postings, &company.career_endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_document() {
        let json = r#"{"openings": [{"id": "1", "title": "Engineer"}, {"id": "2", "title": "Designer"}]}"#;
        let document: StructuredBDocument = serde_json::from_str(json).unwrap();
        assert_eq!(document.postings.len(), 2);
    }

    #[test]
    fn malformed_document_is_an_error() {
        let result: Result<StructuredBDocument, _> = serde_json::from_str("not json");
        assert!(result.is_err());
    }

    #[test]
    fn a_wrong_typed_field_on_one_posting_does_not_sink_the_document() {
        let json = r#"{"openings": [
            {"id": "1", "title": "Engineer"},
            {"id": "2", "location": 12345},
            {"id": "3", "title": "Designer"}
        ]}"#;
        let document: StructuredBDocument = serde_json::from_str(json).unwrap();
        assert_eq!(document.postings.len(), 3);

        let postings = parse_postings_lenient(document.postings, "https://x.com/jobs");
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].external_id.as_deref(), Some("1"));
        assert_eq!(postings[1].external_id.as_deref(), Some("3"));
    }
}
