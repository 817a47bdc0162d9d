//! AIParsed adapter: career pages with no structured feed. Fetches
//! the page once, strips boilerplate, converts to markdown, and asks
//! an LLM to extract the posting list as JSON. A response that isn't
//! a well-formed JSON array is a malformed response, not a legitimately
//! empty page — it fails the company's crawl log rather than being
//! silently reported as zero postings, which would be indistinguishable
//! from a career page that genuinely has no open roles.

use async_trait::async_trait;
use serde::Deserialize;

use crawl_core::adapter::{AdapterError, ListAdapter};
use crawl_core::fetcher::HttpFetcher;
use crawl_core::llm::LlmClient;
use crawl_core::model::{Company, PostingRaw};

use crate::boilerplate::html_to_markdown;
use crate::json_mapping::RawPostingJson;

const MAX_MARKDOWN_CHARS: usize = 12_000;

pub struct AiParsedAdapter {
    llm: std::sync::Arc<dyn LlmClient>,
}

impl AiParsedAdapter {
    pub fn new(llm: std::sync::Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

fn build_prompt(company_name: &str, markdown: &str) -> String {
    let truncated: String = markdown.chars().take(MAX_MARKDOWN_CHARS).collect();
    format!(
        "You are extracting job postings from a company career page rendered as markdown.\n\
         Company: {company_name}\n\n\
         Return ONLY a JSON array. Each element must be an object with these keys:\n\
         external_id (string or null), title (string or null), location (string or null), \
         url (string or null), description (string or null), posted_at (ISO 8601 string or null).\n\
         Do not include any commentary, markdown fences, or keys other than those listed.\n\
         If no postings are present, return an empty array.\n\n\
         Page content:\n{truncated}"
    )
}

fn parse_llm_response(raw: &str) -> Result<Vec<RawPostingJson>, serde_json::Error> {
    let trimmed = raw.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```");
    serde_json::from_str(trimmed.trim())
}

#[async_trait]
impl ListAdapter for AiParsedAdapter {
    async fn list_jobs(
        &self,
        company: &Company,
        fetcher: &dyn HttpFetcher,
    ) -> Result<Vec<PostingRaw>, AdapterError> {
        let fetched = fetcher.fetch(&company.career_endpoint).await?;
        let markdown = html_to_markdown(&fetched.body);
        let prompt = build_prompt(&company.name, &markdown);

        let completion = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|e| AdapterError::DependencyFailed(e.to_string()))?;

        let raw_postings = parse_llm_response(&completion)
            .map_err(|e| AdapterError::UnexpectedStructure(e.to_string()))?;
        Ok(raw_postings.into_iter().map(PostingRaw::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_company_name_and_page_content() {
        let prompt = build_prompt("Acme", "## Open roles\n- Engineer");
        assert!(prompt.contains("Acme"));
        assert!(prompt.contains("Open roles"));
    }

    #[test]
    fn parses_fenced_json_array() {
        let response = "```json\n[{\"id\": \"1\", \"title\": \"Engineer\"}]\n```";
        let postings = parse_llm_response(response).unwrap();
        assert_eq!(postings.len(), 1);
    }

    #[test]
    fn parses_bare_json_array() {
        let response = r#"[{"title": "Designer"}, {"title": "PM"}]"#;
        let postings = parse_llm_response(response).unwrap();
        assert_eq!(postings.len(), 2);
    }

    #[test]
    fn non_array_response_is_an_error() {
        assert!(parse_llm_response("Sorry, I can't help with that.").is_err());
    }

    #[test]
    fn empty_array_is_valid() {
        let postings = parse_llm_response("[]").unwrap();
        assert!(postings.is_empty());
    }

    #[tokio::test]
    async fn non_array_completion_fails_the_crawl_instead_of_reporting_zero_postings() {
        use crawl_core::fetcher::test_util::ScriptedFetcher;
        use crawl_core::llm::test_util::ScriptedLlmClient;
        use crawl_core::fetcher::FetchedPage;

        let fetcher = ScriptedFetcher::new().with_response(
            "https://acme.example/careers",
            Ok(FetchedPage {
                url: "https://acme.example/careers".to_string(),
                status: 200,
                body: "<html><body>No feed here</body></html>".to_string(),
                content_type: Some("text/html".to_string()),
            }),
        );
        let llm = std::sync::Arc::new(ScriptedLlmClient::new(vec![Ok(
            "Sorry, I can't help with that.".to_string()
        )]));
        let adapter = AiParsedAdapter::new(llm);

        let company = Company {
            id: uuid::Uuid::new_v4(),
            name: "Acme".to_string(),
            career_endpoint: "https://acme.example/careers".to_string(),
            adapter_kind: crawl_core::model::AdapterKind::AiParsed,
            active: true,
            last_crawled_at: None,
            consecutive_empty_crawls: 0,
            jobs_found_total: 0,
            viability_score: None,
        };

        let result = adapter.list_jobs(&company, &fetcher).await;
        assert!(matches!(result, Err(AdapterError::UnexpectedStructure(_))));
    }
}
