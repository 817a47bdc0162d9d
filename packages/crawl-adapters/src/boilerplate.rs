//! HTML boilerplate stripping + markdown conversion for the AIParsed
//! adapter, grounded in `kernel::simple_scraper::SimpleScraper`'s use
//! of `scraper` to drop chrome elements before `htmd::convert`.

use scraper::{Html, Selector};

const BOILERPLATE_SELECTORS: &[&str] = &["script", "style", "nav", "footer", "header", "svg", "noscript"];

/// Strip script/style/nav/footer/header/svg nodes, then convert the
/// remaining document to markdown.
pub fn html_to_markdown(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut stripped = html.to_string();

    for selector_str in BOILERPLATE_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in document.select(&selector) {
                let fragment = element.html();
                stripped = stripped.replace(&fragment, "");
            }
        }
    }

    htmd::convert(&stripped).unwrap_or(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_style_tags() {
        let html = "<html><body><script>evil()</script><style>.x{}</style><p>Job description</p></body></html>";
        let markdown = html_to_markdown(html);
        assert!(!markdown.contains("evil()"));
        assert!(markdown.contains("Job description"));
    }

    #[test]
    fn converts_basic_structure_to_markdown() {
        let html = "<html><body><h1>Engineer</h1><p>Remote</p></body></html>";
        let markdown = html_to_markdown(html);
        assert!(markdown.contains("Engineer"));
        assert!(markdown.contains("Remote"));
    }
}
