//! Page analysis — propose workable selectors for a fetched page.
//!
//! Backs the builder UI's URL analyzer: given a page, report which of a set
//! of common selectors match, how often, and what they yield, so a user can
//! pick a starting point without writing selectors blind.

use serde::{Deserialize, Serialize};

use crate::html::{DomNode, HtmlDocument};
use crate::traits::{DocumentAdapter, Page, SelectorKind};

/// Selectors probed against every analyzed page.
const CANDIDATE_SELECTORS: &[&str] = &[
    "h1", "h2", "h3", "p", "a", "img", "li", "table", "article",
];

const MAX_SAMPLES: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorInfo {
    pub selector: String,
    /// Query language the selector is written in (always `css` here).
    pub kind: String,
    pub count: usize,
    pub sample_values: Vec<String>,
    /// Rough content class: `text`, `link` or `image`.
    pub element_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageAnalysis {
    pub url: String,
    pub page_title: Option<String>,
    pub available_selectors: Vec<SelectorInfo>,
}

fn element_type(selector: &str) -> &'static str {
    match selector {
        "a" => "link",
        "img" => "image",
        _ => "text",
    }
}

/// Sample value for one matched element: text for most elements, the target
/// for links and images.
fn sample_value(doc: &HtmlDocument, node: &DomNode, selector: &str) -> Option<String> {
    let value = match selector {
        "a" => doc.attr(node, "href")?,
        "img" => doc.attr(node, "src")?,
        _ => doc.text(node),
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn analyze_page(page: &Page) -> PageAnalysis {
    let doc = HtmlDocument::parse(&page.body, Some(page.url.clone()));
    let root = doc.root();

    let page_title = doc
        .query(&root, "title", SelectorKind::Css)
        .ok()
        .and_then(|titles| titles.first().map(|t| doc.text(t).trim().to_string()))
        .filter(|t| !t.is_empty());

    let mut available_selectors = Vec::new();
    for selector in CANDIDATE_SELECTORS {
        // Candidates are literals, so the parse cannot fail; skip defensively anyway.
        let Ok(matches) = doc.query(&root, selector, SelectorKind::Css) else {
            continue;
        };
        if matches.is_empty() {
            continue;
        }

        let sample_values: Vec<String> = matches
            .iter()
            .filter_map(|node| sample_value(&doc, node, selector))
            .take(MAX_SAMPLES)
            .collect();

        available_selectors.push(SelectorInfo {
            selector: selector.to_string(),
            kind: "css".to_string(),
            count: matches.len(),
            sample_values,
            element_type: element_type(selector).to_string(),
        });
    }

    PageAnalysis {
        url: page.url.clone(),
        page_title,
        available_selectors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_matching_selectors_with_counts_and_samples() {
        let page = Page {
            url: "https://example.com/list".to_string(),
            body: r#"
                <html><head><title> Widgets </title></head><body>
                    <h1>Widgets</h1>
                    <p>First</p><p>Second</p><p>Third</p><p>Fourth</p>
                    <a href="/a">a</a>
                </body></html>
            "#
            .to_string(),
        };

        let analysis = analyze_page(&page);
        assert_eq!(analysis.url, "https://example.com/list");
        assert_eq!(analysis.page_title.as_deref(), Some("Widgets"));

        let p = analysis
            .available_selectors
            .iter()
            .find(|s| s.selector == "p")
            .expect("p should match");
        assert_eq!(p.count, 4);
        assert_eq!(p.sample_values, vec!["First", "Second", "Third"]);
        assert_eq!(p.element_type, "text");

        let a = analysis
            .available_selectors
            .iter()
            .find(|s| s.selector == "a")
            .expect("a should match");
        assert_eq!(a.sample_values, vec!["/a"]);
        assert_eq!(a.element_type, "link");

        assert!(!analysis.available_selectors.iter().any(|s| s.selector == "table"));
    }

    #[test]
    fn missing_title_is_none() {
        let page = Page {
            url: "https://example.com".to_string(),
            body: "<html><body><h1>x</h1></body></html>".to_string(),
        };
        assert_eq!(analyze_page(&page).page_title, None);
    }
}
