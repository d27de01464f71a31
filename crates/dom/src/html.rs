//! `scraper`-backed [`DocumentAdapter`] over one parsed HTML document.
//!
//! The document owns the parsed tree; nodes are addressed by tree id so they
//! stay `Copy` and can be fanned out cheaply during interpretation. XPath is
//! part of the adapter contract but this backend only evaluates CSS;
//! [`SelectorKind::Xpath`] queries report [`DomError::Unsupported`].

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};

use crate::error::DomError;
use crate::traits::{DocumentAdapter, SelectorKind};

/// One parsed HTML document plus the URL it was fetched from.
pub struct HtmlDocument {
    html: Html,
    url: Option<String>,
}

/// Handle to the document root or to one element inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomNode {
    id: NodeId,
    root: bool,
}

impl HtmlDocument {
    pub fn parse(body: &str, url: Option<String>) -> Self {
        Self {
            html: Html::parse_document(body),
            url,
        }
    }

    /// Handle to the whole document; queries from here search every element.
    pub fn root(&self) -> DomNode {
        DomNode {
            id: self.html.root_element().id(),
            root: true,
        }
    }

    fn element(&self, node: &DomNode) -> Option<ElementRef<'_>> {
        self.html.tree.get(node.id).and_then(ElementRef::wrap)
    }
}

fn parse_css(selector: &str) -> Result<Selector, DomError> {
    Selector::parse(selector).map_err(|e| DomError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

impl DocumentAdapter for HtmlDocument {
    type Node = DomNode;

    fn query(
        &self,
        node: &DomNode,
        selector: &str,
        kind: SelectorKind,
    ) -> Result<Vec<DomNode>, DomError> {
        if kind == SelectorKind::Xpath {
            return Err(DomError::Unsupported { kind });
        }
        let css = parse_css(selector)?;

        let matches: Vec<DomNode> = if node.root {
            self.html
                .select(&css)
                .map(|el| DomNode {
                    id: el.id(),
                    root: false,
                })
                .collect()
        } else {
            match self.element(node) {
                Some(el) => el
                    .select(&css)
                    .map(|el| DomNode {
                        id: el.id(),
                        root: false,
                    })
                    .collect(),
                None => Vec::new(),
            }
        };

        Ok(matches)
    }

    fn text(&self, node: &DomNode) -> String {
        let element = if node.root {
            Some(self.html.root_element())
        } else {
            self.element(node)
        };
        match element {
            Some(el) => el.text().collect::<Vec<_>>().join(""),
            None => String::new(),
        }
    }

    fn attr(&self, node: &DomNode, name: &str) -> Option<String> {
        self.element(node)
            .and_then(|el| el.value().attr(name))
            .map(str::to_string)
    }

    fn url_of(&self, _node: &DomNode) -> Option<String> {
        // Every node of this document shares the document's source URL.
        self.url.clone()
    }
}
