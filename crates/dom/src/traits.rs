//! The `DocumentAdapter` and `DocumentFetcher` traits — the contracts the
//! engine dispatches through.
//!
//! Defined here (in the dom crate) so the engine, the production
//! implementations, and test doubles can all import them without a circular
//! dependency.

use async_trait::async_trait;

use crate::error::DomError;

/// Which query language a selector string is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Css,
    Xpath,
}

impl SelectorKind {
    /// Parse the wire spelling (`"css"` / `"xpath"`). Anything else is
    /// unknown and must be handled by the caller.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "css" => Some(Self::Css),
            "xpath" => Some(Self::Xpath),
            _ => None,
        }
    }
}

impl std::fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css => write!(f, "css"),
            Self::Xpath => write!(f, "xpath"),
        }
    }
}

/// Read-only querying capability over one fetched document.
///
/// `Node` is a cheap handle: the whole document and every sub-element
/// produced by [`query`](Self::query) are addressed the same way.
pub trait DocumentAdapter {
    type Node: Clone;

    /// Evaluate `selector` against `node`, returning matches in document
    /// order.
    fn query(
        &self,
        node: &Self::Node,
        selector: &str,
        kind: SelectorKind,
    ) -> Result<Vec<Self::Node>, DomError>;

    /// All text content of `node`, concatenated.
    fn text(&self, node: &Self::Node) -> String;

    /// An attribute of `node`, if present.
    fn attr(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// The URL of the document `node` belongs to, when known.
    fn url_of(&self, node: &Self::Node) -> Option<String>;
}

/// A fetched page, ready to be parsed.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects.
    pub url: String,
    pub body: String,
}

/// Capability to resolve a URL into a [`Page`].
///
/// Kept as a trait so the execution coordinator stays unit-testable without
/// any network dependency.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Page, DomError>;
}
