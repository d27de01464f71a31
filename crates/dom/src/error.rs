//! Typed error type for document querying and fetching.

use thiserror::Error;

use crate::traits::SelectorKind;

#[derive(Debug, Error)]
pub enum DomError {
    /// The selector string could not be parsed.
    #[error("invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    /// The adapter cannot evaluate this kind of query at all.
    #[error("{kind} queries are not supported by this adapter")]
    Unsupported { kind: SelectorKind },

    /// Network-level failure while fetching a document.
    #[error("request for {url} failed: {reason}")]
    Fetch { url: String, reason: String },
}
