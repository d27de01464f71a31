//! `StaticFetcher` — a test double for `DocumentFetcher`.
//!
//! Serves canned pages from memory and records every URL it is asked for,
//! so coordinator and CLI tests run without any network dependency.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::DomError;
use crate::traits::{DocumentFetcher, Page};

/// In-memory fetcher: URL → canned body. Unknown URLs fail like a network
/// error would.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    /// All URLs requested, in call order.
    calls: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canned page.
    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }

    /// Number of fetches performed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The URLs requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, DomError> {
        self.calls.lock().unwrap().push(url.to_string());

        match self.pages.get(url) {
            Some(body) => Ok(Page {
                url: url.to_string(),
                body: body.clone(),
            }),
            None => Err(DomError::Fetch {
                url: url.to_string(),
                reason: "no such page in fixture".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_registered_pages_and_records_calls() {
        let fetcher = StaticFetcher::new().with_page("https://example.com", "<h1>hi</h1>");

        let page = fetcher.fetch("https://example.com").await.unwrap();
        assert_eq!(page.body, "<h1>hi</h1>");

        let missing = fetcher.fetch("https://example.com/404").await;
        assert!(matches!(missing, Err(DomError::Fetch { .. })));

        assert_eq!(fetcher.call_count(), 2);
        assert_eq!(
            fetcher.calls(),
            vec!["https://example.com", "https://example.com/404"]
        );
    }
}
