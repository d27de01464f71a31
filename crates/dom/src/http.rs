//! `reqwest`-backed [`DocumentFetcher`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::DomError;
use crate::traits::{DocumentFetcher, Page};

const USER_AGENT: &str = concat!("scrapeflow/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Plain HTTP fetcher. One shared client, rustls TLS, 30s per-request
/// timeout.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

fn fetch_error(url: &str, e: reqwest::Error) -> DomError {
    DomError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, DomError> {
        debug!(%url, "fetching document");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| fetch_error(url, e))?
            .error_for_status()
            .map_err(|e| fetch_error(url, e))?;

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| fetch_error(url, e))?;
        Ok(Page {
            url: final_url,
            body,
        })
    }
}
