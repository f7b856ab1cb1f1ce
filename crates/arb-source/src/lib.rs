//! Advisory page adapter (reqwest).
//!
//! Implements the `arb-core` AdvisorySource port by fetching the traffic
//! information page and extracting advisory blocks from its HTML.

use std::time::Duration;

use async_trait::async_trait;

use arb_core::{domain::AdvisoryText, errors::Error, ports::AdvisorySource, Result};

pub mod extract;

pub use extract::PageLayout;

#[derive(Clone, Debug)]
pub struct HttpAdvisorySource {
    url: String,
    layout: PageLayout,
    http: reqwest::Client,
}

impl HttpAdvisorySource {
    pub fn new(url: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            url: url.into(),
            layout: PageLayout::bane_nor()
                .map_err(|e| Error::Config(format!("invalid page layout: {e}")))?,
            http,
        })
    }

    async fn fetch_page(&self) -> Result<String> {
        tracing::debug!(url = %self.url, "fetching advisory page");
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("advisory request error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Network(format!(
                "advisory page returned {status}"
            )));
        }

        resp.text()
            .await
            .map_err(|e| Error::Network(format!("advisory body error: {e}")))
    }
}

#[async_trait]
impl AdvisorySource for HttpAdvisorySource {
    async fn fetch(&self) -> Result<Vec<AdvisoryText>> {
        let html = self.fetch_page().await?;
        let advisories = self.layout.extract(&html);
        tracing::info!(count = advisories.len(), "fetched traffic advisories");
        Ok(advisories)
    }
}
