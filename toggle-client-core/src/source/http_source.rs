use crate::model::DefinitionSet;
use crate::refresh::{RefreshOutcome, RefreshTask};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use std::time::Duration;

/// Polling HTTP fetch with entity-tag conditional requests.
///
/// The tag starts empty, is captured from every successful response, and is
/// sent back so the server can answer 304 when nothing changed.
pub struct HttpSource {
    url: String,
    etag: String,
    http: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: format!("{}/api/features", base_url.trim_end_matches('/')),
            etag: String::new(),
            http,
        })
    }
}

#[async_trait]
impl RefreshTask for HttpSource {
    type Output = DefinitionSet;

    async fn run(&mut self) -> Result<RefreshOutcome<DefinitionSet>> {
        tracing::debug!(url = %self.url, etag = %self.etag, "fetching definitions");
        let response = self
            .http
            .get(&self.url)
            .header(IF_NONE_MATCH, self.etag.as_str())
            .send()
            .await?;
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(RefreshOutcome::Unchanged);
        }
        let response = response.error_for_status()?;
        if let Some(etag) = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
        {
            self.etag = etag.to_string();
        }
        let definitions: DefinitionSet = response.json().await?;
        Ok(RefreshOutcome::Updated(definitions))
    }
}
