//! Best-effort usage reporting to the toggle service.

use crate::feature::{FeatureTable, UsageCount};
use crate::refresh::{RefreshOutcome, RefreshTask};
use anyhow::Result;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Serialize)]
struct MetricsBucket {
    start: String,
    stop: String,
    toggles: FxHashMap<String, UsageCount>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricsReport<'a> {
    app_name: &'a str,
    instance_id: &'a str,
    bucket: MetricsBucket,
}

/// Periodic task that drains every feature's counters and posts them.
///
/// Driven by its own [`crate::refresh::Refresher`]; delivery failures bubble
/// up to the refresher, which logs and swallows them.
pub struct MetricsReporter {
    app_name: String,
    instance_id: String,
    url: String,
    http: reqwest::Client,
    table: Arc<ArcSwap<FeatureTable>>,
    window_start: DateTime<Utc>,
}

impl MetricsReporter {
    pub fn new(
        base_url: &str,
        app_name: String,
        instance_id: String,
        table: Arc<ArcSwap<FeatureTable>>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            app_name,
            instance_id,
            url: format!("{}/api/client/metrics", base_url.trim_end_matches('/')),
            http,
            table,
            window_start: Utc::now(),
        })
    }
}

#[async_trait]
impl RefreshTask for MetricsReporter {
    type Output = ();

    async fn run(&mut self) -> Result<RefreshOutcome<()>> {
        let stop = Utc::now();
        // Carry the window forward first so consecutive buckets partition
        // time even when a send fails.
        let start = std::mem::replace(&mut self.window_start, stop);
        let toggles = self.table.load().drain_counts();
        let report = MetricsReport {
            app_name: &self.app_name,
            instance_id: &self.instance_id,
            bucket: MetricsBucket {
                start: start.format(TIMESTAMP_FORMAT).to_string(),
                stop: stop.format(TIMESTAMP_FORMAT).to_string(),
                toggles,
            },
        };
        tracing::debug!(
            url = %self.url,
            toggles = report.bucket.toggles.len(),
            "sending usage report"
        );
        let response = self.http.post(&self.url).json(&report).send().await?;
        tracing::debug!(status = %response.status(), "usage report delivered");
        Ok(RefreshOutcome::Unchanged)
    }
}
