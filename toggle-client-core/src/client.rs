//! The toggle client: wires the definition refresher, the feature table and
//! the metrics reporter together.

use crate::config::{ClientConfig, SourceSpec};
use crate::feature::FeatureTable;
use crate::metrics::MetricsReporter;
use crate::model::{Context, DefinitionSet};
use crate::refresh::{RefreshTask, Refresher};
use crate::source::definition_source;
use crate::strategy::StrategyRegistry;
use anyhow::Result;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;

/// Default instance identifier: `hostname:pid`.
pub fn name_instance() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());
    format!("{}:{}", host, std::process::id())
}

struct LiveClient {
    registry: StrategyRegistry,
    definitions: Refresher<DefinitionSet>,
    reporter: Option<Refresher<()>>,
    table: Arc<ArcSwap<FeatureTable>>,
}

impl LiveClient {
    /// Pull the current definition set and keep the feature table in sync.
    ///
    /// The table is rebuilt only when the set is a different allocation from
    /// the one it was built from. A refresh always produces a fresh `Arc`, so
    /// pointer identity is the whole change signal and the unchanged path
    /// stays O(1).
    async fn current_table(&self) -> Arc<FeatureTable> {
        let definitions = self.definitions.poll().await;
        let table = self.table.load_full();
        if Arc::ptr_eq(table.built_from(), &definitions) {
            return table;
        }
        tracing::debug!(
            features = definitions.features.len(),
            "definition set changed, rebuilding feature table"
        );
        let rebuilt = Arc::new(FeatureTable::build(&self.registry, definitions));
        self.table.store(Arc::clone(&rebuilt));
        rebuilt
    }

    async fn evaluate(&self, name: &str, context: &Context) -> bool {
        let table = self.current_table().await;
        let result = match table.get(name) {
            Some(feature) => feature.evaluate(context),
            // Unknown feature names are expected: fail open-to-off.
            None => false,
        };
        if let Some(reporter) = &self.reporter {
            reporter.poll().await;
        }
        result
    }
}

/// Client facade over the refresh scheduler and the evaluation engine.
///
/// Cheap to call concurrently: lookups read lock-free caches and at most
/// kick off one background refresh.
pub struct ToggleClient {
    inner: Option<LiveClient>,
}

impl ToggleClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_registry(config, StrategyRegistry::with_defaults())
    }

    /// Construct with a custom strategy registry.
    pub fn with_registry(config: ClientConfig, registry: StrategyRegistry) -> Result<Self> {
        let source = SourceSpec::parse(&config.source)?;
        let timeout = Duration::from_secs(config.fetch_timeout_seconds);
        let Some(fetch) = definition_source(&source, timeout)? else {
            tracing::info!("no definition source configured, every feature evaluates to false");
            return Ok(Self { inner: None });
        };

        let table = Arc::new(ArcSwap::from_pointee(FeatureTable::empty()));
        // Usage reports go back to the polled service; file-backed clients
        // have nowhere to post them.
        let reporter = match &source {
            SourceSpec::Http(base_url) if !config.disable_metrics => {
                let task = MetricsReporter::new(
                    base_url,
                    config.app_name.clone(),
                    config.instance_id.clone().unwrap_or_else(name_instance),
                    Arc::clone(&table),
                    timeout,
                )?;
                Some(Refresher::seeded(
                    "metrics",
                    Duration::from_secs(config.metrics_interval_seconds),
                    Box::new(task),
                    (),
                ))
            }
            _ => None,
        };
        let definitions = Refresher::new(
            "definitions",
            Duration::from_secs(config.refresh_interval_seconds),
            fetch,
        );
        Ok(Self {
            inner: Some(LiveClient {
                registry,
                definitions,
                reporter,
                table,
            }),
        })
    }

    /// Construct around a caller-supplied fetch task instead of a parsed
    /// source address. No metrics reporter is attached.
    pub fn with_fetcher(
        config: &ClientConfig,
        registry: StrategyRegistry,
        fetch: Box<dyn RefreshTask<Output = DefinitionSet>>,
    ) -> Self {
        let definitions = Refresher::new(
            "definitions",
            Duration::from_secs(config.refresh_interval_seconds),
            fetch,
        );
        Self {
            inner: Some(LiveClient {
                registry,
                definitions,
                reporter: None,
                table: Arc::new(ArcSwap::from_pointee(FeatureTable::empty())),
            }),
        }
    }

    /// Evaluate a feature for a context.
    ///
    /// Never errors: refresh trouble degrades to stale or empty definitions
    /// and unknown names evaluate to false.
    pub async fn evaluate(&self, name: &str, context: &Context) -> bool {
        match &self.inner {
            Some(live) => live.evaluate(name, context).await,
            None => false,
        }
    }

    /// Flush a final usage report.
    pub async fn close(&self) {
        if let Some(live) = &self.inner
            && let Some(reporter) = &live.reporter
        {
            reporter.force().await;
        }
    }
}
