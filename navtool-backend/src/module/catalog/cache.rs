///! TTL cache of parsed charts with a separate ID index
use navtool_common::{Chart, ChartType};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::client::{CatalogClient, CatalogFilters};
use super::metadata_parser::ParseReport;
use super::store::{ChartRepository, KeyValueStore};
use crate::config::CacheConfig;
use crate::error::{ChartError, Result};

pub const CHART_KEY_PREFIX: &str = "chart:";
pub const INDEX_KEY: &str = "chart_index";

fn chart_key(id: &str) -> String {
    format!("{}{}", CHART_KEY_PREFIX, id)
}

/// Optional narrowing for [`ChartCatalogCache::search_with_filters`]
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Matched case-insensitively against `Chart::state`
    pub state: Option<String>,
    pub chart_type: Option<ChartType>,
}

/// Result of [`ChartCatalogCache::ensure_catalog_bootstrapped`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Charts in the cache afterwards
    pub cached: usize,
    /// Whether the catalog had to be fetched
    pub fetched: bool,
    pub skipped: usize,
    pub failed: usize,
}

pub struct ChartCatalogCache {
    store: Arc<dyn KeyValueStore>,
    repository: Arc<dyn ChartRepository>,
    client: Arc<CatalogClient>,
    chart_ttl: Duration,
    index_ttl: Duration,
    /// Serializes index read-modify-write cycles
    index_lock: Mutex<()>,
    bootstrap_lock: Mutex<()>,
}

impl ChartCatalogCache {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        repository: Arc<dyn ChartRepository>,
        client: Arc<CatalogClient>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            store,
            repository,
            client,
            chart_ttl: config.chart_ttl(),
            index_ttl: config.index_ttl(),
            index_lock: Mutex::new(()),
            bootstrap_lock: Mutex::new(()),
        }
    }

    pub fn chart_ttl(&self) -> Duration {
        self.chart_ttl
    }

    /// Cached chart, or `None` on a miss. Store failures read as a miss.
    pub async fn get(&self, id: &str) -> Option<Chart> {
        let raw = match self.store.get(&chart_key(id)).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Cache read for {} failed, treating as miss: {}", id, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(chart) => Some(chart),
            Err(e) => {
                tracing::warn!("Discarding undecodable cache entry for {}: {}", id, e);
                None
            }
        }
    }

    /// Cache one chart. Write failures are returned, never swallowed.
    pub async fn put(&self, chart: &Chart, ttl: Duration) -> Result<()> {
        self.write_chart(chart, ttl).await?;
        self.add_to_index(std::iter::once(chart.id.clone())).await
    }

    /// Cache a batch with a single index update.
    pub async fn put_all(&self, charts: &[Chart], ttl: Duration) -> Result<()> {
        for chart in charts {
            self.write_chart(chart, ttl).await?;
        }
        self.add_to_index(charts.iter().map(|c| c.id.clone())).await
    }

    async fn write_chart(&self, chart: &Chart, ttl: Duration) -> Result<()> {
        let value = serde_json::to_string(chart)
            .map_err(|e| ChartError::Storage(format!("failed to encode {}: {}", chart.id, e)))?;
        self.store
            .put(&chart_key(&chart.id), value, Some(ttl))
            .await
            .map_err(|e| storage_error(&chart.id, e))
    }

    async fn add_to_index(&self, ids: impl Iterator<Item = String>) -> Result<()> {
        let _guard = self.index_lock.lock().await;
        let mut index = self.index().await;
        let before = index.len();
        index.extend(ids);
        if index.len() == before && before > 0 {
            return Ok(());
        }

        let value = serde_json::to_string(&index)
            .map_err(|e| ChartError::Storage(format!("failed to encode chart index: {}", e)))?;
        self.store
            .put(INDEX_KEY, value, Some(self.index_ttl))
            .await
            .map_err(|e| storage_error(INDEX_KEY, e))
    }

    /// Known chart IDs, sorted. Unreadable index reads as empty.
    pub async fn index(&self) -> BTreeSet<String> {
        match self.store.get(INDEX_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Discarding undecodable chart index: {}", e);
                BTreeSet::new()
            }),
            Ok(None) => BTreeSet::new(),
            Err(e) => {
                tracing::warn!("Chart index read failed, treating as empty: {}", e);
                BTreeSet::new()
            }
        }
    }

    pub async fn count(&self) -> usize {
        self.index().await.len()
    }

    /// Every cached chart that is still live.
    pub async fn all(&self) -> Vec<Chart> {
        let mut charts = Vec::new();
        for id in self.index().await {
            if let Some(chart) = self.get(&id).await {
                charts.push(chart);
            }
        }
        charts
    }

    /// Charts whose title or ID contains `query` (case-insensitive).
    pub async fn search(&self, query: &str) -> Vec<Chart> {
        self.search_with_filters(query, &SearchFilters::default()).await
    }

    pub async fn search_with_filters(&self, query: &str, filters: &SearchFilters) -> Vec<Chart> {
        let results: Vec<Chart> = self
            .all()
            .await
            .into_iter()
            .filter(|chart| chart.matches_query(query))
            .filter(|chart| {
                filters
                    .state
                    .as_deref()
                    .is_none_or(|state| chart.state.eq_ignore_ascii_case(state.trim()))
            })
            .filter(|chart| filters.chart_type.is_none_or(|t| chart.chart_type == t))
            .collect();

        tracing::debug!("Search '{}' found {} charts", query, results.len());
        results
    }

    /// Clear cached charts and the index. Without `force`, only clears when
    /// the index has already expired. Returns whether anything was cleared.
    pub async fn refresh(&self, force: bool) -> Result<bool> {
        let _guard = self.index_lock.lock().await;
        if !force && !self.is_expired().await {
            return Ok(false);
        }

        let removed = self
            .store
            .clear_prefix(CHART_KEY_PREFIX)
            .await
            .map_err(|e| storage_error(CHART_KEY_PREFIX, e))?;
        self.store
            .remove(INDEX_KEY)
            .await
            .map_err(|e| storage_error(INDEX_KEY, e))?;

        tracing::info!("Chart cache cleared ({} entries)", removed);
        Ok(true)
    }

    /// Populate an empty cache from the remote catalog.
    ///
    /// Concurrent callers wait for the first one; later ones see a filled
    /// cache and return without fetching. Fails when nothing usable came back.
    pub async fn ensure_catalog_bootstrapped(&self) -> Result<BootstrapReport> {
        let _guard = self.bootstrap_lock.lock().await;

        // The index can outlive the chart entries, so count live charts
        let cached = self.all().await.len();
        if cached > 0 {
            tracing::debug!("Catalog already bootstrapped with {} charts", cached);
            return Ok(BootstrapReport {
                cached,
                fetched: false,
                skipped: 0,
                failed: 0,
            });
        }

        tracing::info!("Chart cache is empty, bootstrapping catalog...");
        let report = self.fetch_catalog().await?;

        self.put_all(&report.charts, self.chart_ttl).await?;
        self.repository.store_charts(&report.charts).await?;

        let cached = self.count().await;
        tracing::info!(
            "Catalog bootstrapped: {} charts cached ({} skipped, {} failed)",
            cached,
            report.skipped,
            report.failed
        );
        Ok(BootstrapReport {
            cached,
            fetched: true,
            skipped: report.skipped,
            failed: report.failed,
        })
    }

    /// Fetch the full catalog and swap it in for the cached one.
    ///
    /// Nothing is cleared until the new catalog has been fetched and parsed,
    /// so a failed fetch leaves the current catalog in place. Charts the new
    /// catalog no longer lists are dropped from the repository.
    pub async fn reload_catalog(&self) -> Result<BootstrapReport> {
        let _guard = self.bootstrap_lock.lock().await;

        tracing::info!("Reloading chart catalog...");
        let report = self.fetch_catalog().await?;

        self.refresh(true).await?;
        self.put_all(&report.charts, self.chart_ttl).await?;
        self.repository.replace_charts(&report.charts).await?;

        let cached = self.count().await;
        tracing::info!(
            "Catalog reloaded: {} charts cached ({} skipped, {} failed)",
            cached,
            report.skipped,
            report.failed
        );
        Ok(BootstrapReport {
            cached,
            fetched: true,
            skipped: report.skipped,
            failed: report.failed,
        })
    }

    /// Whether the ID index has expired (or was never written).
    pub async fn is_expired(&self) -> bool {
        !matches!(self.store.get(INDEX_KEY).await, Ok(Some(_)))
    }

    async fn fetch_catalog(&self) -> Result<ParseReport> {
        let catalog = self
            .client
            .fetch_chart_catalog(&CatalogFilters::default())
            .await?;
        let report = self.client.parser().parse_features(&catalog.features);

        if report.charts.is_empty() {
            tracing::error!(
                "Catalog fetch produced no charts from {} features",
                catalog.len()
            );
            return Err(ChartError::EmptyCatalog {
                parsed: report.parsed,
                skipped: report.skipped,
                failed: report.failed,
            });
        }
        Ok(report)
    }
}

fn storage_error(key: &str, e: ChartError) -> ChartError {
    match e {
        ChartError::Storage(_) => e,
        other => ChartError::Storage(format!("{}: {}", key, other)),
    }
}
