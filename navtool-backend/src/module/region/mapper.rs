///! State to chart-cell mapping by polygon coverage
use geo::{Area, BooleanOps, Intersects, Polygon};
use navtool_common::GeographicBounds;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::states::{StateRegionTable, bounds_polygon};
use crate::error::Result;
use crate::module::catalog::store::ChartRepository;

struct CachedCells {
    computed_at: Instant,
    cells: BTreeSet<String>,
}

pub struct StateRegionMapper {
    states: Arc<StateRegionTable>,
    repository: Arc<dyn ChartRepository>,
    /// Minimum share of the state's area a chart must cover, in percent
    threshold_percent: f64,
    cache_ttl: Duration,
    cache: RwLock<HashMap<String, CachedCells>>,
}

impl StateRegionMapper {
    pub fn new(
        states: Arc<StateRegionTable>,
        repository: Arc<dyn ChartRepository>,
        threshold_percent: f64,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            states,
            repository,
            threshold_percent,
            cache_ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn states(&self) -> &Arc<StateRegionTable> {
        &self.states
    }

    /// Cell IDs of the charts covering more than the threshold of the state.
    ///
    /// Served from the in-memory cache, then the durable mapping, and only
    /// then computed from the repository's charts.
    pub async fn get_chart_cells_for_state(&self, state_name: &str) -> Result<BTreeSet<String>> {
        let region = self.states.require(state_name)?;
        let key = region.name;

        if let Some(cells) = self.cached(key).await {
            tracing::debug!("State mapping for {} served from memory", key);
            return Ok(cells);
        }

        match self.repository.state_cell_mapping(key).await {
            Ok(Some(cells)) => {
                tracing::debug!("State mapping for {} served from store", key);
                self.remember(key, &cells).await;
                return Ok(cells);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Reading stored mapping for {} failed: {}", key, e),
        }

        let state_polygon = region.polygon();
        let state_area = state_polygon.unsigned_area();
        let candidates = self.repository.charts_in_bounds(&region.bounds).await?;

        let mut cells = BTreeSet::new();
        for chart in &candidates {
            if !chart.bounds.is_valid() {
                tracing::warn!(
                    "Skipping chart {} with invalid bounds {}",
                    chart.id,
                    chart.bounds
                );
                continue;
            }
            let coverage = coverage_percent(&state_polygon, state_area, &chart.bounds);
            if coverage > self.threshold_percent {
                cells.insert(chart.id.clone());
            } else {
                tracing::trace!("{} covers {:.3}% of {}, excluded", chart.id, coverage, key);
            }
        }

        tracing::info!(
            "Mapped {} charts to {} ({} candidates)",
            cells.len(),
            key,
            candidates.len()
        );

        if let Err(e) = self.repository.store_state_cell_mapping(key, &cells).await {
            tracing::warn!("Failed to store mapping for {}: {}", key, e);
        }
        self.remember(key, &cells).await;
        Ok(cells)
    }

    pub fn get_state_bounds(&self, state_name: &str) -> Result<GeographicBounds> {
        Ok(self.states.require(state_name)?.bounds)
    }

    pub fn get_supported_states(&self) -> Vec<&'static str> {
        self.states.names()
    }

    /// Forget every computed mapping, in memory and in the store.
    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.write().await.clear();
        self.repository.clear_all_state_cell_mappings().await?;
        tracing::info!("State mappings cleared");
        Ok(())
    }

    async fn cached(&self, key: &str) -> Option<BTreeSet<String>> {
        let cache = self.cache.read().await;
        cache
            .get(key)
            .filter(|entry| entry.computed_at.elapsed() < self.cache_ttl)
            .map(|entry| entry.cells.clone())
    }

    async fn remember(&self, key: &str, cells: &BTreeSet<String>) {
        self.cache.write().await.insert(
            key.to_string(),
            CachedCells {
                computed_at: Instant::now(),
                cells: cells.clone(),
            },
        );
    }
}

/// Percentage of `state`'s area covered by the chart rectangle.
pub fn coverage_percent(state: &Polygon<f64>, state_area: f64, chart: &GeographicBounds) -> f64 {
    if state_area <= 0.0 {
        return 0.0;
    }
    let chart_polygon = bounds_polygon(chart);
    if !state.intersects(&chart_polygon) {
        return 0.0;
    }
    let overlap = state.intersection(&chart_polygon).unsigned_area();
    overlap / state_area * 100.0
}
