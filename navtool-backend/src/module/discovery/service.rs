///! Chart discovery: bootstrap, state and location lookups, search, repair
use navtool_common::{Chart, GeographicBounds, MaritimeFeature};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ChartError, Result};
use crate::module::catalog::cell_name;
use crate::module::catalog::client::ProgressCallback;
use crate::module::catalog::{
    BootstrapReport, CatalogClient, ChartCatalogCache, ChartRepository, SearchFilters,
};
use crate::module::region::StateRegionMapper;
use crate::module::s57::{S57MaritimeAdapter, S57Metadata, S57Parser, parse_archive_async};

/// Renderable features of one downloaded cell
#[derive(Debug, Clone)]
pub struct ChartFeatures {
    pub cell_id: String,
    pub metadata: S57Metadata,
    pub bounds: Option<GeographicBounds>,
    pub features: Vec<MaritimeFeature>,
    /// S-57 features that had no maritime counterpart
    pub dropped: usize,
}

pub struct ChartDiscoveryService {
    cache: Arc<ChartCatalogCache>,
    client: Arc<CatalogClient>,
    repository: Arc<dyn ChartRepository>,
    mapper: Arc<StateRegionMapper>,
    parser: Arc<S57Parser>,
    adapter: S57MaritimeAdapter,
}

impl ChartDiscoveryService {
    pub fn new(
        cache: Arc<ChartCatalogCache>,
        client: Arc<CatalogClient>,
        repository: Arc<dyn ChartRepository>,
        mapper: Arc<StateRegionMapper>,
        parser: Arc<S57Parser>,
        adapter: S57MaritimeAdapter,
    ) -> Self {
        Self {
            cache,
            client,
            repository,
            mapper,
            parser,
            adapter,
        }
    }

    pub fn mapper(&self) -> &Arc<StateRegionMapper> {
        &self.mapper
    }

    pub fn cache(&self) -> &Arc<ChartCatalogCache> {
        &self.cache
    }

    /// Make sure the catalog cache is populated.
    pub async fn bootstrap(&self) -> Result<BootstrapReport> {
        self.cache.ensure_catalog_bootstrapped().await
    }

    /// Bootstrap, but keep serving from the durable store if the catalog
    /// service cannot be reached.
    async fn bootstrap_or_degrade(&self) {
        if let Err(e) = self.bootstrap().await {
            tracing::warn!("Catalog bootstrap failed, using stored charts only: {}", e);
        }
    }

    /// Charts covering a meaningful share of the state, most detailed first.
    pub async fn charts_for_state(&self, state_name: &str) -> Result<Vec<Chart>> {
        let bounds = self.mapper.get_state_bounds(state_name)?;
        self.bootstrap_or_degrade().await;

        let cells = self.mapper.get_chart_cells_for_state(state_name).await?;
        let mut known: HashMap<String, Chart> = self
            .repository
            .charts_in_bounds(&bounds)
            .await?
            .into_iter()
            .map(|chart| (chart.id.clone(), chart))
            .collect();

        let mut charts = Vec::with_capacity(cells.len());
        for cell in &cells {
            if let Some(chart) = known.remove(cell) {
                charts.push(chart);
            } else if let Some(chart) = self.cache.get(cell).await {
                charts.push(chart);
            } else {
                tracing::debug!("Mapped cell {} for {} is no longer known", cell, state_name);
            }
        }

        sort_most_detailed_first(&mut charts);
        tracing::info!("Found {} charts for {}", charts.len(), state_name);
        Ok(charts)
    }

    /// Charts whose bounds contain the point, most detailed first.
    pub async fn charts_at_location(&self, latitude: f64, longitude: f64) -> Result<Vec<Chart>> {
        validate_position(latitude, longitude)?;
        self.bootstrap_or_degrade().await;

        let point = GeographicBounds::new(latitude, latitude, longitude, longitude);
        let mut charts: Vec<Chart> = self
            .repository
            .charts_in_bounds(&point)
            .await?
            .into_iter()
            .filter(|chart| chart.bounds.contains_point(latitude, longitude))
            .collect();

        sort_most_detailed_first(&mut charts);
        tracing::debug!(
            "Found {} charts at ({:.4}, {:.4})",
            charts.len(),
            latitude,
            longitude
        );
        Ok(charts)
    }

    /// Title/ID search over the cached catalog. A state filter must name a
    /// supported state.
    pub async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Chart>> {
        let mut filters = filters.clone();
        if let Some(state) = filters.state.as_deref() {
            let region = self.mapper.states().require(state)?;
            filters.state = Some(region.name.to_string());
        }

        self.bootstrap_or_degrade().await;
        let mut charts = self.cache.search_with_filters(query, &filters).await;
        sort_most_detailed_first(&mut charts);
        Ok(charts)
    }

    /// One chart by cell ID: cache first, then the catalog service. A chart
    /// fetched remotely is cached and stored.
    pub async fn get_chart(&self, cell_id: &str) -> Result<Chart> {
        let cell_id = cell_name::normalize(cell_id);
        if cell_id.is_empty() {
            return Err(ChartError::InvalidArgument("chart ID is empty".to_string()));
        }

        if let Some(chart) = self.cache.get(&cell_id).await {
            return Ok(chart);
        }

        tracing::debug!("{} not cached, querying catalog", cell_id);
        let chart = self
            .client
            .get_chart_metadata(&cell_id)
            .await?
            .ok_or_else(|| ChartError::NotFound(cell_id.clone()))?;

        self.cache.put(&chart, self.cache.chart_ttl()).await?;
        self.repository.store_charts(std::slice::from_ref(&chart)).await?;
        Ok(chart)
    }

    /// Reload the catalog if the cached one has expired. State mappings are
    /// recomputed whenever the catalog was replaced.
    pub async fn refresh_catalog(&self) -> Result<BootstrapReport> {
        self.rebuild(false).await
    }

    /// Reload the whole catalog and drop every state mapping. The cached
    /// catalog keeps serving if the reload fails.
    pub async fn repair_cache(&self) -> Result<BootstrapReport> {
        tracing::info!("Repairing chart cache...");
        self.rebuild(true).await
    }

    async fn rebuild(&self, force: bool) -> Result<BootstrapReport> {
        if !force && !self.cache.is_expired().await {
            return self.bootstrap().await;
        }
        let report = self.cache.reload_catalog().await?;
        self.mapper.clear_cache().await?;
        Ok(report)
    }

    /// Download the archive for `cell_id` into `directory`.
    pub async fn download_chart(&self, cell_id: &str, directory: &Path) -> Result<PathBuf> {
        let cell_id = cell_name::normalize(cell_id);
        let destination = directory.join(format!("{}.zip", cell_id));
        let progress: ProgressCallback<'_> = &|fraction: f64| {
            tracing::debug!("{}: {:.0}%", cell_id, fraction * 100.0);
        };
        self.client
            .download_chart(&cell_id, &destination, Some(progress))
            .await
    }

    /// Parse a downloaded archive and convert it for rendering.
    pub async fn load_chart_features(
        &self,
        archive: &Path,
        cell_id: &str,
    ) -> Result<ChartFeatures> {
        let cell_id = cell_name::normalize(cell_id);
        let parsed = parse_archive_async(
            self.parser.clone(),
            archive.to_path_buf(),
            Some(cell_id.clone()),
        )
        .await?;

        let (features, dropped) = self.adapter.convert_counted(&parsed.features);
        tracing::info!(
            "Loaded {}: {} S-57 features, {} maritime features",
            cell_id,
            parsed.features.len(),
            features.len()
        );

        Ok(ChartFeatures {
            cell_id,
            metadata: parsed.metadata,
            bounds: parsed.bounds,
            features,
            dropped,
        })
    }
}

fn validate_position(latitude: f64, longitude: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ChartError::InvalidArgument(format!(
            "latitude {} outside [-90, 90]",
            latitude
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ChartError::InvalidArgument(format!(
            "longitude {} outside [-180, 180]",
            longitude
        )));
    }
    Ok(())
}

/// Smallest scale denominator first, then by ID.
fn sort_most_detailed_first(charts: &mut [Chart]) {
    charts.sort_by(|a, b| a.scale.cmp(&b.scale).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, CatalogConfig};
    use crate::module::catalog::{MemoryStore, MetadataParser};
    use crate::module::region::StateRegionTable;
    use crate::module::s57::{AdapterOptions, S57Catalogue};
    use crate::module::test_support::enc::{FIXTURE_CELL, fixture_cell, write_fixture_archive};
    use crate::module::test_support::{
        arcgis_feature, chart, test_catalog_config, unreachable_catalog_config,
    };
    use navtool_common::ChartType;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(config: &CatalogConfig) -> (ChartDiscoveryService, Arc<MemoryStore>) {
        let states = Arc::new(StateRegionTable::us_coastal());
        let store = Arc::new(MemoryStore::new());
        let parser = Arc::new(MetadataParser::new(states.clone()));
        let client = Arc::new(CatalogClient::new(config, parser).unwrap());
        let cache = Arc::new(ChartCatalogCache::new(
            store.clone(),
            store.clone(),
            client.clone(),
            &CacheConfig::default(),
        ));
        let mapper = Arc::new(StateRegionMapper::new(
            states,
            store.clone(),
            1.0,
            Duration::from_secs(3600),
        ));
        let service = ChartDiscoveryService::new(
            cache,
            client,
            store.clone(),
            mapper,
            Arc::new(S57Parser::new(Arc::new(S57Catalogue::standard()))),
            S57MaritimeAdapter::new(AdapterOptions::default()),
        );
        (service, store)
    }

    fn puget_sound() -> Vec<Chart> {
        let mut coastal = chart("US3WA01M", GeographicBounds::new(48.0, 47.0, -122.0, -123.0));
        coastal.scale = 80_000;
        coastal.chart_type = ChartType::Coastal;
        coastal.state = "Washington".to_string();
        coastal.title = "Puget Sound".to_string();

        let mut harbor = chart("US5WA50M", GeographicBounds::new(47.7, 47.5, -122.2, -122.5));
        harbor.scale = 12_000;
        harbor.state = "Washington".to_string();
        harbor.title = "Seattle Harbor".to_string();

        let mut boston = chart("US4MA10M", GeographicBounds::new(42.6, 42.2, -70.6, -71.1));
        boston.scale = 40_000;
        boston.chart_type = ChartType::Approach;
        boston.state = "Massachusetts".to_string();
        boston.title = "Boston Approaches".to_string();

        vec![coastal, harbor, boston]
    }

    /// Offline service with the catalog already cached and stored.
    async fn seeded_service() -> (ChartDiscoveryService, Arc<MemoryStore>) {
        let (service, store) = service(&unreachable_catalog_config());
        let charts = puget_sound();
        service
            .cache
            .put_all(&charts, Duration::from_secs(3600))
            .await
            .unwrap();
        store.store_charts(&charts).await.unwrap();
        (service, store)
    }

    fn ids(charts: &[Chart]) -> Vec<&str> {
        charts.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_charts_at_location_most_detailed_first() {
        let (service, _) = seeded_service().await;

        let charts = service.charts_at_location(47.6, -122.3).await.unwrap();
        assert_eq!(ids(&charts), vec!["US5WA50M", "US3WA01M"]);

        let charts = service.charts_at_location(47.2, -122.8).await.unwrap();
        assert_eq!(ids(&charts), vec!["US3WA01M"]);

        assert!(service.charts_at_location(0.0, 0.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_charts_at_location_rejects_bad_coordinates() {
        let (service, _) = seeded_service().await;
        for (lat, lon) in [(91.0, 0.0), (-90.5, 0.0), (0.0, 180.5), (f64::NAN, 0.0)] {
            assert!(matches!(
                service.charts_at_location(lat, lon).await,
                Err(ChartError::InvalidArgument(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_charts_for_state() {
        let (service, _) = seeded_service().await;

        // The harbor chart covers well under 1% of Washington
        let charts = service.charts_for_state("WA").await.unwrap();
        assert_eq!(ids(&charts), vec!["US3WA01M"]);

        assert!(service.charts_for_state("Oregon").await.unwrap().is_empty());
        assert!(matches!(
            service.charts_for_state("Washingtn").await,
            Err(ChartError::UnsupportedState { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_with_state_filter() {
        let (service, _) = seeded_service().await;

        let found = service.search("", &SearchFilters::default()).await.unwrap();
        assert_eq!(ids(&found), vec!["US5WA50M", "US4MA10M", "US3WA01M"]);

        let filters = SearchFilters {
            state: Some("wa".to_string()),
            chart_type: None,
        };
        let found = service.search("", &filters).await.unwrap();
        assert_eq!(ids(&found), vec!["US5WA50M", "US3WA01M"]);

        let filters = SearchFilters {
            state: Some("Atlantis".to_string()),
            chart_type: None,
        };
        assert!(matches!(
            service.search("", &filters).await,
            Err(ChartError::UnsupportedState { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_chart_falls_back_to_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("where", "DSNM='US5WA51M'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "features": [arcgis_feature("US5WA51M")]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("where", "DSNM='US5WA99M'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "features": [] })))
            .mount(&server)
            .await;

        let (service, store) = service(&test_catalog_config(&server.uri()));

        let chart = service.get_chart("US5WA51M.000").await.unwrap();
        assert_eq!(chart.id, "US5WA51M");
        assert_eq!(store.chart_count().await.unwrap(), 1);

        // Served from the cache the second time (the mock expects one request)
        assert_eq!(service.get_chart("US5WA51M").await.unwrap().id, "US5WA51M");

        assert!(matches!(
            service.get_chart("US5WA99M").await,
            Err(ChartError::NotFound(_))
        ));
        assert!(matches!(
            service.get_chart(" ").await,
            Err(ChartError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_repair_cache_rebuilds_catalog_and_mappings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "features": [arcgis_feature("US5WA50M"), arcgis_feature("US5WA51M")]
            })))
            .mount(&server)
            .await;

        let (service, store) = service(&test_catalog_config(&server.uri()));
        let first = service.bootstrap().await.unwrap();
        assert!(first.fetched);
        assert_eq!(first.cached, 2);

        service.mapper.get_chart_cells_for_state("Washington").await.unwrap();
        assert!(store.state_cell_mapping("Washington").await.unwrap().is_some());

        // Nothing has expired yet
        assert!(!service.refresh_catalog().await.unwrap().fetched);

        let repaired = service.repair_cache().await.unwrap();
        assert!(repaired.fetched);
        assert_eq!(repaired.cached, 2);
        assert!(store.state_cell_mapping("Washington").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_repair_cache_fails_when_catalog_is_unreachable() {
        let (service, store) = seeded_service().await;
        let before = service.charts_for_state("Washington").await.unwrap();
        assert!(service.repair_cache().await.is_err());

        // The seeded catalog and its mappings keep serving
        assert_eq!(service.cache.count().await, 3);
        assert_eq!(store.chart_count().await.unwrap(), 3);
        assert_eq!(service.charts_for_state("Washington").await.unwrap(), before);
        let charts = service.charts_at_location(47.6, -122.3).await.unwrap();
        assert_eq!(ids(&charts), vec!["US5WA50M", "US3WA01M"]);
    }

    #[tokio::test]
    async fn test_repair_cache_drops_withdrawn_charts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "features": [arcgis_feature("US5WA51M")]
            })))
            .mount(&server)
            .await;
        let (service, store) = service(&test_catalog_config(&server.uri()));
        let charts = puget_sound();
        service.cache.put_all(&charts, Duration::from_secs(3600)).await.unwrap();
        store.store_charts(&charts).await.unwrap();

        let report = service.repair_cache().await.unwrap();
        assert_eq!(report.cached, 1);
        let charts = service.charts_at_location(47.6, -122.3).await.unwrap();
        assert_eq!(ids(&charts), vec!["US5WA51M"]);
        assert_eq!(store.chart_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_chart_features() {
        let dir = TempDir::new().unwrap();
        let archive = write_fixture_archive(dir.path(), FIXTURE_CELL, &fixture_cell());
        let (service, _) = service(&unreachable_catalog_config());

        let loaded = service
            .load_chart_features(&archive, &format!("{}.000", FIXTURE_CELL))
            .await
            .unwrap();
        assert_eq!(loaded.cell_id, FIXTURE_CELL);
        assert_eq!(loaded.features.len(), 7);
        // Only the feature of an unknown object class has no counterpart
        assert_eq!(loaded.dropped, 1);
        assert!(loaded.bounds.is_some());
    }
}
