///! Fixtures shared by unit tests
pub mod enc;
pub mod iso8211;

use async_trait::async_trait;
use chrono::Utc;
use navtool_common::{Chart, ChartSource, ChartStatus, ChartType, GeographicBounds};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::CatalogConfig;
use crate::error::{ChartError, Result};
use crate::module::catalog::store::KeyValueStore;

pub fn chart(id: &str, bounds: GeographicBounds) -> Chart {
    Chart {
        id: id.to_string(),
        title: format!("{} title", id),
        scale: 20_000,
        bounds,
        last_update: Utc::now(),
        state: "Unknown".to_string(),
        chart_type: ChartType::Harbor,
        source: ChartSource::Noaa,
        status: ChartStatus::Current,
        metadata: BTreeMap::new(),
    }
}

/// ArcGIS JSON feature for a harbor cell off Seattle.
pub fn arcgis_feature(id: &str) -> Value {
    json!({
        "attributes": {
            "DSNM": id,
            "TITLE": format!("{} Seattle Harbor", id),
        },
        "geometry": {
            "rings": [[
                [-122.5, 47.5], [-122.2, 47.5], [-122.2, 47.7], [-122.5, 47.7], [-122.5, 47.5]
            ]]
        }
    })
}

pub fn test_catalog_config(uri: &str) -> CatalogConfig {
    CatalogConfig {
        query_url: format!("{}/query", uri),
        download_base_url: format!("{}/ENCs", uri),
        page_size: 1000,
        requests_per_window: 1000,
        rate_window_ms: 1000,
        max_retries: 0,
        retry_min_delay_ms: 1,
        request_timeout_secs: 30,
        ..CatalogConfig::default()
    }
}

/// Nothing listens on port 1.
pub fn unreachable_catalog_config() -> CatalogConfig {
    test_catalog_config("http://127.0.0.1:1")
}

/// Store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(ChartError::Storage("store offline".into()))
    }

    async fn put(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> Result<()> {
        Err(ChartError::Storage("store offline".into()))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(ChartError::Storage("store offline".into()))
    }

    async fn clear_prefix(&self, _prefix: &str) -> Result<usize> {
        Err(ChartError::Storage("store offline".into()))
    }
}
