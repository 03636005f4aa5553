///! NOAA ENC catalog client: paginated queries, availability checks and cell downloads
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use futures::stream::BoxStream;
use navtool_common::{Chart, GeographicBounds};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use super::cell_name;
use super::metadata_parser::MetadataParser;
use super::rate_limiter::RateLimiter;
use super::retry::{RetryPolicy, retry_transient};
use crate::config::CatalogConfig;
use crate::error::{ChartError, Result};

/// Progress callback, called with values in [0.0, 1.0]
pub type ProgressCallback<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Optional restrictions on a catalog query
#[derive(Debug, Clone, Default)]
pub struct CatalogFilters {
    /// Raw ArcGIS `where` clause (defaults to `1=1`)
    pub where_clause: Option<String>,
    /// Only return cells intersecting this envelope
    pub bounds: Option<GeographicBounds>,
}

impl CatalogFilters {
    pub fn cell(cell_id: &str) -> Self {
        Self {
            where_clause: Some(format!("DSNM='{}'", cell_id.replace('\'', "''"))),
            bounds: None,
        }
    }

    pub fn within(bounds: GeographicBounds) -> Self {
        Self {
            where_clause: None,
            bounds: Some(bounds),
        }
    }
}

/// All pages of a catalog query merged into one feature list
#[derive(Debug, Clone, Default)]
pub struct RawCatalog {
    pub features: Vec<Value>,
    pub page_count: usize,
    /// The record cap was hit before the server ran out of data
    pub truncated: bool,
}

impl RawCatalog {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Serialized as a single feature collection.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&json!({
            "type": "FeatureCollection",
            "features": self.features,
        }))
        .map_err(|e| ChartError::MalformedResponse(e.to_string()))
    }
}

struct ActiveDownload {
    cancel: CancellationToken,
    progress: watch::Receiver<f64>,
}

/// Releases the per-cell download slot however the download ends.
struct DownloadSlot<'a> {
    downloads: &'a DashMap<String, ActiveDownload>,
    cell_id: String,
}

impl Drop for DownloadSlot<'_> {
    fn drop(&mut self) {
        self.downloads.remove(&self.cell_id);
    }
}

pub struct CatalogClient {
    http: reqwest::Client,
    config: CatalogConfig,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    parser: Arc<MetadataParser>,
    downloads: DashMap<String, ActiveDownload>,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig, parser: Arc<MetadataParser>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        let limiter = Arc::new(RateLimiter::new(
            config.requests_per_window,
            config.rate_window(),
        ));

        Ok(Self {
            http,
            config: config.clone(),
            limiter,
            retry: RetryPolicy::new(config.max_retries, config.retry_min_delay()),
            parser,
            downloads: DashMap::new(),
        })
    }

    /// Share a limiter with other clients of the same service.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn parser(&self) -> &Arc<MetadataParser> {
        &self.parser
    }

    /// Fetch every page of a catalog query.
    ///
    /// Pages are requested until the server stops flagging
    /// `exceededTransferLimit`. Collection stops at `max_records`; that is
    /// logged and reported through [`RawCatalog::truncated`], not an error.
    pub async fn fetch_chart_catalog(&self, filters: &CatalogFilters) -> Result<RawCatalog> {
        let page_size = self.config.page_size.max(1);
        let max_records = self.config.max_records.max(1);
        let mut catalog = RawCatalog::default();
        let mut offset = 0;

        loop {
            let url = self.page_url(filters, offset, page_size);
            let page = retry_transient(&self.retry, "Catalog page request", || {
                self.fetch_json(&url)
            })
            .await?;
            catalog.page_count += 1;

            let more = exceeded_transfer_limit(&page);
            let Some(features) = take_features(page) else {
                return Err(ChartError::MalformedResponse(format!(
                    "catalog page at offset {} has no features array",
                    offset
                )));
            };
            let received = features.len();
            let more = more.unwrap_or(received >= page_size);
            tracing::debug!(
                "Catalog page {} (offset {}): {} features, more = {}",
                catalog.page_count,
                offset,
                received,
                more
            );

            if received == 0 {
                break;
            }
            catalog.features.extend(features);

            if catalog.features.len() > max_records
                || (catalog.features.len() == max_records && more)
            {
                catalog.features.truncate(max_records);
                catalog.truncated = true;
                tracing::warn!(
                    "Catalog query hit the {} record cap after {} pages, catalog is partial",
                    max_records,
                    catalog.page_count
                );
                break;
            }
            if !more {
                break;
            }
            offset += received;
        }

        tracing::info!(
            "Fetched {} catalog features in {} pages",
            catalog.len(),
            catalog.page_count
        );
        Ok(catalog)
    }

    /// Look up one cell. `Ok(None)` when the catalog does not know it.
    pub async fn get_chart_metadata(&self, cell_id: &str) -> Result<Option<Chart>> {
        let cell_id = cell_name::normalize(cell_id);
        if cell_id.is_empty() {
            return Err(ChartError::InvalidArgument("chart ID is empty".to_string()));
        }

        let catalog = match self.fetch_chart_catalog(&CatalogFilters::cell(&cell_id)).await {
            Ok(catalog) => catalog,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        for feature in &catalog.features {
            match self.parser.parse_feature(feature) {
                Ok(Some(chart)) if chart.id == cell_id => return Ok(Some(chart)),
                Ok(_) => {}
                Err(e) => tracing::warn!("Unusable catalog record for {}: {}", cell_id, e),
            }
        }
        Ok(None)
    }

    /// Whether an archive can be downloaded for the cell. Never fails.
    pub async fn is_chart_available(&self, cell_id: &str) -> bool {
        let cell_id = cell_name::normalize(cell_id);
        if cell_id.is_empty() {
            return false;
        }

        for url in self.download_urls(&cell_id) {
            self.limiter.acquire().await;
            match self.http.head(&url).send().await {
                Ok(response) if response.status().is_success() => return true,
                Ok(response) => {
                    tracing::debug!("{} not available at {}: {}", cell_id, url, response.status())
                }
                Err(e) => tracing::debug!("Availability check for {} failed: {}", cell_id, e),
            }
        }
        false
    }

    /// Stream the cell archive to `destination`.
    ///
    /// Progress goes to `on_progress` and to subscribers of
    /// [`get_download_progress`](Self::get_download_progress). On failure or
    /// cancellation the partial file is removed.
    pub async fn download_chart(
        &self,
        cell_id: &str,
        destination: &Path,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<PathBuf> {
        let cell_id = cell_name::normalize(cell_id);
        if cell_id.is_empty() {
            return Err(ChartError::InvalidArgument("chart ID is empty".to_string()));
        }

        let (progress_tx, progress_rx) = watch::channel(0.0);
        let cancel = CancellationToken::new();
        match self.downloads.entry(cell_id.clone()) {
            Entry::Occupied(_) => return Err(ChartError::DownloadInProgress(cell_id)),
            Entry::Vacant(slot) => {
                slot.insert(ActiveDownload {
                    cancel: cancel.clone(),
                    progress: progress_rx,
                });
            }
        }
        let _slot = DownloadSlot {
            downloads: &self.downloads,
            cell_id: cell_id.clone(),
        };

        tracing::info!("Downloading {} to {}", cell_id, destination.display());
        let report = |fraction: f64| {
            progress_tx.send_replace(fraction);
            if let Some(callback) = on_progress {
                callback(fraction);
            }
        };

        let result = self
            .transfer(&cell_id, destination, &cancel, &report)
            .await;

        match &result {
            Ok(_) => tracing::info!("Downloaded {}", cell_id),
            Err(e) => {
                tracing::warn!("Download of {} failed: {}", cell_id, e);
                if let Err(io) = tokio::fs::remove_file(destination).await {
                    if io.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            "Failed to remove partial file {}: {}",
                            destination.display(),
                            io
                        );
                    }
                }
            }
        }
        result
    }

    async fn transfer(
        &self,
        cell_id: &str,
        destination: &Path,
        cancel: &CancellationToken,
        report: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<PathBuf> {
        let mut last_error = ChartError::NotFound(cell_id.to_string());

        for url in self.download_urls(cell_id) {
            if cancel.is_cancelled() {
                return Err(ChartError::Cancelled(cell_id.to_string()));
            }
            self.limiter.acquire().await;

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChartError::Cancelled(cell_id.to_string())),
                response = self.http.get(&url).send() => response,
            };
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!("Download request to {} failed: {}", url, e);
                    last_error = e.into();
                    continue;
                }
            };

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                tracing::debug!("{} not found at {}", cell_id, url);
                continue;
            }
            if !status.is_success() {
                last_error = ChartError::HttpStatus {
                    status: status.as_u16(),
                    url: url.clone(),
                };
                continue;
            }

            return self
                .write_body(cell_id, response, destination, cancel, report)
                .await;
        }

        Err(last_error)
    }

    async fn write_body(
        &self,
        cell_id: &str,
        response: reqwest::Response,
        destination: &Path,
        cancel: &CancellationToken,
        report: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<PathBuf> {
        let total = response.content_length().filter(|len| *len > 0);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(destination).await?;
        let mut body = response.bytes_stream();
        let mut received: u64 = 0;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChartError::Cancelled(cell_id.to_string())),
                chunk = body.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;

            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            if let Some(total) = total {
                report((received as f64 / total as f64).min(1.0));
            }
        }

        file.flush().await?;
        report(1.0);
        tracing::debug!("Wrote {} bytes for {}", received, cell_id);
        Ok(destination.to_path_buf())
    }

    /// Progress of the active download for `cell_id`. Ends when the download
    /// finishes or is cancelled; empty when nothing is in flight.
    pub fn get_download_progress(&self, cell_id: &str) -> BoxStream<'static, f64> {
        let cell_id = cell_name::normalize(cell_id);
        match self.downloads.get(&cell_id) {
            Some(active) => WatchStream::new(active.progress.clone()).boxed(),
            None => futures::stream::empty().boxed(),
        }
    }

    /// Request cancellation. A no-op when the cell is not downloading.
    pub fn cancel_download(&self, cell_id: &str) {
        let cell_id = cell_name::normalize(cell_id);
        if let Some(active) = self.downloads.get(&cell_id) {
            tracing::info!("Cancelling download of {}", cell_id);
            active.cancel.cancel();
        }
    }

    pub fn is_downloading(&self, cell_id: &str) -> bool {
        self.downloads.contains_key(&cell_name::normalize(cell_id))
    }

    /// Archive locations tried in order.
    pub fn download_urls(&self, cell_id: &str) -> Vec<String> {
        let base = self.config.download_base_url.trim_end_matches('/');
        vec![
            format!("{}/{}.zip", base, cell_id),
            format!("{}/All_ENCs/{}.zip", base, cell_id),
        ]
    }

    async fn fetch_json(&self, url: &str) -> Result<Value> {
        self.limiter.acquire().await;

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChartError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| ChartError::MalformedResponse(format!("{}: {}", url, e)))?;

        // ArcGIS reports query errors with HTTP 200 and an error envelope
        if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(Value::as_u64).unwrap_or(500);
            let message = error.get("message").and_then(Value::as_str).unwrap_or("");
            tracing::warn!("Catalog service error {}: {}", code, message);
            return Err(ChartError::HttpStatus {
                status: u16::try_from(code).unwrap_or(500),
                url: url.to_string(),
            });
        }
        Ok(value)
    }

    fn page_url(&self, filters: &CatalogFilters, offset: usize, page_size: usize) -> String {
        let mut params: Vec<(&str, String)> = vec![
            (
                "where",
                filters
                    .where_clause
                    .clone()
                    .unwrap_or_else(|| "1=1".to_string()),
            ),
            ("outFields", "*".to_string()),
            ("returnGeometry", "true".to_string()),
            ("outSR", "4326".to_string()),
            ("f", "json".to_string()),
            ("resultOffset", offset.to_string()),
            ("resultRecordCount", page_size.to_string()),
        ];
        if let Some(bounds) = &filters.bounds {
            params.push((
                "geometry",
                format!("{},{},{},{}", bounds.west, bounds.south, bounds.east, bounds.north),
            ));
            params.push(("geometryType", "esriGeometryEnvelope".to_string()));
            params.push(("spatialRel", "esriSpatialRelIntersects".to_string()));
            params.push(("inSR", "4326".to_string()));
        }

        let query: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect();
        format!("{}?{}", self.config.query_url, query.join("&"))
    }
}

/// `exceededTransferLimit` at the top level (ArcGIS JSON) or under
/// `properties` (GeoJSON output).
fn exceeded_transfer_limit(page: &Value) -> Option<bool> {
    page.get("exceededTransferLimit")
        .or_else(|| page.pointer("/properties/exceededTransferLimit"))
        .and_then(Value::as_bool)
}

fn take_features(page: Value) -> Option<Vec<Value>> {
    match page {
        Value::Object(mut object) => match object.remove("features") {
            Some(Value::Array(features)) => Some(features),
            _ => None,
        },
        _ => None,
    }
}
