///! Durable store seams and the in-process implementation
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use navtool_common::{Chart, GeographicBounds};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::{ChartError, Result};

const SNAPSHOT_FILE: &str = "chart_store.json";

/// String key-value storage with optional per-entry expiry
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// `ttl` of `None` never expires; `Some(Duration::ZERO)` is expired on arrival.
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove every key starting with `prefix`, returning how many were removed.
    async fn clear_prefix(&self, prefix: &str) -> Result<usize>;
}

/// Chart records, spatial lookups and per-state cell mappings
#[async_trait]
pub trait ChartRepository: Send + Sync {
    /// Insert or replace charts by ID.
    async fn store_charts(&self, charts: &[Chart]) -> Result<()>;

    /// Make `charts` the whole catalog; charts not listed are dropped.
    async fn replace_charts(&self, charts: &[Chart]) -> Result<()>;

    /// Charts whose bounds intersect `bounds`.
    async fn charts_in_bounds(&self, bounds: &GeographicBounds) -> Result<Vec<Chart>>;

    async fn chart_count(&self) -> Result<usize>;

    async fn store_state_cell_mapping(&self, state: &str, cells: &BTreeSet<String>) -> Result<()>;

    async fn state_cell_mapping(&self, state: &str) -> Result<Option<BTreeSet<String>>>;

    async fn clear_all_state_cell_mappings(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// On-disk form of the durable part of [`MemoryStore`]
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreSnapshot {
    #[serde(default = "Utc::now")]
    saved_at: DateTime<Utc>,
    #[serde(default)]
    charts: Vec<Chart>,
    #[serde(default)]
    state_mappings: BTreeMap<String, BTreeSet<String>>,
}

/// In-memory store. Optionally mirrors charts and state mappings to a JSON
/// snapshot so the catalog survives restarts; TTL entries are never persisted.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    charts: RwLock<BTreeMap<String, Chart>>,
    state_mappings: RwLock<BTreeMap<String, BTreeSet<String>>>,
    snapshot_dir: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by `<dir>/chart_store.json`, loading it if present.
    pub async fn with_snapshot(dir: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            snapshot_dir: Some(dir.as_ref().to_path_buf()),
            ..Self::default()
        };
        store.load_snapshot().await?;
        Ok(store)
    }

    fn snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot_dir.as_ref().map(|dir| dir.join(SNAPSHOT_FILE))
    }

    async fn load_snapshot(&self) -> Result<()> {
        let Some(path) = self.snapshot_path() else {
            return Ok(());
        };
        if !path.exists() {
            tracing::debug!("Store snapshot does not exist: {:?}", path);
            return Ok(());
        }

        let content = fs::read_to_string(&path).await?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)
            .map_err(|e| ChartError::Storage(format!("failed to parse {:?}: {}", path, e)))?;

        let mut charts = self.charts.write().await;
        for chart in snapshot.charts {
            charts.insert(chart.id.clone(), chart);
        }
        *self.state_mappings.write().await = snapshot.state_mappings;

        tracing::info!(
            "Loaded {} charts from store snapshot (saved {})",
            charts.len(),
            snapshot.saved_at
        );
        Ok(())
    }

    /// Write the snapshot, if this store has one.
    pub async fn persist(&self) -> Result<()> {
        let Some(path) = self.snapshot_path() else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let snapshot = StoreSnapshot {
            saved_at: Utc::now(),
            charts: self.charts.read().await.values().cloned().collect(),
            state_mappings: self.state_mappings.read().await.clone(),
        };
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| ChartError::Storage(format!("failed to serialize store: {}", e)))?;

        // Atomic replace
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!("Saved {} charts to store snapshot", snapshot.charts.len());
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired(Instant::now()));
        entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }
}

#[async_trait]
impl ChartRepository for MemoryStore {
    async fn store_charts(&self, charts: &[Chart]) -> Result<()> {
        {
            let mut stored = self.charts.write().await;
            for chart in charts {
                stored.insert(chart.id.clone(), chart.clone());
            }
        }
        self.persist().await
    }

    async fn replace_charts(&self, charts: &[Chart]) -> Result<()> {
        let removed = {
            let mut stored = self.charts.write().await;
            let previous = std::mem::replace(
                &mut *stored,
                charts
                    .iter()
                    .map(|chart| (chart.id.clone(), chart.clone()))
                    .collect(),
            );
            previous.keys().filter(|id| !stored.contains_key(*id)).count()
        };
        if removed > 0 {
            tracing::info!("{} charts no longer listed in the catalog were dropped", removed);
        }
        self.persist().await
    }

    async fn charts_in_bounds(&self, bounds: &GeographicBounds) -> Result<Vec<Chart>> {
        let charts = self.charts.read().await;
        Ok(charts
            .values()
            .filter(|chart| chart.bounds.intersects(bounds))
            .cloned()
            .collect())
    }

    async fn chart_count(&self) -> Result<usize> {
        Ok(self.charts.read().await.len())
    }

    async fn store_state_cell_mapping(&self, state: &str, cells: &BTreeSet<String>) -> Result<()> {
        self.state_mappings
            .write()
            .await
            .insert(state.to_string(), cells.clone());
        self.persist().await
    }

    async fn state_cell_mapping(&self, state: &str) -> Result<Option<BTreeSet<String>>> {
        Ok(self.state_mappings.read().await.get(state).cloned())
    }

    async fn clear_all_state_cell_mappings(&self) -> Result<()> {
        self.state_mappings.write().await.clear();
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::test_support::chart;
    use tempfile::TempDir;

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let store = MemoryStore::new();
        store.put("a", "1".into(), Some(Duration::from_secs(10))).await.unwrap();
        store.put("b", "2".into(), Some(Duration::ZERO)).await.unwrap();
        store.put("c", "3".into(), None).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b").await.unwrap(), None);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("c").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_clear_prefix() {
        let store = MemoryStore::new();
        store.put("chart:A", "a".into(), None).await.unwrap();
        store.put("chart:B", "b".into(), None).await.unwrap();
        store.put("chart_index", "[]".into(), None).await.unwrap();

        assert_eq!(store.clear_prefix("chart:").await.unwrap(), 2);
        assert!(store.get("chart:A").await.unwrap().is_none());
        assert!(store.get("chart_index").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_charts_in_bounds() {
        let store = MemoryStore::new();
        store
            .store_charts(&[
                chart("SEATTLE", GeographicBounds::new(47.7, 47.5, -122.2, -122.5)),
                chart("BOSTON", GeographicBounds::new(42.5, 42.2, -70.8, -71.1)),
            ])
            .await
            .unwrap();

        let found = store
            .charts_in_bounds(&GeographicBounds::new(49.0, 45.5, -116.9, -124.8))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "SEATTLE");
        assert_eq!(store.chart_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replace_charts_drops_withdrawn_cells() {
        let store = MemoryStore::new();
        store
            .store_charts(&[
                chart("US5WA50M", GeographicBounds::new(47.7, 47.5, -122.2, -122.5)),
                chart("US5WA51M", GeographicBounds::new(47.7, 47.5, -122.2, -122.5)),
            ])
            .await
            .unwrap();

        store
            .replace_charts(&[chart("US5WA51M", GeographicBounds::new(47.8, 47.5, -122.2, -122.5))])
            .await
            .unwrap();

        let found = store
            .charts_in_bounds(&GeographicBounds::new(49.0, 45.5, -116.9, -124.8))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "US5WA51M");
        assert_eq!(found[0].bounds.north, 47.8);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        {
            let store = MemoryStore::with_snapshot(dir.path()).await.unwrap();
            let seattle = chart("US5WA50M", GeographicBounds::new(47.7, 47.5, -122.2, -122.5));
            store.store_charts(&[seattle]).await.unwrap();
            let cells: BTreeSet<String> = ["US5WA50M".to_string()].into_iter().collect();
            store.store_state_cell_mapping("Washington", &cells).await.unwrap();
            store.put("chart_index", "[]".into(), None).await.unwrap();
        }

        let reopened = MemoryStore::with_snapshot(dir.path()).await.unwrap();
        assert_eq!(reopened.chart_count().await.unwrap(), 1);
        assert!(reopened.state_cell_mapping("Washington").await.unwrap().is_some());
        assert!(reopened.get("chart_index").await.unwrap().is_none());

        reopened.clear_all_state_cell_mappings().await.unwrap();
        let again = MemoryStore::with_snapshot(dir.path()).await.unwrap();
        assert!(again.state_cell_mapping("Washington").await.unwrap().is_none());
    }
}
