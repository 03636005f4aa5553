///! Scheduled task manager - periodic catalog maintenance
// Runs the catalog refresh (force refresh, re-bootstrap, state mapping
// invalidation) on a fixed interval with retries.

use super::catalog::MemoryStore;
use super::discovery::ChartDiscoveryService;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Configuration for scheduled tasks
#[derive(Debug, Clone)]
pub struct ScheduledTaskConfig {
    /// Interval between catalog refreshes
    pub refresh_interval: Duration,

    /// Upper bound on a single refresh
    pub refresh_timeout: Duration,

    /// Wait between failed attempts
    pub retry_delay: Duration,

    /// Refresh immediately instead of waiting one interval
    pub perform_initial_refresh: bool,
}

impl Default for ScheduledTaskConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(24 * 60 * 60),
            refresh_timeout: Duration::from_secs(600),
            retry_delay: Duration::from_secs(60),
            perform_initial_refresh: false,
        }
    }
}

/// Scheduled task manager
pub struct ScheduledTaskManager {
    config: ScheduledTaskConfig,
    discovery: Arc<ChartDiscoveryService>,
    store: Option<Arc<MemoryStore>>,
    task_handles: Vec<JoinHandle<()>>,
}

impl ScheduledTaskManager {
    pub fn new(config: ScheduledTaskConfig, discovery: Arc<ChartDiscoveryService>) -> Self {
        Self {
            config,
            discovery,
            store: None,
            task_handles: Vec::new(),
        }
    }

    /// Persist this store's snapshot after every successful refresh.
    pub fn with_snapshot_store(mut self, store: Arc<MemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Start all scheduled tasks
    pub async fn start_all(&mut self) -> anyhow::Result<()> {
        tracing::info!("Starting scheduled task manager...");

        if self.config.refresh_interval.is_zero() {
            anyhow::bail!("catalog refresh interval must be greater than zero");
        }

        let refresh_handle = self.start_catalog_refresh_task();
        self.task_handles.push(refresh_handle);

        tracing::info!(
            "Started {} scheduled tasks (catalog refresh every {:.1} hours)",
            self.task_handles.len(),
            self.config.refresh_interval.as_secs_f64() / 3600.0
        );

        Ok(())
    }

    pub fn task_count(&self) -> usize {
        self.task_handles.len()
    }

    fn start_catalog_refresh_task(&self) -> JoinHandle<()> {
        let discovery = self.discovery.clone();
        let store = self.store.clone();
        let config = self.config.clone();

        tracing::info!(
            "Scheduling catalog refresh task (interval: {:?}, initial: {})",
            config.refresh_interval,
            config.perform_initial_refresh
        );

        tokio::spawn(async move {
            if config.perform_initial_refresh {
                tracing::info!("Performing initial catalog refresh...");
                let result = Self::run_catalog_refresh(&discovery, store.as_deref(), &config).await;
                if let Err(e) = result {
                    tracing::error!("Initial catalog refresh failed: {}", e);
                }
            }

            Self::catalog_refresh_loop(discovery, store, config).await;
        })
    }

    async fn catalog_refresh_loop(
        discovery: Arc<ChartDiscoveryService>,
        store: Option<Arc<MemoryStore>>,
        config: ScheduledTaskConfig,
    ) {
        const MAX_RETRIES: u32 = 3;

        loop {
            let now = Utc::now();
            let next_trigger = Self::calculate_next_refresh_time(now, config.refresh_interval);
            tracing::info!(
                "Next catalog refresh at: {} (in {:.1} h)",
                next_trigger.format("%Y-%m-%d %H:%M:%S UTC"),
                config.refresh_interval.as_secs_f64() / 3600.0
            );

            tokio::time::sleep(config.refresh_interval).await;

            for attempt in 1..=MAX_RETRIES {
                match Self::run_catalog_refresh(&discovery, store.as_deref(), &config).await {
                    Ok(()) => break,
                    Err(e) => {
                        if attempt < MAX_RETRIES {
                            tracing::warn!(
                                "Catalog refresh failed (attempt {}/{}): {}. Retrying in {:?}...",
                                attempt,
                                MAX_RETRIES,
                                e,
                                config.retry_delay
                            );
                            tokio::time::sleep(config.retry_delay).await;
                        } else {
                            tracing::error!(
                                "Catalog refresh failed after {} attempts: {}",
                                MAX_RETRIES,
                                e
                            );
                        }
                    }
                }
            }
        }
    }

    fn calculate_next_refresh_time(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
        match chrono::Duration::from_std(interval) {
            Ok(interval) => now + interval,
            Err(_) => DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Run a single catalog refresh
    async fn run_catalog_refresh(
        discovery: &ChartDiscoveryService,
        store: Option<&MemoryStore>,
        config: &ScheduledTaskConfig,
    ) -> anyhow::Result<()> {
        match tokio::time::timeout(config.refresh_timeout, discovery.repair_cache()).await {
            Ok(Ok(report)) => {
                tracing::info!(
                    "Catalog refresh completed: {} charts ({} skipped, {} failed)",
                    report.cached,
                    report.skipped,
                    report.failed
                );
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => anyhow::bail!(
                "Catalog refresh timed out after {} seconds",
                config.refresh_timeout.as_secs()
            ),
        }

        if let Some(store) = store {
            store.persist().await?;
        }
        Ok(())
    }

    /// Gracefully shutdown all tasks
    pub async fn shutdown(self) {
        tracing::info!("Shutting down scheduled task manager...");

        for handle in self.task_handles {
            handle.abort();
        }

        tracing::info!("All scheduled tasks stopped");
    }
}
