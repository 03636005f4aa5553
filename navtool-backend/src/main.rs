use navtool_backend::config::{self, NavtoolConfig};
use navtool_backend::module::catalog::{
    CatalogClient, ChartCatalogCache, MemoryStore, MetadataParser, SearchFilters,
};
use navtool_backend::module::discovery::ChartDiscoveryService;
use navtool_backend::module::region::{StateRegionMapper, StateRegionTable};
use navtool_backend::module::s57::{AdapterOptions, S57Catalogue, S57MaritimeAdapter, S57Parser};
use navtool_backend::module::scheduled::{ScheduledTaskConfig, ScheduledTaskManager};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use navtool_common::{Chart, ChartType};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "navtool", version, about = "NOAA ENC chart discovery and S-57 parsing")]
struct Cli {
    /// Configuration file
    #[arg(long, env = "NAVTOOL_CONFIG", default_value = "navtool.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Populate the chart cache from the remote catalog
    Bootstrap {
        /// Clear cached charts and state mappings first
        #[arg(long)]
        repair: bool,
    },
    /// Charts covering a US coastal state
    State { name: String },
    /// Charts containing a position
    Location {
        #[arg(allow_hyphen_values = true)]
        latitude: f64,
        #[arg(allow_hyphen_values = true)]
        longitude: f64,
    },
    /// Search cached charts by title or cell ID
    Search {
        query: String,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        chart_type: Option<ChartType>,
    },
    /// Download a cell archive
    Download { cell: String, dest: PathBuf },
    /// Parse a downloaded archive and print a feature summary
    Parse { archive: PathBuf, cell: String },
    /// Bootstrap, then refresh the catalog periodically until Ctrl-C
    Serve,
}

struct App {
    store: Arc<MemoryStore>,
    discovery: Arc<ChartDiscoveryService>,
}

async fn build_app(config: &NavtoolConfig) -> Result<App> {
    let store = Arc::new(
        MemoryStore::with_snapshot(&config.data_dir)
            .await
            .with_context(|| format!("Failed to open chart store in {}", config.data_dir))?,
    );

    let states = Arc::new(StateRegionTable::us_coastal());
    let parser = Arc::new(MetadataParser::new(states.clone()));
    let client = Arc::new(CatalogClient::new(&config.catalog, parser)?);
    let cache = Arc::new(ChartCatalogCache::new(
        store.clone(),
        store.clone(),
        client.clone(),
        &config.cache,
    ));
    let mapper = Arc::new(StateRegionMapper::new(
        states,
        store.clone(),
        config.discovery.coverage_threshold_percent,
        config.discovery.state_cache_ttl(),
    ));
    let s57_parser = Arc::new(S57Parser::new(Arc::new(S57Catalogue::standard())));

    let discovery = Arc::new(ChartDiscoveryService::new(
        cache,
        client,
        store.clone(),
        mapper,
        s57_parser,
        S57MaritimeAdapter::new(AdapterOptions::default()),
    ));

    Ok(App { store, discovery })
}

fn print_charts(charts: &[Chart]) {
    for chart in charts {
        println!(
            "{:<10} 1:{:<9} {:<9} {:<16} {}",
            chart.id, chart.scale, chart.chart_type, chart.state, chart.title
        );
    }
    println!("{} charts", charts.len());
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::read_config(&cli.config)?;

    // Initialize logging
    let _logging_guard = navtool_backend::logging::init_logging(
        &config.log_dir,
        "navtool",
        &config.log_level,
    )?;

    tracing::info!("NavTool starting...");
    let app = build_app(config).await?;

    match cli.command {
        Command::Bootstrap { repair } => {
            let report = if repair {
                app.discovery.repair_cache().await?
            } else {
                app.discovery.bootstrap().await?
            };
            app.store.persist().await?;
            println!(
                "{} charts cached (fetched: {}, skipped: {}, failed: {})",
                report.cached, report.fetched, report.skipped, report.failed
            );
        }
        Command::State { name } => {
            let charts = app.discovery.charts_for_state(&name).await?;
            print_charts(&charts);
        }
        Command::Location { latitude, longitude } => {
            let charts = app.discovery.charts_at_location(latitude, longitude).await?;
            print_charts(&charts);
        }
        Command::Search {
            query,
            state,
            chart_type,
        } => {
            let filters = SearchFilters { state, chart_type };
            let charts = app.discovery.search(&query, &filters).await?;
            print_charts(&charts);
        }
        Command::Download { cell, dest } => {
            let path = app.discovery.download_chart(&cell, &dest).await?;
            println!("{}", path.display());
        }
        Command::Parse { archive, cell } => {
            let loaded = app.discovery.load_chart_features(&archive, &cell).await?;
            println!(
                "{} (edition {}, update {}): {} features, {} without a maritime type",
                loaded.cell_id,
                loaded.metadata.edition.as_deref().unwrap_or("?"),
                loaded.metadata.update_number.as_deref().unwrap_or("?"),
                loaded.features.len(),
                loaded.dropped
            );
            if let Some(bounds) = loaded.bounds {
                println!("bounds: {}", bounds);
            }
            for feature in &loaded.features {
                println!("{:<16} {:?}", feature.id(), feature.feature_type());
            }
        }
        Command::Serve => serve(config, app).await?,
    }

    Ok(())
}

async fn serve(config: &NavtoolConfig, app: App) -> Result<()> {
    let report = app
        .discovery
        .bootstrap()
        .await
        .context("Initial catalog bootstrap failed")?;
    app.store.persist().await?;
    tracing::info!("Catalog ready with {} charts", report.cached);

    let task_config = ScheduledTaskConfig {
        refresh_interval: config.discovery.refresh_interval(),
        ..ScheduledTaskConfig::default()
    };
    let mut task_manager = ScheduledTaskManager::new(task_config, app.discovery.clone())
        .with_snapshot_store(app.store.clone());
    task_manager.start_all().await?;
    tracing::info!("All scheduled tasks started successfully");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    task_manager.shutdown().await;
    app.store.persist().await?;
    tracing::info!("NavTool stopped");
    Ok(())
}
