use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod analysis;
use analysis::{JobDispatcher, JobJournal, ProcessAnalysisRunner};

mod audit;
use audit::StatementAuditLog;

mod config;
use config::{AppConfig, CliConfig, FileConfig};

mod refresh;
use refresh::RefreshOrchestrator;

mod server;
use server::{run_server, ServerState};

mod sqlite_persistence;

mod stock_store;
use stock_store::{SqliteStockStore, StockStore};

use tokio_util::sync::CancellationToken;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the stock database and, by default, the audit log.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to an optional TOML config file. Its values override CLI args.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3000)]
    pub port: u16,

    /// Directory for SQL audit log partitions. Defaults to db_dir/audit.
    #[clap(long, value_parser = parse_path)]
    pub audit_log_dir: Option<PathBuf>,

    /// Number of days to retain audit log partitions. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 90)]
    pub audit_retention_days: u64,

    /// Interval in hours between pruning runs. Only used if audit_retention_days > 0.
    #[clap(long, default_value_t = 24)]
    pub prune_interval_hours: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir,
        port: cli_args.port,
        audit_log_dir: cli_args.audit_log_dir,
        audit_retention_days: cli_args.audit_retention_days,
        prune_interval_hours: cli_args.prune_interval_hours,
    };
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening audit log at {:?}", app_config.audit_log_dir);
    let audit = Arc::new(StatementAuditLog::new(&app_config.audit_log_dir)?);

    info!(
        "Opening SQLite stock database at {:?}...",
        app_config.stock_db_path()
    );
    let stock_store: Arc<dyn StockStore> = Arc::new(SqliteStockStore::new(
        app_config.stock_db_path(),
        audit.clone(),
    )?);

    let shutdown = CancellationToken::new();

    let journal = Arc::new(JobJournal::new());
    let runner = Arc::new(ProcessAnalysisRunner::new(app_config.analyzer.clone()));
    let dispatcher = Arc::new(JobDispatcher::new(
        runner,
        journal.clone(),
        app_config.refresh.max_concurrent_jobs,
        shutdown.clone(),
    ));
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        stock_store.clone(),
        dispatcher.clone(),
        app_config.refresh.orchestrator_settings(),
    ));

    // Spawn background task for audit log pruning if enabled
    if app_config.audit_retention_days > 0 {
        let retention_days = app_config.audit_retention_days;
        let interval_hours = app_config.prune_interval_hours;
        let pruning_audit = audit.clone();

        info!(
            "Audit pruning enabled: retaining {} days, pruning every {} hours",
            retention_days, interval_hours
        );

        tokio::spawn(async move {
            let interval = Duration::from_secs(interval_hours * 60 * 60);
            let mut ticker = tokio::time::interval(interval);

            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                ticker.tick().await;

                match pruning_audit.prune_older_than(retention_days) {
                    Ok(count) => {
                        if count > 0 {
                            info!("Pruned {} expired audit log partitions", count);
                        }
                    }
                    Err(e) => {
                        error!("Failed to prune audit log: {}", e);
                    }
                }
            }
        });
    }

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        info!("Shutdown requested");
        ctrl_c_shutdown.cancel();
    });

    let state = ServerState {
        stock_store,
        dispatcher,
        orchestrator,
        journal,
    };

    info!("Ready to serve at port {}!", app_config.port);
    run_server(app_config.port, state, shutdown).await
}
