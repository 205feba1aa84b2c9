//! PageMerge: merges converted page folders into single PDFs.
//!
//! Main entry point that wires the crates together and runs the merge loop.

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use pagemerge_core::config::AppConfig;
use pagemerge_core::error::AppError;
use pagemerge_core::traits::{JobStateStore, MergeBackend, Notifier};
use pagemerge_database::{DatabasePool, ItemRepository};
use pagemerge_worker::{
    ArtifactMover, CommandMergeBackend, ControlFile, FailureReporter, JobRegistry, LogNotifier,
    MergeExecutor, ReconciliationEngine, RunLoop, SmtpNotifier, StagnationDetector,
};

/// Command line options.
#[derive(Debug, Parser)]
#[command(name = "pagemerge", version, about = "Merge converted page folders into PDFs")]
struct Cli {
    /// Environment overlay loaded after `default.toml`
    #[arg(long, env = "PAGEMERGE_ENV", default_value = "development")]
    env: String,

    /// Directory holding the TOML configuration files
    #[arg(long, env = "PAGEMERGE_CONFIG_DIR", default_value = "config")]
    config_dir: String,

    /// Run a single pass and ignore the control file
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config, cli.once).await {
        tracing::error!("Startup error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration(cli: &Cli) -> Result<AppConfig, AppError> {
    AppConfig::load(&cli.config_dir, &cli.env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Wire the components and drive the loop until it stops.
async fn run(config: AppConfig, once: bool) -> Result<(), AppError> {
    tracing::info!("Starting PageMerge v{}", env!("CARGO_PKG_VERSION"));

    create_data_directories(&config).await?;

    let db_pool = DatabasePool::connect_lazy(&config.database)?;
    match db_pool.health_check().await {
        Ok(_) => tracing::info!("Database reachable"),
        Err(e) => tracing::warn!(error = %e, "Database not reachable yet, jobs will be skipped"),
    }

    let store: Arc<dyn JobStateStore> = Arc::new(ItemRepository::new(
        db_pool.clone().into_pool(),
        config.database.table.clone(),
    ));

    let backend: Arc<dyn MergeBackend> = Arc::new(CommandMergeBackend::from_config(&config.merge));
    tracing::info!(backend = backend.name(), "Merge backend configured");

    let notifier: Arc<dyn Notifier> = if config.notify.enabled {
        Arc::new(SmtpNotifier::from_config(&config.notify)?)
    } else {
        tracing::info!("Notifications disabled, failure reports go to the log");
        Arc::new(LogNotifier)
    };

    let paths = &config.paths;
    let prefix = config.jobs.name_prefix.as_str();

    let engine = ReconciliationEngine::new(Arc::clone(&store), &paths.error);
    let reporter = FailureReporter::new(
        Arc::clone(&store),
        notifier,
        engine,
        StagnationDetector::new(config.stagnation_threshold()),
        JobRegistry::new(&paths.pending, prefix),
        JobRegistry::new(&paths.error, prefix),
        config.notify.subject_prefix.clone(),
    );

    let run_loop = RunLoop::new(
        JobRegistry::new(&paths.pending, prefix),
        JobRegistry::new(&paths.error, prefix),
        Arc::clone(&store),
        MergeExecutor::new(
            Arc::clone(&store),
            backend,
            paths.temp_merge.clone(),
            &config.merge,
        ),
        ArtifactMover::new(&paths.temp_merge, &paths.output),
        reporter,
        ControlFile::new(&paths.control_file),
        config.pass_delay(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping after the current pass");
        let _ = shutdown_tx.send(true);
    });

    let passes = run_loop.run(once, shutdown_rx).await;
    tracing::info!(passes, "Merge loop finished");

    db_pool.close().await;
    Ok(())
}

/// Make sure every working directory exists before the first pass.
async fn create_data_directories(config: &AppConfig) -> Result<(), AppError> {
    let paths = &config.paths;
    for dir in [&paths.pending, &paths.error, &paths.output, &paths.temp_merge] {
        create_dir(dir).await?;
    }
    Ok(())
}

async fn create_dir(dir: &Path) -> Result<(), AppError> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        AppError::with_source(
            pagemerge_core::error::ErrorKind::Storage,
            format!("Failed to create directory {}", dir.display()),
            e,
        )
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
