mod config;
mod database;
mod exchange;
mod ml;
mod types;
mod web;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::AppConfig;
use database::Database;
use exchange::{MetalsApiClient, QuoteSource};
use ml::{
    create_backup, remove_old_backups, FileModelStore, HistoryProvider, ModelManager, SeriesGenerator,
};
use web::{start_prediction_server, AppState};

#[derive(Parser)]
#[command(name = "metals-forecaster")]
#[command(version = "0.1.0")]
#[command(about = "Precious-metal quote ingestion and per-instrument price forecasting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the latest quote, store it, then retrain and save the models
    Ingest {
        /// Only store the quote
        #[arg(long)]
        no_train: bool,
    },
    /// Train every model from stored history and save them
    Train {
        /// Train on synthetic series instead of stored history
        #[arg(long)]
        generated: bool,
        /// Seed for the synthetic series, for reproducible runs
        #[arg(long, requires = "generated")]
        seed: Option<u64>,
    },
    /// Load the saved models and print forecasts as JSON
    Predict {
        /// Number of steps ahead
        #[arg(short, long, default_value = "1")]
        steps: usize,
        /// Comma-separated instruments (default: all configured)
        #[arg(short, long, value_delimiter = ',')]
        tickers: Vec<String>,
    },
    /// Load the saved models and serve forecasts over HTTP
    Serve {
        /// Port (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Snapshot the model directory and rotate old snapshots
    Backup,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG takes precedence over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { no_train } => {
            run_ingest(&config, no_train).await?;
        }
        Commands::Train { generated, seed } => {
            run_training(&config, generated, seed).await?;
        }
        Commands::Predict { steps, tickers } => {
            run_predict(&config, steps, tickers).await?;
        }
        Commands::Serve { port } => {
            run_server(&config, port.unwrap_or(config.server.port)).await?;
        }
        Commands::Backup => {
            run_backup(&config)?;
        }
        Commands::Config => {
            println!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn load_config(path: &str) -> Result<AppConfig> {
    let config = AppConfig::load(path)?;
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Invalid configuration: {}", e);
        }
        return Err(anyhow!("invalid configuration: {}", errors.join("; ")));
    }
    Ok(config)
}

async fn open_database(config: &AppConfig) -> Result<Arc<Database>> {
    let db = Database::new(&config.database_url)
        .await?
        .with_history_window_hours(config.history_window_hours);
    Ok(Arc::new(db))
}

fn build_manager(config: &AppConfig, history: Arc<dyn HistoryProvider>) -> ModelManager {
    ModelManager::new(config.instruments.clone(), config.x_size, config.y_size, history)
}

/// Train all instruments, save whatever fitted, then fail if any instrument did not
async fn train_and_save(manager: &mut ModelManager, store: &FileModelStore, generated: bool) -> Result<()> {
    let report = manager.train(generated).await;
    info!("Trained: {}", report.succeeded().join(", "));
    if !report.is_complete() {
        warn!(
            "{} of {} instruments failed to train, keeping their previous models",
            report.failed().len(),
            manager.instruments().len()
        );
    }

    let saved = manager.save(store).await?;
    info!(
        "Saved {} models to {} ({} skipped, {} failed)",
        saved.saved.len(),
        store.models_dir().display(),
        saved.skipped.len(),
        saved.failed.len()
    );

    let summaries = report.into_result()?;
    info!("Training complete for {} instruments", summaries.len());
    Ok(())
}

async fn run_ingest(config: &AppConfig, no_train: bool) -> Result<()> {
    let api_key = config
        .metals_api
        .api_key
        .clone()
        .ok_or_else(|| anyhow!("no Metals API key configured (set API_KEY or metals_api.api_key)"))?;
    let source = MetalsApiClient::new(
        config.metals_api.base_url.as_str(),
        api_key,
        config.metals_api.base_currency.as_str(),
        config.instruments.clone(),
    );
    let db = open_database(config).await?;

    let quote = match source.latest_quote().await {
        Ok(quote) => quote,
        Err(e) => {
            error!("Failed to fetch quote: {}", e);
            return Ok(());
        }
    };
    db.insert_quote(&quote).await?;
    info!("Stored quote for {} instruments at {}", quote.prices.len(), quote.timestamp);
    for instrument in &config.instruments {
        if let Some(price) = quote.price(instrument) {
            debug!("{}: {}", instrument, price);
        }
    }

    if no_train {
        return Ok(());
    }

    let mut manager = build_manager(config, db);
    let store = FileModelStore::new(config.model_dir());
    train_and_save(&mut manager, &store, false).await
}

async fn run_training(config: &AppConfig, generated: bool, seed: Option<u64>) -> Result<()> {
    let db = open_database(config).await?;
    if generated {
        warn!("Training on generated data, forecasts will not reflect real prices");
    } else {
        for instrument in &config.instruments {
            info!("{}: {} stored quotes", instrument, db.quote_count(instrument).await?);
        }
    }

    let mut manager = build_manager(config, db);
    if let Some(seed) = seed {
        manager = manager.with_generator(SeriesGenerator::seeded(seed));
    }
    let store = FileModelStore::new(config.model_dir());
    train_and_save(&mut manager, &store, generated).await
}

async fn load_models(config: &AppConfig) -> Result<(ModelManager, FileModelStore)> {
    let db = open_database(config).await?;
    let mut manager = build_manager(config, db);
    let store = FileModelStore::new(config.model_dir());

    let report = manager.load(&store).await?;
    info!(
        "Loaded {} models from {} ({} missing, {} rejected)",
        report.loaded.len(),
        store.models_dir().display(),
        report.missing.len(),
        report.rejected.len()
    );
    Ok((manager, store))
}

async fn run_predict(config: &AppConfig, steps: usize, tickers: Vec<String>) -> Result<()> {
    let (manager, _) = load_models(config).await?;
    let requested = if tickers.is_empty() { None } else { Some(tickers.as_slice()) };

    let predictions = manager.predict(steps, requested)?;
    println!("{}", serde_json::to_string_pretty(&json!({ "predictions": predictions }))?);
    Ok(())
}

async fn run_server(config: &AppConfig, port: u16) -> Result<()> {
    let (manager, store) = load_models(config).await?;
    for instrument in manager.instruments() {
        if !manager.is_fitted(instrument) {
            warn!("No fitted model for {}, predictions for it will fail until models are reloaded", instrument);
        }
    }

    let state = AppState::new(manager, Arc::new(store));
    start_prediction_server(state, &config.server.host, port).await
}

fn run_backup(config: &AppConfig) -> Result<()> {
    let backup_dir = config.backup_dir();
    let target = create_backup(&config.model_dir(), &backup_dir)?;
    let removed = remove_old_backups(&backup_dir, config.backup.max_backups)?;
    info!("Backup stored at {} ({} old backups removed)", target.display(), removed.len());
    Ok(())
}
