//! Engine binary for the Vicinity nearby-feed pipeline.
//!
//! This is the main entry point that wires together the user registry,
//! the event store, the producer pool and the periodic query loop. It loads
//! configuration, initializes all subsystems, and runs until Ctrl-C or a
//! configured run boundary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `vicinity-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the user registry and check the config against it
//! 4. Create shared control state and install the Ctrl-C handler
//! 5. Create the event store and start ingestion
//! 6. Run the query loop
//! 7. Stop ingestion, drain the conduit, and log the result

mod error;
mod feed_log;
mod registry;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vicinity_core::config::{LoggingConfig, VicinityConfig};
use vicinity_core::control::ControlState;
use vicinity_core::ingest::ProducerPool;
use vicinity_core::query::QueryService;
use vicinity_core::runner;
use vicinity_core::source::RandomEventSource;
use vicinity_events::EventStore;

use crate::error::EngineError;
use crate::feed_log::LogCallback;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "vicinity-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the shutdown drain fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so remember where the
    //    config came from and report it after step 2.
    let (config, config_source) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!("vicinity-engine starting");
    info!(
        source = %config_source,
        users = config.registry.user_count,
        producers = config.ingest.producer_count,
        emit_interval_ms = config.ingest.emit_interval_ms,
        k = config.query.k,
        "Configuration loaded"
    );

    // 3. Build the user registry.
    let registry = Arc::new(registry::build_registry(&config)?);
    let report = registry::check_config(&registry, &config);
    info!(
        unknown_targets = report.unknown_targets.len(),
        unattributable_producers = report.unattributable_producers,
        "Configuration checked against registry"
    );

    // 4. Control state and Ctrl-C.
    let control = Arc::new(ControlState::new(&config.run));
    {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, stopping");
                    control.request_stop();
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        });
    }

    // 5. Event store and ingestion.
    let store = Arc::new(EventStore::new());
    let source_seed = config.ingest.seed;
    let batch_size = config.ingest.batch_size;
    let ingest = ProducerPool::new(config.ingest.clone(), Arc::clone(&store), Arc::clone(&control))
        .spawn(|producer| RandomEventSource::for_producer(source_seed, producer, batch_size))?;

    // 6. Query loop.
    let service = QueryService::new(Arc::clone(&registry), Arc::clone(&store));
    let mut callback = LogCallback::new();
    let result = runner::run_queries(&service, &config.query, &control, &mut callback).await;
    runner::log_run_end(&result);

    // 7. Drain and report.
    let stats = ingest.shutdown().await.map_err(EngineError::from)?;
    callback.log_summary();

    let status = control.status().await;
    match serde_json::to_string(&status) {
        Ok(json) => info!(status = %json, "Final run status"),
        Err(e) => warn!(error = %e, "Failed to serialize run status"),
    }

    info!(
        end_reason = ?result.end_reason,
        rounds = result.rounds,
        events_stored = store.len(),
        events_dropped = stats.events_dropped,
        conserved = stats.is_conserved(),
        "vicinity-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from `VICINITY_CONFIG` or `vicinity-config.yaml`.
///
/// A missing file means defaults (environment overrides still apply).
/// Returns the config and a description of where it came from.
fn load_config() -> Result<(VicinityConfig, String), EngineError> {
    let config_path = std::env::var_os("VICINITY_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if config_path.exists() {
        let config = VicinityConfig::from_file(&config_path)?;
        Ok((config, config_path.display().to_string()))
    } else {
        let config = VicinityConfig::parse("")?;
        Ok((config, String::from("defaults")))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let installed = if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };
    installed.map_err(|e| EngineError::Logging {
        message: format!("{e}"),
    })
}
