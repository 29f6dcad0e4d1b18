//! Configuration loading and typed config structures for Vicinity.
//!
//! The canonical configuration lives in `vicinity-config.yaml` next to the
//! engine binary. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but holds inconsistent values.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Vicinity configuration.
///
/// Mirrors the structure of `vicinity-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VicinityConfig {
    /// How the static user registry is generated.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Producer pool and fan-in conduit settings.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Which nearby-feed queries the engine runs, and how often.
    #[serde(default)]
    pub query: QueryConfig,

    /// Run boundaries.
    #[serde(default)]
    pub run: RunConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VicinityConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `VICINITY_PRODUCER_COUNT` overrides `ingest.producer_count`
    /// - `VICINITY_QUERY_K` overrides `query.k`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a mapping.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set but unparsable.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("VICINITY_PRODUCER_COUNT") {
            self.ingest.producer_count = val.parse().map_err(|e| ConfigError::Invalid {
                reason: format!("invalid VICINITY_PRODUCER_COUNT: {e}"),
            })?;
        }
        if let Ok(val) = std::env::var("VICINITY_QUERY_K") {
            self.query.k = val.parse().map_err(|e| ConfigError::Invalid {
                reason: format!("invalid VICINITY_QUERY_K: {e}"),
            })?;
        }
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };

        if self.ingest.producer_count == 0 {
            return invalid("ingest.producer_count must be at least 1");
        }
        if self.ingest.max_concurrent_producers == 0 {
            return invalid("ingest.max_concurrent_producers must be at least 1");
        }
        if self.ingest.channel_capacity == 0 {
            return invalid("ingest.channel_capacity must be at least 1");
        }
        if self.ingest.batch_size.min > self.ingest.batch_size.max {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "ingest.batch_size.min ({}) exceeds ingest.batch_size.max ({})",
                    self.ingest.batch_size.min, self.ingest.batch_size.max
                ),
            });
        }
        if self.ingest.emit_interval_ms == 0 {
            return invalid("ingest.emit_interval_ms must be at least 1");
        }
        if self.query.k <= 0 {
            return Err(ConfigError::Invalid {
                reason: format!("query.k must be positive, got {}", self.query.k),
            });
        }
        if self.query.interval_ms == 0 {
            return invalid("query.interval_ms must be at least 1");
        }
        Ok(())
    }
}

/// User registry generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryConfig {
    /// Number of users to place on the map.
    #[serde(default = "default_user_count")]
    pub user_count: usize,

    /// Random seed for user coordinates.
    #[serde(default = "default_registry_seed")]
    pub seed: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            user_count: default_user_count(),
            seed: default_registry_seed(),
        }
    }
}

/// What the conduit does with a batch when its buffer is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Producers wait for buffer space (backpressure).
    #[default]
    Block,
    /// The batch is discarded, counted, and logged.
    Drop,
}

/// Inclusive bounds on how many events a producer emits per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BatchSizeRange {
    /// Smallest batch.
    #[serde(default = "default_batch_min")]
    pub min: usize,

    /// Largest batch.
    #[serde(default = "default_batch_max")]
    pub max: usize,
}

impl BatchSizeRange {
    /// A range that always yields exactly `size` events.
    pub const fn fixed(size: usize) -> Self {
        Self {
            min: size,
            max: size,
        }
    }
}

impl Default for BatchSizeRange {
    fn default() -> Self {
        Self {
            min: default_batch_min(),
            max: default_batch_max(),
        }
    }
}

/// Producer pool and fan-in conduit settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngestConfig {
    /// Number of producers. Producer `i` emits content for user `i`.
    #[serde(default = "default_producer_count")]
    pub producer_count: u32,

    /// Upper bound on producers generating or sending at the same time.
    #[serde(default = "default_max_concurrent_producers")]
    pub max_concurrent_producers: usize,

    /// Events per producer step.
    #[serde(default)]
    pub batch_size: BatchSizeRange,

    /// Milliseconds between a producer's steps.
    #[serde(default = "default_emit_interval_ms")]
    pub emit_interval_ms: u64,

    /// Batches the conduit buffers before the overflow policy applies.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Behavior when the conduit buffer is full.
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    /// Random seed for synthetic content.
    #[serde(default = "default_source_seed")]
    pub seed: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            producer_count: default_producer_count(),
            max_concurrent_producers: default_max_concurrent_producers(),
            batch_size: BatchSizeRange::default(),
            emit_interval_ms: default_emit_interval_ms(),
            channel_capacity: default_channel_capacity(),
            overflow_policy: OverflowPolicy::default(),
            seed: default_source_seed(),
        }
    }
}

/// Nearby-feed query settings for the engine's periodic query loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryConfig {
    /// Users whose nearby feed is computed each round.
    #[serde(default = "default_target_users")]
    pub target_users: Vec<u32>,

    /// Number of nearest neighbors whose content is ranked.
    #[serde(default = "default_k")]
    pub k: i64,

    /// Milliseconds between query rounds.
    #[serde(default = "default_query_interval_ms")]
    pub interval_ms: u64,

    /// Maximum ranked events reported per query (0 = all).
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            target_users: default_target_users(),
            k: default_k(),
            interval_ms: default_query_interval_ms(),
            result_limit: default_result_limit(),
        }
    }
}

/// Run boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Stop after this many wall-clock seconds (0 = until interrupted).
    #[serde(default)]
    pub max_real_time_seconds: u64,

    /// Stop after this many query rounds (0 = unlimited).
    #[serde(default)]
    pub max_query_rounds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_user_count() -> usize {
    10_000
}

const fn default_registry_seed() -> u64 {
    42
}

const fn default_batch_min() -> usize {
    50
}

const fn default_batch_max() -> usize {
    100
}

const fn default_producer_count() -> u32 {
    100
}

const fn default_max_concurrent_producers() -> usize {
    32
}

const fn default_emit_interval_ms() -> u64 {
    60_000
}

const fn default_channel_capacity() -> usize {
    1024
}

const fn default_source_seed() -> u64 {
    7
}

fn default_target_users() -> Vec<u32> {
    vec![1]
}

const fn default_k() -> i64 {
    5
}

const fn default_query_interval_ms() -> u64 {
    1000
}

const fn default_result_limit() -> usize {
    20
}

fn default_log_level() -> String {
    String::from("info")
}
