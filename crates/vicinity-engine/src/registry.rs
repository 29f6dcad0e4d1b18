//! User registry setup for the engine.
//!
//! At startup the engine places `registry.user_count` users at seeded
//! random coordinates, then checks the rest of the configuration against
//! the registry: query targets must exist, and producers beyond the
//! registry emit content that can be stored but never ranked.

use tracing::{info, warn};
use vicinity_core::config::VicinityConfig;
use vicinity_geo::UserRegistry;
use vicinity_types::UserId;

use crate::error::EngineError;

/// Build the static user registry from configuration.
///
/// # Errors
///
/// Returns [`EngineError::Registry`] if the registry cannot be built.
pub fn build_registry(config: &VicinityConfig) -> Result<UserRegistry, EngineError> {
    let registry = UserRegistry::random(config.registry.user_count, config.registry.seed)?;
    info!(
        users = registry.len(),
        seed = config.registry.seed,
        "User registry built"
    );
    Ok(registry)
}

/// Findings from checking configuration against the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryReport {
    /// Query targets that are not registered. Their queries will fail.
    pub unknown_targets: Vec<UserId>,
    /// Producers whose user id is not registered. Their content is stored
    /// but never ranked.
    pub unattributable_producers: u64,
}

/// Check query targets and producer ids against the registry, logging a
/// warning for each mismatch.
pub fn check_config(registry: &UserRegistry, config: &VicinityConfig) -> RegistryReport {
    let unknown_targets: Vec<UserId> = config
        .query
        .target_users
        .iter()
        .copied()
        .map(UserId)
        .filter(|id| !registry.contains(*id))
        .collect();
    for target in &unknown_targets {
        warn!(target_user = %target, users = registry.len(), "Query target is not registered");
    }

    let registered = u64::try_from(registry.len()).unwrap_or(u64::MAX);
    let unattributable_producers =
        u64::from(config.ingest.producer_count).saturating_sub(registered);
    if unattributable_producers > 0 {
        warn!(
            producers = config.ingest.producer_count,
            users = registry.len(),
            unattributable_producers,
            "Some producers have no registered user; their content will never be ranked"
        );
    }

    RegistryReport {
        unknown_targets,
        unattributable_producers,
    }
}
