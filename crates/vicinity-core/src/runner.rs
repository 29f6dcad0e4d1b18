//! Periodic query loop with run boundaries.
//!
//! This module provides [`run_queries`], the top-level async function that
//! answers the configured nearby-feed queries on a fixed cadence while
//! ingestion runs in the background. It stops on:
//!
//! - **Operator stop**: a stop request on the shared [`ControlState`]
//! - **Time limit**: `max_real_time_seconds` of wall-clock time
//! - **Round limit**: `max_query_rounds` completed rounds
//!
//! Each round queries every target concurrently against the store as it is
//! at that moment. A failed query is reported to the callback and logged;
//! it never ends the run.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use vicinity_types::UserId;

use crate::config::QueryConfig;
use crate::control::{ControlState, RunEndReason};
use crate::query::{QueryError, QueryOutcome, QueryService};

/// Result of a query run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// The reason the run ended.
    pub end_reason: RunEndReason,
    /// Number of completed query rounds.
    pub rounds: u64,
    /// Queries that returned a result.
    pub queries_ok: u64,
    /// Queries that returned an error.
    pub queries_failed: u64,
}

/// Callback invoked with every query answer.
///
/// The engine uses this to log results; tests use it to collect them.
pub trait QueryCallback: Send {
    /// Called for each successful query in a round.
    fn on_result(&mut self, round: u64, outcome: &QueryOutcome);

    /// Called for each failed query in a round.
    fn on_error(&mut self, _round: u64, _target: UserId, _error: &QueryError) {}
}

/// A no-op query callback for testing.
pub struct NoOpCallback;

impl QueryCallback for NoOpCallback {
    fn on_result(&mut self, _round: u64, _outcome: &QueryOutcome) {}
}

/// Run query rounds until a termination condition is met.
///
/// The first round runs immediately; later rounds follow every
/// `config.interval_ms`. Waiting for the next round is raced against the
/// stop signal.
pub async fn run_queries(
    service: &QueryService,
    config: &QueryConfig,
    control: &Arc<ControlState>,
    callback: &mut dyn QueryCallback,
) -> RunResult {
    let targets: Vec<UserId> = config.target_users.iter().copied().map(UserId).collect();
    let limit = (config.result_limit > 0).then_some(config.result_limit);
    let mut cadence = tokio::time::interval(Duration::from_millis(config.interval_ms.max(1)));
    cadence.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut result = RunResult {
        end_reason: RunEndReason::OperatorStop,
        rounds: 0,
        queries_ok: 0,
        queries_failed: 0,
    };

    info!(
        targets = targets.len(),
        k = config.k,
        interval_ms = config.interval_ms,
        max_query_rounds = control.max_query_rounds(),
        max_real_time_seconds = control.max_real_time_seconds(),
        "Query loop starting"
    );

    loop {
        // --- Wait for the next round ---
        tokio::select! {
            biased;
            () = control.stopped() => {}
            _ = cadence.tick() => {}
        }

        // --- Check stop request ---
        if control.is_stop_requested() {
            info!("Stop requested");
            result.end_reason = RunEndReason::OperatorStop;
            break;
        }

        // --- Check time limit ---
        if control.time_limit_reached() {
            info!(
                max_seconds = control.max_real_time_seconds(),
                elapsed = control.elapsed_seconds(),
                "Real-time limit reached"
            );
            result.end_reason = RunEndReason::MaxRealTimeReached;
            break;
        }

        // --- Run one round ---
        let round = result.rounds.saturating_add(1);
        let answers = join_all(
            targets
                .iter()
                .map(|&target| service.query_detailed(target, config.k, limit)),
        )
        .await;

        for (target, answer) in targets.iter().zip(answers) {
            match answer {
                Ok(outcome) => {
                    result.queries_ok = result.queries_ok.saturating_add(1);
                    callback.on_result(round, &outcome);
                }
                Err(e) => {
                    result.queries_failed = result.queries_failed.saturating_add(1);
                    warn!(round, target_user = %target, error = %e, "Query failed");
                    callback.on_error(round, *target, &e);
                }
            }
        }
        result.rounds = round;

        // --- Check round limit ---
        if control.round_limit_reached(result.rounds) {
            info!(
                rounds = result.rounds,
                max_query_rounds = control.max_query_rounds(),
                "Query round limit reached"
            );
            result.end_reason = RunEndReason::MaxQueryRoundsReached;
            break;
        }
    }

    control.set_end_reason(result.end_reason).await;
    result
}

/// Log the end of a query run.
pub fn log_run_end(result: &RunResult) {
    info!(
        reason = ?result.end_reason,
        rounds = result.rounds,
        queries_ok = result.queries_ok,
        queries_failed = result.queries_failed,
        "Query loop ended"
    );
    if result.rounds == 0 {
        warn!("Query loop ended with no rounds executed");
    }
}
