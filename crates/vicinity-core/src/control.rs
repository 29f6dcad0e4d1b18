//! Shared control state for producers, the conduit and the query loop.
//!
//! The driver owns one [`ControlState`] behind an `Arc` and hands clones to
//! every task. Producers check it at each suspension point: they park while
//! paused and exit promptly once a stop is requested. The query loop uses it
//! for run boundaries.
//!
//! All mutable control fields use atomics so the hot paths never take a
//! lock; `Notify` wakes tasks that are parked on a state change.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::config::RunConfig;

/// Reason why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEndReason {
    /// Reached the configured `max_real_time_seconds` limit.
    MaxRealTimeReached,
    /// Reached the configured `max_query_rounds` limit.
    MaxQueryRoundsReached,
    /// A stop was requested (Ctrl-C or a caller).
    OperatorStop,
}

/// Shared cooperative control state.
#[derive(Debug)]
pub struct ControlState {
    /// Whether producers are currently paused.
    paused: AtomicBool,

    /// Wakes paused tasks on resume.
    resume_notify: Notify,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Wakes tasks waiting in [`ControlState::stopped`].
    stop_notify: Notify,

    /// Wall-clock time when the run started, for reporting.
    started_at: DateTime<Utc>,

    /// Monotonic start, used for the time limit. Follows tokio's clock, so
    /// a paused test runtime drives it.
    started: Instant,

    /// Maximum wall-clock seconds (0 = unlimited).
    max_real_time_seconds: u64,

    /// Maximum query rounds (0 = unlimited).
    max_query_rounds: u64,

    /// Reason the run ended, if it has.
    end_reason: Mutex<Option<RunEndReason>>,
}

impl ControlState {
    /// Create a new control state from run boundaries.
    pub fn new(bounds: &RunConfig) -> Self {
        Self {
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            started_at: Utc::now(),
            started: Instant::now(),
            max_real_time_seconds: bounds.max_real_time_seconds,
            max_query_rounds: bounds.max_query_rounds,
            end_reason: Mutex::new(None),
        }
    }

    /// A control state with no run boundaries.
    pub fn unbounded() -> Self {
        Self::new(&RunConfig::default())
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Check whether producers are paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause producers. They park at their next suspension point.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume producers and wake any that are parked.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_waiters();
    }

    /// Wait until producers are no longer paused.
    ///
    /// Returns immediately if not paused. A stop request also releases the
    /// wait so paused tasks can shut down.
    pub async fn wait_if_paused(&self) {
        loop {
            let resumed = self.resume_notify.notified();
            let stopped = self.stop_notify.notified();
            if !self.is_paused() || self.is_stop_requested() {
                return;
            }
            tokio::select! {
                () = resumed => {}
                () = stopped => {}
            }
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a cooperative stop and wake every waiting task.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_waiters();
        // Parked producers must see the stop too.
        self.resume_notify.notify_waiters();
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Resolve once a stop has been requested.
    ///
    /// Safe to race in `tokio::select!`: the waiter is registered before the
    /// flag is checked, so a concurrent `request_stop` is never missed.
    pub async fn stopped(&self) {
        loop {
            let notified = self.stop_notify.notified();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }

    /// Record the reason the run ended. The first reason recorded wins.
    pub async fn set_end_reason(&self, reason: RunEndReason) {
        let mut guard = self.end_reason.lock().await;
        if guard.is_none() {
            *guard = Some(reason);
        }
    }

    /// Get the reason the run ended, if it has.
    pub async fn end_reason(&self) -> Option<RunEndReason> {
        *self.end_reason.lock().await
    }

    // -----------------------------------------------------------------------
    // Boundaries
    // -----------------------------------------------------------------------

    /// Whether `completed_rounds` has reached the configured query-round cap.
    ///
    /// Always `false` when the cap is 0.
    pub const fn round_limit_reached(&self, completed_rounds: u64) -> bool {
        self.max_query_rounds > 0 && completed_rounds >= self.max_query_rounds
    }

    /// Whether the wall-clock time limit has been reached.
    ///
    /// Always `false` when the limit is 0.
    pub fn time_limit_reached(&self) -> bool {
        if self.max_real_time_seconds == 0 {
            return false;
        }
        self.elapsed_seconds() >= self.max_real_time_seconds
    }

    /// Return the wall-clock start time.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Return whole seconds elapsed since the run started.
    pub fn elapsed_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Get the configured max real-time seconds.
    pub const fn max_real_time_seconds(&self) -> u64 {
        self.max_real_time_seconds
    }

    /// Get the configured max query rounds.
    pub const fn max_query_rounds(&self) -> u64 {
        self.max_query_rounds
    }

    /// Capture a serializable status report.
    pub async fn status(&self) -> RunStatus {
        RunStatus {
            paused: self.is_paused(),
            stop_requested: self.is_stop_requested(),
            elapsed_seconds: self.elapsed_seconds(),
            max_real_time_seconds: self.max_real_time_seconds,
            max_query_rounds: self.max_query_rounds,
            end_reason: self.end_reason().await,
            started_at: self.started_at.to_rfc3339(),
        }
    }
}

/// JSON-serializable status of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    /// Whether producers are paused.
    pub paused: bool,
    /// Whether a stop has been requested.
    pub stop_requested: bool,
    /// Elapsed wall-clock seconds since start.
    pub elapsed_seconds: u64,
    /// Configured maximum real-time seconds (0 = unlimited).
    pub max_real_time_seconds: u64,
    /// Configured maximum query rounds (0 = unlimited).
    pub max_query_rounds: u64,
    /// The reason the run ended, if applicable.
    pub end_reason: Option<RunEndReason>,
    /// RFC 3339 timestamp of when the run started.
    pub started_at: String,
}
