//! # Connection Rate Limiter
//!
//! Per-identifier and global attempt ceilings with exponential backoff and a
//! one-shot override.
//!
//! ## Algorithm
//!
//! - A tracker resets wholesale once `now - first_attempt_time > time_window`.
//! - Once `attempts >= max_attempts`, the identifier is attemptable again when
//!   `now - last_attempt_time >= min(initial_delay * multiplier, max_delay)`.
//! - The next record after backoff expiry zeroes `attempts` and, if the round
//!   ended in failures, multiplies the multiplier (capped so the delay never
//!   exceeds `max_delay`). Repeated exhaustion therefore escalates
//!   1s, 2s, 4s, ... 30s with the defaults.
//! - The global counter is checked before the per-identifier tracker.
//! - `force_retry` grants one bypass per rate-limited window; consuming it
//!   increments neither counter.
//!
//! ## Persistence
//!
//! A versioned JSON snapshot is written after every mutation. Snapshots with a
//! different version or older than one hour are ignored; corrupt ones are
//! removed and the limiter starts empty (fail-open). Storage failures never
//! propagate: the limiter keeps working in memory.

use crate::domain::config::RateLimitConfig;
use crate::domain::entities::Timestamp;
use crate::domain::errors::StorageError;
use crate::ports::outbound::{KeyValueStore, TimeSource};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Storage key for the limiter snapshot.
pub const RATE_LIMIT_STORAGE_KEY: &str = "wallet_guard:rate_limit";

/// Current snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Snapshots older than this are discarded on restore.
pub const SNAPSHOT_MAX_AGE_MS: u64 = 60 * 60 * 1000;

// =============================================================================
// STATE
// =============================================================================

/// Attempt history for one identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptTracker {
    pub attempts: u32,
    pub success_count: u32,
    pub failure_count: u32,
    pub first_attempt_time: Timestamp,
    pub last_attempt_time: Timestamp,
    pub backoff_multiplier: f64,
    pub override_used: bool,
    pub override_available: bool,
    pub consecutive_failures: u32,
}

impl AttemptTracker {
    fn new(now: Timestamp) -> Self {
        Self {
            attempts: 0,
            success_count: 0,
            failure_count: 0,
            first_attempt_time: now,
            last_attempt_time: now,
            backoff_multiplier: 1.0,
            override_used: false,
            override_available: false,
            consecutive_failures: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct GlobalCounter {
    attempts: u32,
    first_attempt_time: Timestamp,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedTracker {
    id: String,
    #[serde(flatten)]
    tracker: AttemptTracker,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitSnapshot {
    version: u32,
    trackers: Vec<PersistedTracker>,
    global_attempts: u32,
    global_first_attempt: Timestamp,
    timestamp: Timestamp,
}

impl RateLimitSnapshot {
    /// Rejects snapshots no honest writer could have produced at `now`:
    /// backoff multipliers below one or timestamps from the future.
    fn is_plausible(&self, now: Timestamp) -> bool {
        self.timestamp <= now
            && (self.global_attempts == 0 || self.global_first_attempt <= now)
            && self.trackers.iter().all(|p| {
                let t = &p.tracker;
                t.backoff_multiplier >= 1.0
                    && t.first_attempt_time <= t.last_attempt_time
                    && t.last_attempt_time <= now
            })
    }
}

// =============================================================================
// READ MODELS
// =============================================================================

/// Read model over one identifier's tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStats {
    pub attempts: u32,
    pub success_count: u32,
    pub failure_count: u32,
    pub consecutive_failures: u32,
    pub backoff_multiplier: f64,
    /// Backoff delay that applies once attempts are exhausted
    pub current_delay_ms: u64,
    pub remaining_attempts: u32,
    pub cooldown_ms: u64,
    pub override_available: bool,
    pub override_used: bool,
    pub is_rate_limited: bool,
    pub first_attempt_time: Option<Timestamp>,
    pub last_attempt_time: Option<Timestamp>,
}

/// Severity tier for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSeverity {
    Info,
    Warning,
    Error,
}

/// UI-facing rate limit status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub severity: StatusSeverity,
    pub message: String,
    pub can_attempt: bool,
    pub cooldown_ms: u64,
    pub remaining_attempts: u32,
    pub can_force_retry: bool,
}

/// Result of loading the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing stored
    Empty,
    /// Snapshot adopted
    Restored { trackers: usize },
    /// Snapshot unreadable; removed from storage
    Corrupt,
    /// Snapshot written by another format version; ignored
    VersionMismatch { found: u32 },
    /// Snapshot older than `SNAPSHOT_MAX_AGE_MS`; ignored
    Stale { age_ms: u64 },
    /// Storage could not be read
    StorageUnavailable,
    /// Persistence disabled or no store attached
    Disabled,
}

impl RestoreOutcome {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, RestoreOutcome::Corrupt)
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Connection attempt rate limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    trackers: HashMap<String, AttemptTracker>,
    global: GlobalCounter,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Arc<dyn TimeSource>,
    last_restore: RestoreOutcome,
}

impl RateLimiter {
    /// In-memory limiter.
    pub fn new(config: RateLimitConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            config,
            trackers: HashMap::new(),
            global: GlobalCounter::default(),
            store: None,
            clock,
            last_restore: RestoreOutcome::Disabled,
        }
    }

    /// Limiter backed by durable storage. Restores the stored snapshot.
    pub fn with_storage(
        config: RateLimitConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let mut limiter = Self::new(config, clock);
        limiter.store = Some(store);
        limiter.restore();
        limiter
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Outcome of the most recent `restore`.
    pub fn last_restore(&self) -> &RestoreOutcome {
        &self.last_restore
    }

    /// Whether `id` may attempt a connection now. Pure predicate.
    pub fn can_attempt(&self, id: &str) -> bool {
        let now = self.clock.now();
        let tracker = self.trackers.get(id);

        if tracker.is_some_and(|t| t.override_available) {
            return true;
        }
        if self.global_blocked(now) {
            return false;
        }
        match tracker {
            None => true,
            Some(tracker) => !self.tracker_limited(tracker, now),
        }
    }

    /// Whether a `force_retry` override is waiting to be spent in the
    /// current window.
    pub fn override_pending(&self, id: &str) -> bool {
        let now = self.clock.now();
        self.trackers
            .get(id)
            .is_some_and(|t| t.override_available && !self.window_elapsed(t, now))
    }

    /// Record the outcome of a connection attempt.
    pub fn record_attempt(&mut self, id: &str, success: bool) {
        let now = self.clock.now();
        self.roll_global(now);

        let window = self.config.time_window_ms;
        let max_attempts = self.config.max_attempts;
        let backoff_enabled = self.config.enable_backoff;
        let growth = self.config.backoff_multiplier;
        let max_multiplier = self.config.max_multiplier();
        let reset_on_success = self.config.reset_on_success;
        let delay = self
            .trackers
            .get(id)
            .map(|t| self.backoff_delay(t))
            .unwrap_or(0);

        let tracker = self
            .trackers
            .entry(id.to_string())
            .or_insert_with(|| AttemptTracker::new(now));

        if now.saturating_sub(tracker.first_attempt_time) > window {
            *tracker = AttemptTracker::new(now);
        } else if backoff_enabled
            && tracker.attempts >= max_attempts
            && now.saturating_sub(tracker.last_attempt_time) >= delay
        {
            tracker.attempts = 0;
            if tracker.consecutive_failures > 0 {
                tracker.backoff_multiplier =
                    (tracker.backoff_multiplier * growth).min(max_multiplier);
            }
        }

        let override_consumed = tracker.override_available;
        if override_consumed {
            tracker.override_available = false;
            tracker.override_used = true;
        } else {
            tracker.attempts += 1;
        }
        tracker.last_attempt_time = now;

        if success {
            tracker.success_count += 1;
            if reset_on_success {
                tracker.backoff_multiplier = 1.0;
                tracker.consecutive_failures = 0;
            }
        } else {
            tracker.failure_count += 1;
            tracker.consecutive_failures += 1;
        }

        debug!(
            wallet = id,
            success,
            attempts = tracker.attempts,
            multiplier = tracker.backoff_multiplier,
            override_consumed,
            "Recorded connection attempt"
        );

        if !override_consumed {
            if self.global.attempts == 0 {
                self.global.first_attempt_time = now;
            }
            self.global.attempts += 1;
        }

        self.persist_best_effort();
    }

    /// Milliseconds until `id` may attempt again; 0 when attemptable.
    pub fn cooldown_time(&self, id: &str) -> u64 {
        if self.can_attempt(id) {
            return 0;
        }
        let now = self.clock.now();
        let global_wait = self.global_wait(now);
        let tracker_wait = self
            .trackers
            .get(id)
            .filter(|t| self.tracker_limited(t, now))
            .map(|t| self.tracker_wait(t, now))
            .unwrap_or(0);
        global_wait.max(tracker_wait)
    }

    pub fn attempt_stats(&self, id: &str) -> AttemptStats {
        let now = self.clock.now();
        let is_rate_limited = !self.can_attempt(id);
        let cooldown_ms = self.cooldown_time(id);

        match self.trackers.get(id) {
            None => AttemptStats {
                attempts: 0,
                success_count: 0,
                failure_count: 0,
                consecutive_failures: 0,
                backoff_multiplier: 1.0,
                current_delay_ms: self.config.initial_delay_ms.min(self.config.max_delay_ms),
                remaining_attempts: self.config.max_attempts,
                cooldown_ms,
                override_available: false,
                override_used: false,
                is_rate_limited,
                first_attempt_time: None,
                last_attempt_time: None,
            },
            Some(tracker) => AttemptStats {
                attempts: tracker.attempts,
                success_count: tracker.success_count,
                failure_count: tracker.failure_count,
                consecutive_failures: tracker.consecutive_failures,
                backoff_multiplier: tracker.backoff_multiplier,
                current_delay_ms: self.backoff_delay(tracker),
                remaining_attempts: self.remaining_for(tracker, now),
                cooldown_ms,
                override_available: tracker.override_available,
                override_used: tracker.override_used,
                is_rate_limited,
                first_attempt_time: Some(tracker.first_attempt_time),
                last_attempt_time: Some(tracker.last_attempt_time),
            },
        }
    }

    /// Status tiers: error when limited, warning with one attempt left, else info.
    pub fn rate_limit_status(&self, id: &str) -> RateLimitStatus {
        let now = self.clock.now();
        let can_attempt = self.can_attempt(id);
        let cooldown_ms = self.cooldown_time(id);
        let tracker = self.trackers.get(id);
        let remaining_attempts = tracker
            .map(|t| self.remaining_for(t, now))
            .unwrap_or(self.config.max_attempts);
        let global_remaining = self.global_remaining(now);

        if !can_attempt {
            let can_force_retry = tracker.is_some_and(|t| !t.override_used && !t.override_available);
            let seconds = cooldown_ms.div_ceil(1000);
            let tracker_limited = tracker.is_some_and(|t| self.tracker_limited(t, now));
            let message = if tracker_limited {
                format!("Too many connection attempts. Try again in {seconds}s.")
            } else {
                format!("Too many connection attempts across wallets. Try again in {seconds}s.")
            };
            return RateLimitStatus {
                severity: StatusSeverity::Error,
                message,
                can_attempt,
                cooldown_ms,
                remaining_attempts: 0,
                can_force_retry,
            };
        }

        let (severity, message) = if remaining_attempts == 1 {
            (
                StatusSeverity::Warning,
                "1 connection attempt remaining before a cooldown.".to_string(),
            )
        } else if global_remaining == Some(1) {
            (
                StatusSeverity::Warning,
                "Connection attempts are nearly exhausted across wallets.".to_string(),
            )
        } else {
            (
                StatusSeverity::Info,
                format!("{remaining_attempts} connection attempts remaining."),
            )
        };

        RateLimitStatus {
            severity,
            message,
            can_attempt,
            cooldown_ms,
            remaining_attempts,
            can_force_retry: false,
        }
    }

    /// Remove one tracker (subtracting its attempts from the global counter)
    /// or, with `None`, wipe everything.
    pub fn clear_rate_limit(&mut self, id: Option<&str>) {
        match id {
            Some(id) => {
                if let Some(tracker) = self.trackers.remove(id) {
                    self.global.attempts = self.global.attempts.saturating_sub(tracker.attempts);
                    info!(wallet = id, "Cleared rate limit");
                }
            }
            None => {
                self.trackers.clear();
                self.global = GlobalCounter::default();
                info!("Cleared all rate limits");
            }
        }
        self.persist_best_effort();
    }

    /// Grant a one-shot bypass. True only when `id` is rate limited and has
    /// not had an override in this window.
    pub fn force_retry(&mut self, id: &str) -> bool {
        let limited = !self.can_attempt(id);
        let Some(tracker) = self.trackers.get_mut(id) else {
            return false;
        };
        if !limited || tracker.override_used || tracker.override_available {
            return false;
        }
        tracker.override_available = true;
        info!(wallet = id, "Granted one-shot rate limit override");
        self.persist_best_effort();
        true
    }

    /// Write the snapshot to storage. No-op when persistence is disabled.
    pub fn persist(&self) -> Result<(), StorageError> {
        let Some(store) = self.store.as_ref().filter(|_| self.config.persist) else {
            return Ok(());
        };

        let mut trackers: Vec<PersistedTracker> = self
            .trackers
            .iter()
            .map(|(id, tracker)| PersistedTracker {
                id: id.clone(),
                tracker: tracker.clone(),
            })
            .collect();
        trackers.sort_by(|a, b| a.id.cmp(&b.id));

        let snapshot = RateLimitSnapshot {
            version: SNAPSHOT_VERSION,
            trackers,
            global_attempts: self.global.attempts,
            global_first_attempt: self.global.first_attempt_time,
            timestamp: self.clock.now(),
        };
        let json = serde_json::to_string(&snapshot).map_err(|e| StorageError::Io(e.to_string()))?;
        store.set(RATE_LIMIT_STORAGE_KEY, &json)
    }

    /// Load the stored snapshot, replacing in-memory state only on success.
    ///
    /// Safe to call again to adopt a snapshot written by another tab.
    pub fn restore(&mut self) -> RestoreOutcome {
        let outcome = self.load_snapshot();
        match &outcome {
            RestoreOutcome::Restored { trackers } => {
                debug!(trackers, "Restored rate limit snapshot")
            }
            RestoreOutcome::Corrupt => {
                warn!("Corrupt rate limit snapshot discarded; starting unrestricted")
            }
            RestoreOutcome::VersionMismatch { found } => {
                info!(found, expected = SNAPSHOT_VERSION, "Ignoring rate limit snapshot")
            }
            RestoreOutcome::Stale { age_ms } => {
                debug!(age_ms, "Ignoring stale rate limit snapshot")
            }
            RestoreOutcome::Empty
            | RestoreOutcome::StorageUnavailable
            | RestoreOutcome::Disabled => {}
        }
        self.last_restore = outcome.clone();
        outcome
    }

    fn load_snapshot(&mut self) -> RestoreOutcome {
        let Some(store) = self.store.as_ref().filter(|_| self.config.persist) else {
            return RestoreOutcome::Disabled;
        };

        let raw = match store.get(RATE_LIMIT_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return RestoreOutcome::Empty,
            Err(e) => {
                warn!(error = %e, "Rate limit storage unavailable");
                return RestoreOutcome::StorageUnavailable;
            }
        };

        let now = self.clock.now();
        let snapshot = match serde_json::from_str::<RateLimitSnapshot>(&raw) {
            Ok(snapshot) if snapshot.is_plausible(now) => snapshot,
            _ => {
                if let Err(e) = store.remove(RATE_LIMIT_STORAGE_KEY) {
                    warn!(error = %e, "Failed to remove corrupt rate limit snapshot");
                }
                return RestoreOutcome::Corrupt;
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            return RestoreOutcome::VersionMismatch {
                found: snapshot.version,
            };
        }

        let age_ms = now.saturating_sub(snapshot.timestamp);
        if age_ms > SNAPSHOT_MAX_AGE_MS {
            return RestoreOutcome::Stale { age_ms };
        }

        self.trackers = snapshot
            .trackers
            .into_iter()
            .map(|p| (p.id, p.tracker))
            .collect();
        self.global = GlobalCounter {
            attempts: snapshot.global_attempts,
            first_attempt_time: snapshot.global_first_attempt,
        };
        RestoreOutcome::Restored {
            trackers: self.trackers.len(),
        }
    }

    fn persist_best_effort(&self) {
        if let Err(e) = self.persist() {
            warn!(error = %e, "Failed to persist rate limit state; continuing in memory");
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn backoff_delay(&self, tracker: &AttemptTracker) -> u64 {
        let scaled = (self.config.initial_delay_ms as f64 * tracker.backoff_multiplier).round();
        (scaled as u64).min(self.config.max_delay_ms)
    }

    fn window_elapsed(&self, tracker: &AttemptTracker, now: Timestamp) -> bool {
        now.saturating_sub(tracker.first_attempt_time) > self.config.time_window_ms
    }

    fn backoff_elapsed(&self, tracker: &AttemptTracker, now: Timestamp) -> bool {
        self.config.enable_backoff
            && now.saturating_sub(tracker.last_attempt_time) >= self.backoff_delay(tracker)
    }

    fn tracker_limited(&self, tracker: &AttemptTracker, now: Timestamp) -> bool {
        !self.window_elapsed(tracker, now)
            && tracker.attempts >= self.config.max_attempts
            && !self.backoff_elapsed(tracker, now)
    }

    fn tracker_wait(&self, tracker: &AttemptTracker, now: Timestamp) -> u64 {
        let window_wait = tracker
            .first_attempt_time
            .saturating_add(self.config.time_window_ms)
            .saturating_add(1)
            .saturating_sub(now);
        if self.config.enable_backoff {
            let backoff_wait = tracker
                .last_attempt_time
                .saturating_add(self.backoff_delay(tracker))
                .saturating_sub(now);
            window_wait.min(backoff_wait)
        } else {
            window_wait
        }
    }

    fn remaining_for(&self, tracker: &AttemptTracker, now: Timestamp) -> u32 {
        let effective = if self.window_elapsed(tracker, now)
            || (tracker.attempts >= self.config.max_attempts && self.backoff_elapsed(tracker, now))
        {
            0
        } else {
            tracker.attempts
        };
        self.config.max_attempts.saturating_sub(effective)
    }

    fn global_active(&self, now: Timestamp) -> bool {
        self.global.attempts > 0
            && now.saturating_sub(self.global.first_attempt_time)
                <= self.config.global_time_window_ms
    }

    fn global_blocked(&self, now: Timestamp) -> bool {
        match self.config.global_max_attempts {
            Some(max) => self.global_active(now) && self.global.attempts >= max,
            None => false,
        }
    }

    fn global_remaining(&self, now: Timestamp) -> Option<u32> {
        let max = self.config.global_max_attempts?;
        let used = if self.global_active(now) {
            self.global.attempts
        } else {
            0
        };
        Some(max.saturating_sub(used))
    }

    fn global_wait(&self, now: Timestamp) -> u64 {
        if !self.global_blocked(now) {
            return 0;
        }
        self.global
            .first_attempt_time
            .saturating_add(self.config.global_time_window_ms)
            .saturating_add(1)
            .saturating_sub(now)
    }

    fn roll_global(&mut self, now: Timestamp) {
        if self.global.attempts > 0 && !self.global_active(now) {
            self.global = GlobalCounter::default();
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("trackers", &self.trackers.len())
            .field("global_attempts", &self.global.attempts)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}
