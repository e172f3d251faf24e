// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter for the interactive endpoints.
//!
//! Buckets are keyed by (action, client identifier). Each check resets an
//! expired window, increments the counter and compares it against the
//! policy, all as one atomic store operation.
//!
//! Counting lives behind [`CounterStore`] so a shared backend can replace
//! the in-process [`MemoryCounterStore`]. When the store fails, the
//! configured [`FailureMode`] decides the outcome.

use crate::clock::{Clock, SystemClock};
use crate::config::RateLimitConfig;
use crate::error::{AppError, Result};
use crate::metrics::Metrics;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub use crate::config::{FailureMode, RateLimitPolicy};

/// Action classes with their own rate-limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Auth,
    Comment,
    Like,
    Search,
    Upload,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Auth,
        Action::Comment,
        Action::Like,
        Action::Search,
        Action::Upload,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Comment => "comment",
            Self::Like => "like",
            Self::Search => "search",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown action: {s}"))
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
    /// Limit that was applied
    pub limit: u32,
}

impl RateLimitDecision {
    /// Seconds from `now` until the window resets, never negative.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.reset_at - now).num_seconds().max(0) as u64
    }
}

/// Composite bucket key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub action: String,
    pub client: String,
}

impl BucketKey {
    pub fn new(action: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            client: client.into(),
        }
    }
}

/// Counter state after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

/// Storage port for window counters.
///
/// `hit` must reset-if-expired, increment and read back as a single
/// linearizable operation per key.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn hit(
        &self,
        key: &BucketKey,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<WindowState>;

    /// Drop buckets whose window ended before `now`. Returns how many were removed.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize>;
}

#[derive(Debug)]
struct Bucket {
    count: u32,
    window_start: DateTime<Utc>,
    window: Duration,
}

impl Bucket {
    /// A window whose end is not representable never expires.
    fn expired(&self, now: DateTime<Utc>) -> bool {
        self.window_start
            .checked_add_signed(self.window)
            .is_some_and(|end| now >= end)
    }
}

/// Window length for a policy, rejecting values chrono cannot represent.
fn window_length(policy: RateLimitPolicy) -> Result<Duration> {
    i64::try_from(policy.window_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| AppError::Store(format!("window of {}s is out of range", policy.window_secs)))
}

/// End of a window opened at `start`.
fn window_end(start: DateTime<Utc>, window: Duration) -> Result<DateTime<Utc>> {
    start
        .checked_add_signed(window)
        .ok_or_else(|| AppError::Store(format!("window end after {start} is out of range")))
}

/// In-process counter store.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    buckets: RwLock<HashMap<BucketKey, Bucket>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live buckets.
    pub async fn len(&self) -> usize {
        self.buckets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buckets.read().await.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn hit(
        &self,
        key: &BucketKey,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<WindowState> {
        let mut buckets = self.buckets.write().await;
        let bucket = buckets.entry(key.clone()).or_insert_with(|| Bucket {
            count: 0,
            window_start: now,
            window,
        });

        if bucket.expired(now) || bucket.window != window {
            bucket.count = 0;
            bucket.window_start = now;
            bucket.window = window;
        }

        bucket.count = bucket.count.saturating_add(1);

        Ok(WindowState {
            count: bucket.count,
            window_start: bucket.window_start,
        })
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.expired(now));
        Ok(before - buckets.len())
    }
}

/// Thread-safe rate limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    metrics: Option<Metrics>,
}

impl RateLimiter {
    /// Create a limiter over an in-memory store and the system clock.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_parts(config, Arc::new(MemoryCounterStore::new()), Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: RateLimitConfig,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            clock,
            metrics: None,
        }
    }

    /// Attach metrics counters.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Check the configured policy for an action class.
    pub async fn check(&self, action: Action, client_id: &str) -> RateLimitDecision {
        let policy = self.config.policy(action);
        self.check_limit(action.as_str(), client_id, policy).await
    }

    /// Count one request for `(action, client_id)` under `policy`.
    pub async fn check_limit(
        &self,
        action: &str,
        client_id: &str,
        policy: RateLimitPolicy,
    ) -> RateLimitDecision {
        let now = self.clock.now();
        let key = BucketKey::new(action, client_id);

        let decision = match self.count_hit(&key, policy, now).await {
            Ok(decision) => decision,
            Err(err) => self.on_store_error(action, client_id, policy, now, err),
        };

        if decision.allowed {
            debug!(action, client = %client_id, remaining = decision.remaining, "Request allowed");
        } else {
            info!(
                action,
                client = %client_id,
                reset_at = %decision.reset_at,
                "Request rate limited"
            );
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_rate_limit(action, decision.allowed);
        }

        decision
    }

    async fn count_hit(
        &self,
        key: &BucketKey,
        policy: RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision> {
        let window = window_length(policy)?;
        // Unrepresentable window ends never reach the store
        window_end(now, window)?;
        let state = self.store.hit(key, window, now).await?;
        Ok(RateLimitDecision {
            allowed: state.count <= policy.max,
            remaining: policy.max.saturating_sub(state.count),
            reset_at: window_end(state.window_start, window)?,
            limit: policy.max,
        })
    }

    fn on_store_error(
        &self,
        action: &str,
        client_id: &str,
        policy: RateLimitPolicy,
        now: DateTime<Utc>,
        err: AppError,
    ) -> RateLimitDecision {
        let failure_mode = self.config.failure_mode;
        warn!(
            action,
            client = %client_id,
            error = %err,
            ?failure_mode,
            "Rate limit store failed"
        );
        if let Some(metrics) = &self.metrics {
            metrics.rate_limit_store_errors.inc();
        }

        let reset_at = window_length(policy)
            .and_then(|window| window_end(now, window))
            .unwrap_or(now);
        match failure_mode {
            FailureMode::Open => RateLimitDecision {
                allowed: true,
                remaining: policy.max,
                reset_at,
                limit: policy.max,
            },
            FailureMode::Closed => RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at,
                limit: policy.max,
            },
        }
    }

    /// Clean up expired buckets (should be called periodically).
    pub async fn sweep(&self) {
        let now = self.clock.now();
        match self.store.sweep(now).await {
            Ok(removed) if removed > 0 => debug!(removed, "Swept expired rate limit buckets"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "Rate limit sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn limiter_at(start: DateTime<Utc>) -> (RateLimiter, ManualClock, Arc<MemoryCounterStore>) {
        let clock = ManualClock::new(start);
        let store = Arc::new(MemoryCounterStore::new());
        let limiter = RateLimiter::with_parts(
            RateLimitConfig::default(),
            store.clone(),
            Arc::new(clock.clone()),
        );
        (limiter, clock, store)
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_fixed_window_counts_and_resets() {
        let (limiter, clock, _) = limiter_at(start());
        let policy = RateLimitPolicy::new(3, 60);

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_limit("comment", "1.2.3.4", policy).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.reset_at, start() + Duration::seconds(60));
        }

        let denied = limiter.check_limit("comment", "1.2.3.4", policy).await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);

        clock.advance(Duration::seconds(60));
        let fresh = limiter.check_limit("comment", "1.2.3.4", policy).await;
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 2);
        assert_eq!(fresh.reset_at, start() + Duration::seconds(120));
    }

    #[tokio::test]
    async fn test_retry_after_secs() {
        let (limiter, clock, _) = limiter_at(start());
        let decision = limiter
            .check_limit("auth", "9.9.9.9", RateLimitPolicy::new(1, 900))
            .await;
        clock.advance(Duration::seconds(100));
        assert_eq!(decision.retry_after_secs(clock.now()), 800);
        clock.advance(Duration::seconds(1000));
        assert_eq!(decision.retry_after_secs(clock.now()), 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_buckets() {
        let (limiter, clock, store) = limiter_at(start());
        limiter.check(Action::Comment, "1.1.1.1").await;
        limiter.check(Action::Auth, "1.1.1.1").await;
        assert_eq!(store.len().await, 2);

        // comment window (60s) expires, auth window (900s) does not
        clock.advance(Duration::seconds(61));
        limiter.sweep().await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_window_follows_failure_mode() {
        let (limiter, _, store) = limiter_at(start());
        for window_secs in [u64::MAX, 1_000_000_000_000_000] {
            let decision = limiter
                .check_limit("comment", "1.2.3.4", RateLimitPolicy::new(5, window_secs))
                .await;
            assert!(!decision.allowed);
            assert_eq!(decision.reset_at, start());
        }
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("Like".parse::<Action>().unwrap(), Action::Like);
        assert_eq!(" upload ".parse::<Action>().unwrap(), Action::Upload);
        assert!("delete".parse::<Action>().is_err());
    }
}
