//! Fixed-window, per-identity request budgets.
//!
//! Guards expensive or abusable operations (music import). Fixed window,
//! not sliding: every call inside `[window_start, window_start + window)`
//! shares one counter, and the counter resets exactly when the window
//! elapses. A denied check never consumes budget, and `reset_time` is
//! stable across repeated checks within one window.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

/// Operation class a budget applies to. Classes are independent of each
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// Background music / asset import.
    MusicImport,
    /// Scene batch generation.
    SceneBatch,
}

impl OperationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MusicImport => "music_import",
            Self::SceneBatch => "scene_batch",
        }
    }
}

/// A per-window budget.
#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    /// Calls allowed per window.
    pub max: u32,
    /// Window length.
    pub window: Duration,
}

impl RatePolicy {
    pub fn new(max: u32, window: Duration) -> Self {
        Self { max, window }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    /// Whether the call may proceed. When true, the budget was consumed.
    pub allowed: bool,
    /// When the current window resets (`window_start + window`).
    pub reset_time: DateTime<Utc>,
}

impl RateDecision {
    /// Seconds until the window resets, floored at zero.
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.reset_time - now).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: DateTime<Utc>,
    count: u32,
}

/// Fixed-window limiter keyed by `(identity, operation class)`.
///
/// All state sits behind one mutex, which also serializes concurrent
/// check/increment pairs for the same identity.
#[derive(Clone, Default)]
pub struct FixedWindowLimiter {
    windows: Arc<Mutex<HashMap<(String, OperationClass), Window>>>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check (and on success consume) one unit of budget.
    pub async fn check(
        &self,
        identity: &str,
        class: OperationClass,
        policy: RatePolicy,
    ) -> RateDecision {
        self.check_at(identity, class, policy, Utc::now()).await
    }

    /// Clock-injectable variant of [`check`](Self::check), used by tests.
    pub async fn check_at(
        &self,
        identity: &str,
        class: OperationClass,
        policy: RatePolicy,
        now: DateTime<Utc>,
    ) -> RateDecision {
        let mut windows = self.windows.lock().await;
        let key = (identity.to_string(), class);

        let window = windows.entry(key).or_insert(Window { start: now, count: 0 });

        // Count resets exactly when the window has fully elapsed.
        if now >= window.start + policy.window {
            window.start = now;
            window.count = 0;
        }

        let reset_time = window.start + policy.window;

        if window.count >= policy.max {
            debug!(
                identity = %identity,
                class = class.as_str(),
                count = window.count,
                "Rate limit denied"
            );
            // A denied check performs no increment.
            return RateDecision {
                allowed: false,
                reset_time,
            };
        }

        window.count += 1;
        RateDecision {
            allowed: true,
            reset_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy() -> RatePolicy {
        RatePolicy::new(3, Duration::minutes(10))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_exactly_max_calls_allowed_per_window() {
        let limiter = FixedWindowLimiter::new();
        let now = t0();

        for _ in 0..3 {
            let decision = limiter
                .check_at("u1", OperationClass::MusicImport, policy(), now)
                .await;
            assert!(decision.allowed);
        }

        let denied = limiter
            .check_at("u1", OperationClass::MusicImport, policy(), now)
            .await;
        assert!(!denied.allowed);
        assert_eq!(denied.reset_time, t0() + Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_denied_check_does_not_consume_budget() {
        let limiter = FixedWindowLimiter::new();
        let now = t0();

        for _ in 0..3 {
            limiter
                .check_at("u1", OperationClass::MusicImport, policy(), now)
                .await;
        }

        // Repeated denials share the same reset time and never increment.
        let first_denial = limiter
            .check_at("u1", OperationClass::MusicImport, policy(), now)
            .await;
        let second_denial = limiter
            .check_at(
                "u1",
                OperationClass::MusicImport,
                policy(),
                now + Duration::minutes(5),
            )
            .await;
        assert!(!first_denial.allowed);
        assert!(!second_denial.allowed);
        assert_eq!(first_denial.reset_time, second_denial.reset_time);
    }

    #[tokio::test]
    async fn test_window_resets_after_elapse() {
        let limiter = FixedWindowLimiter::new();
        let now = t0();

        for _ in 0..4 {
            limiter
                .check_at("u1", OperationClass::MusicImport, policy(), now)
                .await;
        }

        let after = now + Duration::minutes(10);
        let decision = limiter
            .check_at("u1", OperationClass::MusicImport, policy(), after)
            .await;
        assert!(decision.allowed);
        assert_eq!(decision.reset_time, after + Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_operation_classes_are_independent() {
        let limiter = FixedWindowLimiter::new();
        let now = t0();

        for _ in 0..3 {
            limiter
                .check_at("u1", OperationClass::MusicImport, policy(), now)
                .await;
        }

        let other_class = limiter
            .check_at("u1", OperationClass::SceneBatch, policy(), now)
            .await;
        assert!(other_class.allowed);
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let limiter = FixedWindowLimiter::new();
        let now = t0();

        for _ in 0..3 {
            limiter
                .check_at("u1", OperationClass::MusicImport, policy(), now)
                .await;
        }

        let other_user = limiter
            .check_at("u2", OperationClass::MusicImport, policy(), now)
            .await;
        assert!(other_user.allowed);
    }

    #[test]
    fn test_retry_after_seconds() {
        let decision = RateDecision {
            allowed: false,
            reset_time: t0() + Duration::seconds(90),
        };
        assert_eq!(decision.retry_after_seconds(t0()), 90);
        assert_eq!(
            decision.retry_after_seconds(t0() + Duration::seconds(200)),
            0
        );
    }
}
