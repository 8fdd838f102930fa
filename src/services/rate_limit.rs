use crate::services::clock::{duration_millis, Clock};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Named quota a request draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Discover,
    Swipe,
    Superlike,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Discover, Bucket::Swipe, Bucket::Superlike];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Discover => "discover",
            Bucket::Swipe => "swipe",
            Bucket::Superlike => "superlike",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// At most `max` admitted calls per `window`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketLimit {
    pub max: u32,
    pub window: Duration,
}

impl BucketLimit {
    pub fn new(max: u32, window: Duration) -> Self {
        Self { max, window }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimits {
    pub discover: BucketLimit,
    pub swipe: BucketLimit,
    pub superlike: BucketLimit,
}

impl RateLimits {
    pub fn get(&self, bucket: Bucket) -> BucketLimit {
        match bucket {
            Bucket::Discover => self.discover,
            Bucket::Swipe => self.swipe,
            Bucket::Superlike => self.superlike,
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            discover: BucketLimit::new(20, Duration::from_secs(60)),
            swipe: BucketLimit::new(100, Duration::from_secs(60)),
            superlike: BucketLimit::new(5, Duration::from_secs(86_400)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at_ms: i64,
    count: u32,
}

/// Per-user fixed-window rate limiter
///
/// A window opens at the first admitted call and lasts the bucket's window
/// length. Denied calls do not count. The DashMap entry guard is held across
/// the check and the increment, so concurrent callers cannot both read a
/// stale count.
pub struct RateLimiter {
    windows: DashMap<(String, Bucket), Window>,
    limits: RateLimits,
    clock: Arc<dyn Clock>,
    prune_interval_ms: i64,
    last_prune_ms: AtomicI64,
}

impl RateLimiter {
    pub fn new(limits: RateLimits, prune_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_millis();
        Self {
            windows: DashMap::new(),
            limits,
            clock,
            prune_interval_ms: duration_millis(prune_interval),
            last_prune_ms: AtomicI64::new(now),
        }
    }

    /// Admit one call if the user still has quota in `bucket`
    pub fn allow(&self, user_id: &str, bucket: Bucket) -> bool {
        let now = self.clock.now_millis();
        let limit = self.limits.get(bucket);
        let window_ms = duration_millis(limit.window);

        let allowed = {
            let mut window = self
                .windows
                .entry((user_id.to_string(), bucket))
                .or_insert(Window { started_at_ms: now, count: 0 });

            if now.saturating_sub(window.started_at_ms) >= window_ms {
                window.started_at_ms = now;
                window.count = 0;
            }

            if window.count < limit.max {
                window.count += 1;
                true
            } else {
                false
            }
        };

        if !allowed {
            tracing::info!(user_id, bucket = bucket.as_str(), max = limit.max, "rate limit reached");
        }

        self.maybe_prune(now);
        allowed
    }

    /// Calls left in the current window
    pub fn remaining(&self, user_id: &str, bucket: Bucket) -> u32 {
        let now = self.clock.now_millis();
        let limit = self.limits.get(bucket);
        let window_ms = duration_millis(limit.window);

        match self.windows.get(&(user_id.to_string(), bucket)) {
            Some(window) if now.saturating_sub(window.started_at_ms) < window_ms => {
                limit.max.saturating_sub(window.count)
            }
            _ => limit.max,
        }
    }

    /// Time until the bucket admits calls again; zero when it already does
    pub fn retry_after(&self, user_id: &str, bucket: Bucket) -> Duration {
        if self.remaining(user_id, bucket) > 0 {
            return Duration::ZERO;
        }

        let now = self.clock.now_millis();
        let window_ms = duration_millis(self.limits.get(bucket).window);

        self.windows
            .get(&(user_id.to_string(), bucket))
            .map(|window| {
                let ends_at = window.started_at_ms.saturating_add(window_ms);
                Duration::from_millis(u64::try_from(ends_at.saturating_sub(now)).unwrap_or(0))
            })
            .unwrap_or(Duration::ZERO)
    }

    /// Drop windows that have already closed
    pub fn prune(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.windows.len();

        self.windows.retain(|(_, bucket), window| {
            let window_ms = duration_millis(self.limits.get(*bucket).window);
            now.saturating_sub(window.started_at_ms) < window_ms
        });

        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            tracing::debug!(removed, "pruned idle rate-limit windows");
        }
        removed
    }

    pub fn tracked_windows(&self) -> usize {
        self.windows.len()
    }

    fn maybe_prune(&self, now: i64) {
        let last = self.last_prune_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.prune_interval_ms {
            return;
        }

        if self
            .last_prune_ms
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            self.prune();
        }
    }
}
