//! Per-client admission control.
//!
//! Every inbound request is charged one token from the bucket keyed by its
//! client address. Buckets live in a sharded concurrent map owned by the
//! controller instance that the router state carries.

mod bucket;

pub use bucket::TokenBucket;

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::RateLimitConfig;

/// How often the janitor sweeps idle buckets.
const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of an admission check. `Throttled` is a normal result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Throttled,
}

impl Admission {
    pub fn is_allowed(self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

pub struct AdmissionController {
    config: RateLimitConfig,
    idle_window: Duration,
    buckets: DashMap<String, TokenBucket>,
}

impl AdmissionController {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            idle_window: Duration::from_secs(config.idle_eviction_secs),
            config,
            buckets: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn admit(&self, client_key: &str) -> Admission {
        self.admit_at(client_key, Instant::now())
    }

    /// Charges one token to `client_key` as of `now`.
    ///
    /// Refill and consumption happen while the entry's shard is write-locked,
    /// so two callers racing for the last token cannot both win.
    pub fn admit_at(&self, client_key: &str, now: Instant) -> Admission {
        if !self.config.enabled {
            return Admission::Allowed;
        }

        let mut bucket = self
            .buckets
            .entry(client_key.to_string())
            .or_insert_with(|| {
                TokenBucket::new(self.config.burst, self.config.requests_per_second, now)
            });

        if bucket.try_acquire(now) {
            Admission::Allowed
        } else {
            Admission::Throttled
        }
    }

    /// Drops buckets that have not been touched within the idle window.
    ///
    /// `retain` holds each shard's write lock while it inspects the shard,
    /// the same lock `admit_at` takes, so an admission racing with eviction
    /// either updates the surviving bucket or starts a fresh one.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_seen()) < self.idle_window);
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.buckets.len(), "evicted idle rate-limit buckets");
        }
        evicted
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Spawns the periodic idle-bucket sweep. The task stops when the last
    /// other reference to the controller is dropped.
    pub fn spawn_janitor(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(JANITOR_INTERVAL);
            // First tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match controller.upgrade() {
                    Some(controller) => {
                        controller.evict_idle(Instant::now());
                    }
                    None => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn limiter(rps: f64, burst: u32) -> AdmissionController {
        AdmissionController::new(RateLimitConfig {
            enabled: true,
            requests_per_second: rps,
            burst,
            idle_eviction_secs: 180,
        })
    }

    #[test]
    fn burst_then_throttle_then_refill() {
        let controller = limiter(2.0, 6);
        let t0 = Instant::now();

        for _ in 0..6 {
            assert_eq!(controller.admit_at("10.0.0.1", t0), Admission::Allowed);
        }
        assert_eq!(controller.admit_at("10.0.0.1", t0), Admission::Throttled);

        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(controller.admit_at("10.0.0.1", t1), Admission::Allowed);
    }

    #[test]
    fn one_interval_grants_exactly_one_more() {
        let controller = limiter(4.0, 3);
        let t0 = Instant::now();

        let allowed = (0..10)
            .filter(|_| controller.admit_at("client", t0).is_allowed())
            .count();
        assert_eq!(allowed, 3);

        let t1 = t0 + Duration::from_millis(250);
        assert!(controller.admit_at("client", t1).is_allowed());
        assert!(!controller.admit_at("client", t1).is_allowed());
    }

    #[test]
    fn clients_are_isolated() {
        let controller = limiter(1.0, 1);
        let t0 = Instant::now();

        assert!(controller.admit_at("a", t0).is_allowed());
        assert!(!controller.admit_at("a", t0).is_allowed());
        assert!(controller.admit_at("b", t0).is_allowed());
    }

    #[test]
    fn disabled_limiter_allows_everything() {
        let controller = AdmissionController::new(RateLimitConfig {
            enabled: false,
            requests_per_second: 0.0,
            burst: 0,
            idle_eviction_secs: 180,
        });

        for _ in 0..100 {
            assert!(controller.admit("anyone").is_allowed());
        }
        assert_eq!(controller.tracked_clients(), 0);
    }

    #[test]
    fn idle_buckets_are_evicted() {
        let controller = limiter(1.0, 2);
        let t0 = Instant::now();

        controller.admit_at("stale", t0);
        controller.admit_at("fresh", t0 + Duration::from_secs(170));

        let evicted = controller.evict_idle(t0 + Duration::from_secs(200));
        assert_eq!(evicted, 1);
        assert_eq!(controller.tracked_clients(), 1);

        // An evicted client comes back with a full bucket
        let t2 = t0 + Duration::from_secs(200);
        assert!(controller.admit_at("stale", t2).is_allowed());
        assert!(controller.admit_at("stale", t2).is_allowed());
    }

    #[test]
    fn concurrent_callers_never_exceed_burst() {
        let controller = Arc::new(limiter(0.0, 5));
        let allowed = Arc::new(AtomicUsize::new(0));
        let t0 = Instant::now();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let controller = Arc::clone(&controller);
                let allowed = Arc::clone(&allowed);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        if controller.admit_at("shared", t0).is_allowed() {
                            allowed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(allowed.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn eviction_racing_admission_keeps_bucket_consistent() {
        let controller = Arc::new(limiter(0.0, 1000));
        let t0 = Instant::now();

        let admitter = {
            let controller = Arc::clone(&controller);
            std::thread::spawn(move || {
                (0..500)
                    .filter(|_| controller.admit_at("racer", t0).is_allowed())
                    .count()
            })
        };
        let evictor = {
            let controller = Arc::clone(&controller);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    controller.evict_idle(t0);
                }
            })
        };

        evictor.join().unwrap();
        let allowed = admitter.join().unwrap();

        // Buckets touched at t0 are never idle at t0, so nothing is lost
        assert_eq!(allowed, 500);
        let remaining = controller.buckets.get("racer").map(|b| b.tokens());
        assert_eq!(remaining, Some(500.0));
    }
}
