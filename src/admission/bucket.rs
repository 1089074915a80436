use std::time::Instant;

/// Per-client token bucket.
///
/// Tokens are fractional so refill stays smooth between requests. The bucket
/// starts full, and `0.0 <= tokens <= capacity` holds after every call.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    capacity: u32,
    refill_per_sec: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: f64, now: Instant) -> Self {
        Self {
            tokens: capacity as f64,
            capacity,
            refill_per_sec: refill_per_sec.max(0.0),
            last_refill: now,
            last_seen: now,
        }
    }

    /// Adds the tokens accrued since the last refill, capped at capacity.
    fn refill(&mut self, now: Instant) {
        // Instants taken on other threads can trail `last_refill` slightly
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity as f64);
            self.last_refill = now;
        }
    }

    /// Refills, then takes one token if a whole token is available.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if now > self.last_seen {
            self.last_seen = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }
}
