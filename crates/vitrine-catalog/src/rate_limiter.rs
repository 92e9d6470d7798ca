//! Rate limiting for remote catalog calls.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Token bucket admitting a fixed number of calls per second.
///
/// Tokens refill continuously; a full bucket allows one second's worth of
/// calls as a burst.
#[derive(Debug)]
pub struct TokenBucket {
    calls_per_second: f64,
    bucket: Mutex<Bucket>,
}

impl TokenBucket {
    /// Limiter for `calls_per_second` calls (at least one).
    #[must_use]
    pub fn per_second(calls_per_second: u64) -> Self {
        let rate = calls_per_second.max(1) as f64;
        Self {
            calls_per_second: rate,
            bucket: Mutex::new(Bucket {
                tokens: rate,
                refilled_at: Instant::now(),
            }),
        }
    }

    /// Take a token if one is available.
    pub async fn try_acquire(&self) -> bool {
        self.take().await.is_none()
    }

    /// Take a token, sleeping until one is available.
    pub async fn acquire(&self) {
        while let Some(wait) = self.take().await {
            tokio::time::sleep(wait).await;
        }
    }

    /// Whole tokens currently available.
    pub async fn available(&self) -> u64 {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        bucket.tokens as u64
    }

    /// Take a token, or return how long until the next one.
    async fn take(&self) -> Option<Duration> {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            None
        } else {
            Some(Duration::from_secs_f64(
                (1.0 - bucket.tokens) / self.calls_per_second,
            ))
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.calls_per_second).min(self.calls_per_second);
        bucket.refilled_at = now;
    }
}
