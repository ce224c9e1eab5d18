use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

/// Number of keys above which stale entries are pruned.
pub const PRUNE_THRESHOLD: usize = 1000;

/// Entries older than this are pruned.
pub const STALE_AFTER: Duration = Duration::from_secs(5 * 60);

/// Source of the current time.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// The tokio clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Per-key cooldown limiter.
///
/// An attempt is accepted if no attempt for the same key was accepted within
/// the window. State is process-local and the client IP part of the key is
/// supplied by the caller, so this is an anti-abuse measure, not a security
/// boundary.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    clock: Arc<dyn Clock>,
    accepted: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    /// Create a limiter using the [`SystemClock`].
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    /// Create a limiter with the given clock.
    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            accepted: Default::default(),
        }
    }

    /// Get the window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check and record an attempt of `subject` from `client_ip`.
    ///
    /// # Errors
    /// - [`Error::RateLimited`](crate::Error::RateLimited) with the number of
    ///   seconds (rounded up) until the next attempt would be accepted.
    pub fn check(&self, subject: &str, client_ip: &str) -> crate::Result<()> {
        let key = format!("{subject}:{client_ip}");
        let now = self.clock.now();
        let mut accepted = self
            .accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = accepted.get(&key) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.window {
                let remaining = self.window - elapsed;
                let retry_after = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                tracing::debug!(%key, retry_after, "rate limited");
                return Err(crate::Error::RateLimited { retry_after });
            }
        }

        accepted.insert(key, now);
        if accepted.len() > PRUNE_THRESHOLD {
            accepted.retain(|_, last| now.saturating_duration_since(*last) < STALE_AFTER);
            tracing::debug!(remaining = accepted.len(), "pruned rate limit entries");
        }
        Ok(())
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns whether no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
