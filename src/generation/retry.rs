//! Bounded exponential backoff for readiness polling
//!
//! Attempt `n` (zero-based) that fails is followed by a delay of
//! `base * 2^n`; there is no delay after the final attempt. Waits go through
//! a [`Sleeper`] so tests can record delays instead of sleeping.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Exponential backoff shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay after failed attempt `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Waits between attempts. Returns `false` when cancelled before the delay elapsed.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool;
}

/// Real-time [`Sleeper`]
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

/// How a polling loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The probe succeeded on this (one-based) attempt
    Ready { attempts: u32 },
    Exhausted { attempts: u32 },
    Cancelled { attempts: u32 },
}

impl PollOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Call `probe` until it returns `true`, the attempt budget runs out, or
/// `cancel` fires.
pub async fn poll_with_backoff<F, Fut>(
    policy: BackoffPolicy,
    sleeper: &dyn Sleeper,
    cancel: &CancellationToken,
    mut probe: F,
) -> PollOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 0..policy.max_attempts {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled { attempts: attempt };
        }
        if probe(attempt).await {
            return PollOutcome::Ready {
                attempts: attempt + 1,
            };
        }
        if attempt + 1 == policy.max_attempts {
            break;
        }

        let delay = policy.delay_for(attempt);
        debug!(
            attempt = attempt + 1,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Not ready, backing off"
        );
        if !sleeper.sleep(delay, cancel).await {
            return PollOutcome::Cancelled {
                attempts: attempt + 1,
            };
        }
    }
    PollOutcome::Exhausted {
        attempts: policy.max_attempts,
    }
}

/// [`Sleeper`] that records requested delays and returns immediately.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pub delays: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        self.delays.lock().unwrap().push(duration);
        !cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy::new(max_attempts, Duration::from_millis(100))
    }

    #[test]
    fn test_delay_doubles() {
        let policy = policy(5);
        let delays: Vec<_> = (0..4).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800]);
    }

    #[tokio::test]
    async fn test_ready_on_last_attempt_records_backoff_shape() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let outcome = poll_with_backoff(policy(5), &sleeper, &CancellationToken::new(), |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { n == 4 }
        })
        .await;

        assert_eq!(outcome, PollOutcome::Ready { attempts: 5 });
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(
            *sleeper.delays.lock().unwrap(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ]
        );
    }

    #[tokio::test]
    async fn test_exhausted_without_trailing_sleep() {
        let sleeper = RecordingSleeper::default();
        let outcome =
            poll_with_backoff(policy(3), &sleeper, &CancellationToken::new(), |_| async {
                false
            })
            .await;

        assert_eq!(outcome, PollOutcome::Exhausted { attempts: 3 });
        assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_immediate_success_never_sleeps() {
        let sleeper = RecordingSleeper::default();
        let outcome =
            poll_with_backoff(policy(5), &sleeper, &CancellationToken::new(), |_| async {
                true
            })
            .await;
        assert!(outcome.is_ready());
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_stops_polling() {
        let sleeper = RecordingSleeper::default();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let outcome = poll_with_backoff(policy(5), &sleeper, &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            cancel.cancel();
            async { false }
        })
        .await;

        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tokio_sleeper_observes_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!TokioSleeper.sleep(Duration::from_secs(60), &cancel).await);
        assert!(
            TokioSleeper
                .sleep(Duration::from_millis(1), &CancellationToken::new())
                .await
        );
    }
}
