//! Bounded retry and a circuit breaker for embedding calls.
//!
//! [`ResilientEmbedder`] wraps any [`Embedder`]. Transient failures are
//! retried with exponential backoff; after `failure_threshold` consecutive
//! failed calls the circuit opens and every call fails fast with
//! [`EmbeddingError::CircuitOpen`] until `cool_down` elapses, at which point
//! one trial call is let through. The engine treats any embedding error as
//! a signal to skip semantic search, so an open circuit degrades requests
//! to the tag path instead of stalling them.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cafe_core::{EmbeddingError, EmbeddingTask, Embedder};
use log::{info, warn};

/// Retry schedule for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Factor applied to the delay after each retry.
    pub multiplier: u32,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            multiplier: 2,
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            multiplier: 1,
            max_backoff: Duration::ZERO,
        }
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        current
            .checked_mul(self.multiplier)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_started_at: Option<Instant>,
}

/// Consecutive-failure circuit breaker.
///
/// Once open, calls fail fast until `cool_down` has elapsed. The circuit is
/// then half-open: exactly one trial call is admitted and everything else
/// keeps failing fast until that trial reports back. A trial that never
/// reports back is abandoned after another `cool_down`.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cool_down: Duration,
    state: Mutex<BreakerState>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}

impl CircuitBreaker {
    /// Open after `failure_threshold` consecutive failures and stay open
    /// for `cool_down`.
    #[must_use]
    pub fn new(failure_threshold: u32, cool_down: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cool_down,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Whether calls are currently short-circuited.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.lock().is_ok_and(|state| self.rejects(&state))
    }

    fn rejects(&self, state: &BreakerState) -> bool {
        let within = |since: Option<Instant>| since.is_some_and(|at| at.elapsed() < self.cool_down);
        state.opened_at.is_some() && (within(state.opened_at) || within(state.trial_started_at))
    }

    fn admit(&self) -> Result<(), EmbeddingError> {
        let Ok(mut state) = self.state.lock() else {
            return Ok(());
        };
        if state.opened_at.is_none() {
            return Ok(());
        }
        if self.rejects(&state) {
            return Err(EmbeddingError::CircuitOpen);
        }
        info!("embedding circuit half-open; admitting one trial call");
        state.trial_started_at = Some(Instant::now());
        Ok(())
    }

    fn record_success(&self) {
        if let Ok(mut state) = self.state.lock() {
            if state.opened_at.is_some() {
                info!("embedding circuit closed after a successful trial call");
            }
            *state = BreakerState::default();
        }
    }

    fn record_failure(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            if state.consecutive_failures >= self.failure_threshold {
                if state.opened_at.is_none() {
                    warn!(
                        "embedding circuit opened after {} consecutive failures",
                        state.consecutive_failures
                    );
                }
                state.opened_at = Some(Instant::now());
            }
            state.trial_started_at = None;
        }
    }
}

/// [`Embedder`] decorator adding retry and a circuit breaker.
#[derive(Debug)]
pub struct ResilientEmbedder<E> {
    inner: E,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl<E> ResilientEmbedder<E> {
    /// Wrap `inner` with the default policy and breaker.
    #[must_use]
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            retry: RetryPolicy::default(),
            breaker: CircuitBreaker::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the circuit breaker.
    #[must_use]
    pub fn with_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    /// The circuit breaker guarding `inner`.
    #[must_use]
    pub const fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

#[async_trait]
impl<E: Embedder> Embedder for ResilientEmbedder<E> {
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>, EmbeddingError> {
        self.breaker.admit()?;
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 1;
        loop {
            match self.inner.embed(text, task).await {
                Ok(vector) => {
                    self.breaker.record_success();
                    return Ok(vector);
                }
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    warn!("embedding attempt {attempt} failed, retrying in {backoff:?}: {err}");
                    tokio::time::sleep(backoff).await;
                    backoff = self.retry.next_backoff(backoff);
                    attempt += 1;
                }
                Err(err) => {
                    self.breaker.record_failure();
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use rstest::rstest;

    /// Fails `failures` times with `error`, then succeeds.
    struct Flaky {
        failures: u32,
        error: EmbeddingError,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, error: EmbeddingError) -> Self {
            Self {
                failures,
                error,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for Flaky {
        async fn embed(&self, _text: &str, _task: EmbeddingTask) -> Result<Vec<f32>, EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(vec![1.0])
            }
        }
    }

    fn transport() -> EmbeddingError {
        EmbeddingError::Transport {
            url: "http://embed.test".into(),
            message: "connection reset".into(),
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::ZERO,
            multiplier: 2,
            max_backoff: Duration::ZERO,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn retries_transient_failures() {
        let embedder = ResilientEmbedder::new(Flaky::new(2, transport())).with_retry(fast_retry(3));
        let vector = embedder
            .embed("quiet", EmbeddingTask::Query)
            .await
            .expect("third attempt succeeds");
        assert_eq!(vector, vec![1.0]);
        assert_eq!(embedder.inner.calls(), 3);
    }

    #[rstest]
    #[tokio::test]
    async fn does_not_retry_permanent_failures() {
        let permanent = EmbeddingError::Dimensions {
            expected: 1536,
            found: 3,
        };
        let embedder =
            ResilientEmbedder::new(Flaky::new(1, permanent.clone())).with_retry(fast_retry(3));
        let err = embedder
            .embed("quiet", EmbeddingTask::Query)
            .await
            .expect_err("permanent failure");
        assert_eq!(err, permanent);
        assert_eq!(embedder.inner.calls(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn open_circuit_short_circuits_calls() {
        let embedder = ResilientEmbedder::new(Flaky::new(u32::MAX, transport()))
            .with_retry(RetryPolicy::none())
            .with_breaker(CircuitBreaker::new(2, Duration::from_secs(60)));
        for _ in 0..2 {
            let _ = embedder.embed("quiet", EmbeddingTask::Query).await;
        }
        assert!(embedder.breaker().is_open());
        let err = embedder
            .embed("quiet", EmbeddingTask::Query)
            .await
            .expect_err("circuit is open");
        assert_eq!(err, EmbeddingError::CircuitOpen);
        assert_eq!(embedder.inner.calls(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn trial_call_after_cool_down_closes_circuit() {
        let embedder = ResilientEmbedder::new(Flaky::new(2, transport()))
            .with_retry(RetryPolicy::none())
            .with_breaker(CircuitBreaker::new(2, Duration::ZERO));
        for _ in 0..2 {
            let _ = embedder.embed("quiet", EmbeddingTask::Query).await;
        }
        embedder
            .embed("quiet", EmbeddingTask::Query)
            .await
            .expect("trial call succeeds");
        assert!(!embedder.breaker().is_open());
    }

    #[rstest]
    fn half_open_circuit_admits_a_single_trial() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(200));
        breaker.record_failure();
        assert_eq!(breaker.admit(), Err(EmbeddingError::CircuitOpen));
        std::thread::sleep(Duration::from_millis(250));

        assert_eq!(breaker.admit(), Ok(()));
        assert_eq!(breaker.admit(), Err(EmbeddingError::CircuitOpen));
        assert!(breaker.is_open());

        breaker.record_success();
        assert_eq!(breaker.admit(), Ok(()));
        assert_eq!(breaker.admit(), Ok(()));
    }

    #[rstest]
    fn failed_trial_reopens_the_circuit() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(200));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(breaker.admit(), Ok(()));

        breaker.record_failure();
        assert!(breaker.is_open());
        assert_eq!(breaker.admit(), Err(EmbeddingError::CircuitOpen));
    }

    #[rstest]
    fn backoff_grows_to_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            multiplier: 2,
            max_backoff: Duration::from_millis(500),
        };
        let second = policy.next_backoff(policy.initial_backoff);
        assert_eq!(second, Duration::from_millis(400));
        assert_eq!(policy.next_backoff(second), Duration::from_millis(500));
    }
}
