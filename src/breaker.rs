use crate::config::BreakerDefaults;
use crate::types::ProtocolError;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Persists breaker state across process restarts. Implementations are
/// expected to be best-effort: a failed `load_*` is treated as "no prior
/// state" (the breaker starts `Closed`), and a failed `save_*` is logged
/// but never affects the calling request.
pub trait BreakerPersistence: Send + Sync {
    fn load_state(&self, key: &str) -> Option<BreakerState>;
    fn save_state(&self, key: &str, state: BreakerState);
    fn load_statistics(&self, key: &str) -> Option<BreakerStatistics>;
    fn save_statistics(&self, key: &str, stats: BreakerStatistics);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BreakerStatistics {
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

struct Inner {
    state: BreakerState,
    stats: BreakerStatistics,
    opened_at: Option<Instant>,
}

/// A single circuit breaker guarding calls keyed by `name` (typically
/// `host:port`). One mutex serializes all state transitions; listener
/// callbacks run after the lock is released so they can't deadlock against
/// a caller that re-enters `execute`.
pub struct CircuitBreaker {
    name: String,
    defaults: BreakerDefaults,
    inner: Mutex<Inner>,
    persistence: Option<Box<dyn BreakerPersistence>>,
    listener: Option<Box<dyn Fn(&str, BreakerState, BreakerState) + Send + Sync>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, defaults: BreakerDefaults) -> Self {
        let name = name.into();
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                stats: BreakerStatistics::default(),
                opened_at: None,
            }),
            name,
            defaults,
            persistence: None,
            listener: None,
        }
    }

    pub fn with_persistence(mut self, persistence: Box<dyn BreakerPersistence>) -> Self {
        if let Some(state) = persistence.load_state(&self.name) {
            self.inner.get_mut().unwrap().state = state;
        }
        if let Some(stats) = persistence.load_statistics(&self.name) {
            self.inner.get_mut().unwrap().stats = stats;
        }
        self.persistence = Some(persistence);
        self
    }

    pub fn with_listener(
        mut self,
        listener: impl Fn(&str, BreakerState, BreakerState) + Send + Sync + 'static,
    ) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    pub fn force_open(&self) {
        self.transition(BreakerState::Open);
    }

    pub fn force_half_open(&self) {
        self.transition(BreakerState::HalfOpen);
    }

    pub fn reset(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.stats = BreakerStatistics::default();
        }
        self.transition(BreakerState::Closed);
    }

    /// Runs `f` if the breaker allows it, otherwise rejects locally with
    /// `CircuitBreakerOpen` without attempting the call. An `Ok` result is
    /// always recorded as a success; use [`Self::execute_with`] when a
    /// successful value can still represent a failed call (e.g. a response
    /// carrying a 5xx status).
    pub async fn execute<F, T>(&self, f: F) -> Result<T, ProtocolError>
    where
        F: Future<Output = Result<T, ProtocolError>>,
    {
        self.execute_with(f, |_| false).await
    }

    /// Like [`Self::execute`], but `is_application_failure` is consulted on
    /// `Ok` values so a successful call can still be recorded as a failure.
    pub async fn execute_with<F, T>(
        &self,
        f: F,
        is_application_failure: impl FnOnce(&T) -> bool,
    ) -> Result<T, ProtocolError>
    where
        F: Future<Output = Result<T, ProtocolError>>,
    {
        if !self.allow_request() {
            return Err(ProtocolError::CircuitBreakerOpen(self.name.clone()));
        }

        match f.await {
            Ok(value) => {
                if is_application_failure(&value) {
                    self.record_failure();
                } else {
                    self.record_success();
                }
                Ok(value)
            }
            Err(err) => {
                if Self::counts_as_failure(&err) {
                    self.record_failure();
                } else {
                    self.record_success();
                }
                Err(err)
            }
        }
    }

    /// Timeouts and connection-scoped errors count as failures; anything
    /// else (including ordinary 4xx application responses) counts as a
    /// success by default, since those don't indicate the remote is down.
    fn counts_as_failure(err: &ProtocolError) -> bool {
        matches!(
            err,
            ProtocolError::Timeout
                | ProtocolError::ConnectionFailed(_)
                | ProtocolError::H2ConnectionError(_)
        )
    }

    fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.defaults.open_duration {
                    inner.state = BreakerState::HalfOpen;
                    debug!(breaker = %self.name, "open duration elapsed, probing half-open");
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        let transition = {
            let mut inner = self.inner.lock().unwrap();
            inner.stats.consecutive_failures = 0;
            inner.stats.consecutive_successes += 1;

            if inner.state == BreakerState::HalfOpen
                && inner.stats.consecutive_successes >= self.defaults.success_threshold
            {
                let from = inner.state;
                inner.state = BreakerState::Closed;
                inner.opened_at = None;
                Some((from, BreakerState::Closed))
            } else {
                None
            }
        };
        self.persist();
        if let Some((from, to)) = transition {
            info!(breaker = %self.name, "recovered, closing circuit");
            self.notify(from, to);
        }
    }

    fn record_failure(&self) {
        let transition = {
            let mut inner = self.inner.lock().unwrap();
            inner.stats.consecutive_successes = 0;
            inner.stats.consecutive_failures += 1;

            let should_open = match inner.state {
                BreakerState::Closed => {
                    inner.stats.consecutive_failures >= self.defaults.failure_threshold
                }
                BreakerState::HalfOpen => true,
                BreakerState::Open => false,
            };

            if should_open && inner.state != BreakerState::Open {
                let from = inner.state;
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                Some((from, BreakerState::Open))
            } else {
                None
            }
        };
        self.persist();
        if let Some((from, to)) = transition {
            warn!(breaker = %self.name, "tripping circuit open");
            self.notify(from, to);
        }
    }

    fn transition(&self, to: BreakerState) {
        let from = {
            let mut inner = self.inner.lock().unwrap();
            let from = inner.state;
            inner.state = to;
            inner.opened_at = if to == BreakerState::Open {
                Some(Instant::now())
            } else {
                None
            };
            from
        };
        self.persist();
        self.notify(from, to);
    }

    fn persist(&self) {
        if let Some(persistence) = &self.persistence {
            let (state, stats) = {
                let inner = self.inner.lock().unwrap();
                (inner.state, inner.stats)
            };
            persistence.save_state(&self.name, state);
            persistence.save_statistics(&self.name, stats);
        }
    }

    fn notify(&self, from: BreakerState, to: BreakerState) {
        if from != to {
            if let Some(listener) = &self.listener {
                listener(&self.name, from, to);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> BreakerDefaults {
        BreakerDefaults {
            failure_threshold: 2,
            success_threshold: 1,
            open_duration: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let breaker = CircuitBreaker::new("test", defaults());
        for _ in 0..2 {
            let _ = breaker
                .execute(async { Err::<(), _>(ProtocolError::Timeout) })
                .await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn rejects_locally_while_open() {
        let breaker = CircuitBreaker::new("test", defaults());
        breaker.force_open();
        let result = breaker.execute(async { Ok::<_, ProtocolError>(()) }).await;
        assert!(matches!(result, Err(ProtocolError::CircuitBreakerOpen(_))));
    }

    #[tokio::test]
    async fn non_connection_errors_do_not_trip_the_breaker() {
        let breaker = CircuitBreaker::new("test", defaults());
        for _ in 0..5 {
            let _ = breaker
                .execute(async { Err::<(), _>(ProtocolError::RequestFailed("4xx".into())) })
                .await;
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn execute_with_trips_on_classified_ok_values() {
        let breaker = CircuitBreaker::new("test", defaults());
        for _ in 0..2 {
            let _ = breaker
                .execute_with(async { Ok::<_, ProtocolError>(500u16) }, |status| *status >= 500)
                .await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn execute_with_treats_unclassified_ok_as_success() {
        let breaker = CircuitBreaker::new("test", defaults());
        for _ in 0..5 {
            let _ = breaker
                .execute_with(async { Ok::<_, ProtocolError>(200u16) }, |status| *status >= 500)
                .await;
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
