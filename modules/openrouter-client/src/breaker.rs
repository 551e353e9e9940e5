use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    /// The reset period elapsed; the next call is admitted as a probe.
    HalfOpen,
}

/// Sliding-window circuit breaker for the LLM dependency.
///
/// Tracks `(timestamp, is_error)` events over a fixed window. Once at least
/// `min_calls` calls have been recorded and the error rate reaches the
/// threshold, the breaker opens for `reset_after`; the next call after that
/// is admitted half-open, and a success closes the breaker again.
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    error_threshold: f64,
    window: Duration,
    reset_after: Duration,
    min_calls: usize,
}

struct BreakerInner {
    events: VecDeque<(Instant, bool)>,
    open_since: Option<Instant>,
    half_open: bool,
}

impl CircuitBreaker {
    pub fn new(error_threshold: f64, window: Duration, reset_after: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                events: VecDeque::new(),
                open_since: None,
                half_open: false,
            }),
            error_threshold,
            window,
            reset_after,
            min_calls: 10,
        }
    }

    /// Breaker with the production defaults: 10% error rate over a 5-minute
    /// window, 60-second reset.
    pub fn with_defaults() -> Self {
        Self::new(0.10, Duration::from_secs(300), Duration::from_secs(60))
    }

    pub fn state(&self) -> BreakerState {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        match (inner.open_since, inner.half_open) {
            (Some(_), _) => BreakerState::Open,
            (None, true) => BreakerState::HalfOpen,
            (None, false) => BreakerState::Closed,
        }
    }

    /// Whether a call may proceed. Transitions open → half-open after the
    /// reset period.
    pub fn can_call(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.open_since {
            None => true,
            Some(since) => {
                if since.elapsed() >= self.reset_after {
                    inner.open_since = None;
                    inner.half_open = true;
                    info!("LLM circuit breaker half-open, admitting probe call");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a call result and re-evaluate the error rate.
    pub fn record(&self, is_error: bool) {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("breaker lock poisoned");

        if !is_error && inner.half_open {
            inner.half_open = false;
            info!("LLM circuit breaker closed after successful probe");
        }
        if is_error && inner.half_open {
            // Probe failed; reopen immediately.
            inner.half_open = false;
            inner.open_since = Some(now);
            warn!("LLM circuit breaker reopened after failed probe");
        }

        inner.events.push_back((now, is_error));
        while let Some(&(t, _)) = inner.events.front() {
            if now.duration_since(t) > self.window {
                inner.events.pop_front();
            } else {
                break;
            }
        }

        if inner.open_since.is_none() && inner.events.len() >= self.min_calls {
            let errors = inner.events.iter().filter(|(_, e)| *e).count();
            let rate = errors as f64 / inner.events.len() as f64;
            if rate >= self.error_threshold {
                inner.open_since = Some(now);
                warn!(
                    error_rate = format!("{:.1}%", rate * 100.0),
                    calls = inner.events.len(),
                    "LLM circuit breaker opened"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_breaker() -> CircuitBreaker {
        CircuitBreaker::new(0.10, Duration::from_secs(300), Duration::from_millis(10))
    }

    #[test]
    fn stays_closed_below_min_calls() {
        let breaker = fast_breaker();
        for _ in 0..9 {
            breaker.record(true);
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.can_call());
    }

    #[test]
    fn opens_at_threshold_with_enough_calls() {
        let breaker = fast_breaker();
        for _ in 0..9 {
            breaker.record(false);
        }
        breaker.record(true); // 1/10 = 10% >= threshold
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.can_call());
    }

    #[test]
    fn half_open_after_reset_and_closes_on_success() {
        let breaker = fast_breaker();
        for _ in 0..9 {
            breaker.record(false);
        }
        breaker.record(true);
        assert!(!breaker.can_call());

        std::thread::sleep(Duration::from_millis(15));
        assert!(breaker.can_call());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record(false);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn reopens_on_failed_probe() {
        let breaker = fast_breaker();
        for _ in 0..9 {
            breaker.record(false);
        }
        breaker.record(true);
        std::thread::sleep(Duration::from_millis(15));
        assert!(breaker.can_call());

        breaker.record(true);
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.can_call());
    }

    #[test]
    fn low_error_rate_stays_closed() {
        let breaker = fast_breaker();
        for _ in 0..20 {
            breaker.record(false);
        }
        breaker.record(true); // 1/21 < 10%
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
