//! Per-operation circuit breaker (§4.8): opens after a run of consecutive
//! failures and allows one half-open probe after a cooldown, independent
//! per provider-operation key so one flaky ASR vendor never trips the LLM
//! circuit.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Breaker {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl Breaker {
    fn new() -> Self {
        Self {
            state: State::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }
}

pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_after: Duration,
    breakers: Mutex<HashMap<String, Breaker>>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_after: Duration) -> Self {
        Self {
            failure_threshold,
            reset_after,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `op` under the named operation's breaker, short-circuiting with
    /// `ProviderError::CircuitOpen` while it's open and not yet eligible for
    /// a half-open probe.
    pub async fn call<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        {
            let mut breakers = self.breakers.lock().await;
            let breaker = breakers.entry(operation.to_string()).or_insert_with(Breaker::new);
            if breaker.state == State::Open {
                let elapsed = breaker.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.reset_after {
                    breaker.state = State::HalfOpen;
                } else {
                    return Err(ProviderError::CircuitOpen {
                        operation: operation.to_string(),
                    });
                }
            }
        }

        let result = op().await;

        let mut breakers = self.breakers.lock().await;
        let breaker = breakers.entry(operation.to_string()).or_insert_with(Breaker::new);
        match &result {
            Ok(_) => {
                breaker.state = State::Closed;
                breaker.consecutive_failures = 0;
                breaker.opened_at = None;
            }
            Err(_) => {
                breaker.consecutive_failures += 1;
                if breaker.state == State::HalfOpen || breaker.consecutive_failures >= self.failure_threshold {
                    breaker.state = State::Open;
                    breaker.opened_at = Some(Instant::now());
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(30));
        for _ in 0..2 {
            let _: Result<(), _> = breaker
                .call("op", || async { Err(ProviderError::RetryableTransient("x".into())) })
                .await;
        }
        let result: Result<(), _> = breaker.call("op", || async { Ok(()) }).await;
        assert!(matches!(result, Err(ProviderError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(30));
        let _: Result<(), _> = breaker
            .call("op", || async { Err(ProviderError::RetryableTransient("x".into())) })
            .await;
        let _: Result<(), _> = breaker.call("op", || async { Ok(()) }).await;
        let result: Result<(), _> = breaker
            .call("op", || async { Err(ProviderError::RetryableTransient("x".into())) })
            .await;
        assert!(result.is_err());
        assert!(!matches!(result, Err(ProviderError::CircuitOpen { .. })));
    }
}
