//! Bounded-retry wrapper around a single evaluator call.
//!
//! [`ResilientInvoker`] retries every failure up to [`RetryPolicy::max_attempts`]
//! times, sleeping a jittered delay between attempts, and surfaces the last
//! error when the attempts run out. The whole call, sleeps included, is capped
//! by [`RetryPolicy::max_total_ms`].

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::evaluator::{EvaluationRequest, Evaluator, EvaluatorError};

/// Retry behaviour for evaluator calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per call, the first one included.
    pub max_attempts: u32,
    /// Fixed part of the delay between attempts.
    pub base_delay_ms: u64,
    /// Upper bound of the random part added to `base_delay_ms`.
    pub jitter_ms: u64,
    /// Wall-clock cap for one invocation including all retries.
    pub max_total_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            jitter_ms: 2000,
            max_total_ms: 600_000,
        }
    }
}

impl RetryPolicy {
    /// A policy with no sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            jitter_ms: 0,
            ..Self::default()
        }
    }

    /// Effective attempt count; zero is treated as a single attempt.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before the next attempt: `base_delay_ms + uniform(0..=jitter_ms)`.
    ///
    /// The delay does not grow with the attempt number.
    pub fn backoff_delay(&self) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        };
        Duration::from_millis(self.base_delay_ms.saturating_add(jitter))
    }
}

/// Book-keeping for one attempt within a single invocation. Never persisted.
#[derive(Debug)]
pub struct RetryAttempt {
    pub attempt_number: u32,
    pub last_error: Option<EvaluatorError>,
}

impl RetryAttempt {
    fn first() -> Self {
        Self {
            attempt_number: 1,
            last_error: None,
        }
    }

    fn next(self, error: EvaluatorError) -> Self {
        Self {
            attempt_number: self.attempt_number + 1,
            last_error: Some(error),
        }
    }
}

/// Wraps an [`Evaluator`] with the retry policy. Holds no state between calls.
pub struct ResilientInvoker<E> {
    evaluator: E,
    policy: RetryPolicy,
}

impl<E: Evaluator> ResilientInvoker<E> {
    pub fn new(evaluator: E, policy: RetryPolicy) -> Self {
        Self { evaluator, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Run `request` until it succeeds, the attempts run out, or the
    /// wall-clock cap elapses.
    pub async fn invoke(&self, request: &EvaluationRequest) -> Result<String, EvaluatorError> {
        let started = Instant::now();
        let budget = Duration::from_millis(self.policy.max_total_ms);
        match timeout(budget, self.invoke_with_retries(request)).await {
            Ok(result) => result,
            Err(_) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                error!(
                    kind = request.kind(),
                    elapsed_ms, "evaluator call abandoned after wall-clock cap"
                );
                Err(EvaluatorError::Timeout { elapsed_ms })
            }
        }
    }

    async fn invoke_with_retries(
        &self,
        request: &EvaluationRequest,
    ) -> Result<String, EvaluatorError> {
        let max_attempts = self.policy.attempts();
        let mut attempt = RetryAttempt::first();

        loop {
            debug!(
                kind = request.kind(),
                attempt = attempt.attempt_number,
                max_attempts,
                "calling evaluator"
            );
            match self.evaluator.evaluate(request).await {
                Ok(feedback) => {
                    if let Some(previous) = &attempt.last_error {
                        info!(
                            kind = request.kind(),
                            attempt = attempt.attempt_number,
                            previous_error = %previous,
                            "evaluator call recovered"
                        );
                    }
                    return Ok(feedback);
                }
                Err(err) => {
                    if attempt.attempt_number >= max_attempts {
                        error!(
                            kind = request.kind(),
                            attempts = attempt.attempt_number,
                            error = %err,
                            "evaluator call failed, retries exhausted"
                        );
                        return Err(err);
                    }
                    let delay = self.policy.backoff_delay();
                    warn!(
                        kind = request.kind(),
                        attempt = attempt.attempt_number,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "evaluator call failed, retrying"
                    );
                    attempt = attempt.next(err);
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then answers with `feedback`.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Evaluator for Flaky {
        async fn evaluate(&self, _request: &EvaluationRequest) -> Result<String, EvaluatorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(EvaluatorError::Status {
                    status: 500,
                    message: format!("failure {n}"),
                })
            } else {
                Ok("Final Grade: A".into())
            }
        }
    }

    struct Slow;

    impl Evaluator for Slow {
        async fn evaluate(&self, _request: &EvaluationRequest) -> Result<String, EvaluatorError> {
            sleep(Duration::from_millis(200)).await;
            Ok("late".into())
        }
    }

    fn request() -> EvaluationRequest {
        EvaluationRequest::Initial {
            document: "doc-1".into(),
            criteria: "be fair".into(),
        }
    }

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.jitter_ms, 2000);
    }

    #[test]
    fn backoff_delay_is_bounded_and_flat() {
        let policy = RetryPolicy::default();
        for _ in 0..200 {
            let delay = policy.backoff_delay();
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(3000));
        }
        assert_eq!(
            RetryPolicy::immediate(3).backoff_delay(),
            Duration::from_millis(0)
        );
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(RetryPolicy::immediate(0).attempts(), 1);
    }

    #[tokio::test]
    async fn deterministic_failure_makes_exactly_max_attempts() {
        let flaky = Arc::new(Flaky::new(u32::MAX));
        let invoker = ResilientInvoker::new(flaky.clone(), RetryPolicy::immediate(5));

        let err = invoker.invoke(&request()).await.unwrap_err();
        assert_eq!(flaky.calls(), 5);
        // The last observed error is surfaced, not an aggregate.
        assert_eq!(err.to_string(), "evaluator returned status 500: failure 5");
    }

    #[tokio::test]
    async fn success_on_attempt_k_makes_k_attempts() {
        for k in 1..=5 {
            let flaky = Arc::new(Flaky::new(k - 1));
            let invoker = ResilientInvoker::new(flaky.clone(), RetryPolicy::immediate(5));
            let feedback = invoker.invoke(&request()).await.unwrap();
            assert_eq!(feedback, "Final Grade: A");
            assert_eq!(flaky.calls(), k);
        }
    }

    #[tokio::test]
    async fn wall_clock_cap_yields_timeout() {
        let policy = RetryPolicy {
            max_total_ms: 20,
            ..RetryPolicy::immediate(5)
        };
        let invoker = ResilientInvoker::new(Slow, policy);
        let err = invoker.invoke(&request()).await.unwrap_err();
        assert!(matches!(err, EvaluatorError::Timeout { .. }));
    }
}
