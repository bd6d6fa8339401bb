use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use docent_core::config::CallPolicyConfig;

/// Outcome taxonomy for a single outbound platform call attempt.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The server asked us to slow down. Carries its wait hint when one was
    /// supplied (Retry-After header or response body).
    #[error("rate limited by platform (hint: {retry_after_secs:?} seconds)")]
    RateLimited { retry_after_secs: Option<u64> },
    /// Network failure or 5xx: worth a bounded number of retries.
    #[error("transient call failure: {0}")]
    Transient(String),
    /// Non-rate-limit client error: retrying cannot help.
    #[error("permanent call failure (status {status}): {message}")]
    Permanent { status: u16, message: String },
    /// 2xx with a body we could not decode. Propagated, never defaulted.
    #[error("malformed response body: {0}")]
    MalformedResponse(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub rate_limit_default: Duration,
    pub rate_limit_buffer: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            rate_limit_default: Duration::from_secs(10),
            rate_limit_buffer: Duration::from_millis(500),
        }
    }
}

impl CallPolicy {
    pub fn from_config(config: &CallPolicyConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            rate_limit_default: Duration::from_secs(config.rate_limit_default_secs),
            rate_limit_buffer: Duration::from_millis(config.rate_limit_buffer_ms),
        }
    }

    fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms =
            (self.base_delay.as_millis() as u64).saturating_mul(multiplier).min(
                self.max_delay.as_millis() as u64,
            );
        Duration::from_millis(delay_ms)
    }

    fn rate_limit_wait(&self, hint_secs: Option<u64>) -> Duration {
        let hinted = hint_secs.map(Duration::from_secs).unwrap_or(self.rate_limit_default);
        hinted + self.rate_limit_buffer
    }
}

/// Wraps every outbound platform request. Rate limiting is expected flow
/// control and never consumes the retry budget; transient failures get a
/// bounded number of backed-off retries; permanent failures and undecodable
/// bodies propagate immediately.
#[derive(Clone, Debug, Default)]
pub struct ResilientCaller {
    policy: CallPolicy,
}

impl ResilientCaller {
    pub fn new(policy: CallPolicy) -> Self {
        Self { policy }
    }

    pub async fn call<T, F, Fut>(
        &self,
        operation_name: &'static str,
        mut operation: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut failed_attempts = 0u32;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(ApiError::RateLimited { retry_after_secs }) => {
                    let wait = self.policy.rate_limit_wait(retry_after_secs);
                    warn!(
                        event_name = "platform.call.rate_limited",
                        operation = operation_name,
                        wait_ms = wait.as_millis() as u64,
                        hinted = retry_after_secs.is_some(),
                        "platform rate limited the call; waiting before the same request"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(error @ ApiError::Permanent { .. })
                | Err(error @ ApiError::MalformedResponse(_)) => return Err(error),
                Err(error) => {
                    if failed_attempts >= self.policy.max_retries {
                        warn!(
                            event_name = "platform.call.retries_exhausted",
                            operation = operation_name,
                            max_retries = self.policy.max_retries,
                            error = %error,
                            "retry budget exhausted; surfacing failure to caller"
                        );
                        return Err(error);
                    }

                    let delay = self.policy.backoff(failed_attempts);
                    failed_attempts += 1;
                    warn!(
                        event_name = "platform.call.transient_failure",
                        operation = operation_name,
                        attempt = failed_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient call failure; backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::{ApiError, CallPolicy, ResilientCaller};

    struct ScriptedCall {
        outcomes: Mutex<VecDeque<Result<u32, ApiError>>>,
        attempts: Mutex<u32>,
    }

    impl ScriptedCall {
        fn new(outcomes: Vec<Result<u32, ApiError>>) -> Self {
            Self { outcomes: Mutex::new(outcomes.into()), attempts: Mutex::new(0) }
        }

        fn next(&self) -> Result<u32, ApiError> {
            *self.attempts.lock().expect("attempts lock") += 1;
            self.outcomes
                .lock()
                .expect("outcomes lock")
                .pop_front()
                .unwrap_or(Err(ApiError::Transient("script exhausted".to_string())))
        }

        fn attempts(&self) -> u32 {
            *self.attempts.lock().expect("attempts lock")
        }
    }

    fn fast_policy(max_retries: u32) -> CallPolicy {
        CallPolicy {
            max_retries,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            rate_limit_default: Duration::from_secs(10),
            rate_limit_buffer: Duration::from_millis(500),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_hint_plus_buffer_before_retrying() {
        let script = ScriptedCall::new(vec![
            Err(ApiError::RateLimited { retry_after_secs: Some(5) }),
            Ok(7),
        ]);
        let caller = ResilientCaller::new(fast_policy(3));

        let started = tokio::time::Instant::now();
        let value = caller.call("create_reply", || async { script.next() }).await.expect("call");

        assert_eq!(value, 7);
        assert_eq!(script.attempts(), 2);
        assert!(started.elapsed() >= Duration::from_millis(5_500));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_without_hint_uses_default_backoff() {
        let script = ScriptedCall::new(vec![
            Err(ApiError::RateLimited { retry_after_secs: None }),
            Ok(1),
        ]);
        let caller = ResilientCaller::new(fast_policy(3));

        let started = tokio::time::Instant::now();
        caller.call("create_reply", || async { script.next() }).await.expect("call");

        assert!(started.elapsed() >= Duration::from_millis(10_500));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_does_not_consume_the_retry_budget() {
        let script = ScriptedCall::new(vec![
            Err(ApiError::RateLimited { retry_after_secs: Some(1) }),
            Err(ApiError::RateLimited { retry_after_secs: Some(1) }),
            Err(ApiError::RateLimited { retry_after_secs: Some(1) }),
            Ok(9),
        ]);
        // Zero transient retries allowed; rate-limit turns must still retry.
        let caller = ResilientCaller::new(fast_policy(0));

        let value = caller.call("fetch_latest_posts", || async { script.next() }).await;
        assert_eq!(value, Ok(9));
        assert_eq!(script.attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_then_surface() {
        let script = ScriptedCall::new(vec![
            Err(ApiError::Transient("503".to_string())),
            Err(ApiError::Transient("503".to_string())),
            Err(ApiError::Transient("503".to_string())),
        ]);
        let caller = ResilientCaller::new(fast_policy(2));

        let result = caller.call("edit_post", || async { script.next() }).await;
        assert_eq!(result, Err(ApiError::Transient("503".to_string())));
        assert_eq!(script.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers_within_budget() {
        let script = ScriptedCall::new(vec![
            Err(ApiError::Transient("connection reset".to_string())),
            Ok(3),
        ]);
        let caller = ResilientCaller::new(fast_policy(3));

        let value = caller.call("fetch_history", || async { script.next() }).await.expect("call");
        assert_eq!(value, 3);
        assert_eq!(script.attempts(), 2);
    }

    #[tokio::test]
    async fn permanent_failure_propagates_without_retry() {
        let script = ScriptedCall::new(vec![Err(ApiError::Permanent {
            status: 403,
            message: "forbidden".to_string(),
        })]);
        let caller = ResilientCaller::new(fast_policy(3));

        let result = caller.call("create_reply", || async { script.next() }).await;
        assert!(matches!(result, Err(ApiError::Permanent { status: 403, .. })));
        assert_eq!(script.attempts(), 1);
    }

    #[tokio::test]
    async fn malformed_body_propagates_without_retry() {
        let script = ScriptedCall::new(vec![Err(ApiError::MalformedResponse(
            "missing field `id`".to_string(),
        ))]);
        let caller = ResilientCaller::new(fast_policy(3));

        let result = caller.call("create_reply", || async { script.next() }).await;
        assert!(matches!(result, Err(ApiError::MalformedResponse(_))));
        assert_eq!(script.attempts(), 1);
    }

    #[test]
    fn backoff_grows_and_clamps() {
        let policy = fast_policy(5);
        assert_eq!(policy.backoff(0), Duration::from_millis(10));
        assert_eq!(policy.backoff(1), Duration::from_millis(20));
        assert_eq!(policy.backoff(2), Duration::from_millis(40));
        assert_eq!(policy.backoff(20), Duration::from_millis(100));
    }
}
