//! Rate limiting interceptor that prevents call flooding

use async_trait::async_trait;
use grpcmw_core::{
    Message, Status, StreamCall, StreamInterceptor, StreamNext, UnaryCall, UnaryInterceptor,
    UnaryNext,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::warn;

use crate::stats::{InterceptorStats, Outcome};

/// Rate limiter using a sliding window algorithm
struct RateLimiter {
    /// Max calls per window
    max_requests: usize,
    window: Duration,
    /// Call timestamps per method
    request_history: HashMap<String, Vec<Instant>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            request_history: HashMap::new(),
        }
    }

    /// Record the call if it fits in the window; returns whether it was allowed
    /// and how many calls the window now holds.
    fn check_and_record(&mut self, method: &str) -> (bool, usize) {
        let now = Instant::now();
        let window = self.window;

        // Drop expired timestamps everywhere, and methods left with none
        self.request_history.retain(|_, history| {
            history.retain(|&timestamp| now.duration_since(timestamp) < window);
            !history.is_empty()
        });

        let history = self.request_history.entry(method.to_string()).or_default();

        if history.len() < self.max_requests {
            history.push(now);
            (true, history.len())
        } else {
            (false, history.len())
        }
    }
}

/// Interceptor that limits calls per method within a sliding window
pub struct RateLimitInterceptor {
    name: String,
    stats: Arc<RwLock<InterceptorStats>>,
    limiter: Arc<RwLock<RateLimiter>>,
}

impl RateLimitInterceptor {
    /// Create a new rate limit interceptor
    ///
    /// # Arguments
    /// * `max_requests` - Maximum calls allowed per window, per method
    /// * `window` - Window duration
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            name: "RateLimitInterceptor".to_string(),
            stats: Arc::new(RwLock::new(InterceptorStats::default())),
            limiter: Arc::new(RwLock::new(RateLimiter::new(max_requests, window))),
        }
    }

    /// Create a permissive rate limiter (100 req/min)
    pub fn permissive() -> Self {
        Self::new(100, Duration::from_secs(60))
    }

    /// Create a moderate rate limiter (30 req/min)
    pub fn moderate() -> Self {
        Self::new(30, Duration::from_secs(60))
    }

    /// Create a strict rate limiter (10 req/min)
    pub fn strict() -> Self {
        Self::new(10, Duration::from_secs(60))
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the interceptor's counters
    pub async fn stats(&self) -> InterceptorStats {
        self.stats.read().await.clone()
    }

    async fn admit(&self, method: &str) -> Result<(), Status> {
        let started = std::time::Instant::now();

        let (allowed, current_rate) = self.limiter.write().await.check_and_record(method);

        let outcome = if allowed {
            Outcome::Passed
        } else {
            Outcome::Blocked
        };
        self.stats.write().await.record(started, outcome);

        if allowed {
            Ok(())
        } else {
            warn!(
                "[{}] Rate limit exceeded for method '{}' (current rate: {}/window)",
                self.name, method, current_rate
            );
            Err(Status::resource_exhausted(format!(
                "Rate limit exceeded for method '{}' ({}/window)",
                method, current_rate
            )))
        }
    }
}

#[async_trait]
impl UnaryInterceptor for RateLimitInterceptor {
    async fn intercept(&self, call: UnaryCall, next: UnaryNext) -> Result<Message, Status> {
        self.admit(&call.info.method).await?;
        next.run(call).await
    }
}

#[async_trait]
impl StreamInterceptor for RateLimitInterceptor {
    async fn intercept(&self, call: StreamCall, next: StreamNext) -> Result<(), Status> {
        self.admit(&call.info.method).await?;
        next.run(call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grpcmw_core::{unary_handler_fn, Code};
    use serde_json::json;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_rate_limiter_allows_under_limit() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(1));

        // Should allow first 5 requests
        for _ in 0..5 {
            assert!(limiter.check_and_record("/pkg.Svc/Method").0);
        }

        // 6th request should be blocked
        assert_eq!(limiter.check_and_record("/pkg.Svc/Method"), (false, 5));
    }

    #[tokio::test]
    async fn test_rate_limiter_sliding_window() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(200));

        assert!(limiter.check_and_record("/pkg.Svc/Method").0);
        assert!(limiter.check_and_record("/pkg.Svc/Method").0);
        assert!(!limiter.check_and_record("/pkg.Svc/Method").0);

        // Wait for window to slide
        sleep(Duration::from_millis(250)).await;

        assert!(limiter.check_and_record("/pkg.Svc/Method").0);
    }

    #[tokio::test]
    async fn test_rate_limiter_per_method() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(1));

        assert!(limiter.check_and_record("/pkg.Svc/A").0);
        assert!(limiter.check_and_record("/pkg.Svc/A").0);
        assert!(!limiter.check_and_record("/pkg.Svc/A").0);

        // Other methods keep their own quota
        assert!(limiter.check_and_record("/pkg.Svc/B").0);
        assert!(limiter.check_and_record("/pkg.Svc/B").0);
        assert!(!limiter.check_and_record("/pkg.Svc/B").0);
    }

    #[tokio::test]
    async fn test_rate_limiter_forgets_idle_methods() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(100));

        for method in ["/pkg.Svc/A", "/pkg.Svc/B", "/pkg.Svc/C"] {
            assert!(limiter.check_and_record(method).0);
        }
        assert_eq!(limiter.request_history.len(), 3);

        sleep(Duration::from_millis(150)).await;

        assert!(limiter.check_and_record("/pkg.Svc/D").0);
        assert_eq!(limiter.request_history.len(), 1);
        assert!(limiter.request_history.contains_key("/pkg.Svc/D"));
    }

    #[tokio::test]
    async fn test_rate_limit_interceptor() {
        let interceptor = RateLimitInterceptor::new(3, Duration::from_secs(1));
        let echo = unary_handler_fn(|call: UnaryCall| async move { Ok::<_, Status>(call.request) });

        for i in 0..3 {
            let result = UnaryInterceptor::intercept(
                &interceptor,
                UnaryCall::new("/pkg.Svc/Method", json!(i)),
                UnaryNext::new(echo.clone()),
            )
            .await;
            assert!(result.is_ok(), "Request {} should not be blocked", i);
        }

        let err = UnaryInterceptor::intercept(
            &interceptor,
            UnaryCall::new("/pkg.Svc/Method", json!(4)),
            UnaryNext::new(echo),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), Code::ResourceExhausted);

        let stats = interceptor.stats().await;
        assert_eq!(stats.total_intercepted, 4);
        assert_eq!(stats.total_blocked, 1);
    }

    #[tokio::test]
    async fn test_rate_limit_presets() {
        let permissive = RateLimitInterceptor::permissive();
        let moderate = RateLimitInterceptor::moderate();
        let strict = RateLimitInterceptor::strict();

        assert_eq!(permissive.name(), "RateLimitInterceptor");
        assert_eq!(moderate.limiter.read().await.max_requests, 30);
        assert_eq!(strict.limiter.read().await.max_requests, 10);
    }
}
