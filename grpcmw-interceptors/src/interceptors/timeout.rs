//! Deadline for the rest of the chain

use async_trait::async_trait;
use grpcmw_core::{
    Message, Status, StreamCall, StreamInterceptor, StreamNext, UnaryCall, UnaryInterceptor,
    UnaryNext,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;

use crate::stats::{InterceptorStats, Outcome};

/// Interceptor failing calls whose downstream work outlasts a deadline
///
/// Dropping the downstream future cancels it, so the handler stops at its
/// next suspension point.
pub struct TimeoutInterceptor {
    name: String,
    stats: Arc<RwLock<InterceptorStats>>,
    duration: Duration,
}

impl TimeoutInterceptor {
    /// Create a timeout interceptor with the given deadline
    pub fn new(duration: Duration) -> Self {
        Self {
            name: "TimeoutInterceptor".to_string(),
            stats: Arc::new(RwLock::new(InterceptorStats::default())),
            duration,
        }
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[allow(missing_docs)]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Snapshot of the interceptor's counters
    pub async fn stats(&self) -> InterceptorStats {
        self.stats.read().await.clone()
    }

    async fn bounded<T, F>(&self, method: String, downstream: F) -> Result<T, Status>
    where
        F: Future<Output = Result<T, Status>> + Send,
    {
        let started = Instant::now();
        match tokio::time::timeout(self.duration, downstream).await {
            Ok(result) => {
                self.stats.write().await.record(started, Outcome::Passed);
                result
            }
            Err(_) => {
                self.stats.write().await.record(started, Outcome::Blocked);
                warn!(
                    "[{}] Call to '{}' exceeded {:?}",
                    self.name, method, self.duration
                );
                Err(Status::deadline_exceeded(format!(
                    "Call to '{}' exceeded {:?}",
                    method, self.duration
                )))
            }
        }
    }
}

#[async_trait]
impl UnaryInterceptor for TimeoutInterceptor {
    async fn intercept(&self, call: UnaryCall, next: UnaryNext) -> Result<Message, Status> {
        let method = call.method().to_string();
        self.bounded(method, next.run(call)).await
    }
}

#[async_trait]
impl StreamInterceptor for TimeoutInterceptor {
    async fn intercept(&self, call: StreamCall, next: StreamNext) -> Result<(), Status> {
        let method = call.method().to_string();
        self.bounded(method, next.run(call)).await
    }
}
