//! Logging interceptor that records every call for debugging

use async_trait::async_trait;
use grpcmw_core::{
    Message, MessageStream, Status, StreamCall, StreamInterceptor, StreamNext, UnaryCall,
    UnaryInterceptor, UnaryNext,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};

use crate::stats::{InterceptorStats, Outcome};

/// Interceptor that logs calls entering and leaving a scope
pub struct LoggingInterceptor {
    name: String,
    label: String,
    stats: Arc<RwLock<InterceptorStats>>,
    /// Whether to log payloads (can be verbose)
    log_content: bool,
}

impl LoggingInterceptor {
    /// Create a new logging interceptor
    pub fn new(log_content: bool) -> Self {
        Self {
            name: "LoggingInterceptor".to_string(),
            label: "grpcmw".to_string(),
            stats: Arc::new(RwLock::new(InterceptorStats::default())),
            log_content,
        }
    }

    /// Prefix log lines with `label` instead of the default
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[allow(missing_docs)]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Snapshot of the interceptor's counters
    pub async fn stats(&self) -> InterceptorStats {
        self.stats.read().await.clone()
    }

    fn log_result<T>(&self, method: &str, result: &Result<T, Status>, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(_) => debug!(
                "[{}] {} completed in {:.2}ms",
                self.label, method, elapsed_ms
            ),
            Err(status) => warn!(
                "[{}] {} failed in {:.2}ms: {}",
                self.label, method, elapsed_ms, status
            ),
        }
    }
}

#[async_trait]
impl UnaryInterceptor for LoggingInterceptor {
    async fn intercept(&self, call: UnaryCall, next: UnaryNext) -> Result<Message, Status> {
        let started = Instant::now();
        let method = call.method().to_string();

        if self.log_content {
            info!(
                "[{}] {} - {} (id: {}) request: {}",
                self.label, call.info.direction, method, call.info.id, call.request
            );
        } else {
            debug!(
                "[{}] {} - {} (id: {})",
                self.label, call.info.direction, method, call.info.id
            );
        }

        let result = next.run(call).await;

        if self.log_content {
            if let Ok(response) = &result {
                info!("[{}] {} response: {}", self.label, method, response);
            }
        }
        self.log_result(&method, &result, started);

        self.stats.write().await.record(started, Outcome::Passed);
        result
    }
}

#[async_trait]
impl StreamInterceptor for LoggingInterceptor {
    async fn intercept(&self, call: StreamCall, next: StreamNext) -> Result<(), Status> {
        let started = Instant::now();
        let method = call.method().to_string();

        debug!(
            "[{}] {} - {} stream opened (id: {})",
            self.label, call.info.direction, method, call.info.id
        );

        let label = self.label.clone();
        let log_content = self.log_content;
        let traced_method = method.clone();
        let call = call.map_stream(move |inner| {
            Box::new(LoggedStream {
                inner,
                label,
                method: traced_method,
                log_content,
            }) as Box<dyn MessageStream>
        });

        let result = next.run(call).await;
        self.log_result(&method, &result, started);

        self.stats.write().await.record(started, Outcome::Passed);
        result
    }
}

/// Stream wrapper logging each message at trace level
struct LoggedStream {
    inner: Box<dyn MessageStream>,
    label: String,
    method: String,
    log_content: bool,
}

#[async_trait]
impl MessageStream for LoggedStream {
    async fn recv(&mut self) -> Result<Option<Message>, Status> {
        let received = self.inner.recv().await;
        match &received {
            Ok(Some(message)) if self.log_content => {
                trace!("[{}] {} received: {}", self.label, self.method, message)
            }
            Ok(Some(_)) => trace!("[{}] {} received message", self.label, self.method),
            Ok(None) => trace!("[{}] {} peer finished sending", self.label, self.method),
            Err(status) => trace!("[{}] {} receive failed: {}", self.label, self.method, status),
        }
        received
    }

    async fn send(&mut self, message: Message) -> Result<(), Status> {
        if self.log_content {
            trace!("[{}] {} sending: {}", self.label, self.method, message);
        } else {
            trace!("[{}] {} sending message", self.label, self.method);
        }
        self.inner.send(message).await
    }
}
