//! Gate that rejects calls missing required metadata

use async_trait::async_trait;
use grpcmw_core::{
    Message, Metadata, Status, StreamCall, StreamInterceptor, StreamNext, UnaryCall,
    UnaryInterceptor, UnaryNext,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::warn;

use crate::stats::{InterceptorStats, Outcome};

/// Interceptor that rejects calls lacking any of a set of metadata keys
pub struct RequireMetadataInterceptor {
    name: String,
    stats: Arc<RwLock<InterceptorStats>>,
    keys: Vec<String>,
}

impl RequireMetadataInterceptor {
    /// Require every key in `keys`
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            name: "RequireMetadataInterceptor".to_string(),
            stats: Arc::new(RwLock::new(InterceptorStats::default())),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Require an `authorization` entry
    pub fn authorization() -> Self {
        Self::new(["authorization"])
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the interceptor's counters
    pub async fn stats(&self) -> InterceptorStats {
        self.stats.read().await.clone()
    }

    fn missing<'a>(&'a self, metadata: &Metadata) -> Vec<&'a str> {
        self.keys
            .iter()
            .filter(|key| !metadata.contains_key(key))
            .map(String::as_str)
            .collect()
    }

    async fn check(&self, method: &str, metadata: &Metadata) -> Result<(), Status> {
        let started = Instant::now();
        let missing = self.missing(metadata);

        if missing.is_empty() {
            self.stats.write().await.record(started, Outcome::Passed);
            return Ok(());
        }

        self.stats.write().await.record(started, Outcome::Blocked);
        warn!(
            "[{}] Rejected call to '{}': missing metadata {:?}",
            self.name, method, missing
        );
        Err(Status::unauthenticated(format!(
            "Missing required metadata: {}",
            missing.join(", ")
        )))
    }
}

#[async_trait]
impl UnaryInterceptor for RequireMetadataInterceptor {
    async fn intercept(&self, call: UnaryCall, next: UnaryNext) -> Result<Message, Status> {
        self.check(&call.info.method, &call.metadata).await?;
        next.run(call).await
    }
}

#[async_trait]
impl StreamInterceptor for RequireMetadataInterceptor {
    async fn intercept(&self, call: StreamCall, next: StreamNext) -> Result<(), Status> {
        self.check(&call.info.method, &call.metadata).await?;
        next.run(call).await
    }
}
