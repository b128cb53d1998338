//! Interceptor that stamps metadata onto calls

use async_trait::async_trait;
use grpcmw_core::{
    Message, Metadata, Status, StreamCall, StreamInterceptor, StreamNext, UnaryCall,
    UnaryInterceptor, UnaryNext,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

use crate::stats::{InterceptorStats, Outcome};

/// Interceptor that inserts fixed metadata entries, overriding existing values
pub struct InjectMetadataInterceptor {
    name: String,
    stats: Arc<RwLock<InterceptorStats>>,
    entries: BTreeMap<String, String>,
}

impl InjectMetadataInterceptor {
    /// Create an interceptor inserting `entries`
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self {
            name: "InjectMetadataInterceptor".to_string(),
            stats: Arc::new(RwLock::new(InterceptorStats::default())),
            entries,
        }
    }

    /// Add one more entry
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the interceptor's counters
    pub async fn stats(&self) -> InterceptorStats {
        self.stats.read().await.clone()
    }

    /// Apply the entries; returns whether anything changed.
    fn apply(&self, method: &str, metadata: &mut Metadata) -> bool {
        let mut modified = false;
        for (key, value) in &self.entries {
            if metadata.get(key) != Some(value.as_str()) {
                debug!("[{}] {} set {}={}", self.name, method, key, value);
                metadata.insert(key.clone(), value.clone());
                modified = true;
            }
        }
        modified
    }

    async fn record(&self, started: Instant, modified: bool) {
        let outcome = if modified {
            Outcome::Modified
        } else {
            Outcome::Passed
        };
        self.stats.write().await.record(started, outcome);
    }
}

#[async_trait]
impl UnaryInterceptor for InjectMetadataInterceptor {
    async fn intercept(&self, mut call: UnaryCall, next: UnaryNext) -> Result<Message, Status> {
        let started = Instant::now();
        let modified = self.apply(&call.info.method, &mut call.metadata);
        self.record(started, modified).await;
        next.run(call).await
    }
}

#[async_trait]
impl StreamInterceptor for InjectMetadataInterceptor {
    async fn intercept(&self, mut call: StreamCall, next: StreamNext) -> Result<(), Status> {
        let started = Instant::now();
        let modified = self.apply(&call.info.method, &mut call.metadata);
        self.record(started, modified).await;
        next.run(call).await
    }
}
