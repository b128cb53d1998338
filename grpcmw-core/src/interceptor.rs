//! Interceptor and handler traits.
//!
//! An interceptor wraps a call. It receives the call and a continuation
//! ([`UnaryNext`] / [`StreamNext`]) standing for everything nested inside it:
//! the interceptors registered after it and, innermost, the terminal handler
//! supplied by the RPC framework. Calling `next.run(call)` continues the call;
//! returning without doing so short-circuits it.
//!
//! # Examples
//!
//! ```rust
//! use grpcmw_core::{unary_fn, Status};
//!
//! let deny_anonymous = unary_fn(|call, next| async move {
//!     if call.metadata.contains_key("authorization") {
//!         next.run(call).await
//!     } else {
//!         Err(Status::unauthenticated("missing credentials"))
//!     }
//! });
//! # let _ = deny_anonymous;
//! ```

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::call::{Message, StreamCall, UnaryCall};
use crate::status::Status;

/// Interceptor for request/response calls.
#[async_trait]
pub trait UnaryInterceptor: Send + Sync {
    /// Handle `call`, optionally continuing with `next`.
    async fn intercept(&self, call: UnaryCall, next: UnaryNext) -> Result<Message, Status>;
}

/// Interceptor for streaming calls.
#[async_trait]
pub trait StreamInterceptor: Send + Sync {
    /// Handle `call`, optionally continuing with `next`.
    async fn intercept(&self, call: StreamCall, next: StreamNext) -> Result<(), Status>;
}

/// Innermost element of a unary chain: the method itself on servers, the
/// invoker on clients.
#[async_trait]
pub trait UnaryHandler: Send + Sync {
    #[allow(missing_docs)]
    async fn call(&self, call: UnaryCall) -> Result<Message, Status>;
}

/// Innermost element of a stream chain.
#[async_trait]
pub trait StreamHandler: Send + Sync {
    #[allow(missing_docs)]
    async fn call(&self, call: StreamCall) -> Result<(), Status>;
}

/// Continuation of a unary chain.
#[derive(Clone)]
pub struct UnaryNext {
    handler: Arc<dyn UnaryHandler>,
}

impl UnaryNext {
    /// Wrap a handler as a continuation.
    pub fn new(handler: Arc<dyn UnaryHandler>) -> Self {
        Self { handler }
    }

    /// Continue the call.
    pub async fn run(self, call: UnaryCall) -> Result<Message, Status> {
        self.handler.call(call).await
    }

    /// The handler this continuation invokes.
    pub fn into_handler(self) -> Arc<dyn UnaryHandler> {
        self.handler
    }
}

/// Continuation of a stream chain.
#[derive(Clone)]
pub struct StreamNext {
    handler: Arc<dyn StreamHandler>,
}

impl StreamNext {
    /// Wrap a handler as a continuation.
    pub fn new(handler: Arc<dyn StreamHandler>) -> Self {
        Self { handler }
    }

    /// Continue the call.
    pub async fn run(self, call: StreamCall) -> Result<(), Status> {
        self.handler.call(call).await
    }

    /// The handler this continuation invokes.
    pub fn into_handler(self) -> Arc<dyn StreamHandler> {
        self.handler
    }
}

/// Unary interceptor built from a closure. See [`unary_fn`].
pub struct UnaryFn<F>(F);

/// Stream interceptor built from a closure. See [`stream_fn`].
pub struct StreamFn<F>(F);

/// Unary handler built from a closure. See [`unary_handler_fn`].
pub struct UnaryHandlerFn<F>(F);

/// Stream handler built from a closure. See [`stream_handler_fn`].
pub struct StreamHandlerFn<F>(F);

/// Turn `async |call, next| -> Result<Message, Status>` into an interceptor.
pub fn unary_fn<F, Fut>(f: F) -> Arc<dyn UnaryInterceptor>
where
    F: Fn(UnaryCall, UnaryNext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Message, Status>> + Send + 'static,
{
    Arc::new(UnaryFn(f))
}

/// Turn `async |call, next| -> Result<(), Status>` into an interceptor.
pub fn stream_fn<F, Fut>(f: F) -> Arc<dyn StreamInterceptor>
where
    F: Fn(StreamCall, StreamNext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Status>> + Send + 'static,
{
    Arc::new(StreamFn(f))
}

/// Turn `async |call| -> Result<Message, Status>` into a terminal handler.
pub fn unary_handler_fn<F, Fut>(f: F) -> Arc<dyn UnaryHandler>
where
    F: Fn(UnaryCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Message, Status>> + Send + 'static,
{
    Arc::new(UnaryHandlerFn(f))
}

/// Turn `async |call| -> Result<(), Status>` into a terminal handler.
pub fn stream_handler_fn<F, Fut>(f: F) -> Arc<dyn StreamHandler>
where
    F: Fn(StreamCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Status>> + Send + 'static,
{
    Arc::new(StreamHandlerFn(f))
}

#[async_trait]
impl<F, Fut> UnaryInterceptor for UnaryFn<F>
where
    F: Fn(UnaryCall, UnaryNext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Message, Status>> + Send,
{
    async fn intercept(&self, call: UnaryCall, next: UnaryNext) -> Result<Message, Status> {
        (self.0)(call, next).await
    }
}

#[async_trait]
impl<F, Fut> StreamInterceptor for StreamFn<F>
where
    F: Fn(StreamCall, StreamNext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), Status>> + Send,
{
    async fn intercept(&self, call: StreamCall, next: StreamNext) -> Result<(), Status> {
        (self.0)(call, next).await
    }
}

#[async_trait]
impl<F, Fut> UnaryHandler for UnaryHandlerFn<F>
where
    F: Fn(UnaryCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Message, Status>> + Send,
{
    async fn call(&self, call: UnaryCall) -> Result<Message, Status> {
        (self.0)(call).await
    }
}

#[async_trait]
impl<F, Fut> StreamHandler for StreamHandlerFn<F>
where
    F: Fn(StreamCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), Status>> + Send,
{
    async fn call(&self, call: StreamCall) -> Result<(), Status> {
        (self.0)(call).await
    }
}
