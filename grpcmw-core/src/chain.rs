//! Ordered interceptor chains and their composition.
//!
//! A chain nests its interceptors in insertion order: the first one added is
//! the outermost, so it sees the call first and the result last. Composition
//! folds the chain right-to-left around a terminal handler, producing one
//! handler per call.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::call::{Message, StreamCall, UnaryCall};
use crate::interceptor::{
    StreamHandler, StreamInterceptor, StreamNext, UnaryHandler, UnaryInterceptor, UnaryNext,
};
use crate::status::Status;

/// Ordered, lock-protected list of interceptors of one shape.
pub struct Chain<I: ?Sized> {
    interceptors: RwLock<Vec<Arc<I>>>,
}

/// Chain of unary interceptors.
pub type UnaryChain = Chain<dyn UnaryInterceptor>;

/// Chain of stream interceptors.
pub type StreamChain = Chain<dyn StreamInterceptor>;

impl<I: ?Sized> Chain<I> {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            interceptors: RwLock::new(Vec::new()),
        }
    }

    /// Create a chain holding `interceptors` in order.
    pub fn from_interceptors(interceptors: impl IntoIterator<Item = Arc<I>>) -> Self {
        Self {
            interceptors: RwLock::new(interceptors.into_iter().collect()),
        }
    }

    /// Append interceptors to the end of the chain.
    pub fn add(&self, interceptors: impl IntoIterator<Item = Arc<I>>) -> &Self {
        self.interceptors.write().extend(interceptors);
        self
    }

    /// Append a single interceptor.
    pub fn push(&self, interceptor: Arc<I>) -> &Self {
        self.interceptors.write().push(interceptor);
        self
    }

    /// Append every interceptor of each chain in `chains`, keeping their order.
    ///
    /// Nothing is deduplicated; merging the same chain twice runs its
    /// interceptors twice.
    pub fn merge<'a>(&self, chains: impl IntoIterator<Item = &'a Chain<I>>) -> &Self
    where
        I: 'a,
    {
        for chain in chains {
            // Snapshot first: `chain` may be `self`.
            let items = chain.snapshot();
            self.interceptors.write().extend(items);
        }
        self
    }

    /// Copy of the current interceptor list.
    pub fn snapshot(&self) -> Vec<Arc<I>> {
        self.interceptors.read().clone()
    }

    /// Number of interceptors in the chain.
    pub fn len(&self) -> usize {
        self.interceptors.read().len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.interceptors.read().is_empty()
    }
}

impl<I: ?Sized> Default for Chain<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ?Sized> Clone for Chain<I> {
    fn clone(&self) -> Self {
        Self::from_interceptors(self.snapshot())
    }
}

impl<I: ?Sized> fmt::Debug for Chain<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("len", &self.len()).finish()
    }
}

impl UnaryChain {
    /// Snapshot the chain into a callable unit.
    pub fn compose(&self) -> ComposedUnary {
        ComposedUnary {
            interceptors: self.snapshot(),
        }
    }
}

impl StreamChain {
    /// Snapshot the chain into a callable unit.
    pub fn compose(&self) -> ComposedStream {
        ComposedStream {
            interceptors: self.snapshot(),
        }
    }
}

/// A unary chain frozen for execution.
#[derive(Clone)]
pub struct ComposedUnary {
    interceptors: Vec<Arc<dyn UnaryInterceptor>>,
}

impl ComposedUnary {
    /// Nest the interceptors around `terminal`, last one innermost.
    ///
    /// An empty chain returns `terminal` itself.
    pub fn bind(&self, terminal: Arc<dyn UnaryHandler>) -> Arc<dyn UnaryHandler> {
        self.interceptors
            .iter()
            .rev()
            .fold(terminal, |next, interceptor| {
                let layer: Arc<dyn UnaryHandler> = Arc::new(UnaryLayer {
                    interceptor: interceptor.clone(),
                    next,
                });
                layer
            })
    }

    /// Run `call` through the interceptors and then `terminal`.
    pub async fn call(
        &self,
        call: UnaryCall,
        terminal: Arc<dyn UnaryHandler>,
    ) -> Result<Message, Status> {
        self.bind(terminal).call(call).await
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

/// A stream chain frozen for execution.
#[derive(Clone)]
pub struct ComposedStream {
    interceptors: Vec<Arc<dyn StreamInterceptor>>,
}

impl ComposedStream {
    /// Nest the interceptors around `terminal`, last one innermost.
    ///
    /// An empty chain returns `terminal` itself.
    pub fn bind(&self, terminal: Arc<dyn StreamHandler>) -> Arc<dyn StreamHandler> {
        self.interceptors
            .iter()
            .rev()
            .fold(terminal, |next, interceptor| {
                let layer: Arc<dyn StreamHandler> = Arc::new(StreamLayer {
                    interceptor: interceptor.clone(),
                    next,
                });
                layer
            })
    }

    /// Run `call` through the interceptors and then `terminal`.
    pub async fn call(&self, call: StreamCall, terminal: Arc<dyn StreamHandler>) -> Result<(), Status> {
        self.bind(terminal).call(call).await
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

/// One interceptor bound to its continuation.
struct UnaryLayer {
    interceptor: Arc<dyn UnaryInterceptor>,
    next: Arc<dyn UnaryHandler>,
}

#[async_trait]
impl UnaryHandler for UnaryLayer {
    async fn call(&self, call: UnaryCall) -> Result<Message, Status> {
        self.interceptor
            .intercept(call, UnaryNext::new(self.next.clone()))
            .await
    }
}

struct StreamLayer {
    interceptor: Arc<dyn StreamInterceptor>,
    next: Arc<dyn StreamHandler>,
}

#[async_trait]
impl StreamHandler for StreamLayer {
    async fn call(&self, call: StreamCall) -> Result<(), Status> {
        self.interceptor
            .intercept(call, StreamNext::new(self.next.clone()))
            .await
    }
}

// A whole chain can be nested as a single element of another chain.
#[async_trait]
impl UnaryInterceptor for UnaryChain {
    async fn intercept(&self, call: UnaryCall, next: UnaryNext) -> Result<Message, Status> {
        let composed = self.compose();
        composed.call(call, next.into_handler()).await
    }
}

#[async_trait]
impl StreamInterceptor for StreamChain {
    async fn intercept(&self, call: StreamCall, next: StreamNext) -> Result<(), Status> {
        let composed = self.compose();
        composed.call(call, next.into_handler()).await
    }
}
