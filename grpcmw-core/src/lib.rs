//! # grpcmw Core Library
//!
//! `grpcmw-core` attaches RPC interceptors at four scopes (global, package,
//! service and method) and composes the right combination for every call.
//!
//! ## Features
//!
//! - **Scoped Registration**: Register interceptors by route string (`/pkg`, `/pkg.Service`, `/pkg.Service/Method`)
//! - **Deterministic Ordering**: Global interceptors run first, method interceptors last, handler innermost
//! - **Named Bundles**: Define interceptor sets once under a tag and merge them into many routes
//! - **Unary and Streaming Calls**: Separate chains for both call shapes at every scope
//! - **Declarative Configuration**: JSON, YAML and TOML configuration files
//! - **Concurrent by Default**: Registration and dispatch are safe from any number of threads
//!
//! ## Quick Start
//!
//! ```rust
//! use grpcmw_core::{unary_fn, unary_handler_fn, Router, Status, UnaryCall};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = Router::server();
//!
//!     // Every call passes through the global level
//!     router.global().unary().push(unary_fn(|call, next| async move {
//!         tracing::info!(method = call.method(), "call started");
//!         next.run(call).await
//!     }));
//!
//!     // Only calls to this method are checked for credentials
//!     router.add_unary_interceptor(
//!         "/acme.Accounts/Delete",
//!         [unary_fn(|call, next| async move {
//!             if call.metadata.contains_key("authorization") {
//!                 next.run(call).await
//!             } else {
//!                 Err(Status::unauthenticated("missing credentials"))
//!             }
//!         })],
//!     )?;
//!
//!     let handler = unary_handler_fn(|call: UnaryCall| async move { Ok::<_, Status>(call.request) });
//!     let call = UnaryCall::new("/acme.Accounts/Delete", json!({ "id": 7 }));
//!     let result = router.handle_unary(call, handler).await;
//!     assert!(result.is_err());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`chain`]: ordered interceptor lists and their composition
//! - [`level`]: the route tree of levels and registers
//! - [`route`]: route strings and their tokens
//! - [`resolver`]: walking the tree along a route
//! - [`router`]: registration entry points and the per-call resolved interceptor
//! - [`registry`]: tagged bundles merged into routes
//! - [`config`]: declarative configuration files
//! - [`error`]: error types for all operations

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::uninlined_format_args)]

pub mod call;
pub mod chain;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod level;
pub mod registry;
pub mod resolver;
pub mod route;
pub mod router;
pub mod status;
pub mod stream;

// Re-export commonly used types for convenience
pub use call::{CallDirection, CallInfo, Message, Metadata, StreamCall, UnaryCall};
pub use chain::{Chain, ComposedStream, ComposedUnary, StreamChain, UnaryChain};
pub use config::{
    BundleConfig, InterceptorSpec, MiddlewareConfig, RouteConfig, RouterSpec, ScopeConfig,
};
pub use error::{ConfigError, GrpcmwError, GrpcmwResult, RouteError};
pub use interceptor::{
    stream_fn, stream_handler_fn, unary_fn, unary_handler_fn, StreamHandler, StreamInterceptor,
    StreamNext, UnaryHandler, UnaryInterceptor, UnaryNext,
};
pub use level::{Level, Register};
pub use registry::NamedRegistry;
pub use resolver::{resolve, walk, ResolveMode, Resolution};
pub use route::{Route, Scope};
pub use router::{Router, GLOBAL_INDEX};
pub use status::{Code, Status};
pub use stream::{ChannelStream, MessageStream};

/// Current version of the grpcmw-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
