//! # grpcmw Interceptors
//!
//! Ready-made interceptors for `grpcmw-core` routers, and the glue that turns
//! a [`MiddlewareConfig`](grpcmw_core::MiddlewareConfig) into a populated
//! registry and routers.
//!
//! ## Built-in Interceptors
//!
//! - [`LoggingInterceptor`]: logs calls, optionally with payloads
//! - [`RateLimitInterceptor`]: sliding-window limit per method
//! - [`RequireMetadataInterceptor`]: rejects calls missing metadata keys
//! - [`InjectMetadataInterceptor`]: stamps fixed metadata onto calls
//! - [`TimeoutInterceptor`]: deadline for the rest of the chain
//!
//! ## Example
//!
//! ```rust,no_run
//! use grpcmw_interceptors::Middleware;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let middleware = Middleware::from_file("middleware.toml")?;
//! println!("{}", middleware.server.describe());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::uninlined_format_args)]

pub mod factory;
pub mod interceptors;
pub mod stats;

pub use factory::{build_router, build_stream, build_unary, populate_registry, Middleware};
pub use interceptors::{
    InjectMetadataInterceptor, LoggingInterceptor, RateLimitInterceptor,
    RequireMetadataInterceptor, TimeoutInterceptor,
};
pub use stats::InterceptorStats;

/// Version of the interceptors crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
