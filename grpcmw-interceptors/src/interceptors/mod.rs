//! Built-in interceptors for RPC calls
//!
//! Each interceptor here implements both [`UnaryInterceptor`](grpcmw_core::UnaryInterceptor)
//! and [`StreamInterceptor`](grpcmw_core::StreamInterceptor), so one instance can be
//! registered for both call shapes and share its state between them.

pub mod inject_metadata;
pub mod logging;
pub mod rate_limit;
pub mod require_metadata;
pub mod timeout;

pub use inject_metadata::InjectMetadataInterceptor;
pub use logging::LoggingInterceptor;
pub use rate_limit::RateLimitInterceptor;
pub use require_metadata::RequireMetadataInterceptor;
pub use timeout::TimeoutInterceptor;
