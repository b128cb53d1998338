//! Error types for interceptor routing operations.
//!
//! Registration and configuration code receives a [`GrpcmwError`]. Code that
//! runs inside a call never sees one directly: the resolved interceptors turn
//! every library error into an `INTERNAL` [`Status`](crate::Status) for that
//! single call.

use thiserror::Error;

/// The main error type for all grpcmw operations.
///
/// # Examples
///
/// ```rust
/// use grpcmw_core::error::{GrpcmwError, RouteError};
///
/// let error = GrpcmwError::Route(RouteError::InvalidRoute {
///     route: "pkg.Svc".to_string(),
/// });
///
/// assert_eq!(error.category(), "route");
/// ```
#[derive(Error, Debug)]
pub enum GrpcmwError {
    /// Route parsing or route tree resolution failed
    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    /// Configuration errors (invalid config files, missing parameters, etc.)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors (reading or writing configuration files)
    #[error("IO error: {source}")]
    Io {
        #[from]
        /// The underlying IO error
        source: std::io::Error,
    },
}

/// Errors raised while parsing a route or walking the route tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum RouteError {
    /// The route does not match `/<package>[.<Service>][/<Method>]`
    #[error("Invalid route: {route:?}")]
    InvalidRoute { route: String },

    /// The walk reached a level without children while tokens remained
    #[error("Level {index:?} is not a register, cannot resolve {token:?} below it")]
    NotARegister { index: String, token: String },
}

/// Configuration-related errors.
///
/// These errors occur when configuration files are invalid,
/// missing required parameters, or contain conflicting settings.
#[derive(Error, Debug, Clone)]
#[allow(missing_docs)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration file has invalid format
    #[error("Invalid configuration format in {path}: {reason}")]
    InvalidFormat { path: String, reason: String },

    /// Required configuration parameter is missing
    #[error("Missing required configuration parameter: {parameter}")]
    MissingParameter { parameter: String },

    /// Configuration parameter has invalid value
    #[error("Invalid value for parameter '{parameter}': {value} - {reason}")]
    InvalidValue {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Conflicting configuration parameters
    #[error("Conflicting configuration: {reason}")]
    Conflict { reason: String },
}

/// Convenience type alias for Results using GrpcmwError.
pub type GrpcmwResult<T> = Result<T, GrpcmwError>;

impl GrpcmwError {
    /// Get the error category for this error.
    ///
    /// This is useful for error reporting and log fields.
    pub fn category(&self) -> &'static str {
        match self {
            GrpcmwError::Route(_) => "route",
            GrpcmwError::Config(_) => "config",
            GrpcmwError::Io { .. } => "io",
        }
    }
}

impl RouteError {
    /// Shorthand for [`RouteError::InvalidRoute`].
    pub fn invalid(route: impl Into<String>) -> Self {
        Self::InvalidRoute {
            route: route.into(),
        }
    }
}
