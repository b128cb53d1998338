//! Declarative middleware configuration.
//!
//! A configuration file names reusable bundles and, for each side of the
//! connection, the interceptors to attach globally and per route:
//!
//! ```toml
//! [[bundles]]
//! tag = "audit"
//! unary = [{ kind = "logging", label = "audit", log_content = true }]
//!
//! [server.global]
//! unary = [{ kind = "logging", label = "global" }]
//!
//! [[server.routes]]
//! route = "/pkg.Svc/Method"
//! tags = ["audit"]
//! unary = [{ kind = "rate_limit", max_requests = 10, window = "1m" }]
//! ```
//!
//! Files are read and written as JSON, YAML or TOML depending on their
//! extension.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::call::CallDirection;
use crate::error::{ConfigError, GrpcmwResult};
use crate::route::Route;

/// Root of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Named bundles, merged into routes by tag
    #[serde(default)]
    pub bundles: Vec<BundleConfig>,

    /// Interceptors for incoming calls
    #[serde(default)]
    pub server: RouterSpec,

    /// Interceptors for outgoing calls
    #[serde(default)]
    pub client: RouterSpec,
}

/// A reusable set of interceptors stored under a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Tag routes refer to
    pub tag: String,

    /// Interceptors in the bundle
    #[serde(flatten)]
    pub scope: ScopeConfig,
}

/// Interceptors for one side of the connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterSpec {
    /// Interceptors applied to every call
    #[serde(default)]
    pub global: ScopeConfig,

    /// Per-route interceptors, applied in file order
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Interceptors attached at one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Package, service or method route
    pub route: String,

    /// Bundles merged into the route ahead of its own interceptors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Interceptors registered directly at the route
    #[serde(flatten)]
    pub scope: ScopeConfig,
}

/// Unary and stream interceptor lists of one scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeConfig {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unary: Vec<InterceptorSpec>,

    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stream: Vec<InterceptorSpec>,
}

/// A built-in interceptor and its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterceptorSpec {
    /// Log every call passing through
    Logging {
        /// Prefix distinguishing this logger's lines
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        /// Also log request and response payloads
        #[serde(default)]
        log_content: bool,
    },

    /// Limit calls per method within a sliding window
    RateLimit {
        /// Calls allowed per window
        max_requests: usize,
        /// Window length
        #[serde(with = "humantime_serde")]
        window: Duration,
    },

    /// Reject calls missing any of the given metadata keys
    RequireMetadata {
        /// Keys that must be present
        keys: Vec<String>,
    },

    /// Insert metadata entries before continuing
    InjectMetadata {
        /// Entries to insert, overriding existing values
        #[serde(default)]
        entries: BTreeMap<String, String>,
    },

    /// Fail calls that outlast a deadline
    Timeout {
        /// Deadline for the rest of the chain
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },
}

impl InterceptorSpec {
    /// The `kind` tag of this spec.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Logging { .. } => "logging",
            Self::RateLimit { .. } => "rate_limit",
            Self::RequireMetadata { .. } => "require_metadata",
            Self::InjectMetadata { .. } => "inject_metadata",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::RateLimit {
                max_requests,
                window,
            } => {
                if *max_requests == 0 {
                    return Err(ConfigError::InvalidValue {
                        parameter: "rate_limit.max_requests".to_string(),
                        value: max_requests.to_string(),
                        reason: "Rate limit must allow at least one request".to_string(),
                    });
                }
                if window.is_zero() {
                    return Err(ConfigError::InvalidValue {
                        parameter: "rate_limit.window".to_string(),
                        value: format!("{:?}", window),
                        reason: "Window must be greater than 0".to_string(),
                    });
                }
            }
            Self::RequireMetadata { keys } => {
                if keys.is_empty() {
                    return Err(ConfigError::MissingParameter {
                        parameter: "require_metadata.keys".to_string(),
                    });
                }
                if keys.iter().any(|key| key.is_empty()) {
                    return Err(ConfigError::InvalidValue {
                        parameter: "require_metadata.keys".to_string(),
                        value: format!("{:?}", keys),
                        reason: "Metadata keys cannot be empty".to_string(),
                    });
                }
            }
            Self::Timeout { duration } => {
                if duration.is_zero() {
                    return Err(ConfigError::InvalidValue {
                        parameter: "timeout.duration".to_string(),
                        value: format!("{:?}", duration),
                        reason: "Timeout must be greater than 0".to_string(),
                    });
                }
            }
            Self::Logging { .. } | Self::InjectMetadata { .. } => {}
        }
        Ok(())
    }
}

impl ScopeConfig {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unary interceptor.
    pub fn with_unary(mut self, spec: InterceptorSpec) -> Self {
        self.unary.push(spec);
        self
    }

    /// Add a stream interceptor.
    pub fn with_stream(mut self, spec: InterceptorSpec) -> Self {
        self.stream.push(spec);
        self
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.unary.is_empty() && self.stream.is_empty()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.unary
            .iter()
            .chain(&self.stream)
            .try_for_each(InterceptorSpec::validate)
    }
}

impl RouteConfig {
    /// Create an empty entry for `route`.
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            tags: Vec::new(),
            scope: ScopeConfig::default(),
        }
    }

    /// Merge the bundle stored under `tag`.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Set the interceptors registered directly at the route.
    pub fn with_scope(mut self, scope: ScopeConfig) -> Self {
        self.scope = scope;
        self
    }
}

impl MiddlewareConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named bundle.
    pub fn with_bundle(mut self, tag: impl Into<String>, scope: ScopeConfig) -> Self {
        self.bundles.push(BundleConfig {
            tag: tag.into(),
            scope,
        });
        self
    }

    /// Set the global interceptors of one side.
    pub fn with_global(mut self, direction: CallDirection, scope: ScopeConfig) -> Self {
        self.router_mut(direction).global = scope;
        self
    }

    /// Add a route entry to one side.
    pub fn with_route(mut self, direction: CallDirection, route: RouteConfig) -> Self {
        self.router_mut(direction).routes.push(route);
        self
    }

    /// Settings for one side of the connection.
    pub fn router(&self, direction: CallDirection) -> &RouterSpec {
        match direction {
            CallDirection::Server => &self.server,
            CallDirection::Client => &self.client,
        }
    }

    fn router_mut(&mut self, direction: CallDirection) -> &mut RouterSpec {
        match direction {
            CallDirection::Server => &mut self.server,
            CallDirection::Client => &mut self.client,
        }
    }

    /// Validate the configuration.
    ///
    /// Checks bundle tags, route syntax, route tag references and the
    /// settings of every interceptor.
    pub fn validate(&self) -> GrpcmwResult<()> {
        let mut tags = HashSet::new();
        for bundle in &self.bundles {
            if bundle.tag.is_empty() {
                return Err(ConfigError::MissingParameter {
                    parameter: "bundles.tag".to_string(),
                }
                .into());
            }
            if !tags.insert(bundle.tag.as_str()) {
                return Err(ConfigError::Conflict {
                    reason: format!("Bundle tag '{}' is defined more than once", bundle.tag),
                }
                .into());
            }
            bundle.scope.validate()?;
        }

        for direction in [CallDirection::Server, CallDirection::Client] {
            let spec = self.router(direction);
            spec.global.validate()?;

            for entry in &spec.routes {
                Route::parse(&entry.route).map_err(|e| ConfigError::InvalidValue {
                    parameter: format!("{}.routes.route", direction),
                    value: entry.route.clone(),
                    reason: e.to_string(),
                })?;

                if let Some(unknown) = entry.tags.iter().find(|tag| !tags.contains(tag.as_str())) {
                    return Err(ConfigError::InvalidValue {
                        parameter: format!("{}.routes.tags", direction),
                        value: unknown.clone(),
                        reason: format!("No bundle is tagged '{}'", unknown),
                    }
                    .into());
                }

                entry.scope.validate()?;
            }
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// Supports JSON, YAML, and TOML formats based on file extension. The
    /// loaded configuration is validated.
    pub fn from_file(path: impl AsRef<Path>) -> GrpcmwResult<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };

        let invalid = |reason: String| ConfigError::InvalidFormat {
            path: path.display().to_string(),
            reason,
        };

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?,
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))?
            }
            Some("toml") => toml::from_str(&content).map_err(|e| invalid(e.to_string()))?,
            _ => return Err(invalid(UNSUPPORTED_FORMAT.to_string()).into()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, in the format its extension names.
    pub fn to_file(&self, path: impl AsRef<Path>) -> GrpcmwResult<()> {
        let path = path.as_ref();
        let invalid = |reason: String| ConfigError::InvalidFormat {
            path: path.display().to_string(),
            reason,
        };

        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self).map_err(|e| invalid(e.to_string()))?,
            Some("yaml") | Some("yml") => {
                serde_yaml::to_string(self).map_err(|e| invalid(e.to_string()))?
            }
            Some("toml") => toml::to_string(self).map_err(|e| invalid(e.to_string()))?,
            _ => return Err(invalid(UNSUPPORTED_FORMAT.to_string()).into()),
        };

        std::fs::write(path, content)?;

        Ok(())
    }
}

const UNSUPPORTED_FORMAT: &str = "Unsupported file format. Use .json, .yaml, or .toml";
