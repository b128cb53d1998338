//! Turning configuration into interceptors, bundles and routers.
//!
//! Bundles go into the registry first, then each router gets its global
//! interceptors, then per route the merged tags followed by the route's own
//! interceptors, in file order.

use grpcmw_core::{
    CallDirection, GrpcmwResult, InterceptorSpec, Level, MiddlewareConfig, NamedRegistry, Router,
    ScopeConfig, StreamInterceptor, UnaryInterceptor,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::interceptors::{
    InjectMetadataInterceptor, LoggingInterceptor, RateLimitInterceptor,
    RequireMetadataInterceptor, TimeoutInterceptor,
};

fn shared<T>(interceptor: T) -> (Arc<dyn UnaryInterceptor>, Arc<dyn StreamInterceptor>)
where
    T: UnaryInterceptor + StreamInterceptor + 'static,
{
    let interceptor = Arc::new(interceptor);
    (interceptor.clone(), interceptor)
}

fn instantiate(spec: &InterceptorSpec) -> (Arc<dyn UnaryInterceptor>, Arc<dyn StreamInterceptor>) {
    match spec {
        InterceptorSpec::Logging { label, log_content } => {
            let logging = LoggingInterceptor::new(*log_content);
            match label {
                Some(label) => shared(logging.with_label(label.clone())),
                None => shared(logging),
            }
        }
        InterceptorSpec::RateLimit {
            max_requests,
            window,
        } => shared(RateLimitInterceptor::new(*max_requests, *window)),
        InterceptorSpec::RequireMetadata { keys } => {
            shared(RequireMetadataInterceptor::new(keys.iter().cloned()))
        }
        InterceptorSpec::InjectMetadata { entries } => {
            shared(InjectMetadataInterceptor::new(entries.clone()))
        }
        InterceptorSpec::Timeout { duration } => shared(TimeoutInterceptor::new(*duration)),
    }
}

/// Build a fresh unary interceptor for `spec`.
pub fn build_unary(spec: &InterceptorSpec) -> Arc<dyn UnaryInterceptor> {
    instantiate(spec).0
}

/// Build a fresh stream interceptor for `spec`.
pub fn build_stream(spec: &InterceptorSpec) -> Arc<dyn StreamInterceptor> {
    instantiate(spec).1
}

fn populate_level(level: &Level, scope: &ScopeConfig) {
    level.unary().add(scope.unary.iter().map(build_unary));
    level.stream().add(scope.stream.iter().map(build_stream));
}

/// Store every bundle of `config` in `registry`, replacing bundles with the
/// same tag.
pub fn populate_registry(config: &MiddlewareConfig, registry: &NamedRegistry) {
    for bundle in &config.bundles {
        let level = Level::leaf(bundle.tag.as_str());
        populate_level(&level, &bundle.scope);
        debug!(
            tag = %bundle.tag,
            unary = level.unary().len(),
            stream = level.stream().len(),
            "Built bundle"
        );
        registry.set(bundle.tag.clone(), level);
    }
}

/// Build the router for one side of the connection.
///
/// `registry` must already hold the bundles the routes refer to.
pub fn build_router(
    config: &MiddlewareConfig,
    direction: CallDirection,
    registry: &NamedRegistry,
) -> GrpcmwResult<Router> {
    let router = Router::new(direction);
    let spec = config.router(direction);

    populate_level(router.global(), &spec.global);

    for entry in &spec.routes {
        let level = router.level(&entry.route)?;
        if !entry.tags.is_empty() {
            router.merge_tags(&entry.route, registry, &entry.tags)?;
        }
        populate_level(&level, &entry.scope);
    }

    info!(
        %direction,
        routes = spec.routes.len(),
        "Built interceptor router"
    );
    Ok(router)
}

/// Registry and both routers built from one configuration.
#[derive(Debug)]
pub struct Middleware {
    /// Bundles of the configuration
    pub registry: NamedRegistry,
    /// Router for incoming calls
    pub server: Router,
    /// Router for outgoing calls
    pub client: Router,
}

impl Middleware {
    /// Validate `config` and build everything it describes.
    pub fn from_config(config: &MiddlewareConfig) -> GrpcmwResult<Self> {
        config.validate()?;

        let registry = NamedRegistry::new();
        populate_registry(config, &registry);
        let server = build_router(config, CallDirection::Server, &registry)?;
        let client = build_router(config, CallDirection::Client, &registry)?;

        Ok(Self {
            registry,
            server,
            client,
        })
    }

    /// Load, validate and build a configuration file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> GrpcmwResult<Self> {
        Self::from_config(&MiddlewareConfig::from_file(path)?)
    }
}
