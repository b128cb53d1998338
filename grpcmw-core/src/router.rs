//! Route-keyed interceptor registration and per-call dispatch.
//!
//! A [`Router`] owns the route tree of one endpoint. Registration code adds
//! interceptors at global, package, service or method scope; the RPC framework
//! installs the router's single resolved interceptor, which on every call
//! collects the chains along the call's route and runs them in order:
//!
//! ```text
//! global -> package -> service -> method -> handler
//! ```
//!
//! # Examples
//!
//! ```rust
//! use grpcmw_core::{unary_fn, unary_handler_fn, Router, Status, UnaryCall};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let router = Router::server();
//! router
//!     .add_unary_interceptor(
//!         "/pkg.Greeter/Hello",
//!         [unary_fn(|mut call, next| async move {
//!             call.metadata.insert("greeted", "true");
//!             next.run(call).await
//!         })],
//!     )
//!     .unwrap();
//!
//! let echo = unary_handler_fn(|call: UnaryCall| async move { Ok::<_, Status>(call.request) });
//! let response = router
//!     .handle_unary(UnaryCall::new("/pkg.Greeter/Hello", json!("hi")), echo)
//!     .await
//!     .unwrap();
//! assert_eq!(response, json!("hi"));
//! # }
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::call::{CallDirection, Message, StreamCall, UnaryCall};
use crate::chain::{StreamChain, UnaryChain};
use crate::error::{GrpcmwError, RouteError};
use crate::interceptor::{
    StreamHandler, StreamInterceptor, StreamNext, UnaryHandler, UnaryInterceptor, UnaryNext,
};
use crate::level::Level;
use crate::registry::NamedRegistry;
use crate::resolver::{resolve, walk, ResolveMode, Resolution};
use crate::route::Route;
use crate::status::Status;

/// Index of the root level of every router.
pub const GLOBAL_INDEX: &str = "global";

/// Interceptor tree of one endpoint.
///
/// Cloning is cheap and shares the tree.
#[derive(Debug, Clone)]
pub struct Router {
    direction: CallDirection,
    root: Arc<Level>,
}

impl Router {
    /// Create a router with an empty tree.
    pub fn new(direction: CallDirection) -> Self {
        Self {
            direction,
            root: Arc::new(Level::register(GLOBAL_INDEX)),
        }
    }

    /// Router for incoming calls.
    pub fn server() -> Self {
        Self::new(CallDirection::Server)
    }

    /// Router for outgoing calls.
    pub fn client() -> Self {
        Self::new(CallDirection::Client)
    }

    #[allow(missing_docs)]
    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    /// Root level; its chains run for every call.
    pub fn global(&self) -> &Arc<Level> {
        &self.root
    }

    /// The level at `route`, creating it and its parents if needed.
    pub fn level(&self, route: &str) -> Result<Arc<Level>, RouteError> {
        let parsed = Route::parse(route)?;
        walk(&parsed.tokens(), &self.root, ResolveMode::Register, |_| {})?
            .ok_or_else(|| RouteError::invalid(route))
    }

    /// The level at `route`, if it has been registered.
    pub fn lookup(&self, route: &str) -> Result<Option<Arc<Level>>, RouteError> {
        let parsed = Route::parse(route)?;
        walk(&parsed.tokens(), &self.root, ResolveMode::Dispatch, |_| {})
    }

    /// Append unary interceptors at `route`.
    pub fn add_unary_interceptor(
        &self,
        route: &str,
        interceptors: impl IntoIterator<Item = Arc<dyn UnaryInterceptor>>,
    ) -> Result<(), RouteError> {
        let level = self.level(route)?;
        level.unary().add(interceptors);
        debug!(
            direction = %self.direction,
            route,
            total = level.unary().len(),
            "Registered unary interceptors"
        );
        Ok(())
    }

    /// Append stream interceptors at `route`.
    pub fn add_stream_interceptor(
        &self,
        route: &str,
        interceptors: impl IntoIterator<Item = Arc<dyn StreamInterceptor>>,
    ) -> Result<(), RouteError> {
        let level = self.level(route)?;
        level.stream().add(interceptors);
        debug!(
            direction = %self.direction,
            route,
            total = level.stream().len(),
            "Registered stream interceptors"
        );
        Ok(())
    }

    /// Merge the named bundles for `tags` into the level at `route`.
    pub fn merge_tags<T>(
        &self,
        route: &str,
        registry: &NamedRegistry,
        tags: impl IntoIterator<Item = T>,
    ) -> Result<Arc<Level>, RouteError>
    where
        T: AsRef<str>,
    {
        let level = self.level(route)?;
        registry.merge_into(&level, tags);
        Ok(level)
    }

    /// Unary chain a call to `method` would run, global scope first.
    pub fn unary_chain_for(&self, method: &str) -> Result<UnaryChain, RouteError> {
        Ok(dispatch(&self.root, method)?.unary_chain())
    }

    /// Stream chain a call to `method` would run, global scope first.
    pub fn stream_chain_for(&self, method: &str) -> Result<StreamChain, RouteError> {
        Ok(dispatch(&self.root, method)?.stream_chain())
    }

    /// The interceptor to install in the framework's unary slot.
    pub fn resolved_unary_interceptor(&self) -> Arc<dyn UnaryInterceptor> {
        Arc::new(self.resolver())
    }

    /// The interceptor to install in the framework's stream slot.
    pub fn resolved_stream_interceptor(&self) -> Arc<dyn StreamInterceptor> {
        Arc::new(self.resolver())
    }

    /// Run `call` through the resolved unary interceptor into `handler`.
    pub async fn handle_unary(
        &self,
        call: UnaryCall,
        handler: Arc<dyn UnaryHandler>,
    ) -> Result<Message, Status> {
        UnaryInterceptor::intercept(&self.resolver(), call, UnaryNext::new(handler)).await
    }

    /// Run `call` through the resolved stream interceptor into `handler`.
    pub async fn handle_stream(
        &self,
        call: StreamCall,
        handler: Arc<dyn StreamHandler>,
    ) -> Result<(), Status> {
        StreamInterceptor::intercept(&self.resolver(), call, StreamNext::new(handler)).await
    }

    /// Indented dump of the route tree.
    pub fn describe(&self) -> String {
        self.root.describe()
    }

    fn resolver(&self) -> RouteResolver {
        RouteResolver {
            root: self.root.clone(),
        }
    }
}

fn dispatch(root: &Arc<Level>, method: &str) -> Result<Resolution, RouteError> {
    let route = Route::parse(method)?;
    resolve(&route.tokens(), root, ResolveMode::Dispatch)
}

fn dispatch_failure(method: &str, err: RouteError) -> Status {
    warn!(method, error = %err, "Failed to resolve interceptors for call");
    Status::from(GrpcmwError::from(err))
}

/// Per-call chain builder installed in the framework.
struct RouteResolver {
    root: Arc<Level>,
}

#[async_trait]
impl UnaryInterceptor for RouteResolver {
    async fn intercept(&self, call: UnaryCall, next: UnaryNext) -> Result<Message, Status> {
        let composed = match dispatch(&self.root, call.method()) {
            Ok(resolution) => resolution.unary_chain().compose(),
            Err(err) => return Err(dispatch_failure(call.method(), err)),
        };
        composed.call(call, next.into_handler()).await
    }
}

#[async_trait]
impl StreamInterceptor for RouteResolver {
    async fn intercept(&self, call: StreamCall, next: StreamNext) -> Result<(), Status> {
        let composed = match dispatch(&self.root, call.method()) {
            Ok(resolution) => resolution.stream_chain().compose(),
            Err(err) => return Err(dispatch_failure(call.method(), err)),
        };
        composed.call(call, next.into_handler()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::{unary_fn, unary_handler_fn};
    use crate::status::Code;
    use assert_matches::assert_matches;
    use serde_json::json;
    use tracing_test::traced_test;

    fn pass() -> Arc<dyn UnaryInterceptor> {
        unary_fn(|call, next| next.run(call))
    }

    fn echo() -> Arc<dyn UnaryHandler> {
        unary_handler_fn(|call: UnaryCall| async move { Ok::<_, Status>(call.request) })
    }

    #[test]
    fn test_directions() {
        assert_eq!(Router::server().direction(), CallDirection::Server);
        assert_eq!(Router::client().direction(), CallDirection::Client);
        assert_eq!(Router::client().global().index(), GLOBAL_INDEX);
    }

    #[test]
    fn test_add_rejects_bad_route() {
        let router = Router::server();
        assert_matches!(
            router.add_unary_interceptor("pkg.Svc/Method", [pass()]),
            Err(RouteError::InvalidRoute { .. })
        );
        assert!(router.global().as_register().is_some_and(|r| r.is_empty()));
    }

    #[test]
    fn test_level_and_lookup() {
        let router = Router::server();
        assert_matches!(router.lookup("/pkg.Svc"), Ok(None));

        let level = router.level("/pkg.Svc").unwrap();
        let found = router.lookup("/pkg.Svc").unwrap().unwrap();
        assert!(Arc::ptr_eq(&level, &found));
        assert!(found.is_register());
    }

    #[test]
    fn test_chain_for_collects_scopes() {
        let router = Router::server();
        router.global().unary().push(pass());
        router.add_unary_interceptor("/pkg", [pass()]).unwrap();
        router.add_unary_interceptor("/pkg.Svc/Method", [pass(), pass()]).unwrap();

        assert_eq!(router.unary_chain_for("/pkg.Svc/Method").unwrap().len(), 4);
        assert_eq!(router.unary_chain_for("/pkg.Svc/Other").unwrap().len(), 2);
        assert_eq!(router.unary_chain_for("/other.Svc/Method").unwrap().len(), 1);
        assert!(router.stream_chain_for("/pkg.Svc/Method").unwrap().is_empty());
    }

    #[test]
    fn test_merge_tags() {
        let router = Router::client();
        let registry = NamedRegistry::new();
        registry.get("audit").unary().push(pass());

        let level = router.merge_tags("/pkg.Svc", &registry, ["audit", "audit"]).unwrap();
        assert_eq!(level.unary().len(), 2);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_dispatch_failure_is_logged() {
        let router = Router::server();
        let _ = router
            .handle_unary(UnaryCall::new("/pkg.Svc/", json!(null)), echo())
            .await;
        assert!(logs_contain("Failed to resolve interceptors for call"));
    }

    #[tokio::test]
    async fn test_handle_unary_with_invalid_method() {
        let router = Router::server();
        let err = router
            .handle_unary(UnaryCall::new("not-a-route", json!(null)), echo())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert!(err.message().contains("not-a-route"));
    }

    #[tokio::test]
    async fn test_resolved_interceptor_passes_through_unregistered() {
        let router = Router::server();
        let interceptor = router.resolved_unary_interceptor();
        let response = interceptor
            .intercept(
                UnaryCall::new("/pkg.Svc/Method", json!({"ok": true})),
                UnaryNext::new(echo()),
            )
            .await
            .unwrap();
        assert_eq!(response, json!({"ok": true}));
    }
}
