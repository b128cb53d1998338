//! Route strings and their tokens.
//!
//! A route names one scope of the tree:
//!
//! | route | scope |
//! |---|---|
//! | `/pkg` | package |
//! | `/pkg.Service` | service |
//! | `/pkg.Service/Method` | method |
//!
//! Packages may be dotted (`/acme.billing.Invoices/Create`). Services and
//! methods never contain dots, so the last dot before the service splits the
//! package from the service.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::RouteError;

static ROUTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^/(?:(?P<package>[^./]+(?:\.[^./]+)*)\.(?:(?P<service>[^./]+)/(?P<method>[^./]+)|(?P<bare_service>[^./]+))|(?P<bare_package>[^./]+))$",
    )
    .expect("route pattern compiles")
});

/// Depth a route addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum Scope {
    Package,
    Service,
    Method,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Package => f.write_str("package"),
            Scope::Service => f.write_str("service"),
            Scope::Method => f.write_str("method"),
        }
    }
}

/// A parsed route.
///
/// ```rust
/// use grpcmw_core::{Route, Scope};
///
/// let route: Route = "/acme.billing.Invoices/Create".parse().unwrap();
/// assert_eq!(route.tokens(), vec!["acme.billing", "Invoices", "Create"]);
/// assert_eq!(route.scope(), Scope::Method);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    package: String,
    service: Option<String>,
    method: Option<String>,
}

impl Route {
    /// Parse a fully-qualified path.
    pub fn parse(route: &str) -> Result<Self, RouteError> {
        let captures = ROUTE_PATTERN
            .captures(route)
            .ok_or_else(|| RouteError::invalid(route))?;
        let group = |name: &str| captures.name(name).map(|m| m.as_str().to_string());

        if let Some(package) = group("bare_package") {
            return Ok(Self::package(package));
        }

        let package = group("package").ok_or_else(|| RouteError::invalid(route))?;
        match (group("service"), group("method"), group("bare_service")) {
            (Some(service), Some(method), None) => {
                Ok(Self::package(package).with_service(service).with_method(method))
            }
            (None, None, Some(service)) => Ok(Self::package(package).with_service(service)),
            _ => Err(RouteError::invalid(route)),
        }
    }

    /// Route addressing a whole package.
    pub fn package(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            service: None,
            method: None,
        }
    }

    /// Narrow the route to a service.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Narrow the route to a method. Only meaningful once a service is set.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[allow(missing_docs)]
    pub fn package_name(&self) -> &str {
        &self.package
    }

    #[allow(missing_docs)]
    pub fn service_name(&self) -> Option<&str> {
        self.service.as_deref()
    }

    #[allow(missing_docs)]
    pub fn method_name(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Path through the tree, outermost scope first.
    pub fn tokens(&self) -> Vec<&str> {
        let mut tokens = vec![self.package.as_str()];
        if let Some(service) = &self.service {
            tokens.push(service);
            if let Some(method) = &self.method {
                tokens.push(method);
            }
        }
        tokens
    }

    /// Depth this route addresses.
    pub fn scope(&self) -> Scope {
        match (&self.service, &self.method) {
            (None, _) => Scope::Package,
            (Some(_), None) => Scope::Service,
            (Some(_), Some(_)) => Scope::Method,
        }
    }
}

impl FromStr for Route {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.package)?;
        if let Some(service) = &self.service {
            write!(f, ".{}", service)?;
            if let Some(method) = &self.method {
                write!(f, "/{}", method)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_accepted_shapes() {
        let cases: &[(&str, &[&str], Scope)] = &[
            ("/pkg", &["pkg"], Scope::Package),
            ("/pkg.Svc", &["pkg", "Svc"], Scope::Service),
            ("/pkg.Svc/Method", &["pkg", "Svc", "Method"], Scope::Method),
            ("/a.b.Svc/M", &["a.b", "Svc", "M"], Scope::Method),
            ("/a.b", &["a", "b"], Scope::Service),
            ("/a.b.c", &["a.b", "c"], Scope::Service),
            (
                "/grpc.health.v1.Health/Check",
                &["grpc.health.v1", "Health", "Check"],
                Scope::Method,
            ),
        ];

        for (input, tokens, scope) in cases {
            let route = Route::parse(input).unwrap();
            assert_eq!(route.tokens(), *tokens, "tokens of {input}");
            assert_eq!(route.scope(), *scope, "scope of {input}");
            assert_eq!(route.to_string(), *input);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in [
            "",
            "/",
            "pkg.Svc/Method",
            "/pkg.Svc/",
            "/pkg..Svc",
            "/.pkg",
            "/pkg.",
            "/pkg.Svc/Method/Extra",
            "/pkg.Svc/Me.thod",
            "/Svc/Method",
            "//Method",
        ] {
            assert_matches!(
                Route::parse(input),
                Err(RouteError::InvalidRoute { route }) if route == input,
                "{input:?} should not parse"
            );
        }
    }

    #[test]
    fn test_builders_match_parser() {
        let built = Route::package("acme.billing")
            .with_service("Invoices")
            .with_method("Create");
        assert_eq!(built.to_string(), "/acme.billing.Invoices/Create");
        assert_eq!("/acme.billing.Invoices/Create".parse::<Route>().unwrap(), built);
        assert_eq!(built.package_name(), "acme.billing");
        assert_eq!(built.service_name(), Some("Invoices"));
        assert_eq!(built.method_name(), Some("Create"));
    }

    #[test]
    fn test_scope_ordering() {
        assert!(Scope::Package < Scope::Service);
        assert!(Scope::Service < Scope::Method);
        assert_eq!(Scope::Method.to_string(), "method");
    }
}
