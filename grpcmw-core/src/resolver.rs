//! Walking the route tree along a route's tokens.
//!
//! The same walk serves registration, which creates missing levels, and call
//! dispatch, which never mutates the tree and stops quietly at the first gap.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::chain::{StreamChain, UnaryChain};
use crate::error::RouteError;
use crate::level::Level;

/// Token depth at which levels are created without children.
const METHOD_DEPTH: usize = 2;

/// How a walk treats missing levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Create missing levels; used when registering interceptors
    Register,
    /// Stop at the first missing level; used when dispatching calls
    Dispatch,
}

/// Walk from `root` along `tokens`, calling `visit` on every level reached,
/// root first.
///
/// Returns the level addressed by the last token, or `None` when a dispatch
/// walk hit a missing level. Walking below a level without children fails
/// with [`RouteError::NotARegister`].
pub fn walk<F>(
    tokens: &[&str],
    root: &Arc<Level>,
    mode: ResolveMode,
    mut visit: F,
) -> Result<Option<Arc<Level>>, RouteError>
where
    F: FnMut(&Arc<Level>),
{
    let mut current = root.clone();
    visit(&current);

    for (depth, token) in tokens.iter().enumerate() {
        let register = current
            .as_register()
            .ok_or_else(|| RouteError::NotARegister {
                index: current.index().to_string(),
                token: token.to_string(),
            })?;

        let child = match mode {
            ResolveMode::Register => {
                let (child, created) = register.get_or_create(token, |key| {
                    if depth >= METHOD_DEPTH {
                        Level::leaf(key)
                    } else {
                        Level::register(key)
                    }
                });
                if created {
                    debug!(parent = current.index(), level = *token, "Created route level");
                }
                child
            }
            ResolveMode::Dispatch => match register.get(token) {
                Some(child) => child,
                None => {
                    trace!(parent = current.index(), missing = *token, "Route level not registered");
                    return Ok(None);
                }
            },
        };

        trace!(level = child.index(), depth, "Visiting route level");
        visit(&child);
        current = child;
    }

    Ok(Some(current))
}

/// Levels collected by [`resolve`].
#[derive(Debug, Default)]
pub struct Resolution {
    /// Every level reached, root first
    pub visited: Vec<Arc<Level>>,
    /// The addressed level, if the walk got there
    pub target: Option<Arc<Level>>,
}

impl Resolution {
    /// Fresh chain holding every visited level's unary interceptors, root first.
    pub fn unary_chain(&self) -> UnaryChain {
        let chain = UnaryChain::new();
        chain.merge(self.visited.iter().map(|level| level.unary()));
        chain
    }

    /// Fresh chain holding every visited level's stream interceptors, root first.
    pub fn stream_chain(&self) -> StreamChain {
        let chain = StreamChain::new();
        chain.merge(self.visited.iter().map(|level| level.stream()));
        chain
    }
}

/// Walk like [`walk`], collecting the visited levels.
pub fn resolve(
    tokens: &[&str],
    root: &Arc<Level>,
    mode: ResolveMode,
) -> Result<Resolution, RouteError> {
    let mut visited = Vec::with_capacity(tokens.len() + 1);
    let target = walk(tokens, root, mode, |level| visited.push(level.clone()))?;
    Ok(Resolution { visited, target })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::unary_fn;
    use assert_matches::assert_matches;

    fn root() -> Arc<Level> {
        Arc::new(Level::register("global"))
    }

    fn indices(levels: &[Arc<Level>]) -> Vec<&str> {
        levels.iter().map(|level| level.index()).collect()
    }

    #[test]
    fn test_register_creates_path() {
        let root = root();
        let target = walk(&["pkg", "Svc", "Method"], &root, ResolveMode::Register, |_| {})
            .unwrap()
            .unwrap();
        assert_eq!(target.index(), "Method");
        assert!(!target.is_register());

        let pkg = root.as_register().and_then(|r| r.get("pkg")).unwrap();
        assert!(pkg.is_register());
        let svc = pkg.as_register().and_then(|r| r.get("Svc")).unwrap();
        assert!(svc.is_register());
        assert!(svc.as_register().and_then(|r| r.get("Method")).is_some());
    }

    #[test]
    fn test_shallow_routes_stay_registers() {
        let root = root();
        let pkg = walk(&["pkg"], &root, ResolveMode::Register, |_| {})
            .unwrap()
            .unwrap();
        assert!(pkg.is_register());

        let method = walk(&["pkg", "Svc", "Method"], &root, ResolveMode::Register, |_| {})
            .unwrap()
            .unwrap();
        assert_eq!(method.index(), "Method");
    }

    #[test]
    fn test_register_is_idempotent() {
        let root = root();
        let first = walk(&["pkg", "Svc"], &root, ResolveMode::Register, |_| {})
            .unwrap()
            .unwrap();
        let second = walk(&["pkg", "Svc"], &root, ResolveMode::Register, |_| {})
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_dispatch_visits_root_to_leaf() {
        let root = root();
        walk(&["pkg", "Svc", "Method"], &root, ResolveMode::Register, |_| {}).unwrap();

        let resolution = resolve(&["pkg", "Svc", "Method"], &root, ResolveMode::Dispatch).unwrap();
        assert_eq!(indices(&resolution.visited), vec!["global", "pkg", "Svc", "Method"]);
        assert_eq!(resolution.target.map(|t| t.index().to_string()), Some("Method".into()));
    }

    #[test]
    fn test_dispatch_stops_at_gap() {
        let root = root();
        walk(&["pkg", "Svc"], &root, ResolveMode::Register, |_| {}).unwrap();

        let resolution = resolve(&["pkg", "Svc", "Other"], &root, ResolveMode::Dispatch).unwrap();
        assert!(resolution.target.is_none());
        assert_eq!(indices(&resolution.visited), vec!["global", "pkg", "Svc"]);

        let missing = resolve(&["nope", "Svc"], &root, ResolveMode::Dispatch).unwrap();
        assert_eq!(indices(&missing.visited), vec!["global"]);
        assert_eq!(root.as_register().map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_walk_below_leaf_fails() {
        let root = root();
        if let Some(children) = root.as_register() {
            children.register(Level::leaf("pkg"));
        }

        for mode in [ResolveMode::Register, ResolveMode::Dispatch] {
            assert_matches!(
                walk(&["pkg", "Svc"], &root, mode, |_| {}),
                Err(RouteError::NotARegister { index, token }) if index == "pkg" && token == "Svc"
            );
        }
    }

    #[test]
    fn test_resolution_merges_chains_in_order() {
        let root = root();
        let pass = || unary_fn(|call, next| next.run(call));
        root.unary().push(pass());
        let svc = walk(&["pkg", "Svc"], &root, ResolveMode::Register, |_| {})
            .unwrap()
            .unwrap();
        svc.unary().add([pass(), pass()]);

        let resolution = resolve(&["pkg", "Svc", "Method"], &root, ResolveMode::Dispatch).unwrap();
        assert_eq!(resolution.unary_chain().len(), 3);
        assert!(resolution.stream_chain().is_empty());
        assert_eq!(svc.unary().len(), 2);
    }
}
