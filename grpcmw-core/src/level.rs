//! The route tree: levels and registers.
//!
//! Every addressable scope is a [`Level`] holding one unary and one stream
//! chain. Package and service scopes (and the global root) additionally carry
//! a [`Register`] of children, so a container is still a chain-holder in its
//! own right.

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::chain::{StreamChain, UnaryChain};

/// A named scope in the route tree.
pub struct Level {
    index: String,
    unary: UnaryChain,
    stream: StreamChain,
    children: Option<Register>,
}

impl Level {
    /// Create a level without children (method scope, or a named bundle).
    pub fn leaf(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            unary: UnaryChain::new(),
            stream: StreamChain::new(),
            children: None,
        }
    }

    /// Create a level that can hold children.
    pub fn register(index: impl Into<String>) -> Self {
        Self {
            children: Some(Register::new()),
            ..Self::leaf(index)
        }
    }

    /// Identity of the level within its parent.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Chain applied to unary calls passing through this level.
    pub fn unary(&self) -> &UnaryChain {
        &self.unary
    }

    /// Chain applied to streaming calls passing through this level.
    pub fn stream(&self) -> &StreamChain {
        &self.stream
    }

    /// Append the chains of every level in `others` to this level's chains.
    pub fn merge<'a>(&self, others: impl IntoIterator<Item = &'a Level>) -> &Self {
        for other in others {
            self.unary.merge([&other.unary]);
            self.stream.merge([&other.stream]);
        }
        self
    }

    /// Children of this level, if it is a container.
    pub fn as_register(&self) -> Option<&Register> {
        self.children.as_ref()
    }

    #[allow(missing_docs)]
    pub fn is_register(&self) -> bool {
        self.children.is_some()
    }

    /// Indented dump of the subtree rooted here, children in key order.
    ///
    /// ```rust
    /// use grpcmw_core::Level;
    ///
    /// let root = Level::register("global");
    /// if let Some(children) = root.as_register() {
    ///     children.register(Level::leaf("pkg"));
    /// }
    /// assert_eq!(
    ///     root.describe(),
    ///     "global/ (unary: 0, stream: 0)\n  pkg (unary: 0, stream: 0)\n"
    /// );
    /// ```
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_into(0, &mut out);
        out
    }

    fn describe_into(&self, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.index);
        if self.is_register() {
            out.push('/');
        }
        out.push_str(&format!(
            " (unary: {}, stream: {})\n",
            self.unary.len(),
            self.stream.len()
        ));

        if let Some(children) = &self.children {
            for key in children.keys() {
                if let Some(child) = children.get(&key) {
                    child.describe_into(depth + 1, out);
                }
            }
        }
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("index", &self.index)
            .field("unary", &self.unary.len())
            .field("stream", &self.stream.len())
            .field("children", &self.children)
            .finish()
    }
}

/// Children of a container level, keyed by their index.
#[derive(Default)]
pub struct Register {
    children: RwLock<HashMap<String, Arc<Level>>>,
}

impl Register {
    /// Create an empty register.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a child.
    pub fn get(&self, key: &str) -> Option<Arc<Level>> {
        self.children.read().get(key).cloned()
    }

    /// Store `level` under its index, returning the child it displaced.
    ///
    /// Re-registering an index silently replaces the previous child and
    /// everything below it.
    pub fn register(&self, level: impl Into<Arc<Level>>) -> Option<Arc<Level>> {
        let level = level.into();
        self.children.write().insert(level.index.clone(), level)
    }

    /// Return the child at `key`, creating it with `make` if absent.
    ///
    /// The flag is `true` when this call created the child. Concurrent callers
    /// racing on the same key all receive the same child.
    pub fn get_or_create<F>(&self, key: &str, make: F) -> (Arc<Level>, bool)
    where
        F: FnOnce(&str) -> Level,
    {
        let children = self.children.upgradable_read();
        if let Some(existing) = children.get(key) {
            return (existing.clone(), false);
        }

        let mut children = RwLockUpgradableReadGuard::upgrade(children);
        let level = Arc::new(make(key));
        children.insert(key.to_string(), level.clone());
        (level, true)
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.read().len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.children.read().is_empty()
    }

    /// Child keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.children.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}
