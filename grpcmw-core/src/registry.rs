//! Tagged interceptor bundles, independent of any route tree.
//!
//! A bundle is authored once under a tag and then merged into as many route
//! levels as need it. The registry must be populated before routes merge its
//! tags; merging a tag nobody defined creates an empty bundle for it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::level::Level;

/// Flat store of levels keyed by tag.
#[derive(Default)]
pub struct NamedRegistry {
    entries: Mutex<HashMap<String, Arc<Level>>>,
}

impl NamedRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundle stored under `tag`, created empty on first use.
    pub fn get(&self, tag: &str) -> Arc<Level> {
        self.entries
            .lock()
            .entry(tag.to_string())
            .or_insert_with(|| {
                debug!(tag, "Created named bundle");
                Arc::new(Level::leaf(tag))
            })
            .clone()
    }

    /// Store `level` under `tag`, returning the bundle it replaced.
    pub fn set(&self, tag: impl Into<String>, level: impl Into<Arc<Level>>) -> Option<Arc<Level>> {
        self.entries.lock().insert(tag.into(), level.into())
    }

    /// Remove the bundle stored under `tag`.
    pub fn delete(&self, tag: &str) -> Option<Arc<Level>> {
        self.entries.lock().remove(tag)
    }

    #[allow(missing_docs)]
    pub fn contains(&self, tag: &str) -> bool {
        self.entries.lock().contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.entries.lock().keys().cloned().collect();
        tags.sort();
        tags
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Append the bundles for `tags` to `target`, in the order given.
    pub fn merge_into<T>(&self, target: &Level, tags: impl IntoIterator<Item = T>)
    where
        T: AsRef<str>,
    {
        for tag in tags {
            let bundle = self.get(tag.as_ref());
            target.merge([bundle.as_ref()]);
        }
    }
}

impl fmt::Debug for NamedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}
