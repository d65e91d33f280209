//! Persistent layered metadata store.
//!
//! ```text
//! doc_b.metadata ──► Layer { Title = "B" } ─┐
//!                                           ├──► Layer { Title = "A", Author = "x" } ──► settings
//! doc_a.metadata ───────────────────────────┘
//! ```
//!
//! Pushing a layer never copies or mutates existing layers, so forking a
//! document's metadata costs one small map.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use super::value::{FromMeta, MetaValue};

/// One frozen layer. Keys are stored lowercased alongside their original spelling.
struct Layer {
    items: IndexMap<String, (String, MetaValue)>,
    parent: Option<Arc<Layer>>,
}

/// Immutable stack of metadata layers with case-insensitive keys.
///
/// Lookups scan from the most recently pushed layer down, so newer keys
/// shadow older ones. Cloning is an `Arc` bump.
#[derive(Clone, Default)]
pub struct MetadataStack {
    top: Option<Arc<Layer>>,
}

impl MetadataStack {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a single-layer store.
    pub fn from_items<K, V>(items: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<MetaValue>,
    {
        Self::new().push(items)
    }

    /// Return a new store with `items` layered on top of this one.
    ///
    /// `self` is left untouched and shares every existing layer with the result.
    /// Pushing nothing returns a clone.
    pub fn push<K, V>(&self, items: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<MetaValue>,
    {
        let mut map = IndexMap::new();
        for (key, value) in items {
            let key = key.into();
            map.insert(key.to_lowercase(), (key, value.into()));
        }
        if map.is_empty() {
            return self.clone();
        }
        Self {
            top: Some(Arc::new(Layer {
                items: map,
                parent: self.top.clone(),
            })),
        }
    }

    /// Layer all of `other`'s visible entries on top of this store.
    pub fn push_stack(&self, other: &MetadataStack) -> Self {
        let mut items: Vec<_> = other
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        // `iter` yields newest first; insert oldest first so order reads naturally.
        items.reverse();
        self.push(items)
    }

    /// Look up a raw value.
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        let key = key.to_lowercase();
        self.layers()
            .find_map(|layer| layer.items.get(&key).map(|(_, v)| v))
    }

    /// Look up and coerce a value. Coercion failures read as missing.
    pub fn get_as<T: FromMeta>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(T::from_meta)
    }

    /// Look up and coerce a value, falling back to `default`.
    pub fn get_or<T: FromMeta>(&self, key: &str, default: T) -> T {
        self.get_as(key).unwrap_or(default)
    }

    /// Shorthand for `get_as::<String>`.
    pub fn string(&self, key: &str) -> Option<String> {
        self.get_as(key)
    }

    /// Shorthand for `get_or(key, false)`.
    pub fn bool(&self, key: &str) -> bool {
        self.get_or(key, false)
    }

    /// Whether any layer defines `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Visible entries: topmost layer first, insertion order within a layer,
    /// shadowed keys omitted.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> + '_ {
        let mut seen = FxHashSet::default();
        self.layers()
            .flat_map(|layer| layer.items.iter())
            .filter(move |(lower, _)| seen.insert(*lower))
            .map(|(_, (key, value))| (key.as_str(), value))
    }

    /// Visible keys, in [`iter`](Self::iter) order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Number of visible keys.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether no key is visible.
    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    /// Number of layers.
    pub fn depth(&self) -> usize {
        self.layers().count()
    }

    fn layers(&self) -> impl Iterator<Item = &Layer> {
        std::iter::successors(self.top.as_deref(), |layer| layer.parent.as_deref())
    }
}

impl fmt::Debug for MetadataStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<MetaValue>> FromIterator<(K, V)> for MetadataStack {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_items(iter)
    }
}
