//! Resolved-schema cache.
//!
//! Readers resolve object schemas through the cache; schema mutations evict
//! the entries they touch before applying storage changes and again after
//! commit. Every eviction bumps a generation counter, and a reader only
//! stores what it loaded if the generation is unchanged since it started,
//! so a load that raced a mutation can never reinstate a stale schema.

use crate::schema::ObjectSchema;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Cache of resolved object schemas keyed by object short name.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<String, Arc<ObjectSchema>>>,
    generation: AtomicU64,
}

impl SchemaCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached schema for `object`, if any.
    pub fn get(&self, object: &str) -> Option<Arc<ObjectSchema>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(object)
            .cloned()
    }

    /// The current generation. Take it before loading from storage.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Stores `schema` unless an eviction happened after `loaded_at`.
    /// Returns whether it was stored.
    pub fn insert_if_current(&self, schema: Arc<ObjectSchema>, loaded_at: u64) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::Acquire) != loaded_at {
            tracing::trace!(object = schema.name(), "skipping stale schema load");
            return false;
        }
        entries.insert(schema.name().to_string(), schema);
        true
    }

    /// Evicts the named objects and bumps the generation.
    pub fn evict<I, S>(&self, objects: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::AcqRel);
        for object in objects {
            entries.remove(object.as_ref());
        }
    }

    /// Number of cached schemas.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
