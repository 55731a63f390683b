//! Keyed cache of the last response per query.
//!
//! Keys are path-like segment lists (`["/api/users", "u1", "chat-messages"]`).
//! Writes are last-write-wins; mutations drop every key under a prefix.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

pub type QueryKey = Vec<String>;

pub fn key(parts: &[&str]) -> QueryKey {
    parts.iter().map(|p| p.to_string()).collect()
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
}

#[derive(Default, Clone)]
pub struct QueryCache {
    entries: Arc<RwLock<HashMap<QueryKey, Entry>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Any + Send + Sync>(&self, key: QueryKey, value: T) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            Entry {
                value: Arc::new(value),
                fetched_at: Instant::now(),
            },
        );
    }

    /// Cached value for `key` if present and of type `T`.
    pub fn get<T: Any + Send + Sync + Clone>(&self, key: &[String]) -> Option<T> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key)?.value.downcast_ref::<T>().cloned()
    }

    pub fn age(&self, key: &[String]) -> Option<std::time::Duration> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).map(|e| e.fetched_at.elapsed())
    }

    /// Drops every entry whose key starts with `prefix`. Returns how many were dropped.
    pub fn invalidate(&self, prefix: &[&str]) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|k, _| {
            !(k.len() >= prefix.len() && k.iter().zip(prefix).all(|(a, b)| a.as_str() == *b))
        });
        let dropped = before - entries.len();
        if dropped > 0 {
            log::debug!("invalidated {dropped} cached queries under {prefix:?}");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
