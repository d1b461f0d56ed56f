//! Result caching with at-most-one build per key.
//!
//! [`ResultCache`] hands every caller of a key the same in-flight slot. The
//! first caller runs the build; concurrent callers wait on it and share the
//! outcome. Successes stay cached, failures are shared with the waiters of
//! that flight and then evicted so the next call builds again.

mod key;

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::{Error, Result};

pub use key::CacheKey;

type Slot<V> = Arc<OnceCell<std::result::Result<V, Arc<Error>>>>;

/// Get-or-create cache keyed by string.
#[derive(Debug)]
pub struct ResultCache<V> {
    slots: DashMap<String, Slot<V>>,
}

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }
}

impl<V: Clone> ResultCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, running `create` if no build for it
    /// has completed or is in flight.
    pub async fn get_or_create<F, Fut>(&self, key: &str, create: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let slot: Slot<V> = Arc::clone(
            &*self
                .slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );

        if slot.initialized() {
            tracing::debug!(key, "result cache hit");
        }

        let outcome = slot
            .get_or_init(|| async {
                tracing::debug!(key, "result cache miss, building");
                create().await.map_err(Arc::new)
            })
            .await;

        match outcome {
            Ok(value) => Ok(value.clone()),
            Err(err) => {
                self.slots.remove_if(key, |_, current| Arc::ptr_eq(current, &slot));
                Err(Error::Shared(Arc::clone(err)))
            }
        }
    }

    /// The completed value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        let slot = self.slots.get(key)?;
        match slot.get() {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}
