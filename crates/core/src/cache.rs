//! Reloadable key/value cache.
//!
//! A cache holds one immutable snapshot (`Arc<HashMap>`) that is replaced wholesale on reload.
//! Publishing a new snapshot is a single atomic pointer swap, so reads take no lock and see
//! either the old or the new complete map. The previous map is freed by whoever drops the last
//! reference to it, never while a reader is waiting.
//!
//! Reload failures are absorbed: an error or an empty result keeps the previous snapshot.
//! The only time a reader waits on a fetch is the lazy bootstrap, when no snapshot has ever
//! been loaded.

use crate::collaborators::CollaboratorResult;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use arc_swap::ArcSwapOption;
use std::sync::{Arc, Mutex, PoisonError};

/// Source of a full replacement snapshot.
pub type Loader<K, V> = Box<dyn Fn() -> CollaboratorResult<HashMap<K, V>> + Send + Sync>;

/// Anything the periodic refresh task can drive.
pub trait Reloadable: Send + Sync {
    fn name(&self) -> &str;

    /// Refresh from the source. Never fails; problems are logged.
    fn reload(&self);
}

pub struct ReloadableCache<K, V> {
    name: String,
    loader: Loader<K, V>,
    snapshot: ArcSwapOption<HashMap<K, V>>,
    bootstrap: Mutex<()>,
}

impl<K, V> ReloadableCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new(name: impl Into<String>, loader: Loader<K, V>) -> Self {
        Self {
            name: name.into(),
            loader,
            snapshot: ArcSwapOption::empty(),
            bootstrap: Mutex::new(()),
        }
    }

    /// Looks up `key`, loading the first snapshot inline if none has been loaded yet.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + Debug + ?Sized,
    {
        let snapshot = match self.snapshot() {
            Some(snapshot) => snapshot,
            None => self.bootstrap()?,
        };

        let value = snapshot.get(key).cloned();
        if value.is_none() {
            tracing::debug!(
                cache = %self.name,
                size = snapshot.len(),
                key = ?key,
                "cache miss"
            );
        }
        value
    }

    /// Current snapshot, if one has been loaded.
    pub fn snapshot(&self) -> Option<Arc<HashMap<K, V>>> {
        self.snapshot.load_full()
    }

    pub fn len(&self) -> usize {
        self.snapshot().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Fetch a replacement snapshot and publish it if it is non-empty.
    ///
    /// Returns `true` if a new snapshot was published.
    pub fn refresh(&self) -> bool {
        let loaded = match (self.loader)() {
            Ok(map) => map,
            Err(err) => {
                tracing::warn!(
                    cache = %self.name,
                    size = self.len(),
                    error = %err,
                    "cache reload failed; keeping previous snapshot"
                );
                return false;
            }
        };

        if loaded.is_empty() {
            tracing::warn!(
                cache = %self.name,
                size = self.len(),
                "cache reload returned no entries; keeping previous snapshot"
            );
            return false;
        }

        let size = loaded.len();
        self.snapshot.store(Some(Arc::new(loaded)));
        tracing::info!(cache = %self.name, size, "cache reloaded");
        true
    }

    fn bootstrap(&self) -> Option<Arc<HashMap<K, V>>> {
        let _guard = self.bootstrap.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have finished the bootstrap while we waited.
        if let Some(snapshot) = self.snapshot() {
            return Some(snapshot);
        }
        tracing::info!(cache = %self.name, "cache not loaded; loading inline");
        self.refresh();
        self.snapshot()
    }
}

impl<K, V> Reloadable for ReloadableCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn reload(&self) {
        self.refresh();
    }
}

impl<K, V> Debug for ReloadableCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadableCache")
            .field("name", &self.name)
            .field("size", &self.len())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
