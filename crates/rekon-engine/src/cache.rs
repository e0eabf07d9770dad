//! Two-tier resolution cache.
//!
//! The operation scope holds at most one window and one child handle for
//! the step in progress. The application scope keeps every resolved
//! handle per map until it is cleared. Handles go stale silently, so a
//! single failed existence probe drops everything cached for that map.

use crate::engine::{Engine, ObjectHandle, release};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub map: String,
    pub window: String,
    pub child: Option<String>,
}

impl CacheKey {
    pub fn window(map: &str, window: &str) -> Self {
        Self {
            map: map.to_string(),
            window: window.to_string(),
            child: None,
        }
    }

    pub fn child(map: &str, window: &str, child: &str) -> Self {
        Self {
            map: map.to_string(),
            window: window.to_string(),
            child: Some(child.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    Operation,
    Application,
}

#[derive(Debug, Default)]
struct OperationSlot {
    window: Option<(CacheKey, ObjectHandle)>,
    child: Option<(CacheKey, ObjectHandle)>,
}

impl OperationSlot {
    fn slot(&self, key: &CacheKey) -> &Option<(CacheKey, ObjectHandle)> {
        if key.child.is_some() { &self.child } else { &self.window }
    }

    fn slot_mut(&mut self, key: &CacheKey) -> &mut Option<(CacheKey, ObjectHandle)> {
        if key.child.is_some() {
            &mut self.child
        } else {
            &mut self.window
        }
    }

    fn drain(&mut self, map: Option<&str>) -> Vec<ObjectHandle> {
        let mut drained = Vec::new();
        for slot in [&mut self.window, &mut self.child] {
            let hit = slot
                .as_ref()
                .is_some_and(|(k, _)| map.is_none_or(|m| k.map == m));
            if hit {
                if let Some((_, handle)) = slot.take() {
                    drained.push(handle);
                }
            }
        }
        drained
    }
}

#[derive(Debug, Default)]
pub struct ResolutionCache {
    operation: OperationSlot,
    application: HashMap<String, HashMap<CacheKey, ObjectHandle>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: CacheScope, key: &CacheKey) -> Option<ObjectHandle> {
        match scope {
            CacheScope::Operation => self
                .operation
                .slot(key)
                .as_ref()
                .filter(|(k, _)| k == key)
                .map(|(_, h)| *h),
            CacheScope::Application => self.application.get(&key.map)?.get(key).copied(),
        }
    }

    pub fn put(&mut self, scope: CacheScope, key: CacheKey, handle: ObjectHandle) {
        match scope {
            CacheScope::Operation => {
                let slot = self.operation.slot_mut(&key);
                *slot = Some((key, handle));
            }
            CacheScope::Application => {
                self.application
                    .entry(key.map.clone())
                    .or_default()
                    .insert(key, handle);
            }
        }
    }

    /// Forget the step in progress without releasing anything; the same
    /// handles may still live in the application scope.
    pub fn reset_operation(&mut self) {
        self.operation = OperationSlot::default();
    }

    /// Number of application-scope entries for `map`.
    pub fn len(&self, map: &str) -> usize {
        self.application.get(map).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.application.values().all(HashMap::is_empty)
            && self.operation.window.is_none()
            && self.operation.child.is_none()
    }

    /// Drop one scope entirely, releasing the engine registrations held by
    /// its handles.
    pub async fn invalidate_all<E: Engine + ?Sized>(&mut self, scope: CacheScope, engine: &E) {
        let handles = match scope {
            CacheScope::Operation => self.operation.drain(None),
            CacheScope::Application => self
                .application
                .drain()
                .flat_map(|(_, entries)| entries.into_values())
                .collect(),
        };
        debug!(?scope, count = handles.len(), "cache invalidated");
        release_all(engine, handles).await;
    }

    /// Drop everything cached for `map` in both scopes.
    pub async fn purge_map<E: Engine + ?Sized>(&mut self, map: &str, engine: &E) {
        let mut handles = self.operation.drain(Some(map));
        if let Some(entries) = self.application.remove(map) {
            handles.extend(entries.into_values());
        }
        debug!(map, count = handles.len(), "map cache purged");
        release_all(engine, handles).await;
    }
}

async fn release_all<E: Engine + ?Sized>(engine: &E, handles: Vec<ObjectHandle>) {
    let mut seen = HashSet::new();
    for handle in handles {
        if seen.insert(handle.id) {
            release(engine, &handle).await;
        }
    }
}
