//! Name to live-handle resolution.
//!
//! Lookup order for a window:
//! 1. the operation-scope cache, then the application-scope cache, each
//!    entry confirmed by a short bounded existence probe;
//! 2. the engine's pre-registered named-object table;
//! 3. hierarchical search driven by the stored recognition string.
//!
//! Children follow the same order below their resolved window. A stale
//! cache entry purges the whole map and falls through to the next step.

use super::search::Searcher;
use crate::cache::{CacheKey, CacheScope};
use crate::classifier::{domain_for_type, is_menu_type, logical_type};
use crate::config::ConfigError;
use crate::engine::{Engine, ObjectHandle, release};
use crate::enumerator::{WindowQuery, activate_surfaces, children};
use crate::error::ResolveError;
use crate::matcher;
use crate::probe::{self, Attribute, read_property};
use crate::session::Session;
use crate::store::RecognitionStore;
use crate::wait::poll_until;
use rekon_common::qualifier::{PATH_SEPARATOR, compare_text};
use rekon_common::recognition::strip_parent_prefix;
use rekon_common::{MapEntry, RecognitionPath, SearchMode, ValuePattern};
use std::time::Duration;
use tracing::{debug, info, warn};

const WILDCARD: char = '*';
const MAX_ANCESTRY: usize = 256;

/// Administrative cache invalidation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheTarget {
    Map(String),
    All,
}

pub struct ObjectResolver<'a, E: Engine + ?Sized, S: RecognitionStore + ?Sized> {
    engine: &'a E,
    store: &'a S,
}

impl<'a, E, S> ObjectResolver<'a, E, S>
where
    E: Engine + ?Sized,
    S: RecognitionStore + ?Sized,
{
    pub fn new(engine: &'a E, store: &'a S) -> Self {
        Self { engine, store }
    }

    pub fn engine(&self) -> &'a E {
        self.engine
    }

    /// Resolve a mapped window.
    ///
    /// `ignore_cache` resets the operation scope and skips both cache tiers.
    pub async fn resolve_window(
        &self,
        session: &mut Session,
        map: &str,
        window: &str,
        ignore_cache: bool,
    ) -> Result<Option<ObjectHandle>, ResolveError> {
        let key = CacheKey::window(map, window);
        if ignore_cache {
            session.begin_operation();
        } else if let Some(handle) = self.cached(session, &key).await {
            return Ok(Some(handle));
        }

        let Some(raw) = self.store.recognition(map, window, None).await? else {
            debug!(map, window, "window not mapped");
            return Ok(None);
        };
        let entry = MapEntry::parse(&raw);

        if let Some(handle) = self.named(session, window).await {
            self.remember(session, key, handle, entry.dynamic);
            return Ok(Some(handle));
        }

        let path = match RecognitionPath::parse(&entry.recognition) {
            Ok(path) => path,
            Err(e) => {
                warn!(map, window, error = %e, "malformed window recognition");
                return Ok(None);
            }
        };

        let dynamic = entry.dynamic || path.segments.iter().any(|s| s.is_current_window());
        let found = self.search_window(session, &path).await;
        match found {
            Some(handle) => self.remember(session, key, handle, dynamic),
            None => debug!(map, window, "window not found"),
        }
        Ok(found)
    }

    /// Resolve a mapped child of a mapped window.
    ///
    /// With `disambiguation`, every structural match is appended to the
    /// list; the first one is returned. A child named like its window is
    /// the window itself.
    pub async fn resolve_child(
        &self,
        session: &mut Session,
        map: &str,
        window: &str,
        child: &str,
        ignore_cache: bool,
        disambiguation: Option<&mut Vec<ObjectHandle>>,
    ) -> Result<Option<ObjectHandle>, ResolveError> {
        if child.eq_ignore_ascii_case(window) {
            return self.resolve_window(session, map, window, ignore_cache).await;
        }
        let Some(parent) = self.resolve_window(session, map, window, ignore_cache).await? else {
            return Ok(None);
        };

        let key = CacheKey::child(map, window, child);
        let gather = disambiguation.is_some();
        if !ignore_cache && !gather {
            if let Some(handle) = self.cached_child(session, &key, &parent).await {
                return Ok(Some(handle));
            }
        }

        let Some(raw) = self.store.recognition(map, window, Some(child)).await? else {
            debug!(map, window, child, "child not mapped");
            return Ok(None);
        };
        let entry = MapEntry::parse(&raw);

        if !gather {
            if let Some(handle) = self.named(session, &format!("{}.{}", window, child)).await {
                self.remember(session, key, handle, entry.dynamic);
                return Ok(Some(handle));
            }
        }

        let recognition = self.below_window(map, window, &entry.recognition).await?;
        Ok(self
            .search_child(session, &parent, key, &recognition, entry.dynamic, disambiguation)
            .await)
    }

    /// Resolve a child whose recognition ends in `*`, with `name` put in
    /// place of the wildcard. The match is cached under `name`.
    pub async fn resolve_wildcard_child(
        &self,
        session: &mut Session,
        map: &str,
        window: &str,
        child: &str,
        name: &str,
        ignore_cache: bool,
    ) -> Result<Option<ObjectHandle>, ResolveError> {
        let Some(parent) = self.resolve_window(session, map, window, ignore_cache).await? else {
            return Ok(None);
        };

        let key = CacheKey::child(map, window, name);
        if !ignore_cache {
            if let Some(handle) = self.cached_child(session, &key, &parent).await {
                return Ok(Some(handle));
            }
        }

        let Some(raw) = self.store.recognition(map, window, Some(child)).await? else {
            debug!(map, window, child, "child not mapped");
            return Ok(None);
        };
        let entry = MapEntry::parse(&raw);
        let Some(stem) = entry.recognition.strip_suffix(WILDCARD) else {
            info!(map, window, child, "wildcard recognition must end with '*'");
            return Ok(None);
        };

        let recognition = self.below_window(map, window, &format!("{}{}", stem, name)).await?;
        Ok(self
            .search_child(session, &parent, key, &recognition, entry.dynamic, None)
            .await)
    }

    /// First mappable child of `handle` whose `property` equals `expected`,
    /// or contains it ignoring case when `exact` is false.
    pub async fn find_property_matched_child(
        &self,
        handle: &ObjectHandle,
        property: &str,
        expected: &str,
        exact: bool,
    ) -> Option<ObjectHandle> {
        let candidates = match self.engine.mappable_children(handle).await {
            Ok(candidates) => candidates,
            Err(e) => {
                debug!(id = handle.id, error = %e, "mappable children unavailable");
                return None;
            }
        };
        let expected_lower = expected.to_lowercase();
        for candidate in candidates {
            let candidate = candidate.or_domain(handle.domain);
            let Some(value) = read_property(self.engine, &candidate, property).await else {
                continue;
            };
            let matched = if exact {
                value == expected
            } else {
                value.to_lowercase().contains(&expected_lower)
            };
            if matched {
                return Some(candidate);
            }
        }
        debug!(id = handle.id, property, expected, "no child matched property");
        None
    }

    pub async fn clear_cache(&self, session: &mut Session, target: CacheTarget) {
        match target {
            CacheTarget::Map(map) => session.cache_mut().purge_map(&map, self.engine).await,
            CacheTarget::All => session.clear(self.engine).await,
        }
    }

    /// Children as resolution sees them (menu-aware).
    pub async fn children(&self, handle: &ObjectHandle) -> Vec<ObjectHandle> {
        let handle_type = logical_type(self.engine, handle, false).await.ok().flatten();
        children(self.engine, handle, SearchMode::Classic, handle_type.as_deref()).await
    }

    pub async fn probe(&self, handle: &ObjectHandle, attribute: Attribute) -> String {
        probe::probe(self.engine, handle, attribute).await
    }

    /// Sub-item reached by a `->` path such as `File->Save As`.
    pub async fn resolve_path(
        &self,
        session: &mut Session,
        handle: &ObjectHandle,
        path: &str,
    ) -> Option<ObjectHandle> {
        let steps = match path
            .split(PATH_SEPARATOR)
            .map(|step| ValuePattern::parse(step.trim()))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(steps) => steps,
            Err(e) => {
                warn!(path, error = %e, "malformed path");
                return None;
            }
        };
        let caps = session.capabilities(self.engine).await;
        match matcher::resolve_path(self.engine, &caps, handle, &steps).await {
            Ok(found) => found,
            Err(e) => {
                debug!(path, error = %e, "path lookup failed");
                None
            }
        }
    }

    /// Poll until the window (or child) resolves.
    pub async fn wait_for_object(
        &self,
        session: &mut Session,
        map: &str,
        window: &str,
        child: Option<&str>,
        timeout: Duration,
    ) -> Result<Option<ObjectHandle>, ResolveError> {
        let (interval, every) = wait_policy(session)?;
        let mut failures = 0u32;
        let mut ignore_cache = false;
        let mut found = None;
        let mut fault = None;

        poll_until(
            async || match self.resolve(session, map, window, child, ignore_cache).await {
                Ok(Some(handle)) => {
                    found = Some(handle);
                    true
                }
                Ok(None) => {
                    failures += 1;
                    ignore_cache = self.after_failure(session, map, failures, every).await;
                    false
                }
                Err(e) => {
                    fault = Some(e);
                    true
                }
            },
            timeout,
            interval,
        )
        .await;

        match fault {
            Some(e) => Err(e),
            None => Ok(found),
        }
    }

    /// Poll until a property of the window (or child) equals `expected`.
    #[allow(clippy::too_many_arguments)]
    pub async fn wait_for_property(
        &self,
        session: &mut Session,
        map: &str,
        window: &str,
        child: Option<&str>,
        property: &str,
        expected: &str,
        timeout: Duration,
    ) -> Result<bool, ResolveError> {
        let (interval, every) = wait_policy(session)?;
        let mut failures = 0u32;
        let mut ignore_cache = false;
        let mut fault = None;

        let matched = poll_until(
            async || {
                let handle = match self.resolve(session, map, window, child, ignore_cache).await {
                    Ok(Some(handle)) => handle,
                    Ok(None) => {
                        failures += 1;
                        ignore_cache = self.after_failure(session, map, failures, every).await;
                        return false;
                    }
                    Err(e) => {
                        fault = Some(e);
                        return true;
                    }
                };
                ignore_cache = false;
                let actual = self.property_value(&handle, property).await;
                compare_text(expected, &actual)
            },
            timeout,
            interval,
        )
        .await;

        match fault {
            Some(e) => Err(e),
            None => Ok(matched),
        }
    }

    async fn resolve(
        &self,
        session: &mut Session,
        map: &str,
        window: &str,
        child: Option<&str>,
        ignore_cache: bool,
    ) -> Result<Option<ObjectHandle>, ResolveError> {
        match child {
            Some(child) => {
                self.resolve_child(session, map, window, child, ignore_cache, None)
                    .await
            }
            None => self.resolve_window(session, map, window, ignore_cache).await,
        }
    }

    /// Every `every`-th failed poll purges the map and forces the next
    /// attempt past the cache. Returns the next `ignore_cache` value.
    async fn after_failure(
        &self,
        session: &mut Session,
        map: &str,
        failures: u32,
        every: u32,
    ) -> bool {
        if failures % every != 0 {
            return false;
        }
        session.cache_mut().purge_map(map, self.engine).await;
        true
    }

    /// A raw property, else the probed attribute of the same name.
    async fn property_value(&self, handle: &ObjectHandle, property: &str) -> String {
        if let Some(value) = read_property(self.engine, handle, property).await {
            return value;
        }
        match property.parse::<Attribute>() {
            Ok(attribute) => probe::probe(self.engine, handle, attribute).await,
            Err(_) => String::new(),
        }
    }

    async fn search_window(
        &self,
        session: &mut Session,
        path: &RecognitionPath,
    ) -> Option<ObjectHandle> {
        let first = path.first()?;
        let domain = first
            .domain
            .or_else(|| first.type_name().and_then(domain_for_type));
        let query = WindowQuery {
            domain,
            process: first.process.as_deref(),
            menu_search: first.type_name().is_some_and(is_menu_type),
        };

        let searcher = self.searcher(session, path.mode).await;
        let mut found = searcher.search_windows(session, path, &query, false).await;

        // Only domains that may hide surfaces are worth a second pass.
        let ambiguous = domain.is_none_or(|d| d.needs_surface_activation());
        if found.is_empty() && ambiguous && activate_surfaces(self.engine, session).await {
            info!("retrying window search after surface activation");
            found = searcher.search_windows(session, path, &query, false).await;
        }
        found.into_iter().next()
    }

    async fn searcher(&self, session: &mut Session, mode: SearchMode) -> Searcher<'a, E> {
        let caps = session.capabilities(self.engine).await;
        Searcher::new(self.engine, caps, mode, session.config().search.max_depth)
    }

    /// Operation scope first, then application scope.
    async fn cached(&self, session: &mut Session, key: &CacheKey) -> Option<ObjectHandle> {
        for scope in [CacheScope::Operation, CacheScope::Application] {
            let Some(handle) = session.cache().get(scope, key) else {
                continue;
            };
            if self.verify(session, &handle).await {
                debug!(map = key.map.as_str(), id = handle.id, ?scope, "cache hit");
                if scope == CacheScope::Application {
                    session.cache_mut().put(CacheScope::Operation, key.clone(), handle);
                }
                return Some(handle);
            }
            info!(map = key.map.as_str(), id = handle.id, "cached handle is stale; purging map");
            session.cache_mut().purge_map(&key.map, self.engine).await;
            return None;
        }
        None
    }

    /// A cached child, provided it still sits below `parent`.
    async fn cached_child(
        &self,
        session: &mut Session,
        key: &CacheKey,
        parent: &ObjectHandle,
    ) -> Option<ObjectHandle> {
        let handle = self.cached(session, key).await?;
        if self.is_below(&handle, parent).await {
            return Some(handle);
        }
        info!(map = key.map.as_str(), id = handle.id, "cached child left its window; purging map");
        session.cache_mut().purge_map(&key.map, self.engine).await;
        None
    }

    /// Walks the parent chain of `handle` looking for `ancestor`. Engines
    /// that cannot report parents are trusted.
    async fn is_below(&self, handle: &ObjectHandle, ancestor: &ObjectHandle) -> bool {
        let mut current = *handle;
        for _ in 0..MAX_ANCESTRY {
            match self.engine.parent(&current).await {
                Ok(Some(parent)) if parent.id == ancestor.id => return true,
                Ok(Some(parent)) => current = parent,
                Ok(None) => return false,
                Err(e) => {
                    debug!(id = current.id, error = %e, "parent unavailable");
                    return true;
                }
            }
        }
        false
    }

    /// Child recognition relative to its window.
    async fn below_window(
        &self,
        map: &str,
        window: &str,
        recognition: &str,
    ) -> Result<String, ResolveError> {
        let parent_recognition = self
            .store
            .recognition(map, window, None)
            .await?
            .map(|raw| MapEntry::parse(&raw).recognition)
            .unwrap_or_default();
        let relative = strip_parent_prefix(recognition, &parent_recognition);
        if relative != recognition {
            info!(map, window, "child recognition repeats its window; prefix stripped");
        }
        Ok(relative.to_string())
    }

    async fn search_child(
        &self,
        session: &mut Session,
        parent: &ObjectHandle,
        key: CacheKey,
        recognition: &str,
        dynamic: bool,
        disambiguation: Option<&mut Vec<ObjectHandle>>,
    ) -> Option<ObjectHandle> {
        let path = match RecognitionPath::parse(recognition) {
            Ok(path) => path,
            Err(e) => {
                warn!(map = key.map.as_str(), child = ?key.child, error = %e, "malformed child recognition");
                return None;
            }
        };

        let searcher = self.searcher(session, path.mode).await;
        let found = searcher
            .search_under(parent, &path.segments, disambiguation.is_some())
            .await;
        let first = found.first().copied();
        if let Some(list) = disambiguation {
            list.extend(found);
        }

        let dynamic = dynamic || path.segments.iter().any(|s| s.is_current_window());
        match first {
            Some(handle) => self.remember(session, key, handle, dynamic),
            None => debug!(map = key.map.as_str(), child = ?key.child, "child not found"),
        }
        first
    }

    async fn named(&self, session: &mut Session, path: &str) -> Option<ObjectHandle> {
        let handle = match self.engine.lookup_named(path).await {
            Ok(Some(handle)) => handle,
            Ok(None) => return None,
            Err(e) => {
                debug!(path, error = %e, "named object lookup failed");
                return None;
            }
        };
        if self.verify(session, &handle).await {
            debug!(path, id = handle.id, "named object hit");
            return Some(handle);
        }
        release(self.engine, &handle).await;
        None
    }

    /// Short bounded existence probe.
    async fn verify(&self, session: &Session, handle: &ObjectHandle) -> bool {
        let existence = &session.config().existence_probe;
        let engine = self.engine;
        poll_until(
            async || engine.exists(handle).await.unwrap_or(false),
            existence.timeout(),
            existence.interval(),
        )
        .await
    }

    fn remember(&self, session: &mut Session, key: CacheKey, handle: ObjectHandle, dynamic: bool) {
        if dynamic {
            debug!(map = key.map.as_str(), id = handle.id, "dynamic entry; not cached");
            return;
        }
        let cache = session.cache_mut();
        cache.put(CacheScope::Operation, key.clone(), handle);
        cache.put(CacheScope::Application, key, handle);
    }
}

fn wait_policy(session: &Session) -> Result<(Duration, u32), ResolveError> {
    let wait = &session.config().wait;
    if wait.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid("wait.poll_interval_ms must be > 0".into()).into());
    }
    Ok((wait.poll_interval(), wait.ignore_cache_every.max(1)))
}
