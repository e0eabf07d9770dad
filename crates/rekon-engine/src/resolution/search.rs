//! Hierarchical search.
//!
//! Segment `i` is matched against the candidates under each match of
//! segment `i - 1`. Intermediate matches are tried in enumeration order
//! and the search backtracks when a branch yields nothing.

use crate::classifier::logical_type;
use crate::engine::{Engine, EngineCapabilities, EngineError, ObjectHandle};
use crate::enumerator::{WindowQuery, children, top_windows};
use crate::matcher::SegmentMatcher;
use crate::session::Session;
use async_recursion::async_recursion;
use rekon_common::{RecognitionPath, RecognitionSegment, SearchMode};
use std::collections::HashSet;
use tracing::debug;

pub struct Searcher<'a, E: Engine + ?Sized> {
    engine: &'a E,
    capabilities: EngineCapabilities,
    mode: SearchMode,
    max_depth: usize,
}

impl<'a, E: Engine + ?Sized> Searcher<'a, E> {
    pub fn new(
        engine: &'a E,
        capabilities: EngineCapabilities,
        mode: SearchMode,
        max_depth: usize,
    ) -> Self {
        Self {
            engine,
            capabilities,
            mode,
            max_depth,
        }
    }

    /// Match the first segment over top-level windows, the rest below.
    pub async fn search_windows(
        &self,
        session: &mut Session,
        path: &RecognitionPath,
        query: &WindowQuery<'_>,
        gather: bool,
    ) -> Vec<ObjectHandle> {
        let Some((first, rest)) = path.segments.split_first() else {
            return Vec::new();
        };
        let matcher = SegmentMatcher::new(first, None, true);
        let windows = self.window_candidates(session, &matcher, query).await;
        debug!(count = windows.len(), "top-level candidates");

        let stop_early = rest.is_empty() && !gather && first.index().is_none();
        let matched = self.filter(&matcher, windows, stop_early).await;
        let selected = select(matched, first.index());
        self.descend(selected, rest, gather).await
    }

    /// Top-level candidates. Find mode asks the engine first and enumerates
    /// only when it cannot search on its own.
    async fn window_candidates(
        &self,
        session: &mut Session,
        matcher: &SegmentMatcher<'_>,
        query: &WindowQuery<'_>,
    ) -> Vec<ObjectHandle> {
        if self.mode == SearchMode::Find && self.capabilities.find {
            match self.engine.find(None, &matcher.find_criteria()).await {
                Ok(found) => {
                    return found
                        .into_iter()
                        .filter(|h| query.domain.is_none_or(|want| h.domain == Some(want)))
                        .collect();
                }
                Err(EngineError::NotSupported(_)) => {}
                Err(e) => {
                    debug!(error = %e, "window find failed");
                    return Vec::new();
                }
            }
        }
        top_windows(self.engine, session, query).await
    }

    /// Match `segments` below `parent`.
    #[async_recursion]
    pub async fn search_under(
        &self,
        parent: &ObjectHandle,
        segments: &[RecognitionSegment],
        gather: bool,
    ) -> Vec<ObjectHandle> {
        let Some((segment, rest)) = segments.split_first() else {
            return vec![*parent];
        };
        let parent_type = logical_type(self.engine, parent, false).await.ok().flatten();
        let matcher = SegmentMatcher::new(segment, parent_type.as_deref(), false);

        let candidates = self.candidates(parent, parent_type.as_deref(), &matcher).await;
        let stop_early = rest.is_empty() && !gather && segment.index().is_none();
        let matched = self.filter(&matcher, candidates, stop_early).await;
        let selected = select(matched, segment.index());
        self.descend(selected, rest, gather).await
    }

    async fn descend(
        &self,
        selected: Vec<ObjectHandle>,
        rest: &[RecognitionSegment],
        gather: bool,
    ) -> Vec<ObjectHandle> {
        if rest.is_empty() {
            return if gather {
                selected
            } else {
                selected.into_iter().take(1).collect()
            };
        }

        let mut found = Vec::new();
        for handle in selected {
            let below = self.search_under(&handle, rest, gather).await;
            if !gather && !below.is_empty() {
                return below;
            }
            found.extend(below);
        }
        found
    }

    async fn filter(
        &self,
        matcher: &SegmentMatcher<'_>,
        candidates: Vec<ObjectHandle>,
        stop_early: bool,
    ) -> Vec<ObjectHandle> {
        let mut matched = Vec::new();
        for candidate in candidates {
            if matcher
                .matches(self.engine, &self.capabilities, &candidate)
                .await
            {
                matched.push(candidate);
                if stop_early {
                    break;
                }
            }
        }
        matched
    }

    async fn candidates(
        &self,
        parent: &ObjectHandle,
        parent_type: Option<&str>,
        matcher: &SegmentMatcher<'_>,
    ) -> Vec<ObjectHandle> {
        match self.mode {
            SearchMode::FullPath => {
                children(self.engine, parent, SearchMode::Classic, parent_type).await
            }
            SearchMode::MappedClass => {
                self.descendants(parent, parent_type, SearchMode::MappedClass)
                    .await
            }
            SearchMode::Find if self.capabilities.find => {
                match self.engine.find(Some(parent), &matcher.find_criteria()).await {
                    Ok(found) => found
                        .into_iter()
                        .map(|h| h.or_domain(parent.domain))
                        .collect(),
                    Err(EngineError::NotSupported(_)) => {
                        self.descendants(parent, parent_type, SearchMode::Classic)
                            .await
                    }
                    Err(e) => {
                        debug!(id = parent.id, error = %e, "find failed");
                        Vec::new()
                    }
                }
            }
            SearchMode::Find | SearchMode::Classic => {
                self.descendants(parent, parent_type, SearchMode::Classic)
                    .await
            }
        }
    }

    /// Depth-first, pre-order, bounded by `max_depth`.
    async fn descendants(
        &self,
        root: &ObjectHandle,
        root_type: Option<&str>,
        mode: SearchMode,
    ) -> Vec<ObjectHandle> {
        let mut found = Vec::new();
        let mut visited = HashSet::from([root.id]);
        let mut stack: Vec<(ObjectHandle, usize)> = children(self.engine, root, mode, root_type)
            .await
            .into_iter()
            .rev()
            .map(|h| (h, 1))
            .collect();

        while let Some((node, depth)) = stack.pop() {
            if !visited.insert(node.id) {
                continue;
            }
            found.push(node);
            if depth >= self.max_depth {
                continue;
            }
            let node_type = logical_type(self.engine, &node, false).await.ok().flatten();
            let kids = children(self.engine, &node, mode, node_type.as_deref()).await;
            stack.extend(kids.into_iter().rev().map(|h| (h, depth + 1)));
        }
        found
    }
}

/// Apply a 1-based Index over the matches in enumeration order.
fn select(matched: Vec<ObjectHandle>, index: Option<i64>) -> Vec<ObjectHandle> {
    let Some(index) = index else {
        return matched;
    };
    let position = usize::try_from(index).ok().filter(|&n| n >= 1);
    match position.and_then(|n| matched.get(n - 1)) {
        Some(handle) => vec![*handle],
        None => {
            debug!(index, count = matched.len(), "index out of range");
            Vec::new()
        }
    }
}
