//! Evaluation of one recognition segment against one candidate.

use crate::classifier::{
    MENU_ITEM, canonical_type, class_matches, is_assignable, is_current_window, is_menu_type,
    logical_type,
};
use crate::engine::{Engine, EngineCapabilities, EngineError, FindCriteria, ObjectHandle};
use crate::enumerator::children;
use crate::probe::{Attribute, domain_of, probe};
use rekon_common::{
    Category, Qualifier, QualifierKind, QualifierValue, RecognitionSegment, SearchMode,
    ValuePattern,
};
use tracing::debug;

/// A segment with its type requirement resolved once.
#[derive(Debug)]
pub struct SegmentMatcher<'s> {
    segment: &'s RecognitionSegment,
    required_type: Option<String>,
    /// The type came from the parent, not from the segment.
    implied_type: bool,
    top_level: bool,
}

impl<'s> SegmentMatcher<'s> {
    pub fn new(segment: &'s RecognitionSegment, parent_type: Option<&str>, top_level: bool) -> Self {
        let (required_type, implied_type) = match segment.type_name() {
            Some(t) => (Some(canonical_type(t)), false),
            None if segment.category.is_none() && parent_type.is_some_and(is_menu_type) => {
                (Some(MENU_ITEM.to_string()), true)
            }
            None => (None, false),
        };
        Self {
            segment,
            required_type,
            implied_type,
            top_level,
        }
    }

    pub fn segment(&self) -> &RecognitionSegment {
        self.segment
    }

    /// Every qualifier holds. Engine failures mean "no match".
    pub async fn matches<E: Engine + ?Sized>(
        &self,
        engine: &E,
        capabilities: &EngineCapabilities,
        handle: &ObjectHandle,
    ) -> bool {
        match self.check(engine, capabilities, handle).await {
            Ok(matched) => matched,
            Err(e) => {
                debug!(id = handle.id, code = e.code(), error = %e, "candidate skipped");
                false
            }
        }
    }

    async fn check<E: Engine + ?Sized>(
        &self,
        engine: &E,
        capabilities: &EngineCapabilities,
        handle: &ObjectHandle,
    ) -> Result<bool, EngineError> {
        if let Some(want) = self.segment.domain {
            if domain_of(engine, handle).await.is_some_and(|d| d != want) {
                return Ok(false);
            }
        }

        if let Some(want) = &self.required_type {
            let assignable = if self.implied_type {
                // Unclassifiable classes pass only when nothing asked for a type.
                logical_type(engine, handle, self.top_level)
                    .await?
                    .is_none_or(|found| found.eq_ignore_ascii_case(want))
            } else {
                is_assignable(engine, want, handle, self.top_level).await?
            };
            if !assignable {
                return Ok(false);
            }
        }

        match &self.segment.category {
            Some(Category::Class(pattern)) => {
                if !class_matches(engine, handle, pattern).await? {
                    return Ok(false);
                }
            }
            Some(Category::CurrentWindow) => {
                if !is_current_window(engine, capabilities, handle).await {
                    return Ok(false);
                }
            }
            _ => {}
        }

        for qualifier in self.segment.per_candidate() {
            if !qualifier_matches(engine, capabilities, handle, qualifier).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Literal constraints an engine `find` can evaluate natively. Results
    /// are still passed through [`matches`](Self::matches).
    pub fn find_criteria(&self) -> FindCriteria {
        let class_name = match &self.segment.category {
            Some(Category::Class(ValuePattern::Literal(class))) => Some(class.clone()),
            _ => None,
        };
        let properties = self
            .segment
            .qualifiers
            .iter()
            .filter(|q| q.kind == QualifierKind::Property)
            .filter_map(|q| match &q.value {
                QualifierValue::Property {
                    name,
                    value: ValuePattern::Literal(value),
                } => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect();
        FindCriteria {
            class_name,
            properties,
        }
    }
}

async fn qualifier_matches<E: Engine + ?Sized>(
    engine: &E,
    capabilities: &EngineCapabilities,
    handle: &ObjectHandle,
    qualifier: &Qualifier,
) -> Result<bool, EngineError> {
    use QualifierKind::*;

    let matched = match (&qualifier.kind, &qualifier.value) {
        (Caption, QualifierValue::Pattern(p)) => {
            p.matches_exact(&probe(engine, handle, Attribute::Caption).await)
        }
        (Name, QualifierValue::Pattern(p)) => {
            p.matches_exact(&probe(engine, handle, Attribute::Name).await)
        }
        (NameContains, QualifierValue::Pattern(p)) => {
            p.matches_contains(&probe(engine, handle, Attribute::Name).await)
        }
        (Text, QualifierValue::Pattern(p)) => {
            p.matches_text(&probe(engine, handle, Attribute::Text).await)
        }
        (Id, QualifierValue::Pattern(p)) => {
            p.matches_exact(&probe(engine, handle, Attribute::Id).await)
        }
        (HtmlTitle, QualifierValue::Pattern(p)) => {
            let mut title = probe(engine, handle, Attribute::Caption).await;
            if title.is_empty() {
                title = probe(engine, handle, Attribute::Text).await;
            }
            p.matches_exact(&title)
        }
        (Class, QualifierValue::Pattern(p)) => class_matches(engine, handle, p).await?,
        (Property | PropertyContains, QualifierValue::Property { name, value }) => {
            let actual = match engine.property(handle, name).await {
                Ok(actual) => actual,
                Err(EngineError::PropertyNotFound { .. }) => None,
                Err(e) => return Err(e),
            };
            match actual {
                Some(actual) if qualifier.kind == PropertyContains => {
                    value.matches_contains(&actual)
                }
                Some(actual) => value.matches_text(&actual),
                None => false,
            }
        }
        (Path, QualifierValue::Path(steps)) => {
            resolve_path(engine, capabilities, handle, steps).await?.is_some()
        }
        (Index, _) => true,
        (kind, value) => {
            debug!(?kind, value = ?value.kind(), "qualifier value does not fit its kind");
            false
        }
    };
    Ok(matched)
}

/// Nested sub-item reached from `handle` by following `steps`.
///
/// Uses the engine's whole-path lookup when available and every step is a
/// literal, else walks children step by step comparing their text.
pub async fn resolve_path<E: Engine + ?Sized>(
    engine: &E,
    capabilities: &EngineCapabilities,
    handle: &ObjectHandle,
    steps: &[ValuePattern],
) -> Result<Option<ObjectHandle>, EngineError> {
    if capabilities.path_lookup && steps.iter().all(ValuePattern::is_literal) {
        let texts: Vec<String> = steps.iter().map(|s| s.as_str().to_string()).collect();
        match engine.lookup_path(handle, &texts).await {
            Err(EngineError::NotSupported(_)) => {}
            other => return other.map(|found| found.map(|h| h.or_domain(handle.domain))),
        }
    }

    let mut current = *handle;
    for step in steps {
        let parent_type = logical_type(engine, &current, false).await.ok().flatten();
        let kids = children(engine, &current, SearchMode::Classic, parent_type.as_deref()).await;

        let mut next = None;
        for kid in kids {
            let mut text = probe(engine, &kid, Attribute::Text).await;
            if text.is_empty() {
                text = probe(engine, &kid, Attribute::Caption).await;
            }
            if step.matches_text(&text) {
                next = Some(kid);
                break;
            }
        }
        match next {
            Some(kid) => current = kid,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}
