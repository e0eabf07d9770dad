use crate::classifier::is_menu_item_type;
use crate::engine::{Engine, EngineError, ObjectHandle};
use rekon_common::SearchMode;
use tracing::debug;

/// Candidate children of `handle`.
///
/// Menu items expose their sub-items through the object map; the full
/// structural tree below them is implementation detail. When the map is
/// empty the generic menu-component enumeration is tried instead.
pub async fn children<E: Engine + ?Sized>(
    engine: &E,
    handle: &ObjectHandle,
    mode: SearchMode,
    logical_type: Option<&str>,
) -> Vec<ObjectHandle> {
    let menu_item = logical_type.is_some_and(is_menu_item_type);

    let result = if mode == SearchMode::MappedClass {
        engine.mappable_children(handle).await
    } else if menu_item {
        match engine.mappable_children(handle).await {
            Ok(kids) if kids.is_empty() => menu_components(engine, handle).await,
            other => other,
        }
    } else {
        engine.children(handle).await
    };

    match result {
        Ok(kids) => kids
            .into_iter()
            .map(|kid| kid.or_domain(handle.domain))
            .collect(),
        Err(e) => {
            debug!(id = handle.id, error = %e, "child enumeration failed");
            Vec::new()
        }
    }
}

async fn menu_components<E: Engine + ?Sized>(
    engine: &E,
    handle: &ObjectHandle,
) -> Result<Vec<ObjectHandle>, EngineError> {
    match engine.menu_components(handle).await {
        Err(EngineError::NotSupported(_)) => Ok(Vec::new()),
        other => other,
    }
}
