use async_trait::async_trait;
pub use rekon_common::error::EngineError;
use rekon_common::DomainName;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Opaque live reference to a UI element held by the automation engine.
///
/// Equality and hashing use the engine id only; the domain tag is carried
/// along so callers do not have to ask the engine again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObjectHandle {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<DomainName>,
}

impl ObjectHandle {
    pub fn new(id: u64, domain: Option<DomainName>) -> Self {
        Self { id, domain }
    }

    /// Keep an existing tag, otherwise adopt `domain`.
    pub fn or_domain(self, domain: Option<DomainName>) -> Self {
        Self {
            id: self.id,
            domain: self.domain.or(domain),
        }
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ObjectHandle {}

impl Hash for ObjectHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Native OS window identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeWindow {
    pub hwnd: u64,
    pub pid: u32,
}

/// Engine API variants, negotiated once per session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCapabilities {
    /// Structural `find` over property criteria.
    #[serde(default)]
    pub find: bool,
    /// Whole-path lookup of nested sub-items.
    #[serde(default)]
    pub path_lookup: bool,
    /// Force-activation of extra technology surfaces.
    #[serde(default)]
    pub surface_activation: bool,
    /// Domains whose direct focus signal cannot be trusted.
    #[serde(default)]
    pub unreliable_focus_domains: Vec<DomainName>,
}

/// Property criteria handed to [`Engine::find`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindCriteria {
    pub class_name: Option<String>,
    pub properties: Vec<(String, String)>,
}

/// The automation engine primitives consumed by resolution.
///
/// Every call may fail with a transient [`EngineError`]; resolution treats
/// such failures as "no match" for the element involved and moves on.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn capabilities(&self) -> EngineCapabilities;

    /// Domains currently reachable.
    async fn domains(&self) -> Result<Vec<DomainName>, EngineError>;

    /// Top-level windows of one domain.
    async fn top_windows(&self, domain: DomainName) -> Result<Vec<ObjectHandle>, EngineError>;

    /// Windows owned by `window`, e.g. its modal dialogs.
    async fn owned_windows(&self, window: &ObjectHandle) -> Result<Vec<ObjectHandle>, EngineError>;

    /// Token naming the native window behind a top-level handle. Reports
    /// from different domains sharing a token are the same window.
    async fn native_identity(&self, handle: &ObjectHandle) -> Result<Option<String>, EngineError>;

    /// Communication context (agent channel) the handle is reached through.
    async fn context_id(&self, handle: &ObjectHandle) -> Result<String, EngineError>;

    async fn children(&self, handle: &ObjectHandle) -> Result<Vec<ObjectHandle>, EngineError>;

    /// Children exposed through the lightweight object map.
    async fn mappable_children(
        &self,
        handle: &ObjectHandle,
    ) -> Result<Vec<ObjectHandle>, EngineError>;

    async fn menu_components(
        &self,
        _handle: &ObjectHandle,
    ) -> Result<Vec<ObjectHandle>, EngineError> {
        Err(EngineError::NotSupported("menu_components".into()))
    }

    /// Containing element. Top-level windows have none.
    async fn parent(&self, handle: &ObjectHandle) -> Result<Option<ObjectHandle>, EngineError>;

    async fn class_name(&self, handle: &ObjectHandle) -> Result<String, EngineError>;

    /// Direct superclass of `class` within `domain`.
    async fn superclass(
        &self,
        domain: DomainName,
        class: &str,
    ) -> Result<Option<String>, EngineError>;

    async fn domain_of(&self, handle: &ObjectHandle) -> Result<Option<DomainName>, EngineError>;

    /// Read a property. `Ok(None)` and `PropertyNotFound` both mean absent.
    async fn property(
        &self,
        handle: &ObjectHandle,
        name: &str,
    ) -> Result<Option<String>, EngineError>;

    async fn process_name(&self, handle: &ObjectHandle) -> Result<Option<String>, EngineError>;

    async fn exists(&self, handle: &ObjectHandle) -> Result<bool, EngineError>;

    /// Release the engine's registration of a handle.
    async fn unregister(&self, handle: &ObjectHandle) -> Result<(), EngineError>;

    async fn native_window(&self, handle: &ObjectHandle)
    -> Result<Option<NativeWindow>, EngineError>;

    async fn foreground_window(&self) -> Result<Option<NativeWindow>, EngineError>;

    async fn has_focus(&self, handle: &ObjectHandle) -> Result<bool, EngineError>;

    /// Returns the number of surfaces newly activated.
    async fn activate_surfaces(&self) -> Result<usize, EngineError> {
        Err(EngineError::NotSupported("activate_surfaces".into()))
    }

    async fn lookup_path(
        &self,
        _handle: &ObjectHandle,
        _path: &[String],
    ) -> Result<Option<ObjectHandle>, EngineError> {
        Err(EngineError::NotSupported("lookup_path".into()))
    }

    /// Descendants of `scope` matching `criteria`. Without a scope the top
    /// windows of every reachable domain are searched too.
    async fn find(
        &self,
        _scope: Option<&ObjectHandle>,
        _criteria: &FindCriteria,
    ) -> Result<Vec<ObjectHandle>, EngineError> {
        Err(EngineError::NotSupported("find".into()))
    }

    /// Pre-registered alias table.
    async fn lookup_named(&self, path: &str) -> Result<Option<ObjectHandle>, EngineError>;
}

/// Best-effort unregister; "already gone" and other failures are ignored.
pub async fn release<E: Engine + ?Sized>(engine: &E, handle: &ObjectHandle) {
    if let Err(e) = engine.unregister(handle).await {
        if !e.is_gone() {
            tracing::debug!(id = handle.id, error = %e, "unregister failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_identity_ignores_domain_tag() {
        let a = ObjectHandle::new(7, Some(DomainName::Net));
        let b = ObjectHandle::new(7, None);
        assert_eq!(a, b);
        assert_eq!(b.or_domain(Some(DomainName::Java)).domain, Some(DomainName::Java));
        assert_eq!(a.or_domain(Some(DomainName::Java)).domain, Some(DomainName::Net));
    }
}
