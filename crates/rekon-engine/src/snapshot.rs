//! In-memory engine replaying a captured application tree.
//!
//! A snapshot lists the reachable domains, their top-level windows and the
//! element tree below each window. Elements can be closed at runtime to
//! model windows going away underneath a cached handle.

use crate::engine::{
    Engine, EngineCapabilities, EngineError, FindCriteria, NativeWindow, ObjectHandle,
};
use async_trait::async_trait;
use rekon_common::DomainName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

const DEFAULT_CONTEXT: &str = "default";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse snapshot: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Duplicate element id {0}")]
    DuplicateId(u64),
    #[error("Named object '{name}' refers to unknown element {id}")]
    UnknownNamed { name: String, id: u64 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub capabilities: EngineCapabilities,
    /// Reachable domains. Empty means "every domain a window uses".
    #[serde(default)]
    pub domains: Vec<DomainName>,
    /// Domains that only appear after surface activation.
    #[serde(default)]
    pub hidden_domains: Vec<DomainName>,
    /// Domains whose enumeration fails.
    #[serde(default)]
    pub failing_domains: Vec<DomainName>,
    /// Element ids whose property reads fail.
    #[serde(default)]
    pub failing_properties: Vec<u64>,
    #[serde(default)]
    pub windows: Vec<Element>,
    /// class -> direct superclass
    #[serde(default)]
    pub hierarchy: BTreeMap<String, String>,
    /// Element id of the OS foreground window.
    #[serde(default)]
    pub foreground: Option<u64>,
    #[serde(default)]
    pub named: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Element {
    pub id: u64,
    /// Inherited from the parent when absent.
    #[serde(default)]
    pub domain: Option<DomainName>,
    pub class: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<Element>,
    #[serde(default)]
    pub owned: Vec<Element>,
    #[serde(default)]
    pub menu_components: Vec<Element>,
    #[serde(default = "default_mappable")]
    pub mappable: bool,
    /// Inherited from the parent when absent.
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub hwnd: Option<u64>,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub process: Option<String>,
    #[serde(default)]
    pub focused: bool,
}

fn default_mappable() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Top,
    Owned,
    Child,
    MenuComponent,
}

#[derive(Debug)]
struct Node {
    domain: Option<DomainName>,
    class: String,
    properties: BTreeMap<String, String>,
    parent: Option<u64>,
    children: Vec<u64>,
    owned: Vec<u64>,
    menu_components: Vec<u64>,
    mappable: bool,
    context: String,
    identity: Option<String>,
    native: Option<NativeWindow>,
    process: Option<String>,
    focused: bool,
}

#[derive(Debug, Default)]
struct State {
    closed: HashSet<u64>,
    unregistered: Vec<u64>,
    activated: bool,
    foreground: Option<u64>,
    overrides: HashMap<(u64, String), String>,
    top_window_calls: usize,
    find_calls: usize,
}

pub struct SnapshotEngine {
    capabilities: EngineCapabilities,
    domains: Vec<DomainName>,
    hidden_domains: Vec<DomainName>,
    failing_domains: Vec<DomainName>,
    failing_properties: HashSet<u64>,
    top: Vec<u64>,
    nodes: HashMap<u64, Node>,
    hierarchy: BTreeMap<String, String>,
    named: BTreeMap<String, u64>,
    state: Mutex<State>,
}

impl SnapshotEngine {
    pub fn new(snapshot: Snapshot) -> Result<Self, SnapshotError> {
        let mut nodes = HashMap::new();
        let mut top = Vec::new();
        for window in &snapshot.windows {
            top.push(window.id);
            index(window, None, None, DEFAULT_CONTEXT, Placement::Top, &mut nodes)?;
        }
        for (name, id) in &snapshot.named {
            if !nodes.contains_key(id) {
                return Err(SnapshotError::UnknownNamed {
                    name: name.clone(),
                    id: *id,
                });
            }
        }

        let mut domains = snapshot.domains.clone();
        if domains.is_empty() {
            for id in &top {
                if let Some(d) = nodes.get(id).and_then(|n: &Node| n.domain) {
                    if !domains.contains(&d) && !snapshot.hidden_domains.contains(&d) {
                        domains.push(d);
                    }
                }
            }
        }

        Ok(Self {
            capabilities: snapshot.capabilities,
            domains,
            hidden_domains: snapshot.hidden_domains,
            failing_domains: snapshot.failing_domains,
            failing_properties: snapshot.failing_properties.into_iter().collect(),
            top,
            nodes,
            hierarchy: snapshot.hierarchy,
            named: snapshot.named,
            state: Mutex::new(State {
                foreground: snapshot.foreground,
                ..Default::default()
            }),
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, SnapshotError> {
        Self::new(serde_yaml::from_str(content)?)
    }

    pub async fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_yaml_str(&content)
    }

    /// Close an element and everything below or owned by it.
    pub fn close(&self, id: u64) {
        let mut pending = vec![id];
        let mut state = self.lock();
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.get(&id) {
                if state.closed.insert(id) {
                    pending.extend(&node.children);
                    pending.extend(&node.owned);
                    pending.extend(&node.menu_components);
                }
            }
        }
    }

    pub fn reopen(&self, id: u64) {
        self.lock().closed.remove(&id);
    }

    pub fn set_property(&self, id: u64, name: &str, value: &str) {
        self.lock()
            .overrides
            .insert((id, name.to_string()), value.to_string());
    }

    pub fn set_foreground(&self, id: Option<u64>) {
        self.lock().foreground = id;
    }

    /// Ids passed to `unregister`, in call order.
    pub fn unregistered(&self) -> Vec<u64> {
        self.lock().unregistered.clone()
    }

    /// Number of `top_windows` calls so far.
    pub fn top_window_calls(&self) -> usize {
        self.lock().top_window_calls
    }

    /// Number of `find` calls so far.
    pub fn find_calls(&self) -> usize {
        self.lock().find_calls
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn alive(&self, id: u64) -> bool {
        self.nodes.contains_key(&id) && !self.lock().closed.contains(&id)
    }

    fn node(&self, handle: &ObjectHandle) -> Result<&Node, EngineError> {
        let node = self
            .nodes
            .get(&handle.id)
            .ok_or(EngineError::NotFound { id: handle.id })?;
        if self.lock().closed.contains(&handle.id) {
            return Err(EngineError::Stale { id: handle.id });
        }
        Ok(node)
    }

    fn handles(&self, ids: &[u64]) -> Vec<ObjectHandle> {
        ids.iter()
            .filter(|id| self.alive(**id))
            .filter_map(|id| {
                self.nodes
                    .get(id)
                    .map(|n| ObjectHandle::new(*id, n.domain))
            })
            .collect()
    }

    fn reachable_domains(&self) -> Vec<DomainName> {
        let mut domains = self.domains.clone();
        if self.lock().activated {
            domains.extend(self.hidden_domains.iter().copied());
        }
        domains
    }

    fn property_of(&self, id: u64, node: &Node, name: &str) -> Option<String> {
        if let Some(v) = self.lock().overrides.get(&(id, name.to_string())) {
            return Some(v.clone());
        }
        node.properties.get(name).cloned()
    }

    fn text_of(&self, id: u64, node: &Node) -> Option<String> {
        ["text", "Text", "caption", "Caption"]
            .iter()
            .find_map(|name| self.property_of(id, node, name))
    }

    fn descendants(&self, root: u64, out: &mut Vec<u64>) {
        if let Some(node) = self.nodes.get(&root) {
            for kid in &node.children {
                if self.alive(*kid) {
                    out.push(*kid);
                    self.descendants(*kid, out);
                }
            }
        }
    }

    fn satisfies(&self, id: u64, criteria: &FindCriteria) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        if criteria.class_name.as_ref().is_some_and(|c| *c != node.class) {
            return false;
        }
        criteria
            .properties
            .iter()
            .all(|(name, value)| self.property_of(id, node, name).as_deref() == Some(value))
    }
}

fn index(
    element: &Element,
    parent: Option<u64>,
    inherited_domain: Option<DomainName>,
    inherited_context: &str,
    placement: Placement,
    nodes: &mut HashMap<u64, Node>,
) -> Result<(), SnapshotError> {
    if nodes.contains_key(&element.id) {
        return Err(SnapshotError::DuplicateId(element.id));
    }
    let domain = element.domain.or(inherited_domain).or(
        // Top-level windows without a domain belong to the OS.
        (placement == Placement::Top).then_some(DomainName::Win),
    );
    let context = element.context.as_deref().unwrap_or(inherited_context);
    let native = match (element.hwnd, element.pid) {
        (Some(hwnd), Some(pid)) => Some(NativeWindow { hwnd, pid }),
        _ => None,
    };
    let identity = element
        .identity
        .clone()
        .or_else(|| element.hwnd.map(|h| format!("hwnd:{}", h)));

    nodes.insert(
        element.id,
        Node {
            domain,
            class: element.class.clone(),
            properties: element.properties.clone(),
            parent,
            children: element.children.iter().map(|e| e.id).collect(),
            owned: element.owned.iter().map(|e| e.id).collect(),
            menu_components: element.menu_components.iter().map(|e| e.id).collect(),
            mappable: element.mappable,
            context: context.to_string(),
            identity,
            native,
            process: element.process.clone(),
            focused: element.focused,
        },
    );

    let groups = [
        (&element.children, Placement::Child),
        (&element.owned, Placement::Owned),
        (&element.menu_components, Placement::MenuComponent),
    ];
    for (group, placement) in groups {
        for kid in group {
            // Owned windows are separate top-level surfaces with their own
            // domain; children inherit.
            let kid_domain = if placement == Placement::Owned { None } else { domain };
            index(kid, Some(element.id), kid_domain, context, placement, nodes)?;
        }
    }
    Ok(())
}

#[async_trait]
impl Engine for SnapshotEngine {
    async fn capabilities(&self) -> EngineCapabilities {
        self.capabilities.clone()
    }

    async fn domains(&self) -> Result<Vec<DomainName>, EngineError> {
        Ok(self.reachable_domains())
    }

    async fn top_windows(&self, domain: DomainName) -> Result<Vec<ObjectHandle>, EngineError> {
        self.lock().top_window_calls += 1;
        if self.failing_domains.contains(&domain) {
            return Err(EngineError::Communication(format!("{} agent not responding", domain)));
        }
        if !self.reachable_domains().contains(&domain) {
            return Ok(Vec::new());
        }
        let ids: Vec<u64> = self
            .top
            .iter()
            .copied()
            .filter(|id| self.nodes.get(id).is_some_and(|n| n.domain == Some(domain)))
            .collect();
        Ok(self.handles(&ids))
    }

    async fn owned_windows(&self, window: &ObjectHandle) -> Result<Vec<ObjectHandle>, EngineError> {
        let node = self.node(window)?;
        Ok(self.handles(&node.owned))
    }

    async fn native_identity(&self, handle: &ObjectHandle) -> Result<Option<String>, EngineError> {
        Ok(self.node(handle)?.identity.clone())
    }

    async fn context_id(&self, handle: &ObjectHandle) -> Result<String, EngineError> {
        Ok(self.node(handle)?.context.clone())
    }

    async fn children(&self, handle: &ObjectHandle) -> Result<Vec<ObjectHandle>, EngineError> {
        let node = self.node(handle)?;
        Ok(self.handles(&node.children))
    }

    async fn mappable_children(
        &self,
        handle: &ObjectHandle,
    ) -> Result<Vec<ObjectHandle>, EngineError> {
        let node = self.node(handle)?;
        let ids: Vec<u64> = node
            .children
            .iter()
            .copied()
            .filter(|id| self.nodes.get(id).is_some_and(|n| n.mappable))
            .collect();
        Ok(self.handles(&ids))
    }

    async fn menu_components(
        &self,
        handle: &ObjectHandle,
    ) -> Result<Vec<ObjectHandle>, EngineError> {
        let node = self.node(handle)?;
        Ok(self.handles(&node.menu_components))
    }

    async fn parent(&self, handle: &ObjectHandle) -> Result<Option<ObjectHandle>, EngineError> {
        let node = self.node(handle)?;
        Ok(node
            .parent
            .and_then(|id| self.handles(&[id]).into_iter().next()))
    }

    async fn class_name(&self, handle: &ObjectHandle) -> Result<String, EngineError> {
        Ok(self.node(handle)?.class.clone())
    }

    async fn superclass(
        &self,
        _domain: DomainName,
        class: &str,
    ) -> Result<Option<String>, EngineError> {
        Ok(self.hierarchy.get(class).cloned())
    }

    async fn domain_of(&self, handle: &ObjectHandle) -> Result<Option<DomainName>, EngineError> {
        Ok(self.node(handle)?.domain)
    }

    async fn property(
        &self,
        handle: &ObjectHandle,
        name: &str,
    ) -> Result<Option<String>, EngineError> {
        let node = self.node(handle)?;
        if self.failing_properties.contains(&handle.id) {
            return Err(EngineError::Communication(format!(
                "property '{}' of {} unreadable",
                name, handle.id
            )));
        }
        Ok(self.property_of(handle.id, node, name))
    }

    async fn process_name(&self, handle: &ObjectHandle) -> Result<Option<String>, EngineError> {
        Ok(self.node(handle)?.process.clone())
    }

    async fn exists(&self, handle: &ObjectHandle) -> Result<bool, EngineError> {
        Ok(self.alive(handle.id))
    }

    async fn unregister(&self, handle: &ObjectHandle) -> Result<(), EngineError> {
        let alive = self.alive(handle.id);
        self.lock().unregistered.push(handle.id);
        if alive {
            Ok(())
        } else {
            Err(EngineError::NotFound { id: handle.id })
        }
    }

    async fn native_window(
        &self,
        handle: &ObjectHandle,
    ) -> Result<Option<NativeWindow>, EngineError> {
        Ok(self.node(handle)?.native)
    }

    async fn foreground_window(&self) -> Result<Option<NativeWindow>, EngineError> {
        let foreground = self.lock().foreground;
        Ok(foreground
            .filter(|id| self.alive(*id))
            .and_then(|id| self.nodes.get(&id))
            .and_then(|n| n.native))
    }

    async fn has_focus(&self, handle: &ObjectHandle) -> Result<bool, EngineError> {
        let node = self.node(handle)?;
        Ok(node.focused)
    }

    async fn activate_surfaces(&self) -> Result<usize, EngineError> {
        if !self.capabilities.surface_activation {
            return Err(EngineError::NotSupported("activate_surfaces".into()));
        }
        let mut state = self.lock();
        if state.activated {
            return Ok(0);
        }
        state.activated = true;
        Ok(self.hidden_domains.len())
    }

    async fn lookup_path(
        &self,
        handle: &ObjectHandle,
        path: &[String],
    ) -> Result<Option<ObjectHandle>, EngineError> {
        if !self.capabilities.path_lookup {
            return Err(EngineError::NotSupported("lookup_path".into()));
        }
        let mut current = self.node(handle)?;
        let mut current_id = handle.id;
        for step in path {
            let next = current.children.iter().copied().find(|id| {
                self.alive(*id)
                    && self
                        .nodes
                        .get(id)
                        .and_then(|n| self.text_of(*id, n))
                        .is_some_and(|t| t == *step)
            });
            let Some(id) = next else {
                return Ok(None);
            };
            current_id = id;
            current = self.nodes.get(&id).ok_or(EngineError::NotFound { id })?;
        }
        Ok(Some(ObjectHandle::new(current_id, current.domain)))
    }

    async fn find(
        &self,
        scope: Option<&ObjectHandle>,
        criteria: &FindCriteria,
    ) -> Result<Vec<ObjectHandle>, EngineError> {
        if !self.capabilities.find {
            return Err(EngineError::NotSupported("find".into()));
        }
        self.lock().find_calls += 1;
        let mut ids = Vec::new();
        match scope {
            Some(scope) => {
                self.node(scope)?;
                self.descendants(scope.id, &mut ids);
            }
            None => {
                let domains = self.reachable_domains();
                for id in &self.top {
                    let reachable = self
                        .nodes
                        .get(id)
                        .and_then(|n| n.domain)
                        .is_some_and(|d| domains.contains(&d));
                    if reachable && self.alive(*id) {
                        ids.push(*id);
                        self.descendants(*id, &mut ids);
                    }
                }
            }
        }
        ids.retain(|id| self.satisfies(*id, criteria));
        Ok(self.handles(&ids))
    }

    async fn lookup_named(&self, path: &str) -> Result<Option<ObjectHandle>, EngineError> {
        Ok(self
            .named
            .get(path)
            .and_then(|id| self.nodes.get(id).map(|n| ObjectHandle::new(*id, n.domain))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
windows:
  - id: 1
    domain: JAVA
    class: javax.swing.JFrame
    hwnd: 100
    pid: 7
    properties: { title: Main }
    children:
      - id: 2
        class: javax.swing.JButton
        properties: { text: OK }
    owned:
      - id: 3
        domain: JAVA
        class: javax.swing.JDialog
        properties: { title: Confirm }
named:
  Main: 1
"#;

    #[tokio::test]
    async fn indexes_tree_and_inherits_domain() {
        let engine = SnapshotEngine::from_yaml_str(YAML).unwrap();
        let main = ObjectHandle::new(1, Some(DomainName::Java));
        let kids = engine.children(&main).await.unwrap();
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].domain, Some(DomainName::Java));
        assert_eq!(
            engine.native_identity(&main).await.unwrap().as_deref(),
            Some("hwnd:100")
        );
        assert_eq!(engine.domains().await.unwrap(), vec![DomainName::Java]);
    }

    #[tokio::test]
    async fn closing_a_window_closes_its_tree() {
        let engine = SnapshotEngine::from_yaml_str(YAML).unwrap();
        engine.close(1);
        for id in [1, 2, 3] {
            assert!(!engine.exists(&ObjectHandle::new(id, None)).await.unwrap());
        }
        assert!(matches!(
            engine.class_name(&ObjectHandle::new(2, None)).await,
            Err(EngineError::Stale { id: 2 })
        ));
        assert!(engine
            .unregister(&ObjectHandle::new(1, None))
            .await
            .unwrap_err()
            .is_gone());
    }

    #[tokio::test]
    async fn unscoped_find_includes_top_windows() {
        let yaml = "capabilities: { find: true }\n".to_string() + YAML;
        let engine = SnapshotEngine::from_yaml_str(&yaml).unwrap();
        let criteria = FindCriteria {
            class_name: Some("javax.swing.JFrame".into()),
            properties: vec![("title".into(), "Main".into())],
        };
        let found = engine.find(None, &criteria).await.unwrap();
        assert_eq!(found.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(engine.find_calls(), 1);
    }

    #[tokio::test]
    async fn failing_properties_error_per_element() {
        let yaml = "failing_properties: [2]\n".to_string() + YAML;
        let engine = SnapshotEngine::from_yaml_str(&yaml).unwrap();
        let button = ObjectHandle::new(2, Some(DomainName::Java));
        assert!(matches!(
            engine.property(&button, "text").await,
            Err(EngineError::Communication(_))
        ));
        let main = ObjectHandle::new(1, Some(DomainName::Java));
        assert_eq!(
            engine.property(&main, "title").await.unwrap().as_deref(),
            Some("Main")
        );
    }

    #[test]
    fn rejects_duplicate_ids() {
        let yaml = "windows:\n  - { id: 1, class: A }\n  - { id: 1, class: B }\n";
        assert!(matches!(
            SnapshotEngine::from_yaml_str(yaml),
            Err(SnapshotError::DuplicateId(1))
        ));
    }
}
