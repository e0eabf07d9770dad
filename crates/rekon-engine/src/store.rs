//! Named recognition strings.
//!
//! Application maps are owned by an external store; resolution only reads
//! them. [`MapStore`] is an in-memory implementation loadable from YAML:
//!
//! ```yaml
//! login:
//!   LoginWindow:
//!     recognition: "Type=Window;Caption=Login"
//!     children:
//!       OK: "Type=Button;Name=OK"
//! ```

use async_trait::async_trait;
pub use rekon_common::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[async_trait]
pub trait RecognitionStore: Send + Sync {
    /// Raw, possibly tagged recognition text for a window (`child = None`)
    /// or one of its children. `Ok(None)` when the map or name is unknown.
    async fn recognition(
        &self,
        map: &str,
        window: &str,
        child: Option<&str>,
    ) -> Result<Option<String>, StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowEntry {
    pub recognition: String,
    #[serde(default)]
    pub children: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapStore {
    maps: HashMap<String, BTreeMap<String, WindowEntry>>,
}

impl MapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, StoreError> {
        serde_yaml::from_str(content).map_err(|e| StoreError::Parse(e.to_string()))
    }

    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_yaml_str(&content)
    }

    pub fn insert_window(&mut self, map: &str, window: &str, recognition: &str) {
        let entry = self
            .maps
            .entry(map.to_string())
            .or_default()
            .entry(window.to_string())
            .or_default();
        entry.recognition = recognition.to_string();
    }

    pub fn insert_child(&mut self, map: &str, window: &str, child: &str, recognition: &str) {
        self.maps
            .entry(map.to_string())
            .or_default()
            .entry(window.to_string())
            .or_default()
            .children
            .insert(child.to_string(), recognition.to_string());
    }

    pub fn map_names(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }

    fn window(&self, map: &str, window: &str) -> Option<&WindowEntry> {
        let windows = lookup(&self.maps, map)?;
        lookup(windows, window)
    }
}

/// Exact key first, then a case-insensitive match.
fn lookup<'a, V: 'a>(
    entries: impl IntoIterator<Item = (&'a String, &'a V)>,
    key: &str,
) -> Option<&'a V> {
    let mut fallback = None;
    for (k, v) in entries {
        if k == key {
            return Some(v);
        }
        if fallback.is_none() && k.eq_ignore_ascii_case(key) {
            fallback = Some(v);
        }
    }
    fallback
}

#[async_trait]
impl RecognitionStore for MapStore {
    async fn recognition(
        &self,
        map: &str,
        window: &str,
        child: Option<&str>,
    ) -> Result<Option<String>, StoreError> {
        let Some(entry) = self.window(map, window) else {
            return Ok(None);
        };
        Ok(match child {
            None => Some(entry.recognition.clone()),
            Some(child) => lookup(&entry.children, child).cloned(),
        })
    }
}
