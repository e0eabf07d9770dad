pub mod cache;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod enumerator;
pub mod error;
pub mod matcher;
pub mod probe;
pub mod resolution;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod wait;

pub use engine::{Engine, EngineCapabilities, EngineError, FindCriteria, NativeWindow, ObjectHandle};
pub use error::ResolveError;
pub use probe::Attribute;
pub use resolution::{CacheTarget, ObjectResolver};
pub use session::Session;
pub use snapshot::{Snapshot, SnapshotEngine, SnapshotError};
pub use store::{MapStore, RecognitionStore};
pub use wait::poll_until;

pub use rekon_common::{DomainName, MapEntry, RecognitionPath, SearchMode};
