use crate::config::ConfigError;
use rekon_common::StoreError;
use thiserror::Error;

/// Faults that reach the caller of a resolution.
///
/// "Not found", stale handles, malformed recognition text and transient
/// engine failures are not errors: they resolve to `Ok(None)`.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Map store fault: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration fault: {0}")]
    Config(#[from] ConfigError),
}
