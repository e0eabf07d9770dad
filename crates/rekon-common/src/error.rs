use thiserror::Error;

/// Errors raised while parsing a recognition string.
///
/// These never reach the caller of a resolution: a malformed segment is
/// reported once in the log and then treated as "no match".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("Empty recognition string")]
    Empty,

    #[error("Empty segment at position {0}")]
    EmptySegment(usize),

    #[error("Unbalanced '{open}' block in: {text}")]
    UnbalancedBlock { open: char, text: String },

    #[error("Malformed qualifier: {0}")]
    MalformedQualifier(String),

    #[error("Non-numeric index: {0}")]
    InvalidIndex(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Property qualifier needs 'name:value', got: {0}")]
    InvalidProperty(String),

    #[error("Unknown qualifier: {0}")]
    UnknownQualifier(String),
}

/// Errors reported by the automation engine for a single primitive call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    // ============================================================
    // Object Errors
    // ============================================================
    #[error("Object {id} not found")]
    NotFound { id: u64 },

    #[error("Object {id} is stale (element no longer exists)")]
    Stale { id: u64 },

    #[error("Property '{name}' not available")]
    PropertyNotFound { name: String },

    // ============================================================
    // Transport Errors
    // ============================================================
    #[error("Engine communication failed: {0}")]
    Communication(String),

    #[error("Handle registration failed: {0}")]
    Registration(String),

    #[error("Timeout: {operation}")]
    Timeout { operation: String },

    // ============================================================
    // Capability Errors
    // ============================================================
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Other: {0}")]
    Other(String),
}

impl EngineError {
    /// Stable code for logs and tooling.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "OBJECT_NOT_FOUND",
            EngineError::Stale { .. } => "OBJECT_STALE",
            EngineError::PropertyNotFound { .. } => "PROPERTY_NOT_FOUND",
            EngineError::Communication(_) => "COMMUNICATION_ERROR",
            EngineError::Registration(_) => "REGISTRATION_ERROR",
            EngineError::Timeout { .. } => "TIMEOUT",
            EngineError::NotSupported(_) => "NOT_SUPPORTED",
            EngineError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Transient errors affect one candidate only; enumeration continues.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Communication(_)
                | EngineError::Registration(_)
                | EngineError::Timeout { .. }
                | EngineError::Stale { .. }
        )
    }

    /// "Already gone" outcomes of an unregister call.
    pub fn is_gone(&self) -> bool {
        matches!(self, EngineError::NotFound { .. } | EngineError::Stale { .. })
    }
}

/// Errors from the store that holds named recognition strings.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read map store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse map store: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(EngineError::Communication("pipe closed".into()).is_transient());
        assert!(EngineError::Stale { id: 4 }.is_transient());
        assert!(!EngineError::NotSupported("find".into()).is_transient());
        assert!(!EngineError::PropertyNotFound { name: "Title".into() }.is_transient());
    }

    #[test]
    fn gone_covers_not_found_and_stale() {
        assert!(EngineError::NotFound { id: 1 }.is_gone());
        assert!(EngineError::Stale { id: 1 }.is_gone());
        assert!(!EngineError::Registration("busy".into()).is_gone());
    }

    #[test]
    fn store_errors_wrap_io_failures() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "maps.yaml");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(err.to_string(), "Failed to read map store: maps.yaml");
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(EngineError::Stale { id: 9 }.code(), "OBJECT_STALE");
        assert_eq!(
            EngineError::Timeout {
                operation: "exists".into()
            }
            .code(),
            "TIMEOUT"
        );
    }
}
