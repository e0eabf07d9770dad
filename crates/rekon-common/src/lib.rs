pub mod domain;
pub mod error;
pub mod qualifier;
pub mod recognition;

pub use domain::DomainName;
pub use error::{EngineError, RecognitionError, StoreError};
pub use qualifier::{Qualifier, QualifierKind, QualifierValue, ValuePattern};
pub use recognition::{Category, MapEntry, RecognitionPath, RecognitionSegment, SearchMode};
