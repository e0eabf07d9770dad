pub mod resolver;
pub mod search;

pub use resolver::{CacheTarget, ObjectResolver};
pub use search::Searcher;
