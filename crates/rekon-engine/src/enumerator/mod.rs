//! Candidate enumeration: top-level windows per domain and children per
//! handle.

pub mod children;
pub mod domains;

pub use children::children;
pub use domains::{WindowQuery, activate_surfaces, top_windows};
