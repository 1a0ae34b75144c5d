//! Observability
//!
//! Structured boot journal and the audible failure alert.

pub mod alert;
pub mod journal;
