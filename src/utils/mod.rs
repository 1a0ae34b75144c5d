//! Utilities

pub mod tokens;
