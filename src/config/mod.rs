//! Configuration
//!
//! Shared types and the error taxonomy, the boot plan file, the reference
//! rig presets, and startup validation.

pub mod plan;
pub mod presets;
pub mod types;
pub mod validator;
