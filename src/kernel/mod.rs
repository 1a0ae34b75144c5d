//! Thin wrappers around OS and audio-server primitives.
//!
//! All `unsafe` code is concentrated here.

pub mod domain;
pub mod procfs;
pub mod signal;
