//! Testing infrastructure
//!
//! Scripted fakes for the collaborator traits a boot is built from.

pub mod fakes;

pub use fakes::*;
