//! Boot core.
//!
//! Domain verification and the sequencer state machine that drives a
//! fixed boot plan from the first domain check to the final replay.

pub mod domain;
pub mod sequencer;
pub mod types;
