//! Routing Table Engine
//!
//! Long-running event classifier booted as one of the rig's workers.
//! It shares nothing with the sequencer; the two only meet through the
//! domain's endpoint namespace.

pub mod event;
pub mod table;
pub mod worker;

pub use event::MidiEvent;
pub use table::{Routed, RoutingRule, RoutingTable, Tap};
pub use worker::{run_worker, WorkerStats};
