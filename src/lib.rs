//! rigboot: ordered boot orchestration for multi-server audio rigs
//! Brings up audio server domains and their worker processes in a fixed order,
//! proving each one ready before the next starts, and fails loudly on the first miss
//!
//! # Architecture
//!
//! ## OS Primitives ([`kernel`])
//! - [`kernel::domain`]: Domain backend (client handles, endpoint queries)
//! - [`kernel::procfs`]: Process metadata and I/O counters from `/proc`
//! - [`kernel::signal`]: Signal exit handling
//!
//! ## Execution Control ([`exec`])
//! - [`exec::launcher`]: Spawn a worker bound to a domain and await registration
//! - [`exec::settle`]: I/O-counter liveness probe
//! - [`exec::endpoint`]: Endpoint readiness wait and substring discovery
//! - [`exec::clock`]: The sleeps every wait loop is built from
//!
//! ## Boot Core ([`core`])
//! - [`core::domain`]: Domain verification
//! - [`core::sequencer`]: Linear boot state machine
//! - [`core::types`]: Sequencer states, abort points, boot report
//!
//! ## Routing ([`routing`])
//! - [`routing::table`]: Channel routing rules (single and weighted fan-out)
//! - [`routing::worker`]: Line-oriented router loop
//!
//! ## Observability ([`observability`])
//! - [`observability::journal`]: Structured boot journal
//! - [`observability::alert`]: Audible failure alert
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Shared types and the error taxonomy
//! - [`config::plan`]: Boot plan file
//! - [`config::presets`]: Reference rig and routing table
//! - [`config::validator`]: Startup validation
//!
//! # Design Principles
//!
//! 1. **Order is the contract** - One thread, one step at a time, no parallel boot
//! 2. **Observe, don't ask** - Readiness comes from `/proc` and the domain, never the worker
//! 3. **Bounded waits** - Every poll has a hard attempt ceiling
//! 4. **Fail fast and loud** - First failure aborts, sounds the alert, exits non-zero

// OS Primitives
pub mod kernel;

// Execution Control
pub mod exec;

// Boot sequencing core
pub mod core;

// Routing Table Engine
pub mod routing;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// Testing Infrastructure
pub mod testing;

// CLI entrypoint wiring shared by the rigboot/distribute binaries.
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
pub use crate::core::sequencer::{BootRuntime, Sequencer};
pub use crate::core::types::{AbortPoint, BootAbort, BootReport, SequencerState};
