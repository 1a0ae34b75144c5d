//! Execution control
//!
//! Launching workers into a domain and proving them ready: the launcher,
//! the settle prober and the endpoint waiter, all built on blocking polls.

pub mod clock;
pub mod endpoint;
pub mod launcher;
pub mod settle;
