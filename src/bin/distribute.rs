//! Channel router: JSON event lines on stdin, routed copies on stdout.
//!
//! It exposes no audio server ports, so it never satisfies the reference
//! rig's `Distribute:out_1` / `Distribute:out_16` readiness check.

use anyhow::Result;

fn main() -> Result<()> {
    rigboot::cli::run(rigboot::cli::CliMode::Distribute)
}
