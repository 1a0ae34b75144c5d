use log::info;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
/// Signal handling for the boot orchestrator
///
/// Wait loops have no cancellation path. An operator stops a boot by
/// terminating the whole process, so the handler exits immediately.
/// Launched workers are left running; they belong to the OS after spawn.
use std::sync::atomic::{AtomicBool, Ordering};

static HANDLERS_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Signals that terminate a boot in progress
pub const EXIT_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP];

/// Async-safe exit handler.
/// Only write(2) and _exit(2) are used: no allocation, no locks, no stdio.
extern "C" fn exit_on_signal(sig: libc::c_int) {
    let msg = b"rigboot: signal received, boot interrupted\n";
    unsafe {
        libc::write(2, msg.as_ptr() as *const libc::c_void, msg.len());
        libc::_exit(128 + sig);
    }
}

/// Install the exit handler for SIGINT, SIGTERM and SIGHUP.
/// Must be called early in main() before any threads are spawned.
pub fn install_exit_handlers() -> Result<(), String> {
    if HANDLERS_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let action = SigAction::new(
        SigHandler::Handler(exit_on_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );

    for sig in EXIT_SIGNALS {
        unsafe {
            signal::sigaction(sig, &action)
                .map_err(|e| format!("Failed to install {} handler: {}", sig, e))?;
        }
    }

    info!("Signal handlers installed (SIGINT, SIGTERM, SIGHUP)");
    Ok(())
}

/// Whether `install_exit_handlers` has run in this process
pub fn handlers_installed() -> bool {
    HANDLERS_INSTALLED.load(Ordering::SeqCst)
}
