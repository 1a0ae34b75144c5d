/// Settle prober
///
/// A freshly spawned worker is considered alive and scheduled once the
/// kernel will hand out its I/O accounting counters and the pid still
/// resolves to a live process. A zombie keeps its counters readable, so
/// the counters alone are not enough. This is a liveness signal only; it
/// says nothing about whether the worker finished its own setup.
use crate::config::types::{BootError, ManagedProcess, ProcessState, Result, SettleTiming};
use crate::exec::clock::Clock;
use crate::kernel::procfs::ProcessProbe;

pub struct SettleProber<'a> {
    probe: &'a dyn ProcessProbe,
    clock: &'a dyn Clock,
    timing: SettleTiming,
}

impl<'a> SettleProber<'a> {
    pub fn new(probe: &'a dyn ProcessProbe, clock: &'a dyn Clock, timing: SettleTiming) -> Self {
        Self {
            probe,
            clock,
            timing,
        }
    }

    /// Poll the I/O counters of `process`, sleeping one interval before
    /// each read. On the first successful read, confirm the process is
    /// still alive, sleep the settle delay and mark it settled. A process
    /// that has already exited fails at once.
    pub fn settle(&self, process: &mut ManagedProcess) -> Result<()> {
        let attempts = self.timing.probe.attempts;

        for attempt in 1..=attempts {
            self.clock.sleep(self.timing.probe.interval());
            match self.probe.io_counters(process.pid) {
                Ok(counters) => {
                    log::debug!(
                        "pid {} produced I/O counters on probe {} (rchar={}, wchar={})",
                        process.pid,
                        attempt,
                        counters.rchar,
                        counters.wchar
                    );
                    if let Err(e) = self.probe.resolve(process.pid) {
                        log::warn!(
                            "pid {} exited before settling ({}): {}",
                            process.pid,
                            e,
                            process.command_line()
                        );
                        return Err(BootError::NotSettling {
                            command: process.command_line(),
                            pid: process.pid,
                            attempts: attempt,
                        });
                    }
                    self.clock.sleep(self.timing.settle_delay());
                    process.state = ProcessState::Settled;
                    log::info!("Process appears ready: {}", process.command_line());
                    return Ok(());
                }
                Err(e) => {
                    log::debug!(
                        "I/O counter probe {}/{} for pid {} failed: {}",
                        attempt,
                        attempts,
                        process.pid,
                        e
                    );
                }
            }
        }

        Err(BootError::NotSettling {
            command: process.command_line(),
            pid: process.pid,
            attempts,
        })
    }
}
