/// Process launcher
///
/// Spawns a worker bound to a domain and decides, without any help from
/// the worker, that it survived start-up: the pid must resolve to a live
/// process, then the settle prober must see its I/O counters.
use crate::config::types::{
    BootError, DomainName, LaunchTiming, ManagedProcess, ProcessState, Result, SettleTiming,
    DOMAIN_ENV_VAR,
};
use crate::exec::clock::Clock;
use crate::exec::settle::SettleProber;
use crate::kernel::procfs::ProcessProbe;
use std::process::{Command, Stdio};

/// Starts external commands. Returns the OS pid; the child is not reaped.
pub trait Spawner {
    fn spawn(&self, argv: &[String], domain: &DomainName) -> Result<u32>;
}

/// Spawner backed by `std::process::Command`.
///
/// The only environment change is the domain selector. stdio is
/// inherited so worker output lands on the operator console.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandSpawner;

impl Spawner for CommandSpawner {
    fn spawn(&self, argv: &[String], domain: &DomainName) -> Result<u32> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| BootError::Config("empty command".to_string()))?;

        let child = Command::new(program)
            .args(args)
            .env(DOMAIN_ENV_VAR, domain.as_str())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| BootError::LaunchFailed {
                command: argv.join(" "),
                reason: format!("spawn failed: {}", e),
            })?;

        // Dropping the handle neither kills nor waits; the OS owns the child now.
        Ok(child.id())
    }
}

pub struct Launcher<'a> {
    spawner: &'a dyn Spawner,
    probe: &'a dyn ProcessProbe,
    clock: &'a dyn Clock,
    launch: LaunchTiming,
    settle: SettleTiming,
}

impl<'a> Launcher<'a> {
    pub fn new(
        spawner: &'a dyn Spawner,
        probe: &'a dyn ProcessProbe,
        clock: &'a dyn Clock,
        launch: LaunchTiming,
        settle: SettleTiming,
    ) -> Self {
        Self {
            spawner,
            probe,
            clock,
            launch,
            settle,
        }
    }

    /// Spawn `argv` on `domain`, wait for the pid to register, then settle it.
    pub fn launch(&self, argv: &[String], domain: &DomainName) -> Result<ManagedProcess> {
        if argv.is_empty() {
            return Err(BootError::Config("empty command".to_string()));
        }

        let pid = self.spawner.spawn(argv, domain)?;
        log::debug!("Spawned pid {} on domain '{}': {}", pid, domain, argv.join(" "));

        let mut process = ManagedProcess {
            pid,
            argv: argv.to_vec(),
            domain: domain.clone(),
            state: ProcessState::Starting,
        };

        self.await_registration(&mut process)?;
        SettleProber::new(self.probe, self.clock, self.settle).settle(&mut process)?;
        Ok(process)
    }

    /// Spawn without any readiness checks
    pub fn spawn_background(&self, argv: &[String], domain: &DomainName) -> Result<u32> {
        if argv.is_empty() {
            return Err(BootError::Config("empty command".to_string()));
        }
        let pid = self.spawner.spawn(argv, domain)?;
        log::info!("Started background pid {}: {}", pid, argv.join(" "));
        Ok(pid)
    }

    /// Grace period, then poll until the pid resolves to a live process.
    /// A pid that never resolves means the command exited immediately.
    fn await_registration(&self, process: &mut ManagedProcess) -> Result<()> {
        let policy = self.launch.register;
        let mut last_error = String::from("no resolution attempted");

        self.clock.sleep(self.launch.initial_delay());
        for attempt in 1..=policy.attempts {
            if attempt > 1 {
                self.clock.sleep(policy.interval());
            }
            match self.probe.resolve(process.pid) {
                Ok(info) => {
                    log::debug!(
                        "pid {} registered as '{}' ({:?}) on attempt {}",
                        process.pid,
                        info.comm,
                        info.state,
                        attempt
                    );
                    return Ok(());
                }
                Err(e) => {
                    log::debug!(
                        "pid {} not resolvable (attempt {}/{}): {}",
                        process.pid,
                        attempt,
                        policy.attempts,
                        e
                    );
                    last_error = e.to_string();
                }
            }
        }

        process.state = ProcessState::Dead;
        Err(BootError::LaunchFailed {
            command: process.command_line(),
            reason: format!(
                "pid {} did not register after {} attempts: {}",
                process.pid, policy.attempts, last_error
            ),
        })
    }
}
