/// Boot sequencer
///
/// Drives a fixed boot plan strictly in order on one thread:
///
/// 1. verify every domain (probe handles are released immediately)
/// 2. for each step: launch, settle, wait for each readiness endpoint,
///    then the optional post delay
/// 3. trigger the connection-snapshot replays in the background
///
/// The first failure anywhere aborts the whole boot. Nothing is rolled
/// back: processes already launched keep running. Query handles opened
/// for endpoint waits are released on every exit path.
use crate::config::plan::BootPlan;
use crate::config::types::{BootStep, DomainName, Result};
use crate::core::domain::DomainVerifier;
use crate::core::types::{
    AbortPoint, BootAbort, BootReport, DomainRecord, SequencerState, StepRecord,
};
use crate::exec::clock::Clock;
use crate::exec::endpoint::EndpointWaiter;
use crate::exec::launcher::{Launcher, Spawner};
use crate::kernel::domain::{DomainBackend, DomainSession};
use crate::kernel::procfs::ProcessProbe;
use crate::observability::alert::Alarm;
use crate::observability::journal::{BootEvent, BootEventKind, BootJournal};
use std::time::Instant;

/// Every external collaborator a boot touches
#[derive(Clone, Copy)]
pub struct BootRuntime<'a> {
    pub domains: &'a dyn DomainBackend,
    pub spawner: &'a dyn Spawner,
    pub probe: &'a dyn ProcessProbe,
    pub clock: &'a dyn Clock,
    pub alarm: &'a dyn Alarm,
    pub journal: &'a BootJournal,
}

pub struct Sequencer<'a> {
    plan: &'a BootPlan,
    runtime: BootRuntime<'a>,
    debug: bool,
    state: SequencerState,
    history: Vec<SequencerState>,
    sessions: Vec<DomainSession>,
    handles_acquired: u32,
    handles_released: u32,
}

impl<'a> Sequencer<'a> {
    /// `debug` drops each step's headless arguments
    pub fn new(plan: &'a BootPlan, runtime: BootRuntime<'a>, debug: bool) -> Self {
        Self {
            plan,
            runtime,
            debug,
            state: SequencerState::NotStarted,
            history: vec![SequencerState::NotStarted],
            sessions: Vec::new(),
            handles_acquired: 0,
            handles_released: 0,
        }
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    /// Every state entered so far, oldest first
    pub fn history(&self) -> &[SequencerState] {
        &self.history
    }

    /// Run the whole plan. On failure the alert has already sounded when
    /// this returns.
    pub fn run(&mut self) -> std::result::Result<BootReport, BootAbort> {
        if self.state != SequencerState::NotStarted {
            log::warn!("Sequencer re-run from {:?}; starting over", self.state);
            self.state = SequencerState::NotStarted;
            self.history = vec![SequencerState::NotStarted];
            self.handles_acquired = 0;
            self.handles_released = 0;
        }

        let started = Instant::now();
        let journal = self.runtime.journal;
        journal.record(BootEvent::new(
            BootEventKind::BootStarted,
            format!(
                "Boot started: {} domain(s), {} step(s), debug mode {}",
                self.plan.effective_domains().len(),
                self.plan.steps.len(),
                if self.debug { "on" } else { "off" }
            ),
        ));

        let outcome = self.execute();
        self.release_sessions();

        match outcome {
            Ok((domains, steps, replays)) => {
                self.enter(SequencerState::Completed);
                let report = BootReport {
                    run_id: journal.run_id(),
                    domains,
                    steps,
                    replays,
                    handles_acquired: self.handles_acquired,
                    handles_released: self.handles_released,
                    elapsed_ms: elapsed_ms(started),
                };
                journal.record(BootEvent::new(
                    BootEventKind::BootCompleted,
                    format!(
                        "Boot completed: {} step(s) in {} ms",
                        report.steps.len(),
                        report.elapsed_ms
                    ),
                ));
                Ok(report)
            }
            Err(abort) => {
                self.enter(SequencerState::Aborted(abort.point.clone()));
                journal.record(BootEvent::new(BootEventKind::BootAborted, abort.to_string()));
                self.runtime.alarm.sound();
                Err(abort)
            }
        }
    }

    fn execute(
        &mut self,
    ) -> std::result::Result<(Vec<DomainRecord>, Vec<StepRecord>, Vec<u32>), BootAbort> {
        let plan = self.plan;
        let domains = self.verify_domains()?;

        let mut steps = Vec::with_capacity(plan.steps.len());
        for (index, step) in plan.steps.iter().enumerate() {
            self.enter(SequencerState::Running(index));
            match self.run_step(index, step) {
                Ok(record) => steps.push(record),
                Err(error) => {
                    self.runtime.journal.record(
                        BootEvent::new(BootEventKind::StepFailed, error.to_string())
                            .with_step(index, &step.label)
                            .with_domain(&step.domain),
                    );
                    return Err(BootAbort {
                        point: AbortPoint::Step {
                            index,
                            label: step.label.clone(),
                            domain: step.domain.clone(),
                        },
                        error,
                    });
                }
            }
        }

        let replays = self.replay()?;
        Ok((domains, steps, replays))
    }

    fn verify_domains(&mut self) -> std::result::Result<Vec<DomainRecord>, BootAbort> {
        let verifier = DomainVerifier::new(
            self.runtime.domains,
            self.runtime.clock,
            self.plan.timing.domain,
        );

        let mut records = Vec::new();
        for domain in self.plan.effective_domains() {
            log::info!("Verify / wait for domain '{}'...", domain);
            match verifier.verify(&domain) {
                Ok(record) => {
                    self.runtime.journal.record(
                        BootEvent::new(
                            BootEventKind::DomainVerified,
                            format!("Domain '{}' verified", domain),
                        )
                        .with_domain(&domain),
                    );
                    records.push(record);
                }
                Err(error) => {
                    self.runtime.journal.record(
                        BootEvent::new(BootEventKind::DomainUnavailable, error.to_string())
                            .with_domain(&domain),
                    );
                    return Err(BootAbort {
                        point: AbortPoint::Domain(domain),
                        error,
                    });
                }
            }
        }
        Ok(records)
    }

    fn run_step(&mut self, index: usize, step: &BootStep) -> Result<StepRecord> {
        let started = Instant::now();
        let runtime = self.runtime;
        let timing = self.plan.timing;

        log::info!("Start {} on domain '{}'...", step.label, step.domain);
        runtime.journal.record(
            BootEvent::new(BootEventKind::StepStarted, format!("Starting {}", step.label))
                .with_step(index, &step.label)
                .with_domain(&step.domain),
        );

        let argv = step.launch.resolve(self.debug);
        let launcher = Launcher::new(
            runtime.spawner,
            runtime.probe,
            runtime.clock,
            timing.launch,
            timing.settle,
        );
        let process = launcher.launch(&argv, &step.domain)?;

        if !step.endpoints.is_empty() {
            let waiter = EndpointWaiter::new(runtime.domains, runtime.clock, timing.endpoint);
            let slot = self.session_for(&waiter, &step.domain, &step.endpoints[0])?;
            waiter.wait_all(&self.sessions[slot], &step.endpoints)?;
            log::info!("{} endpoints confirmed", step.label);
        }

        if let Some(delay) = step.post_delay() {
            log::debug!("Pausing {:?} after {}", delay, step.label);
            runtime.clock.sleep(delay);
        }

        let record = StepRecord {
            index,
            label: step.label.clone(),
            domain: step.domain.clone(),
            pid: process.pid,
            endpoints: step.endpoints.clone(),
            elapsed_ms: elapsed_ms(started),
        };
        runtime.journal.record(
            BootEvent::new(
                BootEventKind::StepSucceeded,
                format!("{} ready in {} ms", step.label, record.elapsed_ms),
            )
            .with_step(index, &step.label)
            .with_domain(&step.domain)
            .with_pid(process.pid),
        );
        Ok(record)
    }

    fn replay(&mut self) -> std::result::Result<Vec<u32>, BootAbort> {
        let plan = self.plan;
        if plan.replay.is_empty() {
            return Ok(Vec::new());
        }
        self.enter(SequencerState::Replaying);

        let runtime = self.runtime;
        let launcher = Launcher::new(
            runtime.spawner,
            runtime.probe,
            runtime.clock,
            plan.timing.launch,
            plan.timing.settle,
        );

        let mut pids = Vec::with_capacity(plan.replay.len());
        for (index, replay) in plan.replay.iter().enumerate() {
            let argv = plan.replay_argv(replay);
            log::info!(
                "Replaying connections on '{}' from {}",
                replay.domain,
                replay.snapshot.display()
            );
            match launcher.spawn_background(&argv, &replay.domain) {
                Ok(pid) => {
                    runtime.journal.record(
                        BootEvent::new(
                            BootEventKind::ReplayTriggered,
                            format!("Replay of {} started", replay.snapshot.display()),
                        )
                        .with_domain(&replay.domain)
                        .with_pid(pid),
                    );
                    pids.push(pid);
                }
                Err(error) => {
                    return Err(BootAbort {
                        point: AbortPoint::Replay {
                            index,
                            domain: replay.domain.clone(),
                        },
                        error,
                    });
                }
            }
        }
        Ok(pids)
    }

    /// Index of the query handle for `domain`, opening one on first use
    fn session_for(
        &mut self,
        waiter: &EndpointWaiter<'_>,
        domain: &DomainName,
        pending: &str,
    ) -> Result<usize> {
        if let Some(slot) = self.sessions.iter().position(|s| s.domain() == domain) {
            return Ok(slot);
        }
        let session = waiter.open_session(domain, pending)?;
        self.handles_acquired += 1;
        self.sessions.push(session);
        Ok(self.sessions.len() - 1)
    }

    fn release_sessions(&mut self) {
        for session in self.sessions.drain(..) {
            let domain = session.domain().clone();
            match self.runtime.domains.release(session) {
                Ok(()) => self.handles_released += 1,
                Err(e) => log::warn!("Failed to release handle on '{}': {}", domain, e),
            }
        }
    }

    fn enter(&mut self, state: SequencerState) {
        log::debug!("Sequencer {:?} -> {:?}", self.state, state);
        self.history.push(state.clone());
        self.state = state;
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
