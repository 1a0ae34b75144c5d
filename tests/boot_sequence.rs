//! End-to-end boot sequencing against scripted collaborators
//!
//! Every domain, process and endpoint is faked so the tests run without an
//! audio server and without sleeping.

use rigboot::config::plan::BootPlan;
use rigboot::config::types::{BootError, BootStep, DomainName, FailureKind, LaunchSpec, ReplaySpec};
use rigboot::core::types::{AbortPoint, SequencerState};
use rigboot::observability::journal::{BootEventKind, BootJournal};
use rigboot::testing::{CountingAlarm, FakeClock, FakeDomainBackend, RecordingSpawner, ScriptedProbe};
use rigboot::{BootRuntime, Sequencer};
use std::time::Duration;

const FIRST: u32 = RecordingSpawner::FIRST_PID;

fn step(label: &str, domain: &str, argv: &[&str]) -> BootStep {
    BootStep {
        label: label.to_string(),
        domain: DomainName::from(domain),
        launch: LaunchSpec::new(argv.iter().copied()),
        endpoints: Vec::new(),
        post_delay_ms: None,
    }
}

fn three_step_plan() -> BootPlan {
    let mut router = step("router", "default", &["distribute"]);
    router.endpoints = vec!["Distribute:out_1".to_string()];
    let mut mixer = step("mixer", "default", &["non-mixer", "--instance", "Mixer-General"]);
    mixer.post_delay_ms = Some(3_000);
    let synth = step("synth", "SOFT1", &["yoshimi", "-c"]);
    BootPlan::new(vec![router, mixer, synth])
}

fn backend() -> FakeDomainBackend {
    FakeDomainBackend::new()
        .with_domain("default")
        .with_domain("SOFT1")
        .with_endpoint("default", "Distribute:out_1", 1)
}

struct Rig {
    backend: FakeDomainBackend,
    spawner: RecordingSpawner,
    probe: ScriptedProbe,
    clock: FakeClock,
    alarm: CountingAlarm,
    journal: BootJournal,
}

impl Rig {
    fn new(backend: FakeDomainBackend, probe: ScriptedProbe) -> Self {
        Self {
            backend,
            spawner: RecordingSpawner::new(),
            probe,
            clock: FakeClock::new(),
            alarm: CountingAlarm::new(),
            journal: BootJournal::new(),
        }
    }

    fn runtime(&self) -> BootRuntime<'_> {
        BootRuntime {
            domains: &self.backend,
            spawner: &self.spawner,
            probe: &self.probe,
            clock: &self.clock,
            alarm: &self.alarm,
            journal: &self.journal,
        }
    }
}

#[test]
fn test_all_steps_complete_and_release_handles() {
    let plan = three_step_plan();
    let rig = Rig::new(backend(), ScriptedProbe::new());

    let mut sequencer = Sequencer::new(&plan, rig.runtime(), false);
    let report = sequencer.run().expect("boot should complete");

    assert_eq!(sequencer.state(), &SequencerState::Completed);
    assert_eq!(
        sequencer.history(),
        &[
            SequencerState::NotStarted,
            SequencerState::Running(0),
            SequencerState::Running(1),
            SequencerState::Running(2),
            SequencerState::Completed,
        ]
    );
    assert_eq!(rig.spawner.programs(), vec!["distribute", "non-mixer", "yoshimi"]);
    assert_eq!(report.steps.len(), 3);
    assert_eq!(report.steps[2].pid, FIRST + 2);
    assert_eq!(report.domains.len(), 2);

    assert_eq!(report.handles_acquired, 1);
    assert_eq!(report.handles_released, report.handles_acquired);
    assert_eq!(rig.backend.opened(), rig.backend.released());
    assert_eq!(rig.alarm.count(), 0);
    assert_eq!(rig.journal.kinds().last(), Some(&BootEventKind::BootCompleted));
}

#[test]
fn test_step_two_exiting_immediately_aborts_at_step_two() {
    let plan = three_step_plan();
    let rig = Rig::new(backend(), ScriptedProbe::new().exits_immediately(FIRST + 1));

    let mut sequencer = Sequencer::new(&plan, rig.runtime(), false);
    let abort = sequencer.run().expect_err("boot should abort");

    assert_eq!(
        abort.point,
        AbortPoint::Step {
            index: 1,
            label: "mixer".to_string(),
            domain: DomainName::primary(),
        }
    );
    assert_eq!(abort.kind(), FailureKind::LaunchFailed);
    assert!(matches!(abort.error, BootError::LaunchFailed { .. }));
    assert_eq!(abort.exit_code(), 4);
    assert!(matches!(sequencer.state(), SequencerState::Aborted(_)));

    // step 3 was never attempted
    assert_eq!(rig.spawner.programs(), vec!["distribute", "non-mixer"]);
    assert!(!sequencer.history().contains(&SequencerState::Running(2)));

    assert_eq!(rig.alarm.count(), 1);
    assert_eq!(rig.backend.opened(), rig.backend.released());
    let kinds = rig.journal.kinds();
    assert!(kinds.contains(&BootEventKind::StepFailed));
    assert_eq!(kinds.last(), Some(&BootEventKind::BootAborted));
}

#[test]
fn test_failure_at_any_step_stops_everything_after_it() {
    for failing in 0..3u32 {
        let plan = three_step_plan();
        let rig = Rig::new(backend(), ScriptedProbe::new().never_settles(FIRST + failing));

        let mut sequencer = Sequencer::new(&plan, rig.runtime(), false);
        let abort = sequencer.run().unwrap_err();

        assert_eq!(abort.kind(), FailureKind::NotSettling);
        assert_eq!(rig.spawner.spawned().len(), failing as usize + 1);
        // every earlier step settled before the failing one was spawned
        for earlier in 0..failing {
            assert!(rig.probe.io_probes(FIRST + earlier) >= 1);
        }
        assert_eq!(rig.probe.io_probes(FIRST + failing), 15);
    }
}

#[test]
fn test_worker_dying_after_registration_aborts_the_boot() {
    let plan = three_step_plan();
    let rig = Rig::new(backend(), ScriptedProbe::new().dies_after_registering(FIRST + 2));

    let mut sequencer = Sequencer::new(&plan, rig.runtime(), false);
    let abort = sequencer.run().unwrap_err();

    assert_eq!(abort.kind(), FailureKind::NotSettling);
    assert!(matches!(abort.point, AbortPoint::Step { index: 2, .. }));
    assert!(!sequencer.history().contains(&SequencerState::Completed));
    assert_eq!(rig.alarm.count(), 1);
}

#[test]
fn test_unavailable_domain_aborts_before_any_launch() {
    let plan = three_step_plan();
    let backend = FakeDomainBackend::new()
        .with_domain("default")
        .with_dead_domain("SOFT1");
    let rig = Rig::new(backend, ScriptedProbe::new());

    let mut sequencer = Sequencer::new(&plan, rig.runtime(), false);
    let abort = sequencer.run().unwrap_err();

    assert_eq!(abort.point, AbortPoint::Domain(DomainName::from("SOFT1")));
    assert_eq!(abort.kind(), FailureKind::DomainUnavailable);
    assert!(rig.spawner.spawned().is_empty());
    assert_eq!(rig.backend.open_attempts("SOFT1"), 21);
    assert_eq!(rig.clock.total(), Duration::from_secs(20));
    assert_eq!(
        sequencer.history(),
        &[
            SequencerState::NotStarted,
            SequencerState::Aborted(AbortPoint::Domain(DomainName::from("SOFT1"))),
        ]
    );
    assert_eq!(rig.alarm.count(), 1);
}

#[test]
fn test_missing_endpoint_aborts_and_releases_query_handle() {
    let plan = three_step_plan();
    let backend = FakeDomainBackend::new()
        .with_domain("default")
        .with_domain("SOFT1");
    let rig = Rig::new(backend, ScriptedProbe::new());

    let mut sequencer = Sequencer::new(&plan, rig.runtime(), false);
    let abort = sequencer.run().unwrap_err();

    assert_eq!(abort.kind(), FailureKind::EndpointTimeout);
    assert!(matches!(abort.point, AbortPoint::Step { index: 0, .. }));
    assert_eq!(rig.backend.lookups("default", "Distribute:out_1"), 6);
    // two verification handles plus the query handle, all given back
    assert_eq!(rig.backend.opened(), 3);
    assert_eq!(rig.backend.released(), 3);
    assert!(abort.to_string().contains("router"));
}

#[test]
fn test_query_handle_is_retried_while_domain_blips() {
    let plan = three_step_plan();
    // verification gets through, the next two opens are refused
    let rig = Rig::new(backend().with_outage("default", 1, 2), ScriptedProbe::new());

    let mut sequencer = Sequencer::new(&plan, rig.runtime(), false);
    let report = sequencer.run().unwrap();

    assert_eq!(report.handles_acquired, 1);
    assert_eq!(rig.backend.open_attempts("default"), 4);
    assert_eq!(rig.backend.opened(), rig.backend.released());
}

#[test]
fn test_query_handle_never_opening_is_an_endpoint_timeout() {
    let plan = three_step_plan();
    let rig = Rig::new(backend().with_outage("default", 1, u32::MAX), ScriptedProbe::new());

    let abort = Sequencer::new(&plan, rig.runtime(), false).run().unwrap_err();

    assert_eq!(abort.kind(), FailureKind::EndpointTimeout);
    assert!(matches!(abort.point, AbortPoint::Step { index: 0, .. }));
    assert_eq!(rig.backend.open_attempts("default"), 7);
    assert_eq!(rig.backend.lookups("default", "Distribute:out_1"), 0);
    assert_eq!(rig.alarm.count(), 1);
}

#[test]
fn test_timing_of_a_clean_step() {
    let plan = BootPlan::new(vec![step("synth", "default", &["yoshimi"])]);
    let rig = Rig::new(
        FakeDomainBackend::new().with_domain("default"),
        ScriptedProbe::new().settles_on(FIRST, 3),
    );

    Sequencer::new(&plan, rig.runtime(), false).run().unwrap();

    // 1s grace, 3 settle probes, 1s settle delay
    assert_eq!(rig.clock.total(), Duration::from_secs(5));
}

#[test]
fn test_post_delay_follows_readiness() {
    let plan = three_step_plan();
    let rig = Rig::new(backend(), ScriptedProbe::new());

    Sequencer::new(&plan, rig.runtime(), false).run().unwrap();

    let sleeps = rig.clock.sleeps();
    assert!(sleeps.contains(&Duration::from_secs(3)));
}

#[test]
fn test_debug_mode_keeps_interactive_front_end() {
    let mut synth = step("synth", "default", &["yoshimi", "-c", "-N", "YoshSRO1"]);
    synth.launch = synth.launch.with_headless_args(["-i"]);
    let plan = BootPlan::new(vec![synth]);

    let headless = Rig::new(FakeDomainBackend::new().with_domain("default"), ScriptedProbe::new());
    Sequencer::new(&plan, headless.runtime(), false).run().unwrap();
    assert_eq!(headless.spawner.spawned()[0].0[1], "-i");

    let debug = Rig::new(FakeDomainBackend::new().with_domain("default"), ScriptedProbe::new());
    Sequencer::new(&plan, debug.runtime(), true).run().unwrap();
    assert_eq!(debug.spawner.spawned()[0].0[1], "-c");
}

#[test]
fn test_replay_runs_after_every_step() {
    let mut plan = three_step_plan();
    plan.replay.push(ReplaySpec {
        domain: DomainName::primary(),
        snapshot: "/home/rig/AJBoot.xml".into(),
    });
    let rig = Rig::new(backend(), ScriptedProbe::new());

    let mut sequencer = Sequencer::new(&plan, rig.runtime(), false);
    let report = sequencer.run().unwrap();

    let spawned = rig.spawner.spawned();
    assert_eq!(spawned.len(), 4);
    assert_eq!(spawned[3].0, vec!["aj-snapshot", "-r", "/home/rig/AJBoot.xml"]);
    assert_eq!(report.replays, vec![FIRST + 3]);
    assert!(sequencer.history().contains(&SequencerState::Replaying));
    assert!(rig.journal.kinds().contains(&BootEventKind::ReplayTriggered));
    // background replay is never settle-probed
    assert_eq!(rig.probe.io_probes(FIRST + 3), 0);
}

#[test]
fn test_failed_replay_is_fatal() {
    let mut plan = three_step_plan();
    plan.replay.push(ReplaySpec {
        domain: DomainName::primary(),
        snapshot: "/home/rig/AJBoot.xml".into(),
    });
    let mut rig = Rig::new(backend(), ScriptedProbe::new());
    rig.spawner = RecordingSpawner::new().failing("aj-snapshot");

    let abort = Sequencer::new(&plan, rig.runtime(), false).run().unwrap_err();

    assert_eq!(
        abort.point,
        AbortPoint::Replay {
            index: 0,
            domain: DomainName::primary(),
        }
    );
    assert_eq!(rig.alarm.count(), 1);
}
