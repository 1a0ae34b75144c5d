/// Deterministic stand-ins for every boot collaborator.
///
/// All of them record what they were asked to do so tests can assert on
/// call order, sleep totals and handle bookkeeping without real servers,
/// real processes or real time.
use crate::config::types::{BootError, Direction, DomainName, Endpoint, Result};
use crate::exec::clock::Clock;
use crate::exec::launcher::Spawner;
use crate::kernel::domain::{DomainBackend, DomainSession};
use crate::kernel::procfs::{IoCounters, ProcessInfo, ProcessProbe, RunState};
use crate::observability::alert::Alarm;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Clock that records sleeps instead of performing them
#[derive(Debug, Default)]
pub struct FakeClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sleep_count(&self) -> usize {
        self.sleeps().len()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Clock for FakeClock {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}

/// Scripted behaviour for one pid
#[derive(Clone, Copy, Debug)]
enum PidScript {
    /// Never resolves: the command exited at once
    ExitsImmediately,
    /// Resolves, then I/O counters appear on probe `k` (None = never)
    SettlesOn(Option<u32>),
    /// Resolves once, then exits; its counters stay readable as a zombie
    DiesAfterRegistering,
}

/// Process probe driven by per-pid scripts. Unscripted pids resolve and
/// settle on the first probe.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    scripts: Mutex<HashMap<u32, PidScript>>,
    io_probes: Mutex<HashMap<u32, u32>>,
    resolves: Mutex<HashMap<u32, u32>>,
    resolve_calls: AtomicU32,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exits_immediately(self, pid: u32) -> Self {
        self.script(pid, PidScript::ExitsImmediately)
    }

    /// I/O counters become readable on probe `k` (1-based)
    pub fn settles_on(self, pid: u32, k: u32) -> Self {
        self.script(pid, PidScript::SettlesOn(Some(k)))
    }

    pub fn never_settles(self, pid: u32) -> Self {
        self.script(pid, PidScript::SettlesOn(None))
    }

    /// Registers, then crashes before the first settle probe
    pub fn dies_after_registering(self, pid: u32) -> Self {
        self.script(pid, PidScript::DiesAfterRegistering)
    }

    fn script(self, pid: u32, script: PidScript) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(pid, script);
        }
        self
    }

    fn script_for(&self, pid: u32) -> PidScript {
        self.scripts
            .lock()
            .ok()
            .and_then(|s| s.get(&pid).copied())
            .unwrap_or(PidScript::SettlesOn(Some(1)))
    }

    /// How many times the I/O counters of `pid` were read
    pub fn io_probes(&self, pid: u32) -> u32 {
        self.io_probes
            .lock()
            .ok()
            .and_then(|p| p.get(&pid).copied())
            .unwrap_or(0)
    }

    pub fn resolve_calls(&self) -> u32 {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

fn no_such_process(pid: u32) -> BootError {
    BootError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("no process {}", pid),
    ))
}

impl ProcessProbe for ScriptedProbe {
    fn resolve(&self, pid: u32) -> Result<ProcessInfo> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let seen = match self.resolves.lock() {
            Ok(mut resolves) => {
                let count = resolves.entry(pid).or_insert(0);
                *count += 1;
                *count
            }
            Err(_) => return Err(no_such_process(pid)),
        };
        match self.script_for(pid) {
            PidScript::ExitsImmediately => Err(no_such_process(pid)),
            PidScript::DiesAfterRegistering if seen > 1 => Err(no_such_process(pid)),
            PidScript::SettlesOn(_) | PidScript::DiesAfterRegistering => Ok(ProcessInfo {
                pid,
                comm: "fake".to_string(),
                state: RunState::Sleeping,
                ppid: 1,
            }),
        }
    }

    fn io_counters(&self, pid: u32) -> Result<IoCounters> {
        let probe = match self.io_probes.lock() {
            Ok(mut probes) => {
                let count = probes.entry(pid).or_insert(0);
                *count += 1;
                *count
            }
            Err(_) => return Err(no_such_process(pid)),
        };
        match self.script_for(pid) {
            PidScript::SettlesOn(Some(k)) if probe >= k => Ok(IoCounters::default()),
            PidScript::DiesAfterRegistering => Ok(IoCounters::default()),
            _ => Err(BootError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("io counters of {} not readable yet", pid),
            ))),
        }
    }
}

/// Spawner that hands out sequential pids starting at [`RecordingSpawner::FIRST_PID`]
#[derive(Debug, Default)]
pub struct RecordingSpawner {
    spawned: Mutex<Vec<(Vec<String>, DomainName)>>,
    failing: Mutex<Vec<String>>,
}

impl RecordingSpawner {
    pub const FIRST_PID: u32 = 100;

    pub fn new() -> Self {
        Self::default()
    }

    /// Spawning `program` fails outright, as if it were not installed
    pub fn failing(self, program: &str) -> Self {
        if let Ok(mut failing) = self.failing.lock() {
            failing.push(program.to_string());
        }
        self
    }

    pub fn spawned(&self) -> Vec<(Vec<String>, DomainName)> {
        self.spawned.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Program names in spawn order
    pub fn programs(&self) -> Vec<String> {
        self.spawned()
            .into_iter()
            .filter_map(|(argv, _)| argv.first().cloned())
            .collect()
    }
}

impl Spawner for RecordingSpawner {
    fn spawn(&self, argv: &[String], domain: &DomainName) -> Result<u32> {
        let program = argv.first().cloned().unwrap_or_default();
        let refused = self
            .failing
            .lock()
            .map(|f| f.contains(&program))
            .unwrap_or(false);
        if refused {
            return Err(BootError::LaunchFailed {
                command: argv.join(" "),
                reason: "spawn failed: No such file or directory".to_string(),
            });
        }

        let mut spawned = self
            .spawned
            .lock()
            .map_err(|_| BootError::Backend("spawner lock poisoned".to_string()))?;
        spawned.push((argv.to_vec(), domain.clone()));
        Ok(Self::FIRST_PID + spawned.len() as u32 - 1)
    }
}

#[derive(Debug, Default)]
struct BackendState {
    /// Domain -> failed opens before the first success (None = never)
    domains: HashMap<DomainName, Option<u32>>,
    open_attempts: HashMap<DomainName, u32>,
    /// Domain -> (successful attempts before the outage, refused attempts)
    outages: HashMap<DomainName, (u32, u32)>,
    /// (domain, endpoint) -> lookups before it appears
    endpoints: HashMap<(DomainName, String), u32>,
    lookups: HashMap<(DomainName, String), u32>,
}

/// Domain backend with scripted availability and endpoint appearance
#[derive(Debug, Default)]
pub struct FakeDomainBackend {
    state: Mutex<BackendState>,
    next_id: AtomicU64,
    opened: AtomicU32,
    released: AtomicU32,
}

impl FakeDomainBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Domain that accepts handles from the first attempt
    pub fn with_domain(self, name: &str) -> Self {
        self.with_slow_domain(name, 0)
    }

    /// Domain that refuses the first `failures` handles
    pub fn with_slow_domain(self, name: &str, failures: u32) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.domains.insert(DomainName::from(name), Some(failures));
        }
        self
    }

    /// Domain that is known but never comes up
    pub fn with_dead_domain(self, name: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.domains.insert(DomainName::from(name), None);
        }
        self
    }

    /// After `after` open attempts, refuse the next `length` ones
    pub fn with_outage(self, name: &str, after: u32, length: u32) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.outages.insert(DomainName::from(name), (after, length));
        }
        self
    }

    /// Endpoint that shows up after `misses` empty lookups
    pub fn with_endpoint(self, domain: &str, name: &str, misses: u32) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state
                .endpoints
                .insert((DomainName::from(domain), name.to_string()), misses);
        }
        self
    }

    pub fn opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u32 {
        self.released.load(Ordering::SeqCst)
    }

    pub fn open_attempts(&self, domain: &str) -> u32 {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.open_attempts.get(&DomainName::from(domain)).copied())
            .unwrap_or(0)
    }

    pub fn lookups(&self, domain: &str, endpoint: &str) -> u32 {
        self.state
            .lock()
            .ok()
            .and_then(|s| {
                s.lookups
                    .get(&(DomainName::from(domain), endpoint.to_string()))
                    .copied()
            })
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BackendState>> {
        self.state
            .lock()
            .map_err(|_| BootError::Backend("backend lock poisoned".to_string()))
    }
}

impl DomainBackend for FakeDomainBackend {
    fn backend_name(&self) -> &str {
        "fake"
    }

    fn open(&self, domain: &DomainName) -> Result<DomainSession> {
        let mut state = self.lock()?;
        let attempt = {
            let count = state.open_attempts.entry(domain.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if let Some(&(after, length)) = state.outages.get(domain) {
            if attempt > after && attempt - after <= length {
                return Err(BootError::Backend(format!(
                    "server '{}' went away (attempt {})",
                    domain, attempt
                )));
            }
        }
        match state.domains.get(domain) {
            Some(Some(failures)) if attempt > *failures => {
                self.opened.fetch_add(1, Ordering::SeqCst);
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                Ok(DomainSession::new(id, domain.clone()))
            }
            Some(_) => Err(BootError::Backend(format!(
                "server '{}' not running (attempt {})",
                domain, attempt
            ))),
            None => Err(BootError::Backend(format!("unknown server '{}'", domain))),
        }
    }

    fn release(&self, _session: DomainSession) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn lookup_endpoint(&self, session: &DomainSession, name: &str) -> Result<Option<Endpoint>> {
        let mut state = self.lock()?;
        let key = (session.domain().clone(), name.to_string());
        let seen = {
            let count = state.lookups.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        Ok(match state.endpoints.get(&key) {
            Some(misses) if seen > *misses => Some(Endpoint {
                domain: session.domain().clone(),
                name: name.to_string(),
                direction: Some(Direction::Out),
            }),
            _ => None,
        })
    }

    fn endpoints_matching(&self, session: &DomainSession, fragment: &str) -> Result<Vec<Endpoint>> {
        let state = self.lock()?;
        let mut found: Vec<Endpoint> = state
            .endpoints
            .keys()
            .filter(|(domain, name)| domain == session.domain() && name.contains(fragment))
            .map(|(domain, name)| Endpoint {
                domain: domain.clone(),
                name: name.clone(),
                direction: None,
            })
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }
}

/// Alarm that counts how often it sounded
#[derive(Debug, Default)]
pub struct CountingAlarm {
    sounded: AtomicU32,
}

impl CountingAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.sounded.load(Ordering::SeqCst)
    }
}

impl Alarm for CountingAlarm {
    fn sound(&self) {
        self.sounded.fetch_add(1, Ordering::SeqCst);
    }
}
