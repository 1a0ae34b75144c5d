/// Core types and structures for the rigboot system
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Environment variable that steers a launched process onto a domain
pub const DOMAIN_ENV_VAR: &str = "JACK_DEFAULT_SERVER";

/// Reserved name of the primary domain
pub const PRIMARY_DOMAIN: &str = "default";

/// Name of an addressable execution domain (one audio server instance)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainName(String);

impl DomainName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The primary domain every rig has
    pub fn primary() -> Self {
        Self(PRIMARY_DOMAIN.to_string())
    }

    pub fn is_primary(&self) -> bool {
        self.0 == PRIMARY_DOMAIN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DomainName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Liveness of a domain as observed during one boot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainState {
    Unverified,
    Verified,
    Failed,
}

/// Direction of a communication endpoint, seen from the owning process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

/// Named port exposed by a process inside a domain. Observed, never created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub domain: DomainName,
    /// Full name, `<process>:<port>`
    pub name: String,
    /// Unknown when the backend does not report port flags
    pub direction: Option<Direction>,
}

/// Lifecycle of a process started by the launcher
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Starting,
    Settled,
    Dead,
}

/// A spawned worker process. After spawn the OS owns it; we only track it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedProcess {
    pub pid: u32,
    pub argv: Vec<String>,
    pub domain: DomainName,
    pub state: ProcessState,
}

impl ManagedProcess {
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Fixed-interval polling bound
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Total number of probes, including the first one
    pub attempts: u32,
    /// Sleep between probes
    pub interval_ms: u64,
}

impl PollPolicy {
    pub const fn new(attempts: u32, interval_ms: u64) -> Self {
        Self {
            attempts,
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Timing bounds for process launch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchTiming {
    /// Grace period between spawn and the first metadata probe
    pub initial_delay_ms: u64,
    /// Metadata resolution attempts after the grace period
    pub register: PollPolicy,
}

impl LaunchTiming {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl Default for LaunchTiming {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            register: PollPolicy::new(6, 1_000),
        }
    }
}

/// Timing bounds for the liveness probe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleTiming {
    pub probe: PollPolicy,
    /// Extra sleep after the first successful probe
    pub settle_delay_ms: u64,
}

impl SettleTiming {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for SettleTiming {
    fn default() -> Self {
        Self {
            probe: PollPolicy::new(15, 1_000),
            settle_delay_ms: 1_000,
        }
    }
}

/// All retry bounds used by a boot.
///
/// The defaults are tuned against real hardware start-up times and are
/// kept as-is; override them per plan only when a rig needs it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Domain verification: first attempt plus 20 retries
    #[serde(default = "default_domain_policy")]
    pub domain: PollPolicy,
    #[serde(default)]
    pub launch: LaunchTiming,
    #[serde(default)]
    pub settle: SettleTiming,
    /// Endpoint wait: first attempt plus 5 retries
    #[serde(default = "default_endpoint_policy")]
    pub endpoint: PollPolicy,
}

const fn default_domain_policy() -> PollPolicy {
    PollPolicy::new(21, 1_000)
}

const fn default_endpoint_policy() -> PollPolicy {
    PollPolicy::new(6, 1_000)
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            domain: default_domain_policy(),
            launch: LaunchTiming::default(),
            settle: SettleTiming::default(),
            endpoint: default_endpoint_policy(),
        }
    }
}

/// Audible failure alert
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// External utility and its fixed arguments
    pub command: Vec<String>,
    pub repeats: u32,
    pub gap_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_hz: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_ms: Option<u32>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            command: vec!["beep".to_string()],
            repeats: 5,
            gap_ms: 100,
            frequency_hz: None,
            length_ms: None,
        }
    }
}

impl AlertConfig {
    /// Full argv for one alert invocation
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.command.clone();
        if let Some(freq) = self.frequency_hz {
            argv.push("-f".to_string());
            argv.push(freq.to_string());
        }
        if let Some(length) = self.length_ms {
            argv.push("-l".to_string());
            argv.push(length.to_string());
        }
        argv
    }
}

/// What to run for one boot step
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Program followed by its arguments
    #[serde(
        rename = "command",
        deserialize_with = "crate::config::plan::deserialize_command"
    )]
    pub argv: Vec<String>,
    /// Inserted after the program token unless debug mode is on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headless_args: Vec<String>,
}

impl LaunchSpec {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            headless_args: Vec::new(),
        }
    }

    pub fn with_headless_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headless_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// Resolve the final argument vector for the given debug mode
    pub fn resolve(&self, debug: bool) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.argv.len() + self.headless_args.len());
        let mut tokens = self.argv.iter();
        if let Some(program) = tokens.next() {
            argv.push(program.clone());
        }
        if !debug {
            argv.extend(self.headless_args.iter().cloned());
        }
        argv.extend(tokens.cloned());
        argv
    }
}

/// One unit of the fixed boot order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootStep {
    /// Human-readable name for progress and diagnostics
    pub label: String,
    pub domain: DomainName,
    #[serde(flatten)]
    pub launch: LaunchSpec,
    /// Endpoints whose presence proves the step functionally ready
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_delay_ms: Option<u64>,
}

impl BootStep {
    pub fn post_delay(&self) -> Option<Duration> {
        self.post_delay_ms.map(Duration::from_millis)
    }
}

/// Connection snapshot replayed into a domain once every step is up
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySpec {
    pub domain: DomainName,
    pub snapshot: std::path::PathBuf,
}

/// Closed classification of boot failures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    DomainUnavailable,
    LaunchFailed,
    NotSettling,
    EndpointTimeout,
    Config,
    Backend,
    Io,
}

pub type Result<T> = std::result::Result<T, BootError>;

#[derive(Error, Debug)]
pub enum BootError {
    #[error("Domain '{domain}' unavailable after {attempts} attempts: {reason}")]
    DomainUnavailable {
        domain: DomainName,
        attempts: u32,
        reason: String,
    },

    #[error("Launch failed for '{command}': {reason}")]
    LaunchFailed { command: String, reason: String },

    #[error("Process {pid} ('{command}') produced no I/O counters after {attempts} probes")]
    NotSettling {
        command: String,
        pid: u32,
        attempts: u32,
    },

    #[error("Endpoint '{endpoint}' did not appear in domain '{domain}' after {attempts} attempts")]
    EndpointTimeout {
        domain: DomainName,
        endpoint: String,
        attempts: u32,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Domain backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BootError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::DomainUnavailable { .. } => FailureKind::DomainUnavailable,
            Self::LaunchFailed { .. } => FailureKind::LaunchFailed,
            Self::NotSettling { .. } => FailureKind::NotSettling,
            Self::EndpointTimeout { .. } => FailureKind::EndpointTimeout,
            Self::Config(_) => FailureKind::Config,
            Self::Backend(_) => FailureKind::Backend,
            Self::Io(_) => FailureKind::Io,
        }
    }
}

/// Convert boot errors to process exit codes
impl From<&BootError> for i32 {
    fn from(err: &BootError) -> i32 {
        match err.kind() {
            FailureKind::Config => 2,
            FailureKind::DomainUnavailable => 3,
            FailureKind::LaunchFailed => 4,
            FailureKind::NotSettling => 5,
            FailureKind::EndpointTimeout => 6,
            FailureKind::Backend => 7,
            FailureKind::Io => 74,
        }
    }
}
