use crate::config::types::{BootError, DomainName, DomainState, FailureKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequencer position. Linear: there is no branch and no way back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    NotStarted,
    /// Executing step `i`
    Running(usize),
    /// All steps done, connection snapshots being replayed
    Replaying,
    Aborted(AbortPoint),
    Completed,
}

impl SequencerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Aborted(_) | Self::Completed)
    }
}

/// Where a boot stopped
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortPoint {
    Domain(DomainName),
    Step {
        index: usize,
        label: String,
        domain: DomainName,
    },
    Replay {
        index: usize,
        domain: DomainName,
    },
}

impl fmt::Display for AbortPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(domain) => write!(f, "verification of domain '{}'", domain),
            Self::Step {
                index,
                label,
                domain,
            } => write!(f, "step {} '{}' on domain '{}'", index + 1, label, domain),
            Self::Replay { index, domain } => {
                write!(f, "connection replay {} on domain '{}'", index + 1, domain)
            }
        }
    }
}

/// A failed boot: the failing point plus the underlying error
#[derive(Debug)]
pub struct BootAbort {
    pub point: AbortPoint,
    pub error: BootError,
}

impl BootAbort {
    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }

    pub fn exit_code(&self) -> i32 {
        i32::from(&self.error)
    }
}

impl fmt::Display for BootAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "boot aborted at {}: {}", self.point, self.error)
    }
}

impl std::error::Error for BootAbort {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Observed state of one domain at the end of a boot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub name: DomainName,
    pub state: DomainState,
    /// Verification attempts spent
    pub attempts: u32,
}

/// Outcome of one completed step
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub label: String,
    pub domain: DomainName,
    pub pid: u32,
    pub endpoints: Vec<String>,
    pub elapsed_ms: u64,
}

/// Summary of a successful boot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BootReport {
    pub run_id: String,
    pub domains: Vec<DomainRecord>,
    pub steps: Vec<StepRecord>,
    /// Pids of background replay tools
    pub replays: Vec<u32>,
    pub handles_acquired: u32,
    pub handles_released: u32,
    pub elapsed_ms: u64,
}
