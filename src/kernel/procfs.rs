/// Process evidence from procfs
/// Metadata resolution and I/O accounting counters for spawned workers.
use crate::config::types::{BootError, Result};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Scheduler state letter from `/proc/<pid>/stat`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    Sleeping,
    DiskSleep,
    Stopped,
    Zombie,
    Dead,
    Other(char),
}

impl RunState {
    fn from_letter(letter: char) -> Self {
        match letter {
            'R' => Self::Running,
            'S' => Self::Sleeping,
            'D' => Self::DiskSleep,
            'T' | 't' => Self::Stopped,
            'Z' => Self::Zombie,
            'X' | 'x' => Self::Dead,
            other => Self::Other(other),
        }
    }

    /// Whether the process can still be scheduled
    pub fn is_alive(self) -> bool {
        !matches!(self, Self::Zombie | Self::Dead)
    }
}

/// Resolved OS metadata for a pid
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub comm: String,
    pub state: RunState,
    pub ppid: u32,
}

/// Cumulative I/O accounting from `/proc/<pid>/io`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoCounters {
    pub rchar: u64,
    pub wchar: u64,
    pub syscr: u64,
    pub syscw: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub cancelled_write_bytes: u64,
}

/// OS-level process queries used by the launcher and settle prober
pub trait ProcessProbe {
    /// Resolve metadata; fails while the pid is unknown, exited or a zombie
    fn resolve(&self, pid: u32) -> Result<ProcessInfo>;
    /// Read I/O activity counters; fails until the kernel exposes them
    fn io_counters(&self, pid: u32) -> Result<IoCounters>;
}

/// Probe backed by the live `/proc` filesystem
#[derive(Clone, Debug)]
pub struct ProcfsProbe {
    root: PathBuf,
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsProbe {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/proc"),
        }
    }

    /// Read from an alternate procfs mount
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Check if procfs is mounted where we expect it
    pub fn is_supported(&self) -> bool {
        self.root.join("self").join("stat").exists()
    }

    fn pid_path(&self, pid: u32, file: &str) -> PathBuf {
        self.root.join(pid.to_string()).join(file)
    }
}

impl ProcessProbe for ProcfsProbe {
    fn resolve(&self, pid: u32) -> Result<ProcessInfo> {
        let raw_pid = i32::try_from(pid)
            .map_err(|_| BootError::Config(format!("pid {} out of range", pid)))?;

        // Signal 0 only checks existence and permission.
        kill(Pid::from_raw(raw_pid), None).map_err(|e| BootError::Io(e.into()))?;

        let stat = std::fs::read_to_string(self.pid_path(pid, "stat"))?;
        let info = parse_stat(pid, &stat)?;
        if !info.state.is_alive() {
            return Err(BootError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("process {} has exited (state {:?})", pid, info.state),
            )));
        }
        Ok(info)
    }

    fn io_counters(&self, pid: u32) -> Result<IoCounters> {
        let content = std::fs::read_to_string(self.pid_path(pid, "io"))?;
        parse_io(&content)
    }
}

/// Parse `/proc/<pid>/stat`. The comm field may itself contain spaces and parentheses.
pub fn parse_stat(pid: u32, content: &str) -> Result<ProcessInfo> {
    let open = content
        .find('(')
        .ok_or_else(|| BootError::Config(format!("malformed stat for pid {}", pid)))?;
    let close = content
        .rfind(')')
        .ok_or_else(|| BootError::Config(format!("malformed stat for pid {}", pid)))?;
    if close < open {
        return Err(BootError::Config(format!("malformed stat for pid {}", pid)));
    }

    let comm = content[open + 1..close].to_string();
    let mut rest = content[close + 1..].split_whitespace();
    let state = rest
        .next()
        .and_then(|s| s.chars().next())
        .map(RunState::from_letter)
        .ok_or_else(|| BootError::Config(format!("missing state in stat for pid {}", pid)))?;
    let ppid = rest
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| BootError::Config(format!("missing ppid in stat for pid {}", pid)))?;

    Ok(ProcessInfo {
        pid,
        comm,
        state,
        ppid,
    })
}

/// Parse the `key: value` lines of `/proc/<pid>/io`
pub fn parse_io(content: &str) -> Result<IoCounters> {
    let mut counters = IoCounters::default();
    let mut seen = 0usize;

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Ok(value) = value.trim().parse::<u64>() else {
            continue;
        };
        let slot = match key.trim() {
            "rchar" => &mut counters.rchar,
            "wchar" => &mut counters.wchar,
            "syscr" => &mut counters.syscr,
            "syscw" => &mut counters.syscw,
            "read_bytes" => &mut counters.read_bytes,
            "write_bytes" => &mut counters.write_bytes,
            "cancelled_write_bytes" => &mut counters.cancelled_write_bytes,
            _ => continue,
        };
        *slot = value;
        seen += 1;
    }

    if seen == 0 {
        return Err(BootError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "no I/O counters present",
        )));
    }
    Ok(counters)
}
