/// Boot journal
/// Structured record of one boot run for after-the-fact diagnosis.
///
/// Every event goes to the `log` facade. When a journal file is configured
/// the same event is appended as one JSON object per line, tagged with the
/// run id so several boots can share a file.
use crate::config::types::{BootError, DomainName, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootEventKind {
    BootStarted,
    DomainVerified,
    DomainUnavailable,
    StepStarted,
    StepSucceeded,
    StepFailed,
    ReplayTriggered,
    BootCompleted,
    BootAborted,
}

impl BootEventKind {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::DomainUnavailable | Self::StepFailed | Self::BootAborted
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootEvent {
    pub kind: BootEventKind,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<DomainName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl BootEvent {
    pub fn new(kind: BootEventKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            details: details.into(),
            domain: None,
            step: None,
            label: None,
            pid: None,
        }
    }

    pub fn with_domain(mut self, domain: &DomainName) -> Self {
        self.domain = Some(domain.clone());
        self
    }

    pub fn with_step(mut self, index: usize, label: &str) -> Self {
        self.step = Some(index);
        self.label = Some(label.to_string());
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }
}

pub struct BootJournal {
    run_id: Uuid,
    sink: Option<Mutex<File>>,
    path: Option<PathBuf>,
    events: Mutex<Vec<BootEvent>>,
}

impl BootJournal {
    /// Journal that only logs
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            sink: None,
            path: None,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Journal that also appends JSON lines to `path`
    pub fn with_file(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BootError::Config(format!("Failed to create journal directory: {}", e))
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| BootError::Config(format!("Failed to open boot journal: {}", e)))?;

        Ok(Self {
            run_id: Uuid::new_v4(),
            sink: Some(Mutex::new(file)),
            path: Some(path.to_path_buf()),
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn run_id(&self) -> String {
        self.run_id.to_string()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, event: BootEvent) {
        if event.kind.is_failure() {
            log::error!("[{:?}] {}", event.kind, event.details);
        } else {
            log::info!("[{:?}] {}", event.kind, event.details);
        }

        if let Some(sink) = &self.sink {
            let entry = serde_json::json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "run_id": self.run_id.to_string(),
                "process_id": std::process::id(),
                "event": &event,
            });
            match sink.lock() {
                Ok(mut file) => {
                    if let Err(e) = writeln!(file, "{}", entry) {
                        log::warn!("Failed to write boot journal entry: {}", e);
                    }
                }
                Err(_) => log::warn!("Boot journal lock poisoned; entry dropped"),
            }
        }

        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Kinds recorded so far, in order
    pub fn kinds(&self) -> Vec<BootEventKind> {
        self.events
            .lock()
            .map(|events| events.iter().map(|e| e.kind).collect())
            .unwrap_or_default()
    }

    pub fn events(&self) -> Vec<BootEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Default for BootJournal {
    fn default() -> Self {
        Self::new()
    }
}
