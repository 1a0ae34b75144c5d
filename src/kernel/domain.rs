//! Domain backend abstraction.
//!
//! A domain is one audio server instance addressed by name. Backends open
//! lightweight client handles against it and answer endpoint queries.

use crate::config::types::{BootError, Direction, DomainName, Endpoint, Result, DOMAIN_ENV_VAR};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

/// An open, activated client handle on one domain.
///
/// Deliberately not `Clone`: a handle is released exactly once by passing
/// it back to [`DomainBackend::release`].
#[derive(Debug, PartialEq, Eq)]
pub struct DomainSession {
    id: u64,
    domain: DomainName,
}

impl DomainSession {
    pub fn new(id: u64, domain: DomainName) -> Self {
        Self { id, domain }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn domain(&self) -> &DomainName {
        &self.domain
    }
}

pub trait DomainBackend {
    fn backend_name(&self) -> &str;
    /// Connect to the domain and activate a client handle
    fn open(&self, domain: &DomainName) -> Result<DomainSession>;
    fn release(&self, session: DomainSession) -> Result<()>;
    /// Exact-name endpoint lookup
    fn lookup_endpoint(&self, session: &DomainSession, name: &str) -> Result<Option<Endpoint>>;
    /// All endpoints whose name contains `fragment`
    fn endpoints_matching(&self, session: &DomainSession, fragment: &str) -> Result<Vec<Endpoint>>;
}

/// Backend driving the stock JACK command-line tools.
///
/// Each query runs `jack_lsp` with the domain selected through the
/// environment. Auto-start is disabled so a probe can never bring up a
/// server of its own and report it as verified.
#[derive(Debug)]
pub struct JackToolsBackend {
    lsp_program: String,
    next_id: AtomicU64,
}

impl Default for JackToolsBackend {
    fn default() -> Self {
        Self::new("jack_lsp")
    }
}

impl JackToolsBackend {
    pub fn new(lsp_program: impl Into<String>) -> Self {
        Self {
            lsp_program: lsp_program.into(),
            next_id: AtomicU64::new(1),
        }
    }

    fn command(&self, domain: &DomainName) -> Command {
        let mut cmd = Command::new(&self.lsp_program);
        cmd.env(DOMAIN_ENV_VAR, domain.as_str())
            .env("JACK_NO_START_SERVER", "1")
            .stdin(Stdio::null());
        cmd
    }

    fn list_endpoints(&self, session: &DomainSession) -> Result<Vec<Endpoint>> {
        let output = self
            .command(session.domain())
            .arg("-p")
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| BootError::Backend(format!("failed to run {}: {}", self.lsp_program, e)))?;

        if !output.status.success() {
            return Err(BootError::Backend(format!(
                "{} -p on domain '{}' exited with {}: {}",
                self.lsp_program,
                session.domain(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_port_listing(
            session.domain(),
            &String::from_utf8_lossy(&output.stdout),
        ))
    }
}

impl DomainBackend for JackToolsBackend {
    fn backend_name(&self) -> &str {
        "jack-tools"
    }

    fn open(&self, domain: &DomainName) -> Result<DomainSession> {
        let status = self
            .command(domain)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| BootError::Backend(format!("failed to run {}: {}", self.lsp_program, e)))?;

        if !status.success() {
            return Err(BootError::Backend(format!(
                "domain '{}' refused a client ({} exited with {})",
                domain, self.lsp_program, status
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log::debug!("Opened handle {} on domain '{}'", id, domain);
        Ok(DomainSession::new(id, domain.clone()))
    }

    fn release(&self, session: DomainSession) -> Result<()> {
        // Every query is its own short-lived client; nothing stays connected.
        log::debug!(
            "Released handle {} on domain '{}'",
            session.id(),
            session.domain()
        );
        Ok(())
    }

    fn lookup_endpoint(&self, session: &DomainSession, name: &str) -> Result<Option<Endpoint>> {
        Ok(self
            .list_endpoints(session)?
            .into_iter()
            .find(|endpoint| endpoint.name == name))
    }

    fn endpoints_matching(&self, session: &DomainSession, fragment: &str) -> Result<Vec<Endpoint>> {
        Ok(self
            .list_endpoints(session)?
            .into_iter()
            .filter(|endpoint| endpoint.name.contains(fragment))
            .collect())
    }
}

/// Parse `jack_lsp -p` output: a port name per line, each optionally
/// followed by an indented `properties:` line.
pub fn parse_port_listing(domain: &DomainName, listing: &str) -> Vec<Endpoint> {
    let mut endpoints: Vec<Endpoint> = Vec::new();

    for line in listing.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with(char::is_whitespace) {
            let Some(properties) = line.trim().strip_prefix("properties:") else {
                continue;
            };
            if let Some(last) = endpoints.last_mut() {
                for flag in properties.split(',').map(str::trim) {
                    match flag {
                        "input" => last.direction = Some(Direction::In),
                        "output" => last.direction = Some(Direction::Out),
                        _ => {}
                    }
                }
            }
            continue;
        }
        endpoints.push(Endpoint {
            domain: domain.clone(),
            name: line.trim_end().to_string(),
            direction: None,
        });
    }

    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "system:capture_1\n\tproperties: output,physical,terminal,\nsystem:playback_1\n\tproperties: input,physical,terminal,\nDistribute.py:out_1\n\tproperties: output,\nMixer-General/FinalOutput:out-1\n";

    #[test]
    fn test_parse_port_listing() {
        let domain = DomainName::primary();
        let endpoints = parse_port_listing(&domain, LISTING);
        assert_eq!(endpoints.len(), 4);
        assert_eq!(endpoints[0].name, "system:capture_1");
        assert_eq!(endpoints[0].direction, Some(Direction::Out));
        assert_eq!(endpoints[1].direction, Some(Direction::In));
        assert_eq!(endpoints[2].name, "Distribute.py:out_1");
        assert_eq!(endpoints[3].name, "Mixer-General/FinalOutput:out-1");
        assert_eq!(endpoints[3].direction, None);
        assert!(endpoints.iter().all(|e| e.domain == domain));
    }

    #[test]
    fn test_parse_plain_listing() {
        let endpoints = parse_port_listing(&DomainName::from("SOFT1"), "a:b\nc:d\n\n");
        let names: Vec<_> = endpoints.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a:b", "c:d"]);
    }

    #[test]
    fn test_open_fails_when_tool_missing() {
        let backend = JackToolsBackend::new("/nonexistent/jack_lsp");
        let err = backend.open(&DomainName::primary()).unwrap_err();
        assert!(matches!(err, BootError::Backend(_)));
    }

    #[test]
    fn test_open_with_succeeding_tool() {
        // `true` accepts any arguments and exits 0, standing in for a live server.
        let backend = JackToolsBackend::new("true");
        let first = backend.open(&DomainName::from("SOFT2")).unwrap();
        let second = backend.open(&DomainName::from("SOFT2")).unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(first.domain().as_str(), "SOFT2");
        assert!(backend.lookup_endpoint(&first, "x:y").unwrap().is_none());
        backend.release(first).unwrap();
        backend.release(second).unwrap();
    }
}
