/// Endpoint waiter
///
/// Functional readiness: a worker that has settled may still be setting
/// itself up, and only exposes its endpoints once it is done.
use crate::config::types::{BootError, DomainName, Endpoint, PollPolicy, Result};
use crate::exec::clock::Clock;
use crate::kernel::domain::{DomainBackend, DomainSession};

pub struct EndpointWaiter<'a> {
    backend: &'a dyn DomainBackend,
    clock: &'a dyn Clock,
    policy: PollPolicy,
}

impl<'a> EndpointWaiter<'a> {
    pub fn new(backend: &'a dyn DomainBackend, clock: &'a dyn Clock, policy: PollPolicy) -> Self {
        Self {
            backend,
            clock,
            policy,
        }
    }

    /// Poll for an endpoint by exact name. The first probe runs
    /// immediately; later ones follow a fixed sleep.
    pub fn wait(&self, session: &DomainSession, name: &str) -> Result<Endpoint> {
        for attempt in 1..=self.policy.attempts {
            if attempt > 1 {
                self.clock.sleep(self.policy.interval());
            }
            log::debug!(
                "Endpoint lookup {}/{} for '{}' on domain '{}'",
                attempt,
                self.policy.attempts,
                name,
                session.domain()
            );
            match self.backend.lookup_endpoint(session, name) {
                Ok(Some(endpoint)) => return Ok(endpoint),
                Ok(None) => {}
                Err(e) => log::debug!("Endpoint lookup for '{}' failed: {}", name, e),
            }
        }

        Err(BootError::EndpointTimeout {
            domain: session.domain().clone(),
            endpoint: name.to_string(),
            attempts: self.policy.attempts,
        })
    }

    /// Open a query handle on `domain` under the same poll policy. A domain
    /// that refuses every attempt times out on `pending`, the first
    /// endpoint the handle was wanted for.
    pub fn open_session(&self, domain: &DomainName, pending: &str) -> Result<DomainSession> {
        for attempt in 1..=self.policy.attempts {
            if attempt > 1 {
                self.clock.sleep(self.policy.interval());
            }
            match self.backend.open(domain) {
                Ok(session) => return Ok(session),
                Err(e) => log::debug!(
                    "Query handle {}/{} on domain '{}' refused: {}",
                    attempt,
                    self.policy.attempts,
                    domain,
                    e
                ),
            }
        }

        Err(BootError::EndpointTimeout {
            domain: domain.clone(),
            endpoint: pending.to_string(),
            attempts: self.policy.attempts,
        })
    }

    /// Wait for every name in order; the first one missing fails the lot
    pub fn wait_all(&self, session: &DomainSession, names: &[String]) -> Result<Vec<Endpoint>> {
        names.iter().map(|name| self.wait(session, name)).collect()
    }
}

/// Discovery lookup by substring. Not used for readiness decisions.
pub fn find_endpoints(
    backend: &dyn DomainBackend,
    session: &DomainSession,
    fragment: &str,
) -> Result<Vec<Endpoint>> {
    let found = backend.endpoints_matching(session, fragment)?;
    if found.is_empty() {
        log::info!(
            "No endpoints matching '{}' on domain '{}'",
            fragment,
            session.domain()
        );
    }
    Ok(found)
}
