/// Domain verification
///
/// Proves that a domain accepts new client handles. The probe handle is
/// released as soon as it is activated; nothing is held across the boot.
use crate::config::types::{BootError, DomainName, DomainState, PollPolicy, Result};
use crate::core::types::DomainRecord;
use crate::exec::clock::Clock;
use crate::kernel::domain::DomainBackend;

pub struct DomainVerifier<'a> {
    backend: &'a dyn DomainBackend,
    clock: &'a dyn Clock,
    policy: PollPolicy,
}

impl<'a> DomainVerifier<'a> {
    pub fn new(backend: &'a dyn DomainBackend, clock: &'a dyn Clock, policy: PollPolicy) -> Self {
        Self {
            backend,
            clock,
            policy,
        }
    }

    /// Open, activate and release a probe handle, retrying once per
    /// interval. Transport errors count as "not yet available".
    pub fn verify(&self, domain: &DomainName) -> Result<DomainRecord> {
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.policy.attempts {
            if attempt > 1 {
                self.clock.sleep(self.policy.interval());
            }
            match self.backend.open(domain) {
                Ok(session) => {
                    if let Err(e) = self.backend.release(session) {
                        log::warn!("Failed to release probe handle on '{}': {}", domain, e);
                    }
                    log::info!(
                        "Domain '{}' discovered and verified (attempt {})",
                        domain,
                        attempt
                    );
                    return Ok(DomainRecord {
                        name: domain.clone(),
                        state: DomainState::Verified,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    log::debug!(
                        "Domain '{}' not available (attempt {}/{}): {}",
                        domain,
                        attempt,
                        self.policy.attempts,
                        e
                    );
                    last_error = e.to_string();
                }
            }
        }

        Err(BootError::DomainUnavailable {
            domain: domain.clone(),
            attempts: self.policy.attempts,
            reason: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClock, FakeDomainBackend};
    use std::time::Duration;

    #[test]
    fn test_verify_releases_probe_handle() {
        let backend = FakeDomainBackend::new().with_slow_domain("SOFT1", 3);
        let clock = FakeClock::new();

        let record = DomainVerifier::new(&backend, &clock, PollPolicy::new(21, 1_000))
            .verify(&"SOFT1".into())
            .unwrap();

        assert_eq!(record.state, DomainState::Verified);
        assert_eq!(record.attempts, 4);
        assert_eq!(backend.opened(), 1);
        assert_eq!(backend.released(), 1);
        assert_eq!(clock.total(), Duration::from_secs(3));
    }

    #[test]
    fn test_unavailable_after_ceiling() {
        let backend = FakeDomainBackend::new().with_dead_domain("SOFT3");
        let clock = FakeClock::new();

        let err = DomainVerifier::new(&backend, &clock, PollPolicy::new(21, 1_000))
            .verify(&"SOFT3".into())
            .unwrap_err();

        assert!(matches!(
            err,
            BootError::DomainUnavailable { attempts: 21, .. }
        ));
        assert_eq!(backend.open_attempts("SOFT3"), 21);
        // first attempt plus 20 one-second retries
        assert_eq!(clock.total(), Duration::from_secs(20));
        assert_eq!(backend.opened(), 0);
    }
}
