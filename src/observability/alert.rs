/// Audible failure alert
///
/// An unattended rig has nobody watching the console, so an aborted boot
/// is announced through an external beeper utility, a bounded number of times.
use crate::config::types::AlertConfig;
use std::process::{Command, Stdio};
use std::time::Duration;

pub trait Alarm {
    fn sound(&self);
}

/// Runs the configured beeper utility `repeats` times
#[derive(Clone, Debug, Default)]
pub struct BeepAlarm {
    config: AlertConfig,
}

impl BeepAlarm {
    pub fn new(config: AlertConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }
}

impl Alarm for BeepAlarm {
    fn sound(&self) {
        let argv = self.config.argv();
        let Some((program, args)) = argv.split_first() else {
            log::warn!("Alert command is empty; failure is silent");
            return;
        };

        for round in 0..self.config.repeats {
            match Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .status()
            {
                Ok(status) if !status.success() => {
                    log::debug!("Alert round {} exited with {}", round + 1, status);
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("Cannot run alert command '{}': {}", program, e);
                    return;
                }
            }
            if round + 1 < self.config.repeats {
                std::thread::sleep(Duration::from_millis(self.config.gap_ms));
            }
        }
    }
}

/// Alarm that stays silent, for dry runs
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentAlarm;

impl Alarm for SilentAlarm {
    fn sound(&self) {
        log::info!("Alert suppressed");
    }
}
