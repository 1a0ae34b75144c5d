// Boot plan and routing table validation
// Fail fast at startup with every problem listed, not just the first one

use crate::config::plan::BootPlan;
use crate::config::types::{BootError, DomainName, PollPolicy, Result};
use crate::routing::event::{MAX_CHANNEL, MIN_CHANNEL};
use crate::routing::table::{RoutingRule, RoutingTable};

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turn collected errors into one config error
    fn into_result(self, what: &str) -> Result<Self> {
        if self.is_valid() {
            return Ok(self);
        }
        Err(BootError::Config(format!(
            "{} validation failed:\n{}",
            what,
            self.errors.join("\n")
        )))
    }
}

/// Validate a boot plan. Errors are fatal; warnings are returned.
pub fn validate_plan(plan: &BootPlan) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    if plan.steps.is_empty() {
        result.add_warning("plan has no steps; only domains will be verified".to_string());
    }

    validate_domains(plan, &mut result);
    validate_steps(plan, &mut result);
    validate_replay(plan, &mut result);
    validate_timing(plan, &mut result);

    if plan.alert.command.is_empty() {
        result.add_warning("alert command is empty; failures will be silent".to_string());
    }

    result.into_result("Boot plan")
}

fn validate_domains(plan: &BootPlan, result: &mut ValidationResult) {
    let mut seen: Vec<&DomainName> = Vec::new();
    for domain in &plan.domains {
        if domain.as_str().trim().is_empty() {
            result.add_error("domain name cannot be empty".to_string());
        }
        if seen.contains(&domain) {
            result.add_error(format!("domain '{}' declared twice", domain));
        }
        seen.push(domain);
    }
}

/// With an explicit domain list every step must target one of them
fn validate_steps(plan: &BootPlan, result: &mut ValidationResult) {
    for (index, step) in plan.steps.iter().enumerate() {
        let name = format!("step {} '{}'", index + 1, step.label);

        if step.label.trim().is_empty() {
            result.add_warning(format!("step {} has no label", index + 1));
        }
        match step.launch.program() {
            None => result.add_error(format!("{}: command is empty", name)),
            Some(program) if program.trim().is_empty() => {
                result.add_error(format!("{}: program name is blank", name))
            }
            Some(_) => {}
        }
        if !plan.domains.is_empty() && !plan.domains.contains(&step.domain) {
            result.add_error(format!(
                "{}: domain '{}' is not declared in 'domains'",
                name, step.domain
            ));
        }
        for endpoint in &step.endpoints {
            if !endpoint.contains(':') {
                result.add_warning(format!(
                    "{}: endpoint '{}' is not of the form <process>:<port>",
                    name, endpoint
                ));
            }
        }
    }
}

fn validate_replay(plan: &BootPlan, result: &mut ValidationResult) {
    if !plan.replay.is_empty() && plan.replay_tool.is_empty() {
        result.add_error("replay entries given but replay_tool is empty".to_string());
    }
    for (index, replay) in plan.replay.iter().enumerate() {
        if !plan.domains.is_empty() && !plan.domains.contains(&replay.domain) {
            result.add_error(format!(
                "replay {}: domain '{}' is not declared in 'domains'",
                index + 1,
                replay.domain
            ));
        }
        // Snapshots may be provisioned after validation, so only warn.
        if !replay.snapshot.exists() {
            result.add_warning(format!(
                "replay {}: snapshot {} does not exist",
                index + 1,
                replay.snapshot.display()
            ));
        }
    }
}

fn validate_timing(plan: &BootPlan, result: &mut ValidationResult) {
    let timing = &plan.timing;
    let policies: [(&str, PollPolicy); 4] = [
        ("timing.domain", timing.domain),
        ("timing.launch.register", timing.launch.register),
        ("timing.settle.probe", timing.settle.probe),
        ("timing.endpoint", timing.endpoint),
    ];
    for (name, policy) in policies {
        if policy.attempts == 0 {
            result.add_error(format!("{}.attempts cannot be zero", name));
        }
        if policy.interval_ms > 60_000 {
            result.add_warning(format!(
                "{}.interval_ms {} is over a minute",
                name, policy.interval_ms
            ));
        }
    }
}

/// Validate a routing table. Every problem is an error.
pub fn validate_table(table: &RoutingTable) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    if table.outputs.is_empty() {
        result.add_error("routing table declares no outputs".to_string());
    }
    if !(MIN_CHANNEL..=MAX_CHANNEL).contains(&table.output_channel) {
        result.add_error(format!(
            "output_channel {} outside {}..={}",
            table.output_channel, MIN_CHANNEL, MAX_CHANNEL
        ));
    }
    if table.sustain_controller > 127 {
        result.add_error(format!(
            "sustain_controller {} is not a 7-bit controller number",
            table.sustain_controller
        ));
    }

    if let Some(broadcast) = &table.broadcast {
        for endpoint in broadcast {
            if !table.outputs.contains(endpoint) {
                result.add_error(format!("broadcast target '{}' is not an output", endpoint));
            }
        }
    }

    for (channel, rule) in &table.channels {
        if !(MIN_CHANNEL..=MAX_CHANNEL).contains(channel) {
            result.add_error(format!(
                "channel {} outside {}..={}",
                channel, MIN_CHANNEL, MAX_CHANNEL
            ));
        }
        if let RoutingRule::FanOut(taps) = rule {
            if taps.is_empty() {
                result.add_error(format!("channel {}: fan-out has no members", channel));
            }
            for tap in taps {
                if !(tap.gain > 0.0 && tap.gain <= 1.0) {
                    result.add_error(format!(
                        "channel {}: gain {} for '{}' outside (0, 1]",
                        channel, tap.gain, tap.endpoint
                    ));
                }
            }
        }
        for endpoint in rule.endpoints() {
            if !table.outputs.iter().any(|o| o == endpoint) {
                result.add_error(format!(
                    "channel {}: endpoint '{}' is not an output",
                    channel, endpoint
                ));
            }
        }
    }

    result.into_result("Routing table")
}
