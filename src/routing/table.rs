//! Channel routing table.
//!
//! Sustain pedal changes go to every broadcast endpoint once. Notes are
//! dispatched by inbound channel through the rule table; gains on fan-out
//! members are independent attenuations and are never renormalised, so
//! the copies of a doubled patch leave headroom instead of summing to the
//! original level. Every outbound event is moved onto the output channel.

use crate::config::types::{BootError, Result};
use crate::config::validator::validate_table;
use crate::routing::event::{EventClass, MidiEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Damper/sustain pedal controller number
pub const SUSTAIN_CONTROLLER: u8 = 64;

/// One weighted member of a fan-out rule
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tap {
    pub endpoint: String,
    /// Multiplicative attenuation in (0, 1]
    pub gain: f64,
}

impl Tap {
    pub fn new(endpoint: impl Into<String>, gain: f64) -> Self {
        Self {
            endpoint: endpoint.into(),
            gain,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingRule {
    /// Pass through unmodified
    Single(String),
    /// A scaled copy per member
    FanOut(Vec<Tap>),
}

impl RoutingRule {
    pub fn endpoints(&self) -> Vec<&str> {
        match self {
            Self::Single(endpoint) => vec![endpoint.as_str()],
            Self::FanOut(taps) => taps.iter().map(|tap| tap.endpoint.as_str()).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingTable {
    /// Declared output endpoints of the worker
    pub outputs: Vec<String>,
    /// Endpoints receiving sustain changes; every output when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<Vec<String>>,
    #[serde(default = "default_sustain_controller")]
    pub sustain_controller: u8,
    #[serde(default = "default_output_channel")]
    pub output_channel: u8,
    /// Inbound channel to rule; channels without a rule are inert
    pub channels: BTreeMap<u8, RoutingRule>,
}

fn default_sustain_controller() -> u8 {
    SUSTAIN_CONTROLLER
}

fn default_output_channel() -> u8 {
    1
}

/// One outbound event and where it goes
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Routed<'a> {
    pub endpoint: &'a str,
    pub event: MidiEvent,
}

impl RoutingTable {
    pub fn new(outputs: Vec<String>) -> Self {
        Self {
            outputs,
            broadcast: None,
            sustain_controller: SUSTAIN_CONTROLLER,
            output_channel: default_output_channel(),
            channels: BTreeMap::new(),
        }
    }

    pub fn with_rule(mut self, channel: u8, rule: RoutingRule) -> Self {
        self.channels.insert(channel, rule);
        self
    }

    /// Load and validate a table from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            BootError::Config(format!(
                "Failed to read routing table {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(content)
            .map_err(|e| BootError::Config(format!("Failed to parse routing table JSON: {}", e)))?;
        validate_table(&table)?;
        Ok(table)
    }

    pub fn rule_for(&self, channel: u8) -> Option<&RoutingRule> {
        self.channels.get(&channel)
    }

    /// Sustain targets, each at most once, in declaration order
    pub fn broadcast_targets(&self) -> Vec<&str> {
        let source = self.broadcast.as_ref().unwrap_or(&self.outputs);
        let mut targets: Vec<&str> = Vec::with_capacity(source.len());
        for endpoint in source {
            if !targets.contains(&endpoint.as_str()) {
                targets.push(endpoint);
            }
        }
        targets
    }

    /// Classify one inbound event and fan it out
    pub fn route(&self, event: &MidiEvent) -> Vec<Routed<'_>> {
        match event.class() {
            EventClass::Control => self.route_control(event),
            EventClass::Note => self.route_note(event),
        }
    }

    fn route_control(&self, event: &MidiEvent) -> Vec<Routed<'_>> {
        let MidiEvent::Control { controller, .. } = *event else {
            return Vec::new();
        };
        if controller != self.sustain_controller {
            return Vec::new();
        }
        let outbound = event.with_channel(self.output_channel);
        self.broadcast_targets()
            .into_iter()
            .map(|endpoint| Routed {
                endpoint,
                event: outbound,
            })
            .collect()
    }

    fn route_note(&self, event: &MidiEvent) -> Vec<Routed<'_>> {
        let Some(rule) = self.rule_for(event.channel()) else {
            return Vec::new();
        };
        let outbound = event.with_channel(self.output_channel);
        match rule {
            RoutingRule::Single(endpoint) => vec![Routed {
                endpoint,
                event: outbound,
            }],
            RoutingRule::FanOut(taps) => taps
                .iter()
                .map(|tap| Routed {
                    endpoint: &tap.endpoint,
                    event: outbound.scaled(tap.gain),
                })
                .collect(),
        }
    }
}
