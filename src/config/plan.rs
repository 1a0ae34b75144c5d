/// Boot plan loading from rigboot.json
use crate::config::types::{
    AlertConfig, BootError, BootStep, DomainName, ReplaySpec, Result, TimingConfig,
};
use crate::utils::tokens::split_command_line;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// File name looked up in the working directory when no plan is given
pub const DEFAULT_PLAN_FILE: &str = "rigboot.json";

/// The fixed, deploy-time boot order for one rig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootPlan {
    /// Domains to verify before the first step, in order.
    /// Empty means "every domain named by a step, in first-use order".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<DomainName>,
    pub steps: Vec<BootStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replay: Vec<ReplaySpec>,
    /// Tool that restores a connection snapshot; the snapshot path is appended
    #[serde(default = "default_replay_tool")]
    pub replay_tool: Vec<String>,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub alert: AlertConfig,
}

pub fn default_replay_tool() -> Vec<String> {
    vec!["aj-snapshot".to_string(), "-r".to_string()]
}

impl BootPlan {
    pub fn new(steps: Vec<BootStep>) -> Self {
        Self {
            domains: Vec::new(),
            steps,
            replay: Vec::new(),
            replay_tool: default_replay_tool(),
            timing: TimingConfig::default(),
            alert: AlertConfig::default(),
        }
    }

    /// Load a plan from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            BootError::Config(format!(
                "Failed to read plan file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| BootError::Config(format!("Failed to parse plan JSON: {}", e)))
    }

    /// Load ./rigboot.json, if present
    pub fn load_default() -> Result<Option<Self>> {
        let path = std::env::current_dir()
            .map_err(|e| BootError::Config(format!("Failed to get current directory: {}", e)))?
            .join(DEFAULT_PLAN_FILE);

        if !path.exists() {
            return Ok(None);
        }
        Self::load_from_file(path).map(Some)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BootError::Config(format!("Failed to serialize plan: {}", e)))
    }

    /// Domains in verification order
    pub fn effective_domains(&self) -> Vec<DomainName> {
        if !self.domains.is_empty() {
            return self.domains.clone();
        }
        let mut domains: Vec<DomainName> = Vec::new();
        let named = self
            .steps
            .iter()
            .map(|step| &step.domain)
            .chain(self.replay.iter().map(|replay| &replay.domain));
        for domain in named {
            if !domains.contains(domain) {
                domains.push(domain.clone());
            }
        }
        domains
    }

    /// Full argv for replaying one snapshot
    pub fn replay_argv(&self, replay: &ReplaySpec) -> Vec<String> {
        let mut argv = self.replay_tool.clone();
        argv.push(replay.snapshot.to_string_lossy().into_owned());
        argv
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CommandLine {
    Tokens(Vec<String>),
    Line(String),
}

/// Accept a command either as a token array or as one shell-style string
pub fn deserialize_command<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match CommandLine::deserialize(deserializer)? {
        CommandLine::Tokens(tokens) => Ok(tokens),
        CommandLine::Line(line) => split_command_line(&line).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"{
        "steps": [
            {"label": "router", "domain": "default", "command": "/opt/rig/distribute --table routing.json",
             "endpoints": ["Distribute:out_1"]},
            {"label": "synth", "domain": "SOFT1", "command": ["yoshimi", "-c", "-N", "Yosh"],
             "headless_args": ["-i"], "post_delay_ms": 3000}
        ],
        "replay": [{"domain": "default", "snapshot": "/opt/rig/connections.xml"}],
        "timing": {"endpoint": {"attempts": 2, "interval_ms": 10}}
    }"#;

    #[test]
    fn test_parse_plan_both_command_forms() {
        let plan = BootPlan::from_json(PLAN).unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(
            plan.steps[0].launch.argv,
            vec!["/opt/rig/distribute", "--table", "routing.json"]
        );
        assert_eq!(plan.steps[1].launch.argv, vec!["yoshimi", "-c", "-N", "Yosh"]);
        assert_eq!(plan.steps[1].launch.headless_args, vec!["-i"]);
        assert_eq!(plan.steps[1].post_delay_ms, Some(3000));
        assert_eq!(plan.timing.endpoint.attempts, 2);
        assert_eq!(plan.timing.domain.attempts, 21);
        assert_eq!(plan.replay_tool, vec!["aj-snapshot", "-r"]);
    }

    #[test]
    fn test_effective_domains_first_use_order() {
        let plan = BootPlan::from_json(PLAN).unwrap();
        assert_eq!(
            plan.effective_domains(),
            vec![DomainName::primary(), DomainName::from("SOFT1")]
        );
    }

    #[test]
    fn test_declared_domains_win() {
        let mut plan = BootPlan::from_json(PLAN).unwrap();
        plan.domains = vec!["SOFT1".into(), "default".into(), "SOFT2".into()];
        assert_eq!(plan.effective_domains().len(), 3);
        assert_eq!(plan.effective_domains()[0].as_str(), "SOFT1");
    }

    #[test]
    fn test_replay_argv_appends_snapshot() {
        let plan = BootPlan::from_json(PLAN).unwrap();
        assert_eq!(
            plan.replay_argv(&plan.replay[0]),
            vec!["aj-snapshot", "-r", "/opt/rig/connections.xml"]
        );
    }

    #[test]
    fn test_round_trip_through_pretty_json() {
        let plan = BootPlan::from_json(PLAN).unwrap();
        let reparsed = BootPlan::from_json(&plan.to_json_pretty().unwrap()).unwrap();
        assert_eq!(plan, reparsed);
    }

    #[test]
    fn test_bad_command_string_is_config_error() {
        let err = BootPlan::from_json(
            r#"{"steps": [{"label": "x", "domain": "default", "command": "a 'b"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, BootError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = BootPlan::load_from_file("/nonexistent/rigboot.json").unwrap_err();
        assert!(matches!(err, BootError::Config(_)));
    }
}
