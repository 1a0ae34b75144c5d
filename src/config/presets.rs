/// Reference rig presets
///
/// The boot order and routing table of the rig this tool was built for:
/// one hard server (`default`) plus three soft servers, a MIDI router,
/// a mixer, and the synthesizer and effect hosts for four live patches.
/// Used when no plan file is present and as a template for new rigs.
use crate::config::plan::{default_replay_tool, BootPlan};
use crate::config::types::{
    AlertConfig, BootStep, DomainName, LaunchSpec, ReplaySpec, TimingConfig,
};
use crate::routing::table::{RoutingRule, RoutingTable, Tap};
use std::collections::BTreeMap;
use std::path::Path;

/// Soft servers brought up next to the primary one
pub const SOFT_DOMAINS: [&str; 3] = ["SOFT1", "SOFT2", "SOFT3"];

/// Pause after a patch group so its hosts finish loading
const GROUP_PAUSE_MS: u64 = 3_000;

/// Synthesizer flag that disables the GUI; dropped in debug mode
const HEADLESS_FLAG: &str = "-i";

fn step(label: &str, argv: Vec<String>) -> BootStep {
    BootStep {
        label: label.to_string(),
        domain: DomainName::primary(),
        launch: LaunchSpec::new(argv),
        endpoints: Vec::new(),
        post_delay_ms: None,
    }
}

fn words(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

fn yoshimi(label: &str, instance: &str, patch: &Path) -> BootStep {
    let mut argv = words("yoshimi -c -I -N");
    argv.push(instance.to_string());
    argv.extend(words("-j -J -l"));
    argv.push(patch.to_string_lossy().into_owned());

    let mut step = step(label, argv);
    step.launch = step.launch.with_headless_args([HEADLESS_FLAG]);
    step
}

/// The reference boot plan, with every rig file resolved under `home`
pub fn reference_rig(home: &Path) -> BootPlan {
    let patches = home.join("YOSHIMI");

    let mut router = step(
        "Distribute",
        vec![home.join("Distribute").to_string_lossy().into_owned()],
    );
    router.endpoints = vec!["Distribute:out_1".to_string(), "Distribute:out_16".to_string()];

    let mut mixer_argv = words("non-mixer --instance Mixer-General");
    mixer_argv.push(
        home.join("non-mixer")
            .join("Mixer-General")
            .to_string_lossy()
            .into_owned(),
    );
    let mut mixer = step("Mixer-General", mixer_argv);
    mixer.endpoints = vec![
        "Mixer-General/FinalOutput:out-1".to_string(),
        "Mixer-General/FinalOutput:out-2".to_string(),
    ];
    mixer.post_delay_ms = Some(GROUP_PAUSE_MS);

    let mut calf_sro = step(
        "CalfSRO",
        words("calfjackhost --client CalfSRO eq12:SRO ! reverb:SRO ! multibandcompressor:SRO"),
    );
    calf_sro.post_delay_ms = Some(GROUP_PAUSE_MS);

    let steps = vec![
        router,
        mixer,
        yoshimi("Yoshimi SRO 1", "YoshSRO1", &patches.join("SROpart1.xmz")),
        yoshimi("Yoshimi SRO 2", "YoshSRO2", &patches.join("SROpart2.xmz")),
        yoshimi("Yoshimi SRO 3", "YoshSRO3", &patches.join("SROpart3.xmz")),
        calf_sro,
        step(
            "StringsSSO",
            words("calfjackhost --client StringsSSO fluidsynth:StringsSSO"),
        ),
        step(
            "StringsBassAdd",
            words(
                "calfjackhost --client StringsBassAdd fluidsynth:BassoonsSustain \
                 fluidsynth:ContrabassoonSolo fluidsynth:GeneralBass",
            ),
        ),
        step(
            "MaxStringsFilters",
            words(
                "calfjackhost --client MaxStringsFilters eq12:MaxStrings ! reverb:MaxStrings \
                 ! multibandcompressor:Strings",
            ),
        ),
        yoshimi(
            "Yoshimi FlowBells",
            "YoshFlowBells",
            &patches.join("FlowBells.xmz"),
        ),
    ];

    let mut domains = vec![DomainName::primary()];
    domains.extend(SOFT_DOMAINS.iter().map(|name| DomainName::from(*name)));

    BootPlan {
        domains,
        steps,
        replay: vec![ReplaySpec {
            domain: DomainName::primary(),
            snapshot: home.join("AJBoot.xml"),
        }],
        replay_tool: default_replay_tool(),
        timing: TimingConfig::default(),
        alert: AlertConfig::default(),
    }
}

/// The reference routing table.
///
/// Channels 3 and 5 double two patches; their gains are per-member
/// attenuations chosen by ear to avoid overload.
pub fn reference_routing() -> RoutingTable {
    let outputs: Vec<String> = ["SRO", "Strings", "FlowBells", "Many-Horns"]
        .iter()
        .map(|name| name.to_string())
        .collect();

    let mut channels = BTreeMap::new();
    channels.insert(1, RoutingRule::Single("SRO".to_string()));
    channels.insert(2, RoutingRule::Single("Strings".to_string()));
    channels.insert(
        3,
        RoutingRule::FanOut(vec![Tap::new("SRO", 0.5), Tap::new("Strings", 0.5)]),
    );
    channels.insert(4, RoutingRule::Single("FlowBells".to_string()));
    channels.insert(
        5,
        RoutingRule::FanOut(vec![Tap::new("Strings", 0.55), Tap::new("FlowBells", 1.0)]),
    );
    channels.insert(6, RoutingRule::Single("Many-Horns".to_string()));

    let mut table = RoutingTable::new(outputs);
    // Sustain reaches the three live patches only.
    table.broadcast = Some(vec![
        "SRO".to_string(),
        "Strings".to_string(),
        "FlowBells".to_string(),
    ]);
    table.channels = channels;
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validator::{validate_plan, validate_table};
    use crate::routing::event::MidiEvent;

    #[test]
    fn test_reference_rig_order() {
        let plan = reference_rig(Path::new("/home/rig"));
        let labels: Vec<&str> = plan.steps.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels[0], "Distribute");
        assert_eq!(labels[1], "Mixer-General");
        assert_eq!(labels.last(), Some(&"Yoshimi FlowBells"));
        assert_eq!(plan.steps.len(), 10);
        assert_eq!(plan.effective_domains().len(), 4);
        assert_eq!(plan.steps[1].post_delay_ms, Some(3_000));
        assert_eq!(plan.steps[5].post_delay_ms, Some(3_000));
        assert_eq!(
            plan.replay_argv(&plan.replay[0]),
            vec!["aj-snapshot", "-r", "/home/rig/AJBoot.xml"]
        );
    }

    #[test]
    fn test_yoshimi_headless_toggle() {
        let plan = reference_rig(Path::new("/home/rig"));
        let sro = &plan.steps[2].launch;
        assert_eq!(sro.resolve(false)[..2], ["yoshimi", "-i"]);
        assert_eq!(sro.resolve(true)[1], "-c");
        assert_eq!(
            sro.resolve(true).last().map(String::as_str),
            Some("/home/rig/YOSHIMI/SROpart1.xmz")
        );
    }

    #[test]
    fn test_reference_rig_validates() {
        let plan = reference_rig(Path::new("/nonexistent"));
        let result = validate_plan(&plan).unwrap();
        // Only the snapshot is missing.
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_reference_routing() {
        let table = reference_routing();
        assert!(validate_table(&table).is_ok());
        assert_eq!(table.broadcast_targets(), vec!["SRO", "Strings", "FlowBells"]);

        let doubled = MidiEvent::NoteOn {
            channel: 5,
            note: 64,
            velocity: 100,
        };
        let routed = table.route(&doubled);
        assert_eq!(routed.len(), 2);
        assert_eq!(routed[0].endpoint, "Strings");
        assert_eq!(routed[0].event.intensity(), Some(55));
        assert_eq!(routed[1].event.intensity(), Some(100));
    }
}
