use crate::config::plan::{BootPlan, DEFAULT_PLAN_FILE};
use crate::config::types::{AlertConfig, BootError};
use crate::core::sequencer::{BootRuntime, Sequencer};
use crate::exec::clock::SystemClock;
use crate::exec::launcher::CommandSpawner;
use crate::kernel::domain::JackToolsBackend;
use crate::kernel::procfs::ProcfsProbe;
use crate::observability::alert::{Alarm, BeepAlarm, SilentAlarm};
use crate::observability::journal::BootJournal;
use crate::routing::table::RoutingTable;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CliMode {
    Boot,
    Distribute,
}

impl CliMode {
    fn binary(self) -> &'static str {
        match self {
            Self::Boot => "rigboot",
            Self::Distribute => "distribute",
        }
    }
}

#[derive(Parser)]
#[command(name = "rigboot", author, version, about, long_about = None)]
struct BootCli {
    /// Any value turns debug mode on: workers start with their
    /// interactive front-ends instead of headless
    debug: Option<String>,
    /// Boot plan file (default: ./rigboot.json, else the reference rig)
    #[arg(long)]
    plan: Option<PathBuf>,
    /// Append structured boot events to this JSON-lines file
    #[arg(long)]
    journal: Option<PathBuf>,
    /// Print the effective plan as JSON and exit without booting
    #[arg(long)]
    print_plan: bool,
    /// Base directory for the reference rig's files (default: $HOME)
    #[arg(long)]
    home: Option<PathBuf>,
    /// Tool used to talk to audio server domains
    #[arg(long, default_value = "jack_lsp")]
    lsp_program: String,
    /// Do not sound the alert on failure
    #[arg(long)]
    silent: bool,
}

/// The router speaks JSON lines on stdin/stdout only. It registers no
/// ports with an audio server, so it cannot satisfy a boot step that waits
/// for `Distribute:out_*` endpoints; that step needs a server-side router.
#[derive(Parser)]
#[command(name = "distribute", author, version, about, long_about = None)]
struct DistributeCli {
    /// Routing table file (default: the reference routing table)
    #[arg(long)]
    table: Option<PathBuf>,
    /// Print the effective routing table as JSON and exit
    #[arg(long)]
    print_table: bool,
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

/// Print a boot error and exit with its status
fn exit_with(err: &BootError) -> ! {
    eprintln!("Error: {}", err);
    std::process::exit(i32::from(err));
}

/// Print a boot failure and sound the alarm; returns the exit status
fn report_failure(err: &BootError, alarm: &dyn Alarm) -> i32 {
    eprintln!("Error: {}", err);
    alarm.sound();
    i32::from(err)
}

/// Boot-mode exit: every failure is announced before the process ends
fn fail_boot(err: &BootError, silent: bool, alert: &AlertConfig) -> ! {
    let code = if silent {
        report_failure(err, &SilentAlarm)
    } else {
        report_failure(err, &BeepAlarm::new(alert.clone()))
    };
    std::process::exit(code);
}

pub fn run(mode: CliMode) -> Result<()> {
    init_logging();

    if !cfg!(target_os = "linux") {
        log::warn!(
            "{} probes processes through /proc; readiness checks will fail on this platform",
            mode.binary()
        );
    }

    match mode {
        CliMode::Boot => run_boot(BootCli::parse()),
        CliMode::Distribute => run_distribute(DistributeCli::parse()),
    }
}

fn home_dir(cli: &BootCli) -> PathBuf {
    cli.home
        .clone()
        .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("/"))
}

fn resolve_plan(cli: &BootCli) -> crate::config::types::Result<BootPlan> {
    if let Some(path) = &cli.plan {
        return BootPlan::load_from_file(path);
    }
    match BootPlan::load_default()? {
        Some(plan) => Ok(plan),
        None => {
            let home = home_dir(cli);
            log::warn!(
                "No {} in the working directory; using the reference rig under {}",
                DEFAULT_PLAN_FILE,
                home.display()
            );
            Ok(crate::config::presets::reference_rig(&home))
        }
    }
}

fn run_boot(cli: BootCli) -> Result<()> {
    crate::kernel::signal::install_exit_handlers()
        .map_err(|e| anyhow::anyhow!("Failed to install signal handlers: {}", e))?;

    let debug = cli.debug.is_some();
    if debug {
        log::info!("Debug mode on");
    } else {
        log::info!("Running normally, debug mode off");
    }

    let plan = resolve_plan(&cli)
        .unwrap_or_else(|e| fail_boot(&e, cli.silent, &AlertConfig::default()));

    if cli.print_plan {
        let json = plan
            .to_json_pretty()
            .unwrap_or_else(|e| fail_boot(&e, cli.silent, &plan.alert));
        println!("{}", json);
        return Ok(());
    }

    let validation = crate::config::validator::validate_plan(&plan)
        .unwrap_or_else(|e| fail_boot(&e, cli.silent, &plan.alert));
    for warning in &validation.warnings {
        log::warn!("{}", warning);
    }

    let journal = match &cli.journal {
        Some(path) => BootJournal::with_file(path)
            .unwrap_or_else(|e| fail_boot(&e, cli.silent, &plan.alert)),
        None => BootJournal::new(),
    };

    let probe = ProcfsProbe::new();
    if !probe.is_supported() {
        log::warn!("procfs not found; processes will never register");
    }
    let backend = JackToolsBackend::new(cli.lsp_program.clone());
    let beeper = BeepAlarm::new(plan.alert.clone());
    let alarm: &dyn Alarm = if cli.silent { &SilentAlarm } else { &beeper };

    let runtime = BootRuntime {
        domains: &backend,
        spawner: &CommandSpawner,
        probe: &probe,
        clock: &SystemClock,
        alarm,
        journal: &journal,
    };

    let mut sequencer = Sequencer::new(&plan, runtime, debug);
    match sequencer.run() {
        Ok(report) => {
            log::info!(
                "{} steps ready in {} ms (run {})",
                report.steps.len(),
                report.elapsed_ms,
                report.run_id
            );
            Ok(())
        }
        Err(abort) => {
            eprintln!("Error: {}", abort);
            if let Some(path) = journal.path() {
                eprintln!("Boot journal: {}", path.display());
            }
            std::process::exit(abort.exit_code());
        }
    }
}

fn load_table(path: Option<&Path>) -> crate::config::types::Result<RoutingTable> {
    match path {
        Some(path) => RoutingTable::load_from_file(path),
        None => {
            let table = crate::config::presets::reference_routing();
            crate::config::validator::validate_table(&table)?;
            Ok(table)
        }
    }
}

fn run_distribute(cli: DistributeCli) -> Result<()> {
    let table = load_table(cli.table.as_deref()).unwrap_or_else(|e| exit_with(&e));

    if cli.print_table {
        let json =
            serde_json::to_string_pretty(&table).context("Failed to serialize routing table")?;
        println!("{}", json);
        return Ok(());
    }

    log::info!(
        "Routing {} channel rule(s) to {} output(s)",
        table.channels.len(),
        table.outputs.len()
    );

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    crate::routing::worker::run_worker(&table, stdin.lock(), stdout.lock())
        .context("Router I/O failed")?;
    Ok(())
}
