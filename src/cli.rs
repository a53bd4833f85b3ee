use crate::engine::classifier::OutputClassifier;
use crate::engine::launcher::{Launcher, PlatformLauncher};
use crate::engine::SimulationEngine;
use crate::model::{ChartOptions, RunConfig, RunMode, SimulationParameters, Theme};
use crate::orchestrator::{process_run_completion, SimulationService};
use crate::report::ReportBuilder;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "stellar-evolve",
    version,
    about = "Run the SSE stellar-evolution code and show its evolutionary stages"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print JSON result and exit (no TUI)
    #[arg(long, global = true)]
    pub json: bool,

    /// Print text summary and exit (no TUI)
    #[arg(long, global = true)]
    pub text: bool,

    /// Run silently: suppress all output except errors (for cron usage)
    #[arg(long, global = true)]
    pub silent: bool,

    /// Directory holding the start scripts and per-OS simulator folders
    #[arg(long, global = true, env = "STELLAR_EVOLVE_ROOT", default_value = ".")]
    pub sim_root: PathBuf,

    /// Simulator folder (where evolve.in and evolve.dat live); defaults per OS
    #[arg(long, global = true, env = "STELLAR_EVOLVE_SIM_DIR")]
    pub sim_dir: Option<PathBuf>,

    /// Start script to run instead of the per-OS default
    #[arg(long, global = true, env = "STELLAR_EVOLVE_LAUNCHER")]
    pub launcher: Option<PathBuf>,

    /// Extra output marker that means the simulator failed, on top of ERROR (repeatable)
    #[arg(long = "sentinel", global = true)]
    pub sentinels: Vec<String>,

    /// Separator between entries of the Stage/Time/Mass columns
    #[arg(long, global = true, default_value = "\n", hide_default_value = true)]
    pub field_separator: String,

    /// Kill the simulator if it runs longer than this (e.g. 90s); no limit by default
    #[arg(long, global = true)]
    pub timeout: Option<humantime::Duration>,

    /// Export the run (parameters and report) as JSON
    #[arg(long, global = true)]
    pub export_json: Option<PathBuf>,

    /// Copy the track file here after a successful run
    #[arg(long, global = true)]
    pub export_track: Option<PathBuf>,

    /// Use --auto-save true or --auto-save false to override
    #[arg(long, global = true, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_save: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Evolve a star and list its evolutionary stages
    Evolve(SimArgs),
    /// Evolve a star and draw its track on an HR diagram
    Plot(PlotArgs),
}

/// Simulator parameters. Descriptions follow the simulator's own documentation.
#[derive(Debug, Args, Clone)]
pub struct SimArgs {
    /// Mass in solar units
    #[arg(long, allow_negative_numbers = true)]
    pub mass: f64,

    /// Metallicity in the range 0.0001 -> 0.03 where 0.02 is Population I
    #[arg(long)]
    pub z: f64,

    /// Maximum evolution time in Myr
    #[arg(long)]
    pub tphysf: f64,

    /// Reimers mass-loss coefficient (neta*4x10^-13; 0.5 normally)
    #[arg(long, default_value_t = 0.5)]
    pub neta: f64,

    /// Binary enhanced mass loss parameter (inactive for single)
    #[arg(long, default_value_t = 0.0)]
    pub bwind: f64,

    /// Helium star mass loss factor (1.0 normally)
    #[arg(long, default_value_t = 0.5)]
    pub hewind: f64,

    /// Dispersion in the Maxwellian for the SN kick speed (190 km/s)
    #[arg(long, default_value_t = 190.0)]
    pub sigma: f64,

    /// > 0 uses WD IFMR of HPE, 1995, MNRAS, 272, 800
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub ifflag: i64,

    /// > 0 uses modified-Mestel cooling for WDs
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub wdflag: i64,

    /// > 0 allows velocity kick at BH formation
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub bhflag: i64,

    /// > 0 takes NS/BH mass from Belczynski et al. 2002, ApJ, 572, 407
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub nsflag: i64,

    /// Maximum NS mass (1.8, nsflag=0; 3.0, nsflag=1)
    #[arg(long, default_value_t = 3.0)]
    pub mxns: f64,

    /// Random number seed used in the kick routine
    #[arg(long, default_value_t = 999, allow_negative_numbers = true)]
    pub idum: i64,

    /// Timestep fraction on the main sequence
    #[arg(long, default_value_t = 0.05)]
    pub pts1: f64,

    /// Timestep fraction on the giant branches
    #[arg(long, default_value_t = 0.01)]
    pub pts2: f64,

    /// Timestep fraction in the HG
    #[arg(long, default_value_t = 0.02)]
    pub pts3: f64,
}

#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    #[command(flatten)]
    pub sim: SimArgs,

    /// x-axis (log Teff) bounds for the plot: "default" or "left,right"
    #[arg(long, default_value = "default", allow_hyphen_values = true)]
    pub xbounds: String,

    /// y-axis (log L) bounds for the plot: "default" or "bottom,top"
    #[arg(long, default_value = "default", allow_hyphen_values = true)]
    pub ybounds: String,

    /// Chart colour theme
    #[arg(long, value_enum, default_value_t = ThemeArg::Dark)]
    pub theme: ThemeArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeArg {
    Dark,
    Light,
}

impl From<ThemeArg> for Theme {
    fn from(t: ThemeArg) -> Self {
        match t {
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Light => Theme::Light,
        }
    }
}

impl From<&SimArgs> for SimulationParameters {
    fn from(a: &SimArgs) -> Self {
        SimulationParameters {
            mass: a.mass,
            z: a.z,
            tphysf: a.tphysf,
            neta: a.neta,
            bwind: a.bwind,
            hewind: a.hewind,
            sigma: a.sigma,
            ifflag: a.ifflag,
            wdflag: a.wdflag,
            bhflag: a.bhflag,
            nsflag: a.nsflag,
            mxns: a.mxns,
            idum: a.idum,
            pts1: a.pts1,
            pts2: a.pts2,
            pts3: a.pts3,
        }
    }
}

/// Parse `"default"` or `"a,b"` into a pair of axis bounds.
pub fn parse_bounds(text: &str, default: (f64, f64)) -> Result<(f64, f64)> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("default") {
        return Ok(default);
    }
    let (a, b) = text
        .split_once(',')
        .with_context(|| format!("bounds must be \"default\" or \"lo,hi\", got {text:?}"))?;
    let a: f64 = a.trim().parse().with_context(|| format!("invalid bound {a:?}"))?;
    let b: f64 = b.trim().parse().with_context(|| format!("invalid bound {b:?}"))?;
    if a == b || !a.is_finite() || !b.is_finite() {
        anyhow::bail!("bounds {text:?} must be two different finite numbers");
    }
    Ok((a, b))
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<RunConfig> {
    Ok(match &args.command {
        Command::Evolve(sim) => RunConfig {
            mode: RunMode::Evolve,
            params: sim.into(),
            chart: ChartOptions::default(),
        },
        Command::Plot(plot) => {
            let defaults = ChartOptions::default();
            RunConfig {
                mode: RunMode::Plot,
                params: (&plot.sim).into(),
                chart: ChartOptions {
                    x_bounds: parse_bounds(&plot.xbounds, defaults.x_bounds)
                        .context("--xbounds")?,
                    y_bounds: parse_bounds(&plot.ybounds, defaults.y_bounds)
                        .context("--ybounds")?,
                    theme: plot.theme.into(),
                },
            }
        }
    })
}

/// ERROR always counts as a failure; `--sentinel` only adds markers.
pub fn build_classifier(args: &Cli) -> OutputClassifier {
    OutputClassifier::with_extra(args.sentinels.iter().cloned())
}

/// Build the run service. Fails if this OS has no simulator build.
pub fn build_service(args: &Cli) -> Result<SimulationService> {
    let mut launcher = PlatformLauncher::for_current_platform(&args.sim_root)?;
    if let Some(script) = args.launcher.clone() {
        launcher = launcher.with_script(script);
    }
    if let Some(dir) = args.sim_dir.clone() {
        launcher = launcher.with_sim_dir(dir);
    }
    tracing::debug!(
        script = %launcher.script().display(),
        sim_dir = %launcher.sim_dir().display(),
        "selected simulator"
    );

    let classifier = build_classifier(args);
    tracing::debug!(sentinels = ?classifier.sentinels(), "failure markers");
    let engine = SimulationEngine::new(
        Arc::new(launcher),
        classifier,
        args.timeout.map(Duration::from),
    );
    Ok(SimulationService::new(
        engine,
        ReportBuilder::new(args.field_separator.clone()),
    ))
}

/// Returns whether the run produced a normal-severity report.
pub async fn run(args: Cli) -> Result<bool> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }

    let config = build_config(&args)?;
    let service = build_service(&args)?;

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            crate::tui::run(args, service, config).await?;
            return Ok(true);
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args, service, config).await;
        }
    }

    if args.json {
        return run_json(args, service, config).await;
    }

    run_text(args, service, config).await
}

async fn run_json(args: Cli, service: SimulationService, config: RunConfig) -> Result<bool> {
    let run = service.submit(config).await;
    let processed = process_run_completion(&args, args.auto_save, &run);
    let ok = !processed.record.report.is_error();

    if args.silent {
        if !ok {
            let desc = processed.record.report.description.clone().unwrap_or_default();
            println!("{}", desc);
        }
        return Ok(ok);
    }

    let (out_tx, out_handle) = spawn_output_writer();
    let out = serde_json::to_string_pretty(&processed.record)?;
    let _ = out_tx.send(OutputLine::Stdout(out));
    for msg in processed.export_messages {
        let _ = out_tx.send(OutputLine::Stderr(msg));
    }
    if let Some(p) = processed.auto_saved_path {
        let _ = out_tx.send(OutputLine::Stderr(format!("Saved: {}", p.display())));
    }
    drop(out_tx);
    let _ = out_handle.await;
    Ok(ok)
}

async fn run_text(args: Cli, service: SimulationService, config: RunConfig) -> Result<bool> {
    let (out_tx, out_handle) = spawn_output_writer();
    let _ = out_tx.send(OutputLine::Stderr(format!(
        "Running SSE for {} Msun…",
        config.params.mass
    )));

    let run = service.submit(config).await;
    let processed = process_run_completion(&args, args.auto_save, &run);
    let ok = !processed.record.report.is_error();

    let summary = crate::text_summary::build_text_summary(&processed.record.report);
    for line in summary.lines {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    for msg in processed.export_messages {
        let _ = out_tx.send(OutputLine::Stderr(msg));
    }
    if let Some(p) = processed.auto_saved_path {
        let _ = out_tx.send(OutputLine::Stderr(format!("Saved: {}", p.display())));
    }
    drop(out_tx);
    let _ = out_handle.await;
    Ok(ok)
}
