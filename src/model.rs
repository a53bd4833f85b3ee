use crate::track::TrackTable;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Physical and numerical inputs for one SSE run.
///
/// Field names follow the simulator's own `evolve.in` vocabulary. Only `mass`
/// is checked here; every other range is the simulator's business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    /// Initial mass in solar units.
    pub mass: f64,
    /// Metallicity (0.0001 -> 0.03, 0.02 is Population I).
    pub z: f64,
    /// Maximum evolution time in Myr.
    pub tphysf: f64,

    pub neta: f64,
    pub bwind: f64,
    pub hewind: f64,
    pub sigma: f64,

    pub ifflag: i64,
    pub wdflag: i64,
    pub bhflag: i64,
    pub nsflag: i64,
    pub mxns: f64,
    pub idum: i64,

    pub pts1: f64,
    pub pts2: f64,
    pub pts3: f64,
}

impl SimulationParameters {
    /// Parameters for `mass`/`z`/`tphysf` with the simulator's documented defaults.
    pub fn new(mass: f64, z: f64, tphysf: f64) -> Self {
        Self {
            mass,
            z,
            tphysf,
            neta: 0.5,
            bwind: 0.0,
            hewind: 0.5,
            sigma: 190.0,
            ifflag: 0,
            wdflag: 1,
            bhflag: 0,
            nsflag: 1,
            mxns: 3.0,
            idum: 999,
            pts1: 0.05,
            pts2: 0.01,
            pts3: 0.02,
        }
    }

    /// Reject inputs that must never reach the simulator.
    pub fn validate(&self) -> Result<(), crate::error::PipelineError> {
        // NaN fails this comparison too.
        if self.mass > 0.0 {
            Ok(())
        } else {
            Err(crate::error::PipelineError::InvalidInput {
                reason: "Negative or zero mass currently not supported".into(),
            })
        }
    }
}

/// One line of the simulator's stage summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRecord {
    pub stage: String,
    pub time: f64,
    pub mass: f64,
    /// Time and mass exactly as the simulator printed them.
    pub time_text: String,
    pub mass_text: String,
}

/// Result of one simulator invocation. Exactly one variant per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunOutcome {
    Success {
        records: Vec<EvolutionRecord>,
        raw: String,
    },
    Failure {
        raw: String,
        reason: String,
    },
}

impl RunOutcome {
    pub fn raw(&self) -> &str {
        match self {
            RunOutcome::Success { raw, .. } | RunOutcome::Failure { raw, .. } => raw,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Normal,
    Error,
}

impl Severity {
    /// RGB colour presentation layers use for the report frame.
    pub fn color(self) -> u32 {
        match self {
            Severity::Normal => 0xCCDFF0,
            Severity::Error => 0xFF0000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportField {
    pub name: String,
    pub value: String,
    /// Narrow fields sit side by side; wide fields take the full row.
    pub inline: bool,
}

/// Which command produced the run, and therefore what gets attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    Evolve,
    Plot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Presentation-only extras for the HR-diagram chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartOptions {
    /// (left, right) in log10(Teff); left > right draws hot stars on the left.
    pub x_bounds: (f64, f64),
    /// (bottom, top) in log10(L/Lsun).
    pub y_bounds: (f64, f64),
    pub theme: Theme,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            x_bounds: (4.75, 3.3),
            y_bounds: (-1.8, 6.5),
            theme: Theme::Dark,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attachment {
    /// The simulator's track file, as written by the run.
    TrackFile { path: PathBuf },
    /// An HR diagram drawn from the track file.
    Chart {
        track_path: PathBuf,
        options: ChartOptions,
    },
}

/// Display-ready result handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub severity: Severity,
    pub fields: Vec<ReportField>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

impl Report {
    pub fn field(&self, name: &str) -> Option<&ReportField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Point a track or chart attachment at `path`.
    pub fn retarget_track(&mut self, path: &Path) {
        match self.attachment.as_mut() {
            Some(Attachment::TrackFile { path: p }) => *p = path.to_path_buf(),
            Some(Attachment::Chart { track_path, .. }) => *track_path = path.to_path_buf(),
            None => {}
        }
    }
}

/// Everything needed to run one request, fixed at submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub mode: RunMode,
    pub params: SimulationParameters,
    #[serde(default)]
    pub chart: ChartOptions,
}

/// Per-request record persisted by auto-save and JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(default)]
    pub timestamp_utc: String,
    pub request_id: String,
    pub config: RunConfig,
    #[serde(default, with = "humantime_serde")]
    pub elapsed: Option<Duration>,
    pub report: Report,
}

/// A finished request: its persisted record plus the track snapshot taken
/// while the run still owned the simulator folder.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub record: RunRecord,
    pub track_text: Option<String>,
    pub track: Option<TrackTable>,
}

#[derive(Debug, Clone)]
pub enum RunEvent {
    Queued { request_id: String },
    Started { request_id: String },
    Info(String),
    Completed {
        // Box to keep RunEvent small; the track snapshot can be large.
        run: Box<CompletedRun>,
    },
}
