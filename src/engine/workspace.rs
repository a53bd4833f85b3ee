use std::path::{Path, PathBuf};

/// Name of the input file the simulator reads from its working directory.
pub const INPUT_FILE: &str = "evolve.in";
/// Name of the track file the simulator writes next to its input.
pub const TRACK_FILE: &str = "evolve.dat";

/// File locations one run works with.
///
/// Passed explicitly to every pipeline stage so no stage reaches for a
/// hard-coded path. The simulator itself uses fixed names inside `sim_dir`,
/// so two workspaces over the same directory must never run at once; the
/// orchestrator serializes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunWorkspace {
    pub request_id: String,
    pub sim_dir: PathBuf,
    pub input_path: PathBuf,
    pub track_path: PathBuf,
}

impl RunWorkspace {
    pub fn new(request_id: impl Into<String>, sim_dir: impl AsRef<Path>) -> Self {
        let sim_dir = sim_dir.as_ref().to_path_buf();
        Self {
            request_id: request_id.into(),
            input_path: sim_dir.join(INPUT_FILE),
            track_path: sim_dir.join(TRACK_FILE),
            sim_dir,
        }
    }
}
