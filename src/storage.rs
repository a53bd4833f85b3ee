//! Run persistence: auto-save and exports.

use crate::model::RunRecord;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Directory that auto-saved runs go to.
pub fn runs_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .context("no data directory available")?;
    Ok(base.join("stellar-evolve").join("runs"))
}

/// File name for a saved run: timestamp plus request id, safe on every OS.
pub fn run_file_name(record: &RunRecord, extension: &str) -> String {
    format!(
        "run-{}-{}.{}",
        record.timestamp_utc.replace(':', "-").replace('T', "_"),
        record.request_id,
        extension
    )
}

/// Where a run landed on disk. `record` has its attachment pointed at the
/// saved track copy when one was written.
#[derive(Debug)]
pub struct SavedRun {
    pub json: PathBuf,
    pub track: Option<PathBuf>,
    pub record: RunRecord,
}

/// Save the run record (and a copy of its track text, if any) under `dir`.
pub fn save_run_in(dir: &Path, record: &RunRecord, track_text: Option<&str>) -> Result<SavedRun> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let mut record = record.clone();
    let track = match track_text {
        Some(text) => {
            let track_path = dir.join(run_file_name(&record, "dat"));
            export_track(&track_path, text)?;
            record.report.retarget_track(&track_path);
            Some(track_path)
        }
        None => None,
    };
    let json = dir.join(run_file_name(&record, "json"));
    export_json(&json, &record)?;
    Ok(SavedRun { json, track, record })
}

/// Where `save_run` keeps the track copy for `record`.
pub fn saved_track_path(record: &RunRecord) -> Result<PathBuf> {
    Ok(runs_dir()?.join(run_file_name(record, "dat")))
}

pub fn save_run(record: &RunRecord, track_text: Option<&str>) -> Result<SavedRun> {
    save_run_in(&runs_dir()?, record, track_text)
}

pub fn export_json(path: &Path, record: &RunRecord) -> Result<()> {
    let data = serde_json::to_vec_pretty(record).context("serialize run")?;
    std::fs::write(path, data).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn export_track(path: &Path, track_text: &str) -> Result<()> {
    std::fs::write(path, track_text).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Load up to `limit` saved runs, newest first.
pub fn load_recent_in(dir: &Path, limit: usize) -> Result<Vec<RunRecord>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("read {}", dir.display())),
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("json"))
        .collect();
    // Timestamps in the file name sort chronologically.
    files.sort();
    files.reverse();

    let mut out = Vec::new();
    for p in files.into_iter().take(limit) {
        let data = std::fs::read(&p).with_context(|| format!("read {}", p.display()))?;
        match serde_json::from_slice::<RunRecord>(&data) {
            Ok(r) => out.push(r),
            Err(e) => tracing::warn!(path = %p.display(), error = %e, "skipping unreadable saved run"),
        }
    }
    Ok(out)
}

pub fn load_recent(limit: usize) -> Result<Vec<RunRecord>> {
    load_recent_in(&runs_dir()?, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Attachment, ChartOptions, Report, RunConfig, RunMode, Severity, SimulationParameters,
    };

    fn record(ts: &str, id: &str) -> RunRecord {
        RunRecord {
            timestamp_utc: ts.into(),
            request_id: id.into(),
            config: RunConfig {
                mode: RunMode::Evolve,
                params: SimulationParameters::new(5.0, 0.02, 12000.0),
                chart: ChartOptions::default(),
            },
            elapsed: Some(std::time::Duration::from_millis(1500)),
            report: Report {
                title: "Output".into(),
                severity: Severity::Normal,
                fields: Vec::new(),
                description: None,
                attachment: None,
            },
        }
    }

    #[test]
    fn file_names_are_filesystem_safe() {
        let r = record("2024-05-01T10:20:30Z", "abc");
        assert_eq!(run_file_name(&r, "json"), "run-2024-05-01_10-20-30Z-abc.json");
    }

    #[test]
    fn saved_runs_load_back_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        save_run_in(dir.path(), &record("2024-05-01T10:00:00Z", "a"), None).unwrap();
        save_run_in(dir.path(), &record("2024-05-02T10:00:00Z", "b"), Some("t\n1\n")).unwrap();

        let loaded = load_recent_in(dir.path(), 10).unwrap();
        let ids: Vec<&str> = loaded.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(loaded[0].elapsed, Some(std::time::Duration::from_millis(1500)));
        assert!(dir.path().join("run-2024-05-02_10-00-00Z-b.dat").exists());

        assert_eq!(load_recent_in(dir.path(), 1).unwrap().len(), 1);
    }

    #[test]
    fn saved_record_points_at_its_own_track_copy() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = record("2024-05-03T10:00:00Z", "c");
        r.report.attachment = Some(Attachment::TrackFile {
            path: "linux-sse/evolve.dat".into(),
        });

        let saved = save_run_in(dir.path(), &r, Some("t\n1\n")).unwrap();

        let copy = dir.path().join("run-2024-05-03_10-00-00Z-c.dat");
        assert_eq!(saved.track.as_deref(), Some(copy.as_path()));
        assert_eq!(std::fs::read_to_string(&copy).unwrap(), "t\n1\n");
        let expected = Some(Attachment::TrackFile { path: copy });
        assert_eq!(saved.record.report.attachment, expected);
        let on_disk: RunRecord =
            serde_json::from_slice(&std::fs::read(&saved.json).unwrap()).unwrap();
        assert_eq!(on_disk.report.attachment, expected);
    }

    #[test]
    fn saving_without_track_keeps_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = record("2024-05-04T10:00:00Z", "d");
        r.report.attachment = Some(Attachment::TrackFile {
            path: "elsewhere.dat".into(),
        });

        let saved = save_run_in(dir.path(), &r, None).unwrap();

        assert!(saved.track.is_none());
        assert_eq!(saved.record.report.attachment, r.report.attachment);
    }

    #[test]
    fn missing_directory_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_recent_in(&dir.path().join("none"), 5).unwrap().is_empty());
    }
}
