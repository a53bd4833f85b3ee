//! Post-run processing utilities.
//!
//! Handles auto-save and exports after a run completes.

use crate::cli::Cli;
use crate::model::{CompletedRun, RunRecord};
use crate::storage;
use std::path::Path;

/// Result of post-run processing, ready for presentation layers.
pub(crate) struct ProcessedRun {
    pub record: RunRecord,
    pub export_messages: Vec<String>,
    pub auto_saved_path: Option<std::path::PathBuf>,
}

/// Process a completed run: auto-save, export, and point the attachment at a
/// copy of the track that later runs cannot overwrite.
pub(crate) fn process_run_completion(args: &Cli, auto_save: bool, run: &CompletedRun) -> ProcessedRun {
    let save_dir = if auto_save {
        match storage::runs_dir() {
            Ok(dir) => Some(dir),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "auto-save failed");
                None
            }
        }
    } else {
        None
    };
    process_run_completion_in(args, save_dir.as_deref(), run)
}

/// As [`process_run_completion`], auto-saving into `save_dir` when given.
///
/// The explicit `--export-track` copy wins over the auto-saved one as the
/// attachment target, and `--export-json` is written last so it names it.
pub(crate) fn process_run_completion_in(
    args: &Cli,
    save_dir: Option<&Path>,
    run: &CompletedRun,
) -> ProcessedRun {
    let mut record = run.record.clone();
    let mut export_messages = Vec::new();

    let auto_saved_path = save_dir.and_then(|dir| {
        match storage::save_run_in(dir, &record, run.track_text.as_deref()) {
            Ok(saved) => {
                tracing::debug!(json = %saved.json.display(), track = ?saved.track, "auto-saved run");
                record = saved.record;
                Some(saved.json)
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "auto-save failed");
                None
            }
        }
    });

    if let (Some(export_path), Some(text)) = (args.export_track.as_deref(), run.track_text.as_deref()) {
        match storage::export_track(export_path, text) {
            Ok(_) => {
                export_messages.push(format!("Exported track: {}", export_path.display()));
                record.report.retarget_track(export_path);
            }
            Err(e) => export_messages.push(format!("Export track failed: {e:#}")),
        }
    }

    if let Some(export_path) = args.export_json.as_deref() {
        match storage::export_json(export_path, &record) {
            Ok(_) => export_messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    ProcessedRun {
        record,
        export_messages,
        auto_saved_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attachment;
    use clap::Parser;

    fn completed(attachment: Option<Attachment>) -> CompletedRun {
        use crate::model::*;
        CompletedRun {
            record: RunRecord {
                timestamp_utc: "2024-01-01T00:00:00Z".into(),
                request_id: "abc".into(),
                config: RunConfig {
                    mode: RunMode::Evolve,
                    params: SimulationParameters::new(1.0, 0.02, 100.0),
                    chart: ChartOptions::default(),
                },
                elapsed: None,
                report: Report {
                    title: "Output".into(),
                    severity: Severity::Normal,
                    fields: Vec::new(),
                    description: None,
                    attachment,
                },
            },
            track_text: Some("Time\n0.0\n".into()),
            track: None,
        }
    }

    #[test]
    fn exports_write_files_and_retarget_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let track_out = dir.path().join("track.dat");
        let json_out = dir.path().join("run.json");
        let args = Cli::parse_from([
            "stellar-evolve",
            "--export-track",
            track_out.to_str().unwrap(),
            "--export-json",
            json_out.to_str().unwrap(),
            "evolve",
            "--mass",
            "1.0",
            "--z",
            "0.02",
            "--tphysf",
            "100",
        ]);
        let run = completed(Some(Attachment::TrackFile {
            path: "linux-sse/evolve.dat".into(),
        }));

        let processed = process_run_completion(&args, false, &run);

        assert_eq!(processed.export_messages.len(), 2);
        assert!(processed.auto_saved_path.is_none());
        assert_eq!(std::fs::read_to_string(&track_out).unwrap(), "Time\n0.0\n");
        assert_eq!(
            processed.record.report.attachment,
            Some(Attachment::TrackFile { path: track_out.clone() })
        );
        let saved: RunRecord =
            serde_json::from_slice(&std::fs::read(&json_out).unwrap()).unwrap();
        assert_eq!(saved.request_id, "abc");
    }

    #[test]
    fn auto_saved_record_names_the_saved_track_copy() {
        let dir = tempfile::tempdir().unwrap();
        let json_out = dir.path().join("run.json");
        let args = Cli::parse_from([
            "stellar-evolve",
            "--export-json",
            json_out.to_str().unwrap(),
            "evolve",
            "--mass",
            "1.0",
            "--z",
            "0.02",
            "--tphysf",
            "100",
        ]);
        let run = completed(Some(Attachment::TrackFile {
            path: "linux-sse/evolve.dat".into(),
        }));
        let runs = dir.path().join("runs");

        let processed = process_run_completion_in(&args, Some(&runs), &run);

        let copy = runs.join("run-2024-01-01_00-00-00Z-abc.dat");
        let expected = Some(Attachment::TrackFile { path: copy.clone() });
        assert_eq!(std::fs::read_to_string(&copy).unwrap(), "Time\n0.0\n");
        assert_eq!(processed.record.report.attachment, expected);
        let saved_json = processed.auto_saved_path.unwrap();
        let saved: RunRecord =
            serde_json::from_slice(&std::fs::read(saved_json).unwrap()).unwrap();
        assert_eq!(saved.report.attachment, expected);
        let exported: RunRecord =
            serde_json::from_slice(&std::fs::read(&json_out).unwrap()).unwrap();
        assert_eq!(exported.report.attachment, expected);
    }
}
