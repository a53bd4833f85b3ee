use crate::model::RunRecord;
use anyhow::{Context, Result};
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

use super::state::LastRun;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Save the run to the auto-save location and describe the outcome.
/// On success the shown record follows the saved track copy.
pub fn save_message(run: &mut LastRun) -> String {
    match crate::storage::save_run(&run.record, run.track_text.as_deref()) {
        Ok(saved) => {
            run.record = saved.record;
            format!("Saved: {}", saved.json.display())
        }
        Err(e) => format!("Save failed: {e:#}"),
    }
}

/// Export JSON into the current directory.
/// Returns the absolute path of the exported file.
pub fn export_record_json(r: &RunRecord) -> Result<std::path::PathBuf> {
    let current_dir = std::env::current_dir().context("get current directory")?;
    let path = current_dir.join(format!(
        "stellar-evolve-{}",
        crate::storage::run_file_name(r, "json")
    ));
    crate::storage::export_json(&path, r)?;
    Ok(path)
}

/// Plain-text rendering of a report, as printed by `--text`.
pub fn report_text(r: &RunRecord) -> String {
    crate::text_summary::build_text_summary(&r.report)
        .lines
        .join("\n")
}

/// Initialize the clipboard manager thread if not already initialized.
/// Each clipboard instance is kept alive for a while so clipboard managers on
/// Linux have time to read the contents.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Copy text to clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}
