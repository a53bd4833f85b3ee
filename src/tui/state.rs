use crate::model::{RunRecord, Severity};
use crate::track::TrackTable;
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};
use std::time::Instant;

pub const TAB_REPORT: usize = 0;
pub const TAB_DIAGRAM: usize = 1;
pub const TAB_HISTORY: usize = 2;
pub const TAB_HELP: usize = 3;
pub const TAB_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Queued { request_id: String },
    Running { request_id: String, since: Instant },
    Done,
}

impl RunStatus {
    /// Shown after the terminal is restored when quitting leaves a run behind.
    pub fn quit_notice(&self) -> Option<&'static str> {
        match self {
            RunStatus::Queued { .. } | RunStatus::Running { .. } => {
                Some("Waiting for the simulator to finish…")
            }
            RunStatus::Idle | RunStatus::Done => None,
        }
    }
}

/// The most recent finished run, as shown on the Report and HR Diagram tabs.
pub struct LastRun {
    pub record: RunRecord,
    pub track: Option<TrackTable>,
    pub track_text: Option<String>,
}

pub struct UiState {
    pub tab: usize,
    pub status: RunStatus,
    pub info: String,
    pub report_scroll: u16,

    pub last: Option<LastRun>,
    pub history: Vec<RunRecord>,
    pub history_selected: usize, // Index of selected history item (0 = most recent)
    pub history_scroll_offset: usize,
    pub initial_history_load_size: usize, // Initial load size based on terminal height
    pub auto_save: bool,
    pub last_exported_path: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: TAB_REPORT,
            status: RunStatus::Idle,
            info: String::new(),
            report_scroll: 0,
            last: None,
            history: Vec::new(),
            history_selected: 0,
            history_scroll_offset: 0,
            initial_history_load_size: 66, // Default initial load size
            auto_save: true,
            last_exported_path: None,
        }
    }
}

impl UiState {
    /// Put a finished run at the top of the history, replacing any earlier
    /// copy loaded from disk.
    pub fn push_history(&mut self, record: RunRecord) {
        self.history.retain(|r| r.request_id != record.request_id);
        self.history.insert(0, record);
        self.history_selected = 0;
        self.history_scroll_offset = 0;
    }

    pub fn selected_history(&self) -> Option<&RunRecord> {
        self.history.get(self.history_selected)
    }

    pub fn select_prev(&mut self) {
        if self.history_selected > 0 {
            self.history_selected -= 1;
            if self.history_selected < self.history_scroll_offset {
                self.history_scroll_offset = self.history_selected;
            }
        }
    }

    pub fn select_next(&mut self, visible_rows: usize) {
        if self.history_selected + 1 < self.history.len() {
            self.history_selected += 1;
            let visible_rows = visible_rows.max(1);
            if self.history_selected >= self.history_scroll_offset + visible_rows {
                self.history_scroll_offset = self.history_selected + 1 - visible_rows;
            }
        }
    }
}

pub fn severity_color(severity: Severity) -> Color {
    let rgb = severity.color();
    Color::Rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = (remaining.len() as u16).min(line_width) as usize;
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    fn record(id: &str) -> RunRecord {
        RunRecord {
            timestamp_utc: "2024-01-01T00:00:00Z".into(),
            request_id: id.into(),
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
                attachment: None,
            },
        }
    }

    #[test]
    fn wrapped_kv_splits_long_values() {
        let mut out = Vec::new();
        push_wrapped_status_kv(&mut out, "Path", &"x".repeat(30), 20);
        // 16 usable columns, 5 for "Path:" plus a space on the first line.
        assert_eq!(out.len(), 3);
        push_wrapped_status_kv(&mut out, "Empty", "   ", 20);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn push_history_replaces_reloaded_copy() {
        let mut state = UiState::default();
        state.history = vec![record("a"), record("b")];
        state.history_selected = 1;
        state.push_history(record("b"));
        let ids: Vec<_> = state.history.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(state.history_selected, 0);
    }

    #[test]
    fn selection_scrolls_with_cursor() {
        let mut state = UiState::default();
        state.history = (0..10).map(|i| record(&i.to_string())).collect();
        for _ in 0..5 {
            state.select_next(3);
        }
        assert_eq!(state.history_selected, 5);
        assert_eq!(state.history_scroll_offset, 3);
        for _ in 0..5 {
            state.select_prev();
        }
        assert_eq!(state.history_selected, 0);
        assert_eq!(state.history_scroll_offset, 0);
    }

    #[test]
    fn severity_colors_map_to_rgb() {
        assert_eq!(severity_color(Severity::Error), Color::Rgb(0xFF, 0, 0));
        assert_eq!(severity_color(Severity::Normal), Color::Rgb(0xCC, 0xDF, 0xF0));
    }

    #[test]
    fn quitting_mid_run_leaves_a_notice() {
        let running = RunStatus::Running {
            request_id: "a".into(),
            since: Instant::now(),
        };
        assert!(running.quit_notice().is_some());
        assert!(RunStatus::Queued { request_id: "b".into() }
            .quit_notice()
            .is_some());
        assert_eq!(RunStatus::Done.quit_notice(), None);
        assert_eq!(RunStatus::Idle.quit_notice(), None);
    }
}
