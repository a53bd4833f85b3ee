//! Text summary builder for CLI output.
//!
//! Lays out a report for a terminal: inline fields become table columns,
//! wide fields are printed as blocks.

use crate::model::{Attachment, Report, ReportField};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary of a report.
pub(crate) fn build_text_summary(report: &Report) -> TextSummary {
    let mut lines = vec![format!("== {} ==", report.title)];

    let inline: Vec<&ReportField> = report.fields.iter().filter(|f| f.inline).collect();
    if !inline.is_empty() {
        lines.extend(render_columns(&inline));
    }

    for field in report.fields.iter().filter(|f| !f.inline) {
        lines.push(format!("{}:", field.name));
        lines.extend(field.value.lines().map(|l| format!("  {l}")));
    }

    if let Some(desc) = report.description.as_deref() {
        if !desc.trim().is_empty() {
            lines.push(desc.to_string());
        }
    }

    match &report.attachment {
        Some(Attachment::TrackFile { path }) => {
            lines.push(format!("Track file: {}", path.display()));
        }
        Some(Attachment::Chart { track_path, .. }) => {
            lines.push(format!("HR diagram from: {}", track_path.display()));
        }
        None => {}
    }

    TextSummary { lines }
}

/// Side-by-side columns, one row per line of each field's value.
fn render_columns(fields: &[&ReportField]) -> Vec<String> {
    let cells: Vec<Vec<&str>> = fields.iter().map(|f| f.value.lines().collect()).collect();
    let widths: Vec<usize> = fields
        .iter()
        .zip(&cells)
        .map(|(f, col)| {
            col.iter()
                .map(|c| c.chars().count())
                .chain(std::iter::once(f.name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let rows = cells.iter().map(Vec::len).max().unwrap_or(0);

    let format_row = |cols: Vec<&str>| {
        cols.iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows + 1);
    out.push(format_row(fields.iter().map(|f| f.name.as_str()).collect()));
    for row in 0..rows {
        out.push(format_row(
            cells
                .iter()
                .map(|col| col.get(row).copied().unwrap_or(""))
                .collect(),
        ));
    }
    out
}
