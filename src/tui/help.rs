use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(format!("{:pad$}{action}", "")),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit (waits for a running simulator)"),
        ]),
        key_line("r", 11, "Run the simulator again with the same parameters"),
        key_line("s", 11, "Save the last run"),
        key_line("a", 11, "Toggle auto-save"),
        key_line("y", 11, "Copy the shown report to the clipboard"),
        key_line("tab", 9, "Switch tabs"),
        key_line("?", 11, "Show this help"),
        Line::from(""),
        Line::from("Report tab:"),
        key_line("↑/↓ j/k", 5, "Scroll"),
        Line::from(""),
        Line::from("History tab:"),
        key_line("↑/↓ j/k", 5, "Navigate"),
        key_line("enter", 7, "Open selected run"),
        key_line("e", 11, "Export selected as JSON"),
        key_line("r", 11, "Refresh history"),
        Line::from(""),
        Line::from("Runs never overlap: a rerun waits until the current run finishes."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
