mod charts;
mod export;
mod help;
mod state;

use crate::cli::Cli;
use crate::model::{CompletedRun, RunConfig, RunEvent, RunMode, RunRecord};
use crate::orchestrator::{self, SimulationService, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{
    push_wrapped_status_kv, severity_color, LastRun, RunStatus, UiState, TAB_COUNT, TAB_DIAGRAM,
    TAB_HELP, TAB_HISTORY, TAB_REPORT,
};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli, service: SimulationService, config: RunConfig) -> Result<()> {
    // Unbounded channels keep the service from ever waiting on the UI.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<RunEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let service = Arc::new(service.with_events(event_tx.clone()));

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_config = config.clone();
    let ui_handle =
        std::thread::spawn(move || run_threaded(ui_args, ui_config, event_rx, cmd_tx));

    let res = orchestrator::run_controller(service, config, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    args: Cli,
    config: RunConfig,
    mut event_rx: UnboundedReceiver<RunEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let initial_load = terminal
        .size()
        .map(|size| ((size.height as usize).saturating_sub(2) * 3).max(20))
        .unwrap_or(66);

    let mut state = UiState {
        auto_save: args.auto_save,
        tab: match config.mode {
            RunMode::Evolve => TAB_REPORT,
            RunMode::Plot => TAB_DIAGRAM,
        },
        ..Default::default()
    };
    // UiState is owned by the UI thread only; no cross-thread mutation.
    state.initial_history_load_size = initial_load;
    state.history = crate::storage::load_recent(initial_load).unwrap_or_default();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut history_rows = 20usize;

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            match ev {
                RunEvent::Completed { run } => handle_run_completed(&args, &mut state, *run),
                other => apply_event(&mut state, other),
            }
        }

        if last_tick.elapsed() >= tick_rate {
            terminal
                .draw(|f| {
                    history_rows = (f.area().height as usize).saturating_sub(6);
                    draw(f.area(), f, &state, &config);
                })
                .ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('r')) => {
                        if state.tab == TAB_HISTORY {
                            refresh_history(&mut state);
                        } else {
                            let _ = cmd_tx.send(UiCommand::Rerun);
                            state.report_scroll = 0;
                        }
                    }
                    (_, KeyCode::Char('s')) => {
                        state.info = match state.last.as_mut() {
                            Some(last) => export::save_message(last),
                            None => "No completed run to save yet.".into(),
                        };
                    }
                    (_, KeyCode::Char('e')) => {
                        if state.tab == TAB_HISTORY {
                            if let Some(r) = state.selected_history() {
                                match export::export_record_json(r) {
                                    Ok(p) => {
                                        state.last_exported_path =
                                            Some(p.to_string_lossy().to_string());
                                        state.info = format!("Exported JSON: {}", p.display());
                                    }
                                    Err(e) => state.info = format!("JSON export failed: {e:#}"),
                                }
                            }
                        }
                    }
                    (_, KeyCode::Char('y')) => {
                        let shown = if state.tab == TAB_HISTORY {
                            state.selected_history()
                        } else {
                            state.last.as_ref().map(|l| &l.record)
                        };
                        match shown {
                            Some(r) => match export::copy_to_clipboard(&export::report_text(r)) {
                                Ok(_) => state.info = "✓ Copied report to clipboard".into(),
                                Err(e) => state.info = format!("Clipboard copy failed: {e:#}"),
                            },
                            None => state.info = "No report to copy yet.".into(),
                        }
                    }
                    (_, KeyCode::Char('a')) => {
                        state.auto_save = !state.auto_save;
                        state.info = if state.auto_save {
                            "Auto-save enabled".into()
                        } else {
                            "Auto-save disabled".into()
                        };
                    }
                    (_, KeyCode::Enter) => {
                        if state.tab == TAB_HISTORY {
                            open_history_run(&mut state);
                        }
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % TAB_COUNT;
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = TAB_HELP;
                    }
                    (_, KeyCode::Up) | (_, KeyCode::Char('k')) => match state.tab {
                        TAB_HISTORY => state.select_prev(),
                        TAB_REPORT => state.report_scroll = state.report_scroll.saturating_sub(1),
                        _ => {}
                    },
                    (_, KeyCode::Down) | (_, KeyCode::Char('j')) => match state.tab {
                        TAB_HISTORY => state.select_next(history_rows),
                        TAB_REPORT => state.report_scroll = state.report_scroll.saturating_add(1),
                        _ => {}
                    },
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    if let Some(notice) = state.status.quit_notice() {
        eprintln!("{notice}");
    }
    res
}

fn apply_event(state: &mut UiState, ev: RunEvent) {
    match ev {
        RunEvent::Queued { request_id } => {
            // A queued rerun must not hide the run that is still going.
            if !matches!(state.status, RunStatus::Running { .. }) {
                state.status = RunStatus::Queued {
                    request_id: request_id.clone(),
                };
            }
            state.info = format!("Queued run {request_id}");
        }
        RunEvent::Started { request_id } => {
            state.info = format!("Running simulator ({request_id})…");
            state.status = RunStatus::Running {
                request_id,
                since: Instant::now(),
            };
        }
        RunEvent::Info(msg) => state.info = msg,
        RunEvent::Completed { .. } => {}
    }
}

fn handle_run_completed(args: &Cli, state: &mut UiState, run: CompletedRun) {
    let processed = orchestrator::process_run_completion(args, state.auto_save, &run);

    state.info = match processed.auto_saved_path.as_ref() {
        Some(path) => format!("Saved: {}", path.display()),
        None => format!("Run {} finished", processed.record.request_id),
    };
    if !processed.export_messages.is_empty() {
        state.info = processed.export_messages.join("; ");
    }

    state.push_history(processed.record.clone());
    state.status = RunStatus::Done;
    state.report_scroll = 0;
    state.last = Some(LastRun {
        record: processed.record,
        track: run.track,
        track_text: run.track_text,
    });
}

fn refresh_history(state: &mut UiState) {
    let reload_size = state.initial_history_load_size.max(state.history.len());
    match crate::storage::load_recent(reload_size) {
        Ok(new_history) => {
            state.history = new_history;
            state.history_selected = 0;
            state.history_scroll_offset = 0;
            state.info = format!("Refreshed: {} run(s)", state.history.len());
        }
        Err(e) => {
            state.info = format!("Refresh failed: {e:#}");
        }
    }
}

/// Show a saved run on the Report and HR Diagram tabs.
fn open_history_run(state: &mut UiState) {
    let Some(record) = state.selected_history().cloned() else {
        return;
    };
    // The track copy is already on disk; nothing to keep for re-saving.
    let track = crate::storage::saved_track_path(&record)
        .ok()
        .and_then(|p| crate::track::read_track(&p).ok());
    state.info = match &track {
        Some(t) => format!("Opened run {} ({} track rows)", record.request_id, t.len()),
        None => format!("Opened run {} (no saved track)", record.request_id),
    };
    state.last = Some(LastRun {
        record,
        track,
        track_text: None,
    });
    state.report_scroll = 0;
    state.tab = TAB_REPORT;
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState, config: &RunConfig) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Report"),
        Line::from("HR Diagram"),
        Line::from("History"),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(Block::default().borders(Borders::ALL).title("stellar-evolve"))
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        TAB_REPORT => draw_report(chunks[1], f, state, config),
        TAB_DIAGRAM => draw_diagram(chunks[1], f, state, config),
        TAB_HISTORY => draw_history(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn draw_report(area: Rect, f: &mut ratatui::Frame, state: &UiState, config: &RunConfig) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(38), Constraint::Min(0)].as_ref())
        .split(area);

    // Parameters of the shown run, or of the pending one before anything finished.
    let params = state
        .last
        .as_ref()
        .map(|l| &l.record.config.params)
        .unwrap_or(&config.params);

    let status = match &state.status {
        RunStatus::Idle => "Starting".to_string(),
        RunStatus::Queued { request_id } => format!("Queued ({request_id})"),
        RunStatus::Running { request_id, since } => format!(
            "Running {}s ({request_id})",
            since.elapsed().as_secs()
        ),
        RunStatus::Done => "Done".to_string(),
    };

    let width = cols[0].width;
    let mut lines: Vec<Line<'static>> = Vec::new();
    push_wrapped_status_kv(&mut lines, "Status", &status, width);
    push_wrapped_status_kv(&mut lines, "Mass", &format!("{} Msun", params.mass), width);
    push_wrapped_status_kv(&mut lines, "Z", &params.z.to_string(), width);
    push_wrapped_status_kv(&mut lines, "Tphysf", &format!("{} Myr", params.tphysf), width);
    if let Some(last) = state.last.as_ref() {
        push_wrapped_status_kv(&mut lines, "Run", &last.record.request_id, width);
        push_wrapped_status_kv(&mut lines, "At", &last.record.timestamp_utc, width);
        if let Some(elapsed) = last.record.elapsed {
            let elapsed = Duration::from_millis(elapsed.as_millis() as u64);
            push_wrapped_status_kv(
                &mut lines,
                "Elapsed",
                &humantime::format_duration(elapsed).to_string(),
                width,
            );
        }
        if let Some(track) = last.track.as_ref() {
            push_wrapped_status_kv(
                &mut lines,
                "Track",
                &format!("{} rows × {} columns", track.len(), track.columns().len()),
                width,
            );
        }
    }
    push_wrapped_status_kv(
        &mut lines,
        "Auto-save",
        if state.auto_save { "on" } else { "off" },
        width,
    );
    push_wrapped_status_kv(&mut lines, "Info", &state.info, width);
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Run")),
        cols[0],
    );

    let Some(last) = state.last.as_ref() else {
        let p = Paragraph::new("Waiting for the simulator…")
            .block(Block::default().borders(Borders::ALL).title("Report"));
        f.render_widget(p, cols[1]);
        return;
    };
    let report = &last.record.report;
    let color = severity_color(report.severity);
    let body: Vec<Line> = crate::text_summary::build_text_summary(report)
        .lines
        .into_iter()
        .skip(1)
        .map(Line::from)
        .collect();
    let p = Paragraph::new(body)
        .scroll((state.report_scroll, 0))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(Span::styled(
                    report.title.clone(),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )),
        );
    f.render_widget(p, cols[1]);
}

fn draw_diagram(area: Rect, f: &mut ratatui::Frame, state: &UiState, config: &RunConfig) {
    match state.last.as_ref() {
        Some(last) => {
            let title = format!(
                "HR diagram: {} Msun, Z={} ({})",
                last.record.config.params.mass,
                last.record.config.params.z,
                last.record.request_id
            );
            charts::draw_hr_diagram(
                area,
                f,
                last.track.as_ref(),
                &last.record.config.chart,
                &title,
            );
        }
        None => charts::draw_hr_diagram(area, f, None, &config.chart, "HR diagram"),
    }
}

fn history_line(r: &RunRecord, selected: bool) -> Line<'static> {
    let mode = match r.config.mode {
        RunMode::Evolve => "evolve",
        RunMode::Plot => "plot",
    };
    let outcome = if r.report.is_error() {
        r.report
            .description
            .clone()
            .unwrap_or_else(|| r.report.title.clone())
    } else {
        r.report
            .field("Stage")
            .and_then(|f| f.value.lines().last().map(str::to_string))
            .unwrap_or_default()
    };
    let style = if selected {
        Style::default().fg(Color::Black).bg(Color::Yellow)
    } else {
        Style::default()
    };
    Line::from(vec![
        Span::styled(if selected { "> " } else { "  " }, style),
        Span::styled(format!("{:<22}", r.timestamp_utc), style),
        Span::styled(format!("{mode:<7}"), style),
        Span::styled(format!("{:>9} Msun  ", r.config.params.mass), style),
        Span::styled(
            outcome.lines().next().unwrap_or("").to_string(),
            style.fg(if selected {
                Color::Black
            } else {
                severity_color(r.report.severity)
            }),
        ),
    ])
}

fn draw_history(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
        .split(area);

    // Subtract borders and the header line
    let max_items = (cols[0].height as usize).saturating_sub(3);
    let total_count = state.history.len();
    let current_pos = if total_count > 0 {
        state.history_selected + 1
    } else {
        0
    };

    let mut lines: Vec<Line> = vec![Line::from(vec![
        Span::raw(format!("Runs ({current_pos}/{total_count}) - ")),
        Span::styled("j/k", Style::default().fg(Color::Magenta)),
        Span::raw(": navigate, "),
        Span::styled("enter", Style::default().fg(Color::Magenta)),
        Span::raw(": open, "),
        Span::styled("e", Style::default().fg(Color::Magenta)),
        Span::raw(": export JSON, "),
        Span::styled("r", Style::default().fg(Color::Magenta)),
        Span::raw(": refresh"),
    ])];

    if state.history.is_empty() {
        lines.push(Line::from("No saved runs yet."));
    }
    lines.extend(
        state
            .history
            .iter()
            .enumerate()
            .skip(state.history_scroll_offset)
            .take(max_items)
            .map(|(i, r)| history_line(r, i == state.history_selected)),
    );
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("History")),
        cols[0],
    );

    let mut detail: Vec<Line> = Vec::new();
    if let Some(r) = state.selected_history() {
        detail.extend(
            crate::text_summary::build_text_summary(&r.report)
                .lines
                .into_iter()
                .map(Line::from),
        );
    }
    if let Some(path) = state.last_exported_path.as_deref() {
        detail.push(Line::from(""));
        push_wrapped_status_kv(
            &mut detail,
            "Last export",
            path,
            cols[1].width,
        );
    }
    f.render_widget(
        Paragraph::new(detail)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Selected")),
        cols[1],
    );
}
