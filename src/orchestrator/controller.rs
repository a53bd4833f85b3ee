//! Run lifecycle controller.
//!
//! Owns the simulator folder for the duration of each run and emits events for
//! presentation layers.

use crate::engine::workspace::RunWorkspace;
use crate::engine::SimulationEngine;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{
    Attachment, CompletedRun, Report, RunConfig, RunEvent, RunMode, RunOutcome, RunRecord,
};
use crate::report::ReportBuilder;
use crate::track::{self, TrackError, TrackTable};
use anyhow::Result;
use rand::RngCore;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Commands emitted by UI layers to control runs.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Rerun,
    Quit,
}

/// Generate a random request ID.
fn gen_request_id() -> String {
    let mut b = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut b);
    b.iter().map(|x| format!("{x:02x}")).collect()
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}

/// Accepts run requests concurrently and executes them one at a time.
///
/// The simulator reads and writes fixed file names inside its folder, so the
/// whole write-input / run / read-track sequence happens under `run_lock`.
/// Waiting on the lock is async; queued requests do not block the runtime.
pub(crate) struct SimulationService {
    engine: SimulationEngine,
    reports: ReportBuilder,
    run_lock: Mutex<()>,
    event_tx: Option<UnboundedSender<RunEvent>>,
}

impl SimulationService {
    pub fn new(engine: SimulationEngine, reports: ReportBuilder) -> Self {
        Self {
            engine,
            reports,
            run_lock: Mutex::new(()),
            event_tx: None,
        }
    }

    pub fn with_events(mut self, event_tx: UnboundedSender<RunEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    fn emit(&self, ev: RunEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// Run one request to completion. Never fails: every error becomes an
    /// error-severity report.
    pub async fn submit(&self, config: RunConfig) -> CompletedRun {
        let request_id = gen_request_id();
        self.emit(RunEvent::Queued {
            request_id: request_id.clone(),
        });

        let (report, track_text, track, elapsed) = {
            let _guard = self.run_lock.lock().await;
            self.emit(RunEvent::Started {
                request_id: request_id.clone(),
            });
            let start = Instant::now();
            let ws = self.engine.workspace(&request_id);
            let (report, track_text, track) = match self.run_locked(&ws, &config).await {
                Ok(done) => done,
                Err(e) => {
                    tracing::warn!(%request_id, error = %e, "run failed");
                    (self.reports.from_error(&e), None, None)
                }
            };
            (report, track_text, track, start.elapsed())
        };

        tracing::info!(
            %request_id,
            severity = ?report.severity,
            elapsed_ms = elapsed.as_millis() as u64,
            "run completed"
        );

        CompletedRun {
            record: RunRecord {
                timestamp_utc: now_rfc3339(),
                request_id,
                config,
                elapsed: Some(elapsed),
                report,
            },
            track_text,
            track,
        }
    }

    /// Everything that touches the simulator folder. Caller holds `run_lock`.
    async fn run_locked(
        &self,
        ws: &RunWorkspace,
        config: &RunConfig,
    ) -> PipelineResult<(Report, Option<String>, Option<TrackTable>)> {
        let outcome = self.engine.run(ws, &config.params).await?;
        tracing::debug!(request_id = %ws.request_id, bytes = outcome.raw().len(), "classified output");

        let records_found = matches!(&outcome, RunOutcome::Success { records, .. } if !records.is_empty());
        if !records_found {
            return Ok((self.reports.build(&outcome, None), None, None));
        }

        // Snapshot the track now; the next run will overwrite it.
        let track_text = tokio::fs::read_to_string(&ws.track_path)
            .await
            .map_err(TrackError::from);

        match config.mode {
            RunMode::Evolve => {
                let track_text = match track_text {
                    Ok(t) => Some(t),
                    Err(e) => {
                        tracing::warn!(request_id = %ws.request_id, error = %e, "no track file after run");
                        None
                    }
                };
                let track = track_text.as_deref().and_then(|t| track::parse_track(t).ok());
                let attachment = track_text.as_ref().map(|_| Attachment::TrackFile {
                    path: ws.track_path.clone(),
                });
                Ok((self.reports.build(&outcome, attachment), track_text, track))
            }
            RunMode::Plot => {
                let text = track_text?;
                let table = track::parse_track(&text)?;
                // Fail here rather than hand the chart a table it cannot draw.
                table.hr_points().map_err(PipelineError::from)?;
                let attachment = Attachment::Chart {
                    track_path: ws.track_path.clone(),
                    options: config.chart.clone(),
                };
                Ok((
                    self.reports.build(&outcome, Some(attachment)),
                    Some(text),
                    Some(table),
                ))
            }
        }
    }
}

fn spawn_run(runs: &mut JoinSet<CompletedRun>, service: &Arc<SimulationService>, config: &RunConfig) {
    let service = service.clone();
    let config = config.clone();
    runs.spawn(async move { service.submit(config).await });
}

/// Orchestrate runs based on UI commands and emit completions back to presentation layers.
///
/// A rerun while a run is active queues behind it; runs never overlap. A
/// launched simulator cannot be cancelled, so quitting waits for in-flight runs.
pub(crate) async fn run_controller(
    service: Arc<SimulationService>,
    config: RunConfig,
    event_tx: UnboundedSender<RunEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut runs: JoinSet<CompletedRun> = JoinSet::new();
    spawn_run(&mut runs, &service, &config);
    let mut quit_pending = false;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv(), if !quit_pending => {
                match cmd {
                    Some(UiCommand::Rerun) => {
                        spawn_run(&mut runs, &service, &config);
                        let _ = event_tx.send(RunEvent::Info("Rerun queued…".into()));
                    }
                    Some(UiCommand::Quit) | None => {
                        quit_pending = true;
                        if runs.is_empty() {
                            break;
                        }
                        let _ = event_tx.send(RunEvent::Info(
                            "Waiting for the simulator to finish…".into(),
                        ));
                    }
                }
            }
            Some(joined) = runs.join_next() => {
                match joined {
                    Ok(run) => {
                        let _ = event_tx.send(RunEvent::Completed { run: Box::new(run) });
                    }
                    Err(e) => {
                        let _ = event_tx.send(RunEvent::Info(format!("Run join failed: {e}")));
                    }
                }
                if quit_pending && runs.is_empty() {
                    break;
                }
            }
        }
    }

    Ok(())
}
