//! Simulation pipeline: input file, process run, and output interpretation.

pub mod classifier;
pub mod config_builder;
pub mod launcher;
pub mod parser;
pub mod runner;
pub mod workspace;

use crate::error::{PipelineError, PipelineResult};
use crate::model::{RunOutcome, SimulationParameters};
use classifier::{Classification, OutputClassifier};
use launcher::Launcher;
use runner::ProcessRunner;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use workspace::RunWorkspace;

/// One configured pipeline. Holds no per-run state; callers pass a workspace.
pub struct SimulationEngine {
    runner: ProcessRunner,
    classifier: OutputClassifier,
}

impl SimulationEngine {
    pub fn new(
        launcher: Arc<dyn Launcher>,
        classifier: OutputClassifier,
        timeout: Option<Duration>,
    ) -> Self {
        let runner = ProcessRunner::new(launcher, classifier.primary_sentinel())
            .with_timeout(timeout);
        Self { runner, classifier }
    }

    pub fn sim_dir(&self) -> &Path {
        self.runner.launcher().sim_dir()
    }

    pub fn workspace(&self, request_id: &str) -> RunWorkspace {
        RunWorkspace::new(request_id, self.sim_dir())
    }

    /// Validate, write the input file, run the simulator and classify its output.
    ///
    /// Invalid parameters return before anything touches the filesystem.
    pub async fn run(
        &self,
        ws: &RunWorkspace,
        params: &SimulationParameters,
    ) -> PipelineResult<RunOutcome> {
        if let Err(e) = params.validate() {
            tracing::info!(request_id = %ws.request_id, mass = params.mass, "rejected before launch");
            return Err(e);
        }
        config_builder::write_input(ws, params).await?;
        clear_track(ws).await?;
        let raw = self.runner.run(ws).await?;
        let outcome = self.interpret(raw);
        if !outcome.is_success() {
            let fed = tokio::fs::read_to_string(&ws.input_path)
                .await
                .ok()
                .and_then(|t| config_builder::parse_input(&t));
            tracing::warn!(request_id = %ws.request_id, input = ?fed, "simulator failed on this input");
        }
        Ok(outcome)
    }

    /// Turn raw output into an outcome. Never fails.
    pub fn interpret(&self, raw: String) -> RunOutcome {
        match self.classifier.classify(&raw) {
            Classification::Failure { sentinel, reason } => {
                tracing::warn!(%sentinel, "simulator reported failure");
                RunOutcome::Failure { raw, reason }
            }
            Classification::Success => {
                let records = parser::parse_records(&raw);
                tracing::debug!(records = records.len(), "parsed simulator output");
                RunOutcome::Success { records, raw }
            }
        }
    }
}

/// Remove the previous run's track so a run that writes none is not credited
/// with someone else's.
async fn clear_track(ws: &RunWorkspace) -> PipelineResult<()> {
    match tokio::fs::remove_file(&ws.track_path).await {
        Ok(()) => {
            tracing::debug!(request_id = %ws.request_id, "removed previous track file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PipelineError::ClearTrack {
            path: ws.track_path.clone(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launcher::fake::ScriptLauncher;

    fn engine_with(launcher: Arc<ScriptLauncher>) -> SimulationEngine {
        SimulationEngine::new(launcher, OutputClassifier::default(), None)
    }

    #[tokio::test]
    async fn non_positive_mass_never_launches() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(ScriptLauncher::new("true", dir.path()));
        let engine = engine_with(launcher.clone());
        let ws = engine.workspace("bad");

        for mass in [0.0, -3.2, f64::NAN] {
            let err = engine
                .run(&ws, &SimulationParameters::new(mass, 0.02, 12000.0))
                .await
                .unwrap_err();
            assert!(matches!(err, PipelineError::InvalidInput { .. }));
        }
        assert_eq!(launcher.invocations(), 0);
        assert!(!ws.input_path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_yields_records() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(ScriptLauncher::printing(
            "Main sequence Star   Time 0.0 Mass 5.000\n\nHertzsprung Gap   Time 87.8 Mass 5.000\n",
            dir.path(),
        ));
        let engine = engine_with(launcher.clone());
        let ws = engine.workspace("ok");

        let outcome = engine
            .run(&ws, &SimulationParameters::new(5.0, 0.02, 12000.0))
            .await
            .unwrap();

        match outcome {
            RunOutcome::Success { records, raw } => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[1].stage, "Hertzsprung Gap");
                assert!(!raw.contains("\n\n"));
            }
            other => panic!("expected success, got {other:?}"),
        }
        assert!(ws.input_path.exists());
        assert_eq!(launcher.invocations(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stale_track_is_removed_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        let ws_path = dir.path().join(workspace::TRACK_FILE);
        std::fs::write(&ws_path, " Time log10(L) log10(Teff)\n 0.0 9.9 9.9\n").unwrap();
        let launcher = Arc::new(ScriptLauncher::new(
            "test -e evolve.dat && echo 'stale track visible'; echo 'Main sequence Star  Time 0.0 Mass 1.0'",
            dir.path(),
        ));
        let engine = engine_with(launcher);
        let ws = engine.workspace("fresh");

        let outcome = engine
            .run(&ws, &SimulationParameters::new(1.0, 0.02, 100.0))
            .await
            .unwrap();

        assert!(!outcome.raw().contains("stale track visible"));
        assert!(!ws.track_path.exists());
    }

    #[test]
    fn sentinel_wins_over_well_formed_records() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(Arc::new(ScriptLauncher::new("true", dir.path())));
        let raw = "Main sequence Star   Time 0.0 Mass 5.000\n ERROR in EVOLV1\n".to_string();
        match engine.interpret(raw.clone()) {
            RunOutcome::Failure { raw: r, reason } => {
                assert_eq!(r, raw);
                assert_eq!(reason, classifier::FAILURE_REASON);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
