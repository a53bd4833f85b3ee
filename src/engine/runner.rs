use crate::engine::launcher::Launcher;
use crate::engine::workspace::RunWorkspace;
use crate::error::{PipelineError, PipelineResult};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;

/// How long a killed process group gets to disappear before we move on.
#[cfg(unix)]
const GROUP_EXIT_GRACE: Duration = Duration::from_secs(2);

/// Runs the simulator as a child process and returns its stdout.
///
/// The wait happens on tokio's process driver, so the runtime keeps serving
/// other tasks while the simulator works.
pub struct ProcessRunner {
    launcher: Arc<dyn Launcher>,
    failure_marker: String,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// `failure_marker` is appended to the output when the launcher exits
    /// unsuccessfully, so the classifier sees the run as failed.
    pub fn new(launcher: Arc<dyn Launcher>, failure_marker: impl Into<String>) -> Self {
        Self {
            launcher,
            failure_marker: failure_marker.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn launcher(&self) -> &Arc<dyn Launcher> {
        &self.launcher
    }

    pub async fn run(&self, ws: &RunWorkspace) -> PipelineResult<String> {
        let program = self.launcher.program();
        let mut cmd = self.launcher.command(ws);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The script starts the simulator as its own child; a group lets a
        // timeout take both down.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.as_std_mut().process_group(0);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| PipelineError::Launch {
            program: program.clone(),
            source,
        })?;
        tracing::info!(request_id = %ws.request_id, %program, "simulator started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let waited = {
            let io = async {
                let (status, out, err) =
                    tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr));
                Ok::<_, std::io::Error>((status?, out?, err?))
            };
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, io).await.ok(),
                None => Some(io.await),
            }
        };
        let Some(waited) = waited else {
            let limit = self.timeout.unwrap_or_default();
            tracing::warn!(request_id = %ws.request_id, ?limit, "simulator timed out; killing it");
            terminate_tree(&mut child).await;
            return Err(PipelineError::Timeout(limit));
        };
        let (status, stdout, stderr) = waited.map_err(|source| PipelineError::Launch {
            program: program.clone(),
            source,
        })?;

        let mut raw = normalize_output(&String::from_utf8_lossy(&stdout));
        if !status.success() {
            tracing::warn!(
                request_id = %ws.request_id,
                %status,
                "simulator exited unsuccessfully"
            );
            if !raw.is_empty() && !raw.ends_with('\n') {
                raw.push('\n');
            }
            raw.push_str(&format!(
                "{}: launcher exited with {}\n",
                self.failure_marker, status
            ));
            let stderr = String::from_utf8_lossy(&stderr);
            let stderr = stderr.trim();
            if !stderr.is_empty() {
                raw.push_str(&normalize_output(stderr));
                raw.push('\n');
            }
        }

        tracing::info!(
            request_id = %ws.request_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes = raw.len(),
            "simulator finished"
        );
        Ok(raw)
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kill the launcher and everything it started, and wait until they are gone.
/// Returns only when nothing from this run can still touch the simulator folder.
async fn terminate_tree(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };

    #[cfg(unix)]
    {
        // process_group(0) made the launcher's pid the group id.
        let pgid = pid as libc::pid_t;
        // SAFETY: killpg only sends a signal; no memory is shared.
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
        let _ = child.wait().await;
        // Orphaned members are reaped by init; poll until the group is empty.
        let deadline = Instant::now() + GROUP_EXIT_GRACE;
        // SAFETY: signal 0 only checks for existence.
        while unsafe { libc::killpg(pgid, 0) } == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[cfg(windows)]
    {
        let _ = tokio::process::Command::new("taskkill")
            .args(["/T", "/F", "/PID", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        let _ = child.kill().await;
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        let _ = child.kill().await;
    }
}

/// Unify line endings, then replace each `"\n\n"` pair with a single newline.
///
/// This is a single left-to-right pass, so three newlines become two.
pub fn normalize_output(text: &str) -> String {
    text.replace("\r\n", "\n").replace("\n\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::launcher::fake::ScriptLauncher;

    #[test]
    fn normalize_collapses_blank_line_pairs() {
        assert_eq!(normalize_output("a\n\nb\n"), "a\nb\n");
        assert_eq!(normalize_output("a\n\n\nb"), "a\n\nb");
        assert_eq!(normalize_output("a\r\n\r\nb\r\n"), "a\nb\n");
        assert_eq!(normalize_output(""), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(ScriptLauncher::new(
            "printf 'Main sequence Star  Time 0.0 Mass 1.0\\n\\nDone\\n'",
            dir.path(),
        ));
        let runner = ProcessRunner::new(launcher.clone(), "ERROR");
        let ws = RunWorkspace::new("r1", dir.path());

        let raw = runner.run(&ws).await.unwrap();

        assert_eq!(raw, "Main sequence Star  Time 0.0 Mass 1.0\nDone\n");
        assert_eq!(launcher.invocations(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_folded_into_output() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(ScriptLauncher::new(
            "echo 'partial line'; echo 'segfault' >&2; exit 3",
            dir.path(),
        ));
        let runner = ProcessRunner::new(launcher, "ERROR");
        let ws = RunWorkspace::new("r2", dir.path());

        let raw = runner.run(&ws).await.unwrap();

        assert!(raw.starts_with("partial line\nERROR: launcher exited with"));
        assert!(raw.contains("segfault"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_working_directory_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("not-there");
        let launcher = Arc::new(ScriptLauncher::new("true", &gone));
        let runner = ProcessRunner::new(launcher, "ERROR");
        let ws = RunWorkspace::new("r3", &gone);

        let err = runner.run(&ws).await.unwrap_err();
        assert!(matches!(err, PipelineError::Launch { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_stops_a_hung_simulator() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(ScriptLauncher::new("sleep 5", dir.path()));
        let runner = ProcessRunner::new(launcher, "ERROR")
            .with_timeout(Some(Duration::from_millis(100)));
        let ws = RunWorkspace::new("r4", dir.path());

        let err = runner.run(&ws).await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_processes_the_launcher_started() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(ScriptLauncher::new(
            "( sleep 0.5; echo LATE > evolve.dat ) & wait",
            dir.path(),
        ));
        let runner = ProcessRunner::new(launcher, "ERROR")
            .with_timeout(Some(Duration::from_millis(100)));
        let ws = RunWorkspace::new("r5", dir.path());

        let err = runner.run(&ws).await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout(_)));

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(!ws.track_path.exists(), "background writer survived the timeout");
    }
}
