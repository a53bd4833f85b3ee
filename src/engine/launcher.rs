//! Launcher selection for the simulator.
//!
//! The simulator ships as a per-OS folder plus a start script. Which one to use
//! is decided once at startup and handed to the runner as a `Launcher`, so the
//! runner never branches on the platform and tests can swap in a fake.

use crate::engine::workspace::RunWorkspace;
use crate::error::{PipelineError, PipelineResult};
use std::path::{Path, PathBuf};
use tokio::process::Command;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Builds the process invocation for one simulator run.
pub trait Launcher: Send + Sync {
    /// Human-readable program name for logs and errors.
    fn program(&self) -> String;

    /// Folder holding `evolve.in` and `evolve.dat`.
    fn sim_dir(&self) -> &Path;

    /// Command for the run described by `ws`. No arguments beyond what the
    /// input file already encodes.
    fn command(&self, ws: &RunWorkspace) -> Command;
}

/// Start script plus simulator folder for a supported operating system.
#[derive(Debug, Clone)]
pub struct PlatformLauncher {
    /// Interpreter for the script, if it is not directly executable.
    shell: Option<String>,
    script: PathBuf,
    working_dir: PathBuf,
    sim_dir: PathBuf,
    #[cfg_attr(not(windows), allow(dead_code))]
    hide_window: bool,
}

impl PlatformLauncher {
    /// Launcher for the OS this binary runs on, rooted at `root`.
    pub fn for_current_platform(root: &Path) -> PipelineResult<Self> {
        Self::for_os(std::env::consts::OS, root)
    }

    /// Launcher for a named OS (`std::env::consts::OS` vocabulary).
    pub fn for_os(os: &str, root: &Path) -> PipelineResult<Self> {
        match os {
            "windows" => Ok(Self {
                shell: None,
                script: root.join("start_sse.bat"),
                working_dir: root.to_path_buf(),
                sim_dir: root.join("sse"),
                hide_window: true,
            }),
            "linux" => Ok(Self {
                shell: Some("bash".into()),
                script: root.join("start_sse.sh"),
                working_dir: root.to_path_buf(),
                sim_dir: root.join("linux-sse"),
                hide_window: false,
            }),
            other => Err(PipelineError::UnsupportedPlatform { os: other.into() }),
        }
    }

    /// Use a different start script; the interpreter stays as selected.
    pub fn with_script(mut self, script: PathBuf) -> Self {
        self.script = script;
        self
    }

    /// Use a different simulator folder.
    pub fn with_sim_dir(mut self, sim_dir: PathBuf) -> Self {
        self.sim_dir = sim_dir;
        self
    }

    pub fn script(&self) -> &Path {
        &self.script
    }
}

impl Launcher for PlatformLauncher {
    fn program(&self) -> String {
        match &self.shell {
            Some(sh) => format!("{} {}", sh, self.script.display()),
            None => self.script.display().to_string(),
        }
    }

    fn sim_dir(&self) -> &Path {
        &self.sim_dir
    }

    fn command(&self, _ws: &RunWorkspace) -> Command {
        let mut cmd = match &self.shell {
            Some(sh) => {
                let mut c = Command::new(sh);
                c.arg(&self.script);
                c
            }
            None => Command::new(&self.script),
        };
        cmd.current_dir(&self.working_dir);
        #[cfg(windows)]
        {
            if self.hide_window {
                cmd.creation_flags(CREATE_NO_WINDOW);
            }
        }
        cmd
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_uses_bash_script_and_linux_folder() {
        let l = PlatformLauncher::for_os("linux", Path::new("/opt/sse")).unwrap();
        assert_eq!(l.sim_dir(), Path::new("/opt/sse/linux-sse"));
        assert_eq!(l.program(), "bash /opt/sse/start_sse.sh");
    }

    #[test]
    fn windows_uses_batch_file() {
        let l = PlatformLauncher::for_os("windows", Path::new("C:/sse-bot")).unwrap();
        assert_eq!(l.sim_dir(), Path::new("C:/sse-bot/sse"));
        assert_eq!(l.script(), Path::new("C:/sse-bot/start_sse.bat"));
        assert!(l.hide_window);
    }

    #[test]
    fn unknown_os_is_unsupported() {
        let err = PlatformLauncher::for_os("macos", Path::new(".")).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedPlatform { ref os } if os == "macos"));
    }

    #[test]
    fn overrides_replace_script_and_folder() {
        let l = PlatformLauncher::for_os("linux", Path::new("/srv"))
            .unwrap()
            .with_script(PathBuf::from("/usr/local/bin/run-sse.sh"))
            .with_sim_dir(PathBuf::from("/var/lib/sse"));
        assert_eq!(l.program(), "bash /usr/local/bin/run-sse.sh");
        assert_eq!(l.sim_dir(), Path::new("/var/lib/sse"));
    }
}
