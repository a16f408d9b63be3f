//! Starting and stopping the engine process.

use crate::error::ProcessError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// How long a terminated engine gets before it is killed.
pub const STOP_GRACE: Duration = Duration::from_secs(10);

/// What to start.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Committed functions directory; the engine's working directory.
    pub functions_dir: PathBuf,
    /// Port the engine must listen on.
    pub port: u16,
    /// `APPLICATION_ID` for the engine.
    pub application_id: String,
    /// `PROJECT_ID` for the engine.
    pub project_id: String,
    /// Run this through `sh -c` instead of the built-in engine.
    pub start_script: Option<String>,
    /// Readiness deadline.
    pub startup_timeout: Duration,
}

/// Identity of one engine process. Never reused across restarts.
#[derive(Debug, Clone)]
pub struct EngineProcessHandle {
    /// OS process id, when there is one.
    pub pid: Option<u32>,
    /// When it was started.
    pub started_at: DateTime<Utc>,
    /// Set once the process has exited.
    pub exit_status: Option<String>,
}

impl EngineProcessHandle {
    /// A handle for a process started now.
    pub fn started(pid: Option<u32>) -> Self {
        Self {
            pid,
            started_at: Utc::now(),
            exit_status: None,
        }
    }
}

/// A running engine.
#[async_trait]
pub trait EngineInstance: Send + Sync {
    /// Its identity.
    fn handle(&self) -> &EngineProcessHandle;

    /// Check without blocking whether it has exited, recording the status.
    fn poll_exit(&mut self) -> Option<String>;

    /// Terminate it and wait for it to go away.
    async fn stop(&mut self) -> Result<(), ProcessError>;
}

/// Starts engines. Returns only once the engine is listening.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    /// Start an engine for `spec`.
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn EngineInstance>, ProcessError>;
}

/// Runs the engine as a child process: the start script under `sh -c`, or
/// this executable's `engine` subcommand in local mode.
pub struct ChildProcessLauncher {
    program: PathBuf,
}

impl ChildProcessLauncher {
    /// Launch the currently running executable.
    pub fn new() -> Result<Self, ProcessError> {
        Ok(Self::with_program(std::env::current_exe()?))
    }

    /// Launch `program` with the `engine` subcommand.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, spec: &LaunchSpec) -> Command {
        let port = spec.port.to_string();
        let mut command = match &spec.start_script {
            Some(script) => {
                let mut command = Command::new("sh");
                command.arg("-c").arg(script);
                command
            }
            None => {
                let mut command = Command::new(&self.program);
                command
                    .args(["engine", "--port", &port, "--mode", "local", "--functions-dir"])
                    .arg(&spec.functions_dir);
                command
            }
        };
        command
            .current_dir(&spec.functions_dir)
            .env("APPLICATION_ID", &spec.application_id)
            .env("PROJECT_ID", &spec.project_id)
            .env("PORT", &port)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl EngineLauncher for ChildProcessLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn EngineInstance>, ProcessError> {
        let child = self.command(spec).spawn().map_err(ProcessError::Spawn)?;
        let mut instance = ChildInstance {
            handle: EngineProcessHandle::started(child.id()),
            child,
        };
        info!(pid = ?instance.handle.pid, port = spec.port, "engine process started");

        if let Err(e) = wait_until_listening(&mut instance, spec.port, spec.startup_timeout).await {
            if let Err(stop) = instance.stop().await {
                warn!(error = %stop, "could not stop engine that failed to start");
            }
            return Err(e);
        }
        info!(pid = ?instance.handle.pid, port = spec.port, "engine ready");
        Ok(Box::new(instance))
    }
}

async fn wait_until_listening(
    instance: &mut ChildInstance,
    port: u16,
    timeout: Duration,
) -> Result<(), ProcessError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = instance.poll_exit() {
            return Err(ProcessError::ExitedEarly { status });
        }
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ProcessError::NotReady { after: timeout });
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

struct ChildInstance {
    handle: EngineProcessHandle,
    child: Child,
}

#[async_trait]
impl EngineInstance for ChildInstance {
    fn handle(&self) -> &EngineProcessHandle {
        &self.handle
    }

    fn poll_exit(&mut self) -> Option<String> {
        if let Some(status) = &self.handle.exit_status {
            return Some(status.clone());
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                let status = status.to_string();
                self.handle.exit_status = Some(status.clone());
                Some(status)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "could not poll engine process");
                None
            }
        }
    }

    async fn stop(&mut self) -> Result<(), ProcessError> {
        if self.poll_exit().is_some() {
            return Ok(());
        }
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let pid = Pid::from_raw(
            i32::try_from(pid).map_err(|e| ProcessError::Io(std::io::Error::other(e)))?,
        );
        debug!(%pid, "sending SIGTERM to engine");
        match kill(pid, Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => return Err(e.into()),
        }

        let status = match tokio::time::timeout(STOP_GRACE, self.child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(%pid, "engine ignored SIGTERM, killing");
                self.child.kill().await?;
                self.child.wait().await?
            }
        };
        info!(%pid, %status, "engine process stopped");
        self.handle.exit_status = Some(status.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(dir: &std::path::Path, script: &str, port: u16) -> LaunchSpec {
        LaunchSpec {
            functions_dir: dir.to_path_buf(),
            port,
            application_id: "app".into(),
            project_id: "proj".into(),
            start_script: Some(script.into()),
            startup_timeout: Duration::from_secs(2),
        }
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[tokio::test]
    async fn early_exit_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ChildProcessLauncher::with_program("/nonexistent");
        let err = launcher
            .launch(&spec(dir.path(), "exit 3", free_port()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProcessError::ExitedEarly { .. }), "{err}");
    }

    #[tokio::test]
    async fn silent_process_times_out_and_is_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ChildProcessLauncher::with_program("/nonexistent");
        let mut spec = spec(dir.path(), "sleep 30", free_port());
        spec.startup_timeout = Duration::from_millis(300);
        let err = launcher.launch(&spec).await.err().unwrap();
        assert!(matches!(err, ProcessError::NotReady { .. }), "{err}");
    }

    #[tokio::test]
    async fn environment_reaches_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ChildProcessLauncher::with_program("/nonexistent");
        let script = "echo \"$APPLICATION_ID $PROJECT_ID $PORT\" > env.txt; exit 0";
        let port = free_port();
        let _ = launcher.launch(&spec(dir.path(), script, port)).await;
        let written = std::fs::read_to_string(dir.path().join("env.txt")).unwrap();
        assert_eq!(written.trim(), format!("app proj {port}"));
    }
}
