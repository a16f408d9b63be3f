#![deny(missing_docs)]
//! Run one external command through `sh -c`.
//!
//! [`ShellCommand`] sets the working directory, environment overrides,
//! optional stdin and an optional timeout. Every line the command writes is
//! logged as it arrives (target `faas_shell`) and also collected into the
//! returned [`ShellOutput`]. A non-zero exit and a timeout are distinct
//! errors. The command runs in its own process group; on timeout the whole
//! group is killed before the error is returned, so nothing the command
//! started outlives the limit.

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shell runner errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ShellError {
    /// The shell could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// The command line.
        command: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully.
    #[error("`{command}` exited with {}: {stderr}", exit_label(.code))]
    NonZeroExit {
        /// The command line.
        command: String,
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Everything written to stderr.
        stderr: String,
    },

    /// The command did not finish in time and was killed.
    #[error("`{command}` timed out after {after:?}")]
    Timeout {
        /// The command line.
        command: String,
        /// The limit that was exceeded.
        after: Duration,
    },

    /// Waiting on the child failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "a signal".to_owned(),
    }
}

/// What a successful command printed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    /// Stdout, one `\n`-terminated line per line written.
    pub stdout: String,
    /// Stderr, same layout.
    pub stderr: String,
}

/// One command line to run.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    command: String,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
    stdin: Option<Vec<u8>>,
    timeout: Option<Duration>,
}

impl ShellCommand {
    /// A command line to hand to `sh -c`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            env: Vec::new(),
            stdin: None,
            timeout: None,
        }
    }

    /// Run in `dir` instead of the current directory.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set one environment variable on top of the inherited environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set several environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Bytes to write to the command's stdin. Stdin is closed afterwards.
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Kill the command, and everything it started, if it has not exited and
    /// closed its output within `limit`.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// The command line.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run to completion.
    pub async fn run(&self) -> Result<ShellOutput, ShellError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        debug!(command = %self.command, cwd = ?self.cwd, "running command");
        let mut child = cmd.spawn().map_err(|source| ShellError::Spawn {
            command: self.command.clone(),
            source,
        })?;
        let group = child.id().and_then(|id| i32::try_from(id).ok()).map(Pid::from_raw);

        if let (Some(input), Some(mut pipe)) = (self.stdin.clone(), child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(&input).await {
                    debug!(error = %e, "stdin closed early");
                }
            });
        }
        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(stream_lines(out, "stdout", self.command.clone())));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(stream_lines(err, "stderr", self.command.clone())));
        let readers: Vec<_> = [&stdout, &stderr]
            .into_iter()
            .flatten()
            .map(JoinHandle::abort_handle)
            .collect();

        let finished = finish(&mut child, stdout, stderr);
        let outcome = match self.timeout {
            None => Some(finished.await),
            Some(limit) => tokio::time::timeout(limit, finished).await.ok(),
        };
        let Some(result) = outcome else {
            self.terminate(&mut child, group).await;
            for reader in readers {
                reader.abort();
            }
            let after = self.timeout.unwrap_or_default();
            warn!(command = %self.command, limit = ?after, "command timed out");
            return Err(ShellError::Timeout {
                command: self.command.clone(),
                after,
            });
        };

        let (status, output) = result?;
        if status.success() {
            Ok(output)
        } else {
            Err(ShellError::NonZeroExit {
                command: self.command.clone(),
                code: status.code(),
                stderr: output.stderr,
            })
        }
    }

    async fn terminate(&self, child: &mut Child, group: Option<Pid>) {
        if let Some(group) = group {
            match killpg(group, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => warn!(command = %self.command, error = %e, "failed to kill process group"),
            }
        }
        if let Err(e) = child.kill().await {
            debug!(command = %self.command, error = %e, "shell already gone");
        }
    }
}

/// Wait for exit and for both output streams to close.
async fn finish(
    child: &mut Child,
    stdout: Option<JoinHandle<String>>,
    stderr: Option<JoinHandle<String>>,
) -> Result<(ExitStatus, ShellOutput), ShellError> {
    let status = child.wait().await?;
    let output = ShellOutput {
        stdout: collected(stdout).await,
        stderr: collected(stderr).await,
    };
    Ok((status, output))
}

async fn stream_lines<R>(reader: R, stream: &'static str, command: String) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut collected = String::new();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                info!(target: "faas_shell", command = %command, stream, "{line}");
                collected.push_str(&line);
                collected.push('\n');
            }
            Ok(None) => break,
            Err(e) => {
                warn!(target: "faas_shell", command = %command, stream, error = %e, "unreadable output");
                break;
            }
        }
    }
    collected
}

async fn collected(reader: Option<JoinHandle<String>>) -> String {
    match reader {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let out = ShellCommand::new("echo one; echo two >&2")
            .run()
            .await
            .unwrap();
        assert_eq!(out.stdout, "one\n");
        assert_eq!(out.stderr, "two\n");
    }

    #[tokio::test]
    async fn stdin_is_piped() {
        let out = ShellCommand::new("cat").stdin("hello").run().await.unwrap();
        assert_eq!(out.stdout, "hello\n");
    }

    #[tokio::test]
    async fn env_overrides_apply() {
        let out = ShellCommand::new("echo $FAAS_TEST_VALUE")
            .env("FAAS_TEST_VALUE", "42")
            .run()
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "42");
    }
}
