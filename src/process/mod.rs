//! Interpreter process spawning.
//!
//! The runner talks to the interpreter only through `ProcessSpawner` and
//! `ProcessHandle`, so tests can substitute a stub that counts spawns and
//! disposals. `TokioSpawner` is the real implementation backed by
//! `tokio::process`.

pub mod quote;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashMap;
use std::future::Future;
use std::process::ExitStatus;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Everything the interpreter produced before it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, or `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CapturedOutput {
    pub fn from_status(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
            exit_code: status.code(),
        }
    }
}

/// A live interpreter process owned by exactly one tool call.
pub trait ProcessHandle: Send {
    /// Start writing the full script to the process's stdin, closing it
    /// afterwards. The write may still be in progress when this returns;
    /// `read_all` completes it and reports its errors.
    fn write_input(&mut self, input: &str) -> impl Future<Output = std::io::Result<()>> + Send;

    /// Drain stdout and stderr to EOF while any pending input is written,
    /// then wait for the process to exit.
    fn read_all(&mut self) -> impl Future<Output = std::io::Result<CapturedOutput>> + Send;

    /// Release the process: kill it if still running and close its streams.
    ///
    /// Synchronous so it can run from `Drop`.
    fn dispose(&mut self);
}

/// Starts interpreter processes.
pub trait ProcessSpawner: Send + Sync + 'static {
    type Handle: ProcessHandle + 'static;

    fn spawn(&self, executable: &str, flags: &[&str]) -> std::io::Result<Self::Handle>;
}

/// Spawns real child processes with piped stdio via `tokio::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct TokioSpawner {
    /// Resolved environment overrides applied to every child.
    env: HashMap<String, String>,
}

impl TokioSpawner {
    pub fn new(env: HashMap<String, String>) -> Self {
        Self { env }
    }
}

impl ProcessSpawner for TokioSpawner {
    type Handle = ChildHandle;

    fn spawn(&self, executable: &str, flags: &[&str]) -> std::io::Result<ChildHandle> {
        let mut cmd = Command::new(executable);
        cmd.args(flags);
        if !self.env.is_empty() {
            cmd.envs(&self.env);
        }
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        Ok(ChildHandle {
            child,
            stdin,
            writer: None,
            stdout,
            stderr,
        })
    }
}

/// `ProcessHandle` over a `tokio::process::Child`.
pub struct ChildHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    /// Background stdin write started by `write_input`.
    writer: Option<JoinHandle<std::io::Result<()>>>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

fn pipe_closed(name: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("{} pipe is not available", name),
    )
}

impl ProcessHandle for ChildHandle {
    async fn write_input(&mut self, input: &str) -> std::io::Result<()> {
        let mut stdin = self.stdin.take().ok_or_else(|| pipe_closed("stdin"))?;
        let input = input.as_bytes().to_vec();
        // The interpreter runs statements as it reads them, so its output must
        // be drained while this is still writing. Dropping stdin signals EOF.
        self.writer = Some(tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        }));
        Ok(())
    }

    async fn read_all(&mut self) -> std::io::Result<CapturedOutput> {
        let mut stdout = self.stdout.take().ok_or_else(|| pipe_closed("stdout"))?;
        let mut stderr = self.stderr.take().ok_or_else(|| pipe_closed("stderr"))?;
        let writer = self.writer.take();

        let write = async move {
            let Some(writer) = writer else {
                return Ok(());
            };
            match writer.await.map_err(std::io::Error::other)? {
                // The interpreter exited before reading all of its input; its stderr says why.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!(error = %e, "interpreter closed stdin early");
                    Ok(())
                }
                other => other,
            }
        };

        // Drain both pipes alongside the writer so no full buffer stalls the others.
        let mut stdout_bytes = Vec::new();
        let mut stderr_bytes = Vec::new();
        tokio::try_join!(
            write,
            stdout.read_to_end(&mut stdout_bytes),
            stderr.read_to_end(&mut stderr_bytes),
        )?;

        let status = self.child.wait().await?;
        Ok(CapturedOutput::from_status(
            status,
            &stdout_bytes,
            &stderr_bytes,
        ))
    }

    fn dispose(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        self.stdin = None;
        self.stdout = None;
        self.stderr = None;
        match self.child.try_wait() {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                if let Err(e) = self.child.start_kill() {
                    tracing::debug!(error = %e, "failed to kill interpreter process");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_spawn_missing_executable_fails() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        let spawner = TokioSpawner::default();
        let result = spawner.spawn("/this/interpreter/does/not/exist-shellport", &[]);
        assert!(result.is_err(), "spawning a missing executable should fail");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_handle_round_trip_through_cat() {
        // `cat` echoes stdin, standing in for an interpreter
        let spawner = TokioSpawner::default();
        let mut handle = spawner.spawn("cat", &[]).unwrap();
        handle.write_input("Write-Output test\n").await.unwrap();
        let output = handle.read_all().await.unwrap();
        handle.dispose();

        assert_eq!(output.stdout, "Write-Output test\n");
        assert!(output.stderr.is_empty());
        assert_eq!(output.exit_code, Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_handle_captures_stderr_and_exit_code() {
        let spawner = TokioSpawner::default();
        let mut handle = spawner
            .spawn("sh", &["-c", "echo out; echo err >&2; exit 3"])
            .unwrap();
        handle.write_input("").await.unwrap();
        let output = handle.read_all().await.unwrap();
        handle.dispose();

        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_output_while_input_is_still_being_written() {
        // Fills the stdout pipe before reading any of its input.
        let spawner = TokioSpawner::default();
        let mut handle = spawner
            .spawn(
                "sh",
                &["-c", "head -c 200000 /dev/zero | tr '\\0' a; cat > /dev/null"],
            )
            .unwrap();
        handle.write_input(&"x".repeat(200_000)).await.unwrap();
        let output = tokio::time::timeout(Duration::from_secs(10), handle.read_all())
            .await
            .expect("read_all should not stall on full pipes")
            .unwrap();
        handle.dispose();

        assert_eq!(output.stdout.len(), 200_000);
        assert!(output.stdout.chars().all(|c| c == 'a'));
        assert_eq!(output.exit_code, Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dispose_kills_running_process() {
        let spawner = TokioSpawner::default();
        let mut handle = spawner.spawn("sleep", &["30"]).unwrap();
        handle.dispose();
        let status = handle.child.wait().await.unwrap();
        assert!(!status.success(), "killed process should not exit cleanly");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_overrides_applied() {
        let mut env = HashMap::new();
        env.insert("SHELLPORT_TEST_VALUE".to_string(), "from-config".to_string());
        let spawner = TokioSpawner::new(env);
        let mut handle = spawner
            .spawn("sh", &["-c", "printf %s \"$SHELLPORT_TEST_VALUE\""])
            .unwrap();
        handle.write_input("").await.unwrap();
        let output = handle.read_all().await.unwrap();
        handle.dispose();
        assert_eq!(output.stdout, "from-config");
    }
}
