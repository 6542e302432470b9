//! Process runner: one interpreter process per call, always disposed.
//!
//! `ProcessRunner::run` spawns the configured interpreter with fixed flags,
//! feeds the script over stdin, captures stdout/stderr and folds the outcome
//! into an `ExecutionResult`. It never returns an error: launch failures,
//! non-zero exits, stderr output, I/O errors and timeouts all become failed
//! results.
//!
//! The spawned handle is wrapped in a `DisposeGuard` immediately, so disposal
//! runs on every exit path, including timeout, panic inside the handle and
//! cancellation of the calling future.

use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::ShellportError;
use crate::process::quote::quote_literal;
use crate::process::{CapturedOutput, ProcessHandle, ProcessSpawner};

/// Flags passed to the interpreter on every spawn.
///
/// `-NoProfile` and `-ExecutionPolicy Bypass` isolate execution from host
/// customization and policy gating; `-NonInteractive` stops prompts from
/// blocking; `-Command -` reads the script from stdin, one line at a time
/// (see `stdin_payload`).
pub const INTERPRETER_FLAGS: [&str; 6] = [
    "-NoProfile",
    "-ExecutionPolicy",
    "Bypass",
    "-NonInteractive",
    "-Command",
    "-",
];

/// Output reported when a command succeeds without printing anything.
pub const EMPTY_OUTPUT_PLACEHOLDER: &str = "Command executed successfully with no output.";

/// Per-call options for `ProcessRunner::run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub working_directory: Option<String>,
}

impl RunOptions {
    pub fn in_directory(dir: Option<String>) -> Self {
        Self {
            working_directory: dir,
        }
    }
}

/// Outcome of one interpreter invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub error_message: Option<String>,
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn succeeded(output: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: true,
            output: output.into(),
            error_message: None,
            duration,
        }
    }

    pub fn failed(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            output: String::new(),
            error_message: Some(message.into()),
            duration,
        }
    }
}

/// Calls `dispose()` on the wrapped handle when dropped.
struct DisposeGuard<H: ProcessHandle> {
    handle: H,
}

impl<H: ProcessHandle> Deref for DisposeGuard<H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.handle
    }
}

impl<H: ProcessHandle> DerefMut for DisposeGuard<H> {
    fn deref_mut(&mut self) -> &mut H {
        &mut self.handle
    }
}

impl<H: ProcessHandle> Drop for DisposeGuard<H> {
    fn drop(&mut self) {
        self.handle.dispose();
    }
}

/// Runs scripts through a configured interpreter executable.
pub struct ProcessRunner<S> {
    spawner: S,
    executable: String,
    timeout: Duration,
}

impl<S: ProcessSpawner> ProcessRunner<S> {
    pub fn new(spawner: S, executable: impl Into<String>, timeout: Duration) -> Self {
        Self {
            spawner,
            executable: executable.into(),
            timeout,
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `command` in a fresh interpreter process.
    pub async fn run(&self, command: &str, options: &RunOptions) -> ExecutionResult {
        let start = Instant::now();
        tracing::debug!(
            executable = %self.executable,
            working_directory = ?options.working_directory,
            command = %command,
            "running interpreter command"
        );

        let outcome = self.execute(command, options).await;
        let duration = start.elapsed();

        match outcome {
            Ok(output) => {
                tracing::info!(
                    executable = %self.executable,
                    duration_ms = %duration.as_millis(),
                    "interpreter command succeeded"
                );
                ExecutionResult::succeeded(output, duration)
            }
            Err(e) => {
                tracing::warn!(
                    executable = %self.executable,
                    duration_ms = %duration.as_millis(),
                    error = %e,
                    "interpreter command failed"
                );
                ExecutionResult::failed(e.to_string(), duration)
            }
        }
    }

    async fn execute(&self, command: &str, options: &RunOptions) -> crate::Result<String> {
        let script = compose_script(command, options.working_directory.as_deref());
        let payload = stdin_payload(&script);

        let handle = self
            .spawner
            .spawn(&self.executable, &INTERPRETER_FLAGS)
            .map_err(|e| ShellportError::ProcessLaunch(self.executable.clone(), e.to_string()))?;
        let mut handle = DisposeGuard { handle };

        let captured = tokio::time::timeout(self.timeout, async {
            handle.write_input(&payload).await?;
            handle.read_all().await
        })
        .await
        .map_err(|_| ShellportError::Timeout(self.timeout))?
        .map_err(|e| ShellportError::ProcessExecution(format!("interpreter I/O error: {}", e)))?;

        tracing::debug!(
            exit_code = ?captured.exit_code,
            stdout_bytes = captured.stdout.len(),
            stderr_bytes = captured.stderr.len(),
            "interpreter exited"
        );

        interpret(captured)
    }
}

/// Build the script run by the interpreter.
///
/// A working directory becomes a `Set-Location` prologue in the same session;
/// if it fails the session exits before `command` runs.
pub fn compose_script(command: &str, working_directory: Option<&str>) -> String {
    let mut script = String::new();
    if let Some(dir) = working_directory {
        script.push_str(&format!(
            "try {{ Set-Location -LiteralPath {} -ErrorAction Stop }} catch {{ [Console]::Error.WriteLine($_.Exception.Message); exit 1 }}\n",
            quote_literal(dir)
        ));
    }
    script.push_str(command);
    script
}

/// Wrap `script` into the single line written to the interpreter's stdin.
///
/// `-Command -` reads stdin line by line and a blank line closes any open
/// block, so a literal holding `\n\n` would otherwise end the statement early
/// and run the rest of the value as code. The script travels base64-encoded
/// and is parsed as one script block.
pub fn stdin_payload(script: &str) -> String {
    format!(
        "& ([scriptblock]::Create([Text.Encoding]::UTF8.GetString([Convert]::FromBase64String('{}'))))\n",
        STANDARD.encode(script.as_bytes())
    )
}

/// Decide success or failure from captured output.
///
/// Success requires exit code 0 and an empty error stream. Stderr text is
/// passed through verbatim as the diagnostic.
fn interpret(captured: CapturedOutput) -> crate::Result<String> {
    let stderr = captured.stderr.trim_end();
    match captured.exit_code {
        Some(0) if stderr.is_empty() => {
            let stdout = captured.stdout.trim_end();
            if stdout.is_empty() {
                Ok(EMPTY_OUTPUT_PLACEHOLDER.to_string())
            } else {
                Ok(stdout.to_string())
            }
        }
        Some(code) => {
            if stderr.is_empty() {
                Err(ShellportError::ProcessExecution(format!(
                    "interpreter exited with status {}",
                    code
                )))
            } else {
                Err(ShellportError::ProcessExecution(stderr.to_string()))
            }
        }
        None => Err(ShellportError::ProcessExecution(
            "interpreter was terminated by a signal".to_string(),
        )),
    }
}
