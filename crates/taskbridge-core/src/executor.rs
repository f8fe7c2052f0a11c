use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_INTERPRETER: &str = "osascript";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// What one interpreter run produced. Consumed once by the result parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExecutionResult {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
}

impl RawExecutionResult {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            ok: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            ok: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Something that can run one script and report what happened.
pub trait ScriptRunner {
    fn run(&self, script: &str) -> RawExecutionResult;
}

impl<R: ScriptRunner + ?Sized> ScriptRunner for &R {
    fn run(&self, script: &str) -> RawExecutionResult {
        (**self).run(script)
    }
}

/// Spawns the interpreter, writes the script to its stdin and waits for it
/// to exit or for the timeout to pass. No retries and no pooling.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    command: Vec<String>,
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(command: Vec<String>, timeout: Duration) -> Result<Self> {
        if command.is_empty() {
            return Err(anyhow!("interpreter command is empty"));
        }
        Ok(Self { command, timeout })
    }

    /// Parses a shell-style command line such as `osascript -`.
    pub fn from_command_line(line: &str, timeout: Duration) -> Result<Self> {
        let command = shell_words::split(line)
            .with_context(|| format!("invalid interpreter command: {}", line))?;
        Self::new(command, timeout)
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    fn spawn(&self) -> Result<Child> {
        let program = which::which(&self.command[0])
            .with_context(|| format!("interpreter not found on PATH: {}", self.command[0]))?;
        Command::new(program)
            .args(&self.command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.command[0]))
    }

    fn execute(&self, script: &str) -> Result<RawExecutionResult> {
        let started = Instant::now();
        let mut child = self.spawn()?;
        tracing::debug!(pid = child.id(), bytes = script.len(), "spawned interpreter");

        // Pipes are fed and drained on their own threads so neither a large
        // script nor a chatty one can stall the timeout loop.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        if let Some(mut stdin) = child.stdin.take() {
            let script = script.to_owned();
            thread::spawn(move || {
                if let Err(err) = stdin.write_all(script.as_bytes()) {
                    tracing::warn!(error = %err, "failed to write script to interpreter stdin");
                }
            });
        }

        let status = loop {
            if let Some(status) = child.try_wait().context("failed to wait for interpreter")? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "interpreter timed out and was killed"
                );
                return Ok(RawExecutionResult::failure(format!(
                    "Script timed out after {} seconds",
                    self.timeout.as_secs_f64()
                )));
            }
            thread::sleep(POLL_INTERVAL);
        };

        // A grandchild holding the pipes open must not outlive the timeout.
        let deadline = started + self.timeout;
        let (Some(stdout), Some(stderr)) = (collect(stdout, deadline), collect(stderr, deadline))
        else {
            tracing::warn!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "interpreter output still open at the timeout"
            );
            return Ok(RawExecutionResult::failure(format!(
                "Script timed out after {} seconds waiting for output",
                self.timeout.as_secs_f64()
            )));
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(code = ?status.code(), elapsed_ms, "interpreter exited");
        if status.success() {
            return Ok(RawExecutionResult {
                ok: true,
                stdout,
                stderr,
            });
        }
        let stderr = if stderr.trim().is_empty() {
            match status.code() {
                Some(code) => format!("Interpreter exited with status {}", code),
                None => "Interpreter terminated by signal".to_string(),
            }
        } else {
            stderr
        };
        Ok(RawExecutionResult {
            ok: false,
            stdout,
            stderr,
        })
    }
}

impl ScriptRunner for ProcessExecutor {
    fn run(&self, script: &str) -> RawExecutionResult {
        match self.execute(script) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(error = %err, "interpreter could not run");
                RawExecutionResult::failure(format!("{:#}", err))
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> mpsc::Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = sender.send(String::from_utf8_lossy(&buf).into_owned());
    });
    receiver
}

/// `None` when the pipe is still open at `deadline`.
fn collect(pipe: Option<mpsc::Receiver<String>>, deadline: Instant) -> Option<String> {
    let Some(pipe) = pipe else {
        return Some(String::new());
    };
    match pipe.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(text) => Some(text),
        Err(mpsc::RecvTimeoutError::Timeout) => None,
        Err(mpsc::RecvTimeoutError::Disconnected) => Some(String::new()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(body: &str, timeout: Duration) -> ProcessExecutor {
        ProcessExecutor::new(
            vec!["sh".to_string(), "-c".to_string(), body.to_string()],
            timeout,
        )
        .expect("executor")
    }

    #[test]
    fn script_text_goes_to_stdin() {
        let executor = sh("cat", Duration::from_secs(10));
        let result = executor.run("hello \"world\"");
        assert!(result.ok);
        assert_eq!(result.stdout, "hello \"world\"");
    }

    #[test]
    fn nonzero_exit_reports_stderr() {
        let executor = sh(
            "cat >/dev/null; echo 'execution error: boom (-2700)' >&2; exit 1",
            Duration::from_secs(10),
        );
        let result = executor.run("x");
        assert!(!result.ok);
        assert!(result.stderr.contains("boom"));
    }

    #[test]
    fn silent_failure_still_has_a_message() {
        let executor = sh("cat >/dev/null; exit 3", Duration::from_secs(10));
        let result = executor.run("x");
        assert!(!result.ok);
        assert_eq!(result.stderr, "Interpreter exited with status 3");
    }

    #[test]
    fn timeout_kills_the_process() {
        let executor = sh("exec sleep 5", Duration::from_millis(200));
        let started = Instant::now();
        let result = executor.run("x");
        assert!(!result.ok);
        assert!(result.stderr.contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn inherited_pipes_do_not_outlast_the_timeout() {
        let executor = sh("cat >/dev/null; (sleep 5 &); echo done", Duration::from_millis(300));
        let started = Instant::now();
        let result = executor.run("x");
        assert!(!result.ok);
        assert!(result.stderr.contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_interpreter_is_a_failed_run() {
        let executor = ProcessExecutor::new(
            vec!["taskbridge-no-such-interpreter".to_string()],
            Duration::from_secs(1),
        )
        .expect("executor");
        let result = executor.run("x");
        assert!(!result.ok);
        assert!(result.stderr.contains("taskbridge-no-such-interpreter"));
    }

    #[test]
    fn command_line_is_split_like_a_shell() {
        let executor =
            ProcessExecutor::from_command_line("osascript -l 'AppleScript'", Duration::from_secs(1))
                .expect("executor");
        assert_eq!(executor.command(), ["osascript", "-l", "AppleScript"]);
        assert!(ProcessExecutor::from_command_line("", Duration::from_secs(1)).is_err());
    }
}
