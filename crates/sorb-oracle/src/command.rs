//! Oracle backed by a local command.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::Oracle;

/// Runs a command with the prompt on stdin and takes stdout as the reply.
///
/// The child is killed if the call is dropped (timeout, Ctrl-C).
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandOracle {
    /// Default program.
    pub const DEFAULT_PROGRAM: &'static str = "claude";

    /// Default time limit per call.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Create an oracle running `program args...`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-call time limit.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the command.
    ///
    /// # Errors
    /// Returns `Backend` if the program can't start or exits non-zero, and
    /// `Timeout` if it doesn't finish in time.
    pub async fn run(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(model) = model {
            command.args(["--model", model]);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program, args = ?self.args, model, "starting oracle command");
        let mut child = command
            .spawn()
            .map_err(|e| Error::Backend(format!("failed to start `{}`: {e}", self.program)))?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(prompt.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let run = async { tokio::join!(feed, child.wait_with_output()) };
        let (fed, output) = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| Error::Timeout(self.timeout.as_secs()))?;
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("`{}` exited with {}", self.program, output.status)
            } else {
                stderr
            };
            return Err(Error::Backend(detail));
        }
        if let Err(e) = fed {
            // A program may answer without reading all of stdin.
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(e.into());
            }
        }

        let reply = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(bytes = reply.len(), "oracle command finished");
        Ok(reply)
    }
}

impl Default for CommandOracle {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROGRAM, vec!["-p".to_string()])
    }
}

impl Oracle for CommandOracle {
    fn name(&self) -> &str {
        &self.program
    }

    async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        self.run(prompt, model).await
    }
}
