//! External command execution
//!
//! [`ProcessRunner`] runs commands with tokio and echoes their output as it
//! arrives. [`MockRunner`] replays scripted results and records every command
//! line, for tests that must not touch a real chart tool.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use chartstep_core::CommandLine;

use crate::error::{KubeError, Result};

/// What happens to the standard output of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Echo stdout while capturing it
    Stream,
    /// Capture stdout only, it is a value rather than progress
    Capture,
}

/// Result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    /// Stdout followed by stderr
    pub combined: Vec<u8>,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        let stdout = stdout.into();
        Self {
            code: Some(0),
            combined: stdout.clone(),
            stdout,
        }
    }

    pub fn failed(code: i32, output: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(code),
            stdout: Vec::new(),
            combined: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn combined_lossy(&self) -> String {
        String::from_utf8_lossy(&self.combined).into_owned()
    }
}

/// Runs external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion.
    ///
    /// A non-zero exit is reported through [`CommandOutput::code`], not as an
    /// error. Errors mean the command could not run at all.
    async fn run(&self, command: &CommandLine, mode: OutputMode) -> Result<CommandOutput>;
}

/// Run a command and turn a non-zero exit into [`KubeError::CommandFailed`]
pub async fn run_checked(
    runner: &dyn CommandRunner,
    command: &CommandLine,
    mode: OutputMode,
) -> Result<CommandOutput> {
    let output = runner.run(command, mode).await?;
    if !output.success() {
        return Err(KubeError::CommandFailed {
            command: command.to_string(),
            code: output.code,
        });
    }
    Ok(output)
}

/// Runs commands as child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandLine, mode: OutputMode) -> Result<CommandOutput> {
        tracing::debug!(command = %command, ?mode, "running command");

        let mut child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| KubeError::CommandSpawn {
                command: command.to_string(),
                source,
            })?;

        let stdout_echo = match mode {
            OutputMode::Stream => Some(tokio::io::stdout()),
            OutputMode::Capture => None,
        };

        let (stdout, stderr, status) = tokio::join!(
            pump(child.stdout.take(), stdout_echo),
            pump(child.stderr.take(), Some(tokio::io::stderr())),
            child.wait(),
        );
        let stdout = stdout?;
        let stderr = stderr?;
        let status = status?;

        let mut combined = stdout.clone();
        combined.extend_from_slice(&stderr);

        tracing::debug!(command = %command, code = ?status.code(), "command finished");
        Ok(CommandOutput {
            code: status.code(),
            stdout,
            combined,
        })
    }
}

/// Drain a child stream, optionally echoing it
async fn pump<R, W>(reader: Option<R>, mut echo: Option<W>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut captured = Vec::new();
    let Some(mut reader) = reader else {
        return Ok(captured);
    };

    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        captured.extend_from_slice(&buf[..n]);
        if let Some(echo) = echo.as_mut() {
            echo.write_all(&buf[..n]).await?;
            echo.flush().await?;
        }
    }
    Ok(captured)
}

/// Scripted runner for testing
///
/// Each rule pairs a fragment of the rendered command line with the result
/// to return. The first matching rule wins; unmatched commands succeed with
/// empty output.
#[derive(Clone, Default)]
pub struct MockRunner {
    rules: Arc<RwLock<Vec<(String, CommandOutput)>>>,
    commands: Arc<RwLock<Vec<String>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `output` for commands containing `fragment`
    pub fn on(self, fragment: impl Into<String>, output: CommandOutput) -> Self {
        self.rules.write().unwrap().push((fragment.into(), output));
        self
    }

    /// Every command run so far, rendered
    pub fn commands(&self) -> Vec<String> {
        self.commands.read().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, command: &CommandLine, _mode: OutputMode) -> Result<CommandOutput> {
        let rendered = command.to_string();
        self.commands.write().unwrap().push(rendered.clone());

        let rules = self.rules.read().unwrap();
        Ok(rules
            .iter()
            .find(|(fragment, _)| rendered.contains(fragment.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(Vec::<u8>::new())))
    }
}
