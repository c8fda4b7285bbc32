//! Subprocess invocation seam.
//!
//! Every external collaborator (git, make, the version probe, the
//! consumer binary) is reached through the [`Invoker`] trait, so the
//! whole matrix can be exercised in tests against a scripted fake.
//!
//! Working directory and environment are explicit fields on every
//! [`Invocation`]; the harness never changes the process's own current
//! directory — ambient cwd is shared mutable state that would leak
//! between releases.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{HarnessError, Result};

/// One subprocess invocation: program, arguments, extra environment,
/// working directory.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Program to execute.
    pub program: String,

    /// Arguments, not including the program itself.
    pub args: Vec<String>,

    /// Environment variables set on top of the inherited environment.
    pub env: Vec<(String, String)>,

    /// Working directory for the child.
    pub cwd: PathBuf,

    /// Capture stdout/stderr. When false, the child inherits the
    /// harness's streams so long-running build output stays visible.
    pub capture: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: cwd.into(),
            capture: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Stream child output instead of capturing it.
    pub fn streamed(mut self) -> Self {
        self.capture = false;
        self
    }

    /// Look up an environment variable set on this invocation.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Result of a completed invocation.
#[derive(Debug, Clone)]
pub struct InvocationOutput {
    /// Exit code (0 = success, -1 if terminated by signal).
    pub exit_code: i32,

    /// Captured stdout (empty when streamed).
    pub stdout: String,

    /// Captured stderr (empty when streamed).
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl InvocationOutput {
    /// Whether the child exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes invocations. Implemented by [`ShellInvoker`] for real runs
/// and by `fakes::ScriptedInvoker` for tests.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Run the invocation to completion and observe its exit.
    ///
    /// A non-zero exit is not an error at this layer; callers decide
    /// what an exit code means. `Err` is reserved for failure to spawn
    /// or to collect the child at all.
    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationOutput>;
}

/// Real invoker over `tokio::process`. Synchronous from the harness's
/// perspective: the call does not return until the child has exited.
/// No timeout — a hung collaborator hangs the run.
#[derive(Debug, Default)]
pub struct ShellInvoker;

impl ShellInvoker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Invoker for ShellInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationOutput> {
        let start = Instant::now();

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).current_dir(&invocation.cwd);
        for (key, value) in &invocation.env {
            command.env(key, value);
        }
        if invocation.capture {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let child = command.spawn().map_err(|source| HarnessError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        let output = child.wait_with_output().await?;

        Ok(InvocationOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
