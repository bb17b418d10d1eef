use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use eyre::Context;
use tracing::warn;

/// Exit code reported for invocations killed by the runner timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Arguments whose following value must never reach the logs.
const SECRET_FLAGS: &[&str] = &["--etherscan-api-key", "--private-key"];

/// A fully resolved command line, ready to be run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Variables set on top of the inherited environment
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    #[cfg(test)]
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Value following `flag`, if the flag is present.
    #[cfg(test)]
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;

        let mut redact_next = false;
        for arg in &self.args {
            if redact_next {
                write!(f, " ***")?;
            } else {
                write!(f, " {arg}")?;
            }
            redact_next = SECRET_FLAGS.contains(&arg.as_str());
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes invocations. Forge in production, scripted fakes in tests.
pub trait ToolRunner {
    async fn run(&self, invocation: &Invocation) -> eyre::Result<RunResult>;
}

#[derive(Debug, Clone, Default)]
pub struct ForgeRunner {
    timeout: Option<Duration>,
}

impl ForgeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl ToolRunner for ForgeRunner {
    async fn run(&self, invocation: &Invocation) -> eyre::Result<RunResult> {
        let mut cmd = tokio::process::Command::new(&invocation.program);

        cmd.args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(cwd) = &invocation.cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd.output();

        let output = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, output).await {
                Ok(output) => output,
                Err(_) => {
                    warn!("{} timed out after {timeout:?}", invocation.program);

                    return Ok(RunResult {
                        exit_code: TIMEOUT_EXIT_CODE,
                        stdout: String::new(),
                        stderr: format!("timed out after {timeout:?}"),
                    });
                }
            },
            None => output.await,
        }
        .with_context(|| format!("Spawning {}", invocation.program))?;

        Ok(RunResult {
            // Killed by a signal
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
