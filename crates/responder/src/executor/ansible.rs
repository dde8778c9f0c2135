//! `ansible-playbook` runner
//!
//! Spawns the configured binary once per recovery, streams both pipes while
//! waiting, and kills the child when the time budget runs out.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::{ExecutionError, ExecutionResult, ExtraVars, PlaybookRunner};
use crate::{actions::Playbook, config::AnsibleConfig, metrics};

#[derive(Debug, Clone)]
pub struct AnsibleExecutor {
    config: AnsibleConfig,
    timeout: Duration,
}

struct RunOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl AnsibleExecutor {
    pub fn new(config: AnsibleConfig) -> Self {
        let timeout = config.timeout();
        Self { config, timeout }
    }

    /// Overrides the time budget taken from the configuration.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command_args(&self, playbook: &Playbook, extra_vars_json: String) -> Vec<String> {
        let mut args = vec![
            playbook
                .path_in(&self.config.playbook_dir)
                .display()
                .to_string(),
            "-i".to_string(),
            self.config.inventory.display().to_string(),
        ];
        if self.config.verbose {
            args.push("-v".to_string());
        }
        args.push("--extra-vars".to_string());
        args.push(extra_vars_json);
        args
    }

    async fn execute(&self, playbook: &Playbook, args: Vec<String>) -> ExecutionResult {
        let mut child = match Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                error!("Error executing playbook {}: {}", playbook, e);
                return ExecutionResult::failed(ExecutionError::Launch(e.to_string()), e.to_string());
            }
        };

        let budget = self.timeout();
        let outcome = timeout(budget, wait_with_output(&mut child)).await;

        match outcome {
            Ok(Ok(run)) => finish(playbook, run),
            Ok(Err(e)) => {
                error!("Error executing playbook {}: {}", playbook, e);
                reap(&mut child, playbook).await;
                ExecutionResult::failed(ExecutionError::Io(e.to_string()), e.to_string())
            }
            Err(_) => {
                error!("Playbook {} timed out after {:?}", playbook, budget);
                reap(&mut child, playbook).await;
                ExecutionResult::timed_out(budget)
            }
        }
    }
}

#[async_trait]
impl PlaybookRunner for AnsibleExecutor {
    async fn run(&self, playbook: &Playbook, extra_vars: &ExtraVars) -> ExecutionResult {
        let started = Instant::now();

        let args = self.command_args(playbook, extra_vars_json(extra_vars));
        info!(
            "Executing command: {} {}",
            self.config.binary.display(),
            args.join(" ")
        );

        let result = self.execute(playbook, args).await;

        let outcome = if result.success {
            "success"
        } else if result.is_timeout() {
            "timeout"
        } else {
            "failure"
        };
        metrics::record_playbook_run(outcome, started.elapsed());

        result
    }
}

/// `--extra-vars` payload: a flat JSON object of strings.
fn extra_vars_json(extra_vars: &ExtraVars) -> String {
    let object: Map<String, Value> = extra_vars
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();
    Value::Object(object).to_string()
}

/// Waits for exit while draining both pipes so a chatty playbook cannot
/// stall on a full pipe buffer.
async fn wait_with_output(child: &mut Child) -> std::io::Result<RunOutput> {
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let (status, _, _) = tokio::try_join!(
        child.wait(),
        drain(stdout_pipe.as_mut(), &mut stdout),
        drain(stderr_pipe.as_mut(), &mut stderr),
    )?;

    Ok(RunOutput {
        status,
        stdout,
        stderr,
    })
}

async fn drain<R>(pipe: Option<&mut R>, buf: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    if let Some(pipe) = pipe {
        pipe.read_to_end(buf).await?;
    }
    Ok(())
}

/// Kills the child and waits for it so no zombie outlives the request.
async fn reap(child: &mut Child, playbook: &Playbook) {
    if let Err(e) = child.kill().await {
        warn!("Failed to kill playbook {} process: {}", playbook, e);
    }
}

fn finish(playbook: &Playbook, run: RunOutput) -> ExecutionResult {
    let stdout = String::from_utf8_lossy(&run.stdout).into_owned();

    if run.status.success() {
        info!("Playbook {} executed successfully", playbook);
        return ExecutionResult::succeeded(stdout);
    }

    let stderr = String::from_utf8_lossy(&run.stderr).into_owned();
    let diagnostic = if !stderr.trim().is_empty() {
        stderr
    } else if !stdout.trim().is_empty() {
        stdout
    } else {
        format!("Playbook {} exited with {}", playbook, run.status)
    };

    error!("Playbook {} failed: {}", playbook, diagnostic);
    ExecutionResult::failed(
        ExecutionError::NonZeroExit {
            code: run.status.code(),
        },
        diagnostic,
    )
}
