use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Result, WalldError};
use crate::interface::ResolvedCommand;

/// How a launched command ended, once it could be started at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure { code: Option<i32>, stderr: String },
}

/// Runs a single argument list to completion.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, argv: &[String]) -> Result<ExitStatus>;
}

/// Launches real child processes.
pub struct ProcessLauncher;

impl ProcessLauncher {
    fn build_command(argv: &[String]) -> Result<Command> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| WalldError::Launch("empty command".into()))?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        Ok(cmd)
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, argv: &[String]) -> Result<ExitStatus> {
        let output = Self::build_command(argv)?
            .output()
            .await
            .map_err(|e| WalldError::Launch(format!("failed to run {}: {e}", argv[0])))?;

        if output.status.success() {
            return Ok(ExitStatus::Success);
        }
        Ok(ExitStatus::Failure {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Succeeded,
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    SpawnFailed {
        program: String,
        reason: String,
    },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub interface: String,
    pub outcome: DispatchOutcome,
}

/// Fire-and-forget execution of resolved interface commands.
#[derive(Clone)]
pub struct Dispatcher {
    launcher: Arc<dyn Launcher>,
}

impl Dispatcher {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self { launcher }
    }

    pub fn processes() -> Self {
        Self::new(Arc::new(ProcessLauncher))
    }

    /// Spawn one task per interface and return immediately. The handles may
    /// be awaited or dropped; dropping them does not cancel anything.
    pub fn submit(
        &self,
        wallpaper: &Path,
        commands: Vec<ResolvedCommand>,
    ) -> Vec<JoinHandle<DispatchReport>> {
        info!(
            wallpaper = %wallpaper.display(),
            interfaces = commands.len(),
            "dispatching"
        );
        commands
            .into_iter()
            .map(|cmd| tokio::spawn(run_interface(Arc::clone(&self.launcher), cmd)))
            .collect()
    }
}

/// Pre hooks, the command itself, then post hooks. A failed pre hook or
/// command ends the run; post hook failures are only reported.
async fn run_interface(launcher: Arc<dyn Launcher>, cmd: ResolvedCommand) -> DispatchReport {
    let ResolvedCommand {
        interface,
        pre_hooks,
        argv,
        post_hooks,
    } = cmd;

    let mut outcome = DispatchOutcome::Succeeded;
    for hook in &pre_hooks {
        outcome = run_step(launcher.as_ref(), hook).await;
        if !outcome.is_success() {
            break;
        }
    }
    if outcome.is_success() {
        outcome = run_step(launcher.as_ref(), &argv).await;
    }
    if outcome.is_success() {
        for hook in &post_hooks {
            let hook_outcome = run_step(launcher.as_ref(), hook).await;
            if !hook_outcome.is_success() && outcome.is_success() {
                outcome = hook_outcome;
            }
        }
    }

    match &outcome {
        DispatchOutcome::Succeeded => info!(interface = %interface, "interface applied"),
        DispatchOutcome::NonZeroExit {
            program,
            code,
            stderr,
        } => warn!(
            interface = %interface,
            program = %program,
            code = ?code,
            stderr = %stderr,
            "interface command exited with failure"
        ),
        DispatchOutcome::SpawnFailed { program, reason } => error!(
            interface = %interface,
            program = %program,
            "could not launch interface command: {reason}"
        ),
    }

    DispatchReport { interface, outcome }
}

async fn run_step(launcher: &dyn Launcher, argv: &[String]) -> DispatchOutcome {
    let program = argv.first().cloned().unwrap_or_default();
    debug!(argv = ?argv, "launching");
    match launcher.launch(argv).await {
        Ok(ExitStatus::Success) => DispatchOutcome::Succeeded,
        Ok(ExitStatus::Failure { code, stderr }) => DispatchOutcome::NonZeroExit {
            program,
            code,
            stderr,
        },
        Err(e) => DispatchOutcome::SpawnFailed {
            program,
            reason: e.to_string(),
        },
    }
}
