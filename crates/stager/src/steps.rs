//! Execution of recipe steps
//!
//! Steps run with a constructed environment and the working directories
//! as their only view of the host. Cancellation prevents new spawns and
//! terminates an in-flight child.

use dop_errors::{BuildError, Error};
use dop_recipe::Step;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Run `steps` sequentially in `cwd`.
///
/// # Errors
///
/// `Error::Cancelled` when the token fires; `BuildError::StepStatus` on
/// a non-zero exit; `BuildError::StepFailed` when a step cannot spawn.
pub async fn run_steps(
    steps: &[Step],
    cwd: &Path,
    env: &BTreeMap<String, String>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    for step in steps {
        run_step(step, cwd, env, cancel).await?;
    }
    Ok(())
}

async fn run_step(
    step: &Step,
    cwd: &Path,
    env: &BTreeMap<String, String>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let (mut command, step_display) = match step {
        Step::Run { run } => {
            let program = run.first().ok_or_else(|| BuildError::StepFailed {
                step: "run".to_string(),
                message: "empty argv".to_string(),
            })?;
            let mut command = Command::new(program);
            command.args(&run[1..]);
            (command, run.join(" "))
        }
        Step::Shell { shell } => {
            let mut command = Command::new("sh");
            command.arg("-c").arg(shell);
            (command, shell.clone())
        }
    };

    command.current_dir(cwd);
    command.env_clear();
    // PATH stays so tools resolve; everything else comes from the profile
    if let Ok(path) = std::env::var("PATH") {
        command.env("PATH", path);
    }
    command.envs(env);

    debug!(step = %step_display, cwd = %cwd.display(), "running step");
    let mut child = command.spawn().map_err(|e| BuildError::StepFailed {
        step: step_display.clone(),
        message: e.to_string(),
    })?;

    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| BuildError::StepFailed {
            step: step_display.clone(),
            message: e.to_string(),
        })?,
        () = cancel.cancelled() => {
            warn!(step = %step_display, "cancelled, terminating child");
            child.start_kill().ok();
            child.wait().await.ok();
            return Err(Error::Cancelled);
        }
    };

    if status.success() {
        Ok(())
    } else {
        Err(BuildError::StepStatus {
            step: step_display,
            status: status.code().unwrap_or(-1),
        }
        .into())
    }
}
