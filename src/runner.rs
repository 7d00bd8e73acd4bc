//! Command Runner: executes one shell command inside a workspace under a
//! caller-supplied deadline, merging stdout and stderr for the report.

use std::path::Path;
use std::time::{Duration, Instant};

use tokio::process::Command as AsyncCommand;

/// Per-command deadline, independent of and always intersected with the
/// caller's outer deadline. Fixed at 5 minutes.
pub const PER_COMMAND_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Run `command` via `/bin/sh -c` inside `workspace`, with `extra_env`
/// injected on top of the inherited environment. The command is bounded by
/// `deadline` (already intersected with [`PER_COMMAND_DEADLINE`] by the
/// caller).
///
/// Returns the combined stdout+stderr output and whether the command both
/// started and exited with status zero before `deadline` elapsed.
pub async fn run(
    workspace: &Path,
    command: &str,
    deadline: Duration,
    extra_env: &[(String, String)],
) -> (String, bool) {
    let mut cmd = AsyncCommand::new("/bin/sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(workspace)
        .envs(extra_env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .kill_on_drop(true);

    match tokio::time::timeout(deadline, cmd.output()).await {
        Ok(Ok(output)) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            (combined, output.status.success())
        }
        Ok(Err(io_err)) => (format!("failed to spawn command: {io_err}"), false),
        Err(_elapsed) => (
            format!("command exceeded {}s deadline", deadline.as_secs()),
            false,
        ),
    }
}

/// Clamp a remaining-time-until-deadline duration to at most
/// [`PER_COMMAND_DEADLINE`].
#[must_use]
pub fn bounded_by_remaining(outer_deadline: Instant) -> Duration {
    outer_deadline
        .saturating_duration_since(Instant::now())
        .min(PER_COMMAND_DEADLINE)
}
