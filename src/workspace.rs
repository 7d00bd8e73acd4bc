//! Workspace Manager: per-deploy scratch directories under `tmp_dir`.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};

/// Acquire a fresh workspace directory for `repo_name` under `tmp_dir`.
///
/// Any stale entry at the computed path is removed first so a crashed prior
/// run never leaves a half-populated clone behind. The directory is created
/// with mode `0755`.
pub fn acquire(tmp_dir: &Path, repo_name: &str) -> Result<PathBuf> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let path = tmp_dir.join(format!("sentry-{repo_name}-{stamp}"));

    if path.exists() {
        std::fs::remove_dir_all(&path)
            .with_context(|| format!("removing stale workspace at {}", path.display()))?;
    }
    std::fs::create_dir_all(&path)
        .with_context(|| format!("creating workspace at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("setting workspace permissions at {}", path.display()))?;
    }

    Ok(path)
}

/// Remove a workspace directory. A no-op if it no longer exists.
///
/// Refuses to operate on an empty path or `/` to guard against a
/// misconfigured `tmp_dir` turning this into a destructive wipe.
pub fn release(path: &Path) -> Result<()> {
    let as_str = path.to_string_lossy();
    if as_str.is_empty() || as_str == "/" {
        bail!("refusing to release workspace path {as_str:?}");
    }
    if !path.exists() {
        return Ok(());
    }
    std::fs::remove_dir_all(path)
        .with_context(|| format!("removing workspace at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_and_release_removes() {
        let root = tempfile::tempdir().unwrap();
        let workspace = acquire(root.path(), "demo").unwrap();
        assert!(workspace.exists());
        assert!(workspace.starts_with(root.path()));

        release(&workspace).unwrap();
        assert!(!workspace.exists());
    }

    #[test]
    fn acquire_clears_stale_directory() {
        let root = tempfile::tempdir().unwrap();
        let workspace = acquire(root.path(), "demo").unwrap();
        std::fs::write(workspace.join("stale.txt"), b"old").unwrap();

        // re-running acquire against the same repo name collides on the same
        // path (the timestamp component is identical within the same
        // second) and must wipe the stale contents left behind above
        let reacquired = acquire(root.path(), "demo").unwrap();
        assert_eq!(reacquired, workspace);
        assert!(!reacquired.join("stale.txt").exists());
    }

    #[test]
    fn release_on_missing_path_is_ok() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("never-created");
        assert!(release(&missing).is_ok());
    }

    #[test]
    fn release_refuses_root() {
        assert!(release(Path::new("/")).is_err());
    }
}
