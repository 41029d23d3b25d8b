//! Platform unmount tools.
//!
//! Thin wrappers around the system unmount commands used by the built-in
//! providers. Failures come back as [`io::Error`]s; a "busy" report from the
//! tool is mapped to [`io::ErrorKind::ResourceBusy`] so the mount lifecycle
//! can tell a recoverable busy unmount from other failures.
//!
//! # Safety
//!
//! **IMPORTANT**: These functions will attempt to unmount ANY path. They are
//! only called by the [`NativeMount`](crate::NativeMount) that owns the mount.
//!
//! # Platform Support
//!
//! - **macOS**: `umount`, `diskutil unmount force`, falls back to `umount -f`
//! - **Linux**: `umount`, `fusermount -uz` / `umount -l` (lazy), `umount -f`
//! - **Other**: [`io::ErrorKind::Unsupported`]

use std::io;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

/// How long a single unmount tool may run before we give up on it.
///
/// Tools can hang forever on ghost mounts.
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(3);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run a command to completion, converting a non-zero exit into an error.
///
/// A stderr mentioning "busy" yields [`io::ErrorKind::ResourceBusy`].
pub fn run_tool(mut command: Command) -> io::Result<()> {
    let program = command.get_program().to_string_lossy().into_owned();
    let output = command.output()?;
    check_output(&program, &output)
}

/// Like [`run_tool`], but kills the tool and fails with [`io::ErrorKind::TimedOut`] after `timeout`.
///
/// The child is killed and reaped before returning, so a reported failure
/// never completes later in the background. If the tool manages to finish
/// successfully before the kill lands, that success is reported instead.
pub fn run_tool_with_timeout(mut command: Command, timeout: Duration) -> io::Result<()> {
    let program = command.get_program().to_string_lossy().into_owned();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let deadline = Instant::now() + timeout;
    while child.try_wait()?.is_none() {
        if Instant::now() >= deadline {
            tracing::debug!("{program} exceeded {timeout:?}, killing it");
            // Fails only if the child already exited, which wait_with_output reports.
            let _ = child.kill();
            let output = child.wait_with_output()?;
            if output.status.success() {
                return Ok(());
            }
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{program} did not finish within {timeout:?} (possible ghost mount)"),
            ));
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    let output = child.wait_with_output()?;
    check_output(&program, &output)
}

fn check_output(program: &str, output: &Output) -> io::Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = format!("{program} failed: {}", stderr.trim());
    let kind = if stderr.to_lowercase().contains("busy") {
        io::ErrorKind::ResourceBusy
    } else {
        io::ErrorKind::Other
    };
    Err(io::Error::new(kind, message))
}

/// Gracefully unmount the filesystem at `mountpoint`.
///
/// Fails with [`io::ErrorKind::ResourceBusy`] while files are open.
pub fn unmount(mountpoint: &Path) -> io::Result<()> {
    #[cfg(any(target_os = "macos", target_os = "linux"))]
    {
        let mut command = Command::new("umount");
        command.arg(mountpoint);
        let result = run_tool_with_timeout(command, TOOL_TIMEOUT);
        if result.is_ok() {
            tracing::debug!("Unmount via umount succeeded for {}", mountpoint.display());
        }
        result
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Err(unsupported("Unmount", mountpoint))
    }
}

/// Force unmount a filesystem at the given path.
///
/// # Behavior
///
/// - On macOS: Tries `diskutil unmount force`, then `umount -f`
/// - On Linux: Tries `umount -f`, then a lazy unmount
/// - Other platforms: Returns error
pub fn force_unmount(mountpoint: &Path) -> io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        force_unmount_macos(mountpoint)
    }

    #[cfg(target_os = "linux")]
    {
        let mut command = Command::new("umount");
        command.arg("-f").arg(mountpoint);
        match run_tool_with_timeout(command, TOOL_TIMEOUT) {
            Ok(()) => {
                tracing::debug!("Force unmount via umount -f succeeded for {}", mountpoint.display());
                Ok(())
            }
            Err(e) => {
                tracing::debug!("umount -f failed for {}: {}", mountpoint.display(), e);
                lazy_unmount(mountpoint)
            }
        }
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Err(unsupported("Force unmount", mountpoint))
    }
}

/// Attempt a lazy/deferred unmount.
///
/// This immediately removes the mount from the namespace but allows
/// existing file handles to continue until they're closed. Never reports
/// busy, which makes it the teardown of last resort.
pub fn lazy_unmount(mountpoint: &Path) -> io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        // macOS doesn't have true lazy unmount
        force_unmount_macos(mountpoint)
    }

    #[cfg(target_os = "linux")]
    {
        lazy_unmount_linux(mountpoint)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Err(unsupported("Lazy unmount", mountpoint))
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn unsupported(what: &str, mountpoint: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{what} not supported on this platform for {}", mountpoint.display()),
    )
}

#[cfg(target_os = "macos")]
fn force_unmount_macos(mountpoint: &Path) -> io::Result<()> {
    // Skip mountpoint.exists(): it blocks forever on ghost mounts.
    let mut diskutil = Command::new("diskutil");
    diskutil.args(["unmount", "force"]).arg(mountpoint);
    match run_tool_with_timeout(diskutil, TOOL_TIMEOUT) {
        Ok(()) => {
            tracing::debug!("Force unmount via diskutil succeeded for {}", mountpoint.display());
            return Ok(());
        }
        Err(e) => tracing::debug!("diskutil unmount failed for {}: {}", mountpoint.display(), e),
    }

    let mut umount = Command::new("umount");
    umount.arg("-f").arg(mountpoint);
    run_tool_with_timeout(umount, TOOL_TIMEOUT)
}

#[cfg(target_os = "linux")]
fn lazy_unmount_linux(mountpoint: &Path) -> io::Result<()> {
    // fusermount only applies to FUSE mounts but is the only option for
    // unprivileged users.
    let mut fusermount = Command::new("fusermount");
    fusermount.arg("-uz").arg(mountpoint);
    if run_tool(fusermount).is_ok() {
        tracing::debug!("Lazy unmount via fusermount -uz succeeded for {}", mountpoint.display());
        return Ok(());
    }

    let mut umount = Command::new("umount");
    umount.arg("-l").arg(mountpoint);
    run_tool(umount)?;
    tracing::debug!("Lazy unmount via umount -l succeeded for {}", mountpoint.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_unmount_nonexistent_path() {
        // Trying to unmount a path that isn't mounted should fail
        let result = force_unmount(Path::new("/nonexistent/path/that/does/not/exist"));
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn run_tool_reports_failure_with_stderr() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo 'nope' >&2; exit 1"]);
        let err = run_tool(command).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(err.to_string().contains("nope"));
    }

    #[cfg(unix)]
    #[test]
    fn run_tool_maps_busy_stderr() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo 'umount: /mnt: target is busy.' >&2; exit 32"]);
        let err = run_tool(command).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ResourceBusy);
    }

    #[cfg(unix)]
    #[test]
    fn run_tool_with_timeout_gives_up() {
        let mut command = Command::new("sleep");
        command.arg("5");
        let err = run_tool_with_timeout(command, Duration::from_millis(100)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[cfg(unix)]
    #[test]
    fn run_tool_with_timeout_kills_the_tool() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("done");
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(format!("sleep 0.5; touch '{}'", marker.display()));

        let err = run_tool_with_timeout(command, Duration::from_millis(100)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        std::thread::sleep(Duration::from_secs(1));
        assert!(!marker.exists(), "timed-out tool must not complete later");
    }

    #[cfg(unix)]
    #[test]
    fn run_tool_with_timeout_reports_fast_failure() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo 'target is busy' >&2; exit 32"]);
        let err = run_tool_with_timeout(command, Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ResourceBusy);
    }
}
