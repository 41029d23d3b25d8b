//! Mountpoint probing and validation.
//!
//! A mountpoint sitting on a stale mount (crashed FUSE daemon, dead network
//! share) blocks every filesystem call on it indefinitely. All probes here
//! run on a helper thread and give up after a timeout, so validating a
//! mountpoint never hangs the caller.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::feature::MountTarget;

/// Default timeout for filesystem accessibility checks
pub const DEFAULT_ACCESS_TIMEOUT: Duration = Duration::from_millis(500);

/// Result of checking mount point accessibility
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountPointStatus {
    /// Path is an accessible directory
    Available,
    /// Path exists and appears to be a stale/unresponsive mount
    StaleMountDetected,
    /// Path doesn't exist (may need to be created)
    DoesNotExist,
    /// Path exists but is not a directory
    NotADirectory,
    /// Parent directory did not respond (possibly stale mount)
    ParentInaccessible,
    /// Some other error occurred
    Error(String),
}

/// Run `probe` on a helper thread, returning `None` on timeout.
fn with_timeout<T, F>(timeout: Duration, probe: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(probe());
    });
    rx.recv_timeout(timeout).ok()
}

/// Check if a path is accessible within a timeout.
pub fn is_path_accessible(path: &Path, timeout: Duration) -> bool {
    let path = path.to_path_buf();
    with_timeout(timeout, move || std::fs::metadata(&path).is_ok()).unwrap_or(false)
}

/// Check if a directory exists and has no entries (with timeout protection).
pub fn is_directory_empty(path: &Path, timeout: Duration) -> bool {
    let path = path.to_path_buf();
    with_timeout(timeout, move || {
        std::fs::read_dir(&path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
    })
    .unwrap_or(false)
}

/// Check the status of a potential mount point.
///
/// Uses timeout-wrapped filesystem operations to avoid blocking on stale mounts.
pub fn check_mountpoint_status(path: &Path, timeout: Duration) -> MountPointStatus {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && *p != Path::new("/"));
    if let Some(parent) = parent {
        let parent = parent.to_path_buf();
        // Only a hang matters here; a missing parent shows up as NotFound below.
        if with_timeout(timeout, move || std::fs::symlink_metadata(&parent)).is_none() {
            return MountPointStatus::ParentInaccessible;
        }
    }

    let path_buf = path.to_path_buf();
    let probe = with_timeout(timeout, move || match std::fs::metadata(&path_buf) {
        Ok(meta) if meta.is_dir() => match std::fs::read_dir(&path_buf) {
            Ok(mut entries) => {
                let _ = entries.next();
                MountPointStatus::Available
            }
            Err(_) => MountPointStatus::StaleMountDetected,
        },
        Ok(_) => MountPointStatus::NotADirectory,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => MountPointStatus::DoesNotExist,
        Err(e) => MountPointStatus::Error(e.to_string()),
    });

    probe.unwrap_or(MountPointStatus::StaleMountDetected)
}

/// Parse a drive letter token (`X:`, `X:\` or `X:/`), returning the
/// upper-case letter.
pub fn parse_drive_letter(path: &Path) -> Option<char> {
    let s = path.to_str()?;
    let mut chars = s.chars();
    let letter = chars.next().filter(char::is_ascii_alphabetic)?;
    if chars.next() != Some(':') {
        return None;
    }
    match chars.as_str() {
        "" | "\\" | "/" => Some(letter.to_ascii_uppercase()),
        _ => None,
    }
}

/// Check that `mountpoint` is legal for a provider mounting to `target`.
///
/// - [`MountTarget::ExistingDir`]: an existing, empty directory
/// - [`MountTarget::WithinExistingParent`]: a missing path whose parent is a directory
/// - [`MountTarget::DriveLetter`]: a drive letter token
/// - [`MountTarget::SystemChosenPath`]: anything; the provider decides
pub fn validate_mountpoint(
    target: MountTarget,
    mountpoint: &Path,
    timeout: Duration,
) -> Result<(), ConfigError> {
    match target {
        MountTarget::ExistingDir => match check_mountpoint_status(mountpoint, timeout) {
            MountPointStatus::Available => {
                if is_directory_empty(mountpoint, timeout) {
                    Ok(())
                } else {
                    Err(ConfigError::DirectoryNotEmpty(mountpoint.to_path_buf()))
                }
            }
            MountPointStatus::DoesNotExist | MountPointStatus::NotADirectory => Err(
                ConfigError::NotAnExistingDirectory(mountpoint.to_path_buf()),
            ),
            MountPointStatus::StaleMountDetected | MountPointStatus::ParentInaccessible => {
                Err(ConfigError::StaleMountpoint(mountpoint.to_path_buf()))
            }
            MountPointStatus::Error(reason) => Err(ConfigError::Inaccessible {
                path: mountpoint.to_path_buf(),
                reason,
            }),
        },
        MountTarget::WithinExistingParent => {
            let parent = parent_dir(mountpoint);
            match check_mountpoint_status(&parent, timeout) {
                MountPointStatus::Available => {}
                MountPointStatus::StaleMountDetected | MountPointStatus::ParentInaccessible => {
                    return Err(ConfigError::StaleMountpoint(parent));
                }
                _ => return Err(ConfigError::ParentNotADirectory(parent)),
            }
            let path = mountpoint.to_path_buf();
            match with_timeout(timeout, move || std::fs::symlink_metadata(&path)) {
                None => Err(ConfigError::StaleMountpoint(mountpoint.to_path_buf())),
                Some(Ok(_)) => Err(ConfigError::MountpointExists(mountpoint.to_path_buf())),
                Some(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Some(Err(e)) => Err(ConfigError::Inaccessible {
                    path: mountpoint.to_path_buf(),
                    reason: e.to_string(),
                }),
            }
        }
        MountTarget::DriveLetter => parse_drive_letter(mountpoint)
            .map(|_| ())
            .ok_or_else(|| ConfigError::NotADriveLetter(mountpoint.to_path_buf())),
        MountTarget::SystemChosenPath => Ok(()),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
