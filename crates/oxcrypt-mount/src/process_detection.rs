//! Process detection for busy mounts
//!
//! When a graceful unmount reports the filesystem as busy, callers usually
//! want to tell the user which programs are holding it open.

use std::path::Path;

use serde::Serialize;

/// A process holding a file open under a mountpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    /// Process ID
    pub pid: u32,
    /// Process name (command)
    pub name: String,
    /// File path being accessed (if available)
    pub file_path: Option<String>,
}

/// Find processes using files under a mountpoint
///
/// Uses `lsof` on macOS and Linux. Returns an empty vector on unsupported
/// platforms or if detection fails.
#[cfg(any(target_os = "macos", target_os = "linux"))]
pub fn find_processes_using_mount(mountpoint: &Path) -> Vec<ProcessInfo> {
    use std::process::Command;

    let output = match Command::new("lsof").arg("+D").arg(mountpoint).output() {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!("Failed to run lsof: {}", e);
            return Vec::new();
        }
    };

    // lsof exits non-zero when nothing is open, which is fine
    parse_lsof(&String::from_utf8_lossy(&output.stdout))
}

/// Stub implementation for unsupported platforms
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub fn find_processes_using_mount(_mountpoint: &Path) -> Vec<ProcessInfo> {
    Vec::new()
}

/// Parse `lsof` output (`COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME`),
/// keeping the first entry per PID, ordered by PID.
#[cfg_attr(not(any(target_os = "macos", target_os = "linux")), allow(dead_code))]
fn parse_lsof(stdout: &str) -> Vec<ProcessInfo> {
    let mut processes: Vec<ProcessInfo> = Vec::new();

    for line in stdout.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 9 {
            continue;
        }
        let Ok(pid) = parts[1].parse::<u32>() else {
            continue;
        };
        if processes.iter().any(|p| p.pid == pid) {
            continue;
        }
        processes.push(ProcessInfo {
            pid,
            name: parts[0].to_string(),
            file_path: Some(parts[8..].join(" ")),
        });
    }

    processes.sort_by_key(|p| p.pid);
    processes
}
