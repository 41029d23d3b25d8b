//! Linux bind mounts.

use std::io;
use std::path::PathBuf;
use std::process::Command;

use crate::feature::{FeatureSet, MountFeature};
use crate::force_unmount;
use crate::provider::{MountProvider, MountRequest, NativeMount};

/// Flags applied when the caller sets none.
pub const DEFAULT_BIND_FLAGS: &str = "nosuid,nodev";

/// Exposes the root on an existing empty directory via `mount --bind`.
///
/// Requires root privileges.
#[derive(Debug, Default)]
pub struct BindProvider;

impl BindProvider {
    /// Create the provider.
    pub fn new() -> Self {
        Self
    }
}

impl MountProvider for BindProvider {
    fn id(&self) -> &str {
        "bind"
    }

    fn display_name(&self) -> &str {
        "Bind Mount"
    }

    fn description(&self) -> &str {
        "Linux bind mount onto an empty directory (requires root)"
    }

    #[cfg(target_os = "linux")]
    fn is_supported(&self) -> bool {
        nix::unistd::geteuid().is_root() && std::path::Path::new("/proc/self/mountinfo").exists()
    }

    #[cfg(not(target_os = "linux"))]
    fn is_supported(&self) -> bool {
        false
    }

    fn supported_features(&self) -> FeatureSet {
        FeatureSet::of(&[
            MountFeature::MountToExistingDir,
            MountFeature::MountFlags,
            MountFeature::ReadOnly,
            MountFeature::UnmountForced,
        ])
    }

    fn default_mount_flags(&self, _mount_name: &str) -> Option<String> {
        Some(DEFAULT_BIND_FLAGS.to_string())
    }

    fn mount_native(&self, request: &MountRequest) -> io::Result<Box<dyn NativeMount>> {
        let mountpoint = request.mountpoint.clone();

        let mut bind = Command::new("mount");
        bind.arg("--bind");
        if let Some(flags) = request.mount_flags.as_deref().filter(|f| !f.is_empty()) {
            bind.args(["-o", flags]);
        }
        bind.arg(&request.root).arg(&mountpoint);
        force_unmount::run_tool(bind)?;
        tracing::debug!(mountpoint = %mountpoint.display(), "Bind mount attached");

        if request.read_only {
            // A bind mount only honours `ro` on remount.
            let mut remount = Command::new("mount");
            remount.args(["-o", "remount,bind,ro"]).arg(&mountpoint);
            if let Err(e) = force_unmount::run_tool(remount) {
                if let Err(undo) = force_unmount::unmount(&mountpoint) {
                    tracing::warn!("Failed to undo bind mount at {}: {undo}", mountpoint.display());
                }
                return Err(e);
            }
        }

        Ok(Box::new(BindMount { mountpoint }))
    }
}

struct BindMount {
    mountpoint: PathBuf,
}

impl NativeMount for BindMount {
    fn unmount(&mut self) -> io::Result<()> {
        force_unmount::unmount(&self.mountpoint)
    }

    fn unmount_forced(&mut self) -> io::Result<()> {
        force_unmount::lazy_unmount(&self.mountpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_existing_dir_target() {
        let features = BindProvider::new().supported_features();
        assert!(features.validate().is_ok());
        assert_eq!(features.mount_target(), Some(crate::MountTarget::ExistingDir));
        assert!(features.contains(MountFeature::MountFlags));
        assert!(!features.contains(MountFeature::Port));
    }

    #[test]
    fn default_flags_are_restrictive() {
        assert_eq!(
            BindProvider::new().default_mount_flags("vault").as_deref(),
            Some("nosuid,nodev")
        );
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn unsupported_off_linux() {
        assert!(!BindProvider::new().is_supported());
    }
}
