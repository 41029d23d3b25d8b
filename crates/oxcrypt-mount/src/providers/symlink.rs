//! Symbolic-link "mounts".
//!
//! Not a mount in the kernel sense: the root is made reachable under a new
//! path inside an existing directory. Useful where no mount mechanism is
//! available to an unprivileged user.

use std::io;
use std::path::PathBuf;

use crate::feature::{FeatureSet, MountFeature};
use crate::provider::{MountProvider, MountRequest, NativeMount};

/// Exposes the root through a symbolic link at a path that does not exist yet.
#[derive(Debug, Default)]
pub struct SymlinkProvider;

impl SymlinkProvider {
    /// Create the provider.
    pub fn new() -> Self {
        Self
    }
}

impl MountProvider for SymlinkProvider {
    fn id(&self) -> &str {
        "symlink"
    }

    fn display_name(&self) -> &str {
        "Symbolic Link"
    }

    fn description(&self) -> &str {
        "Symbolic link created inside an existing directory"
    }

    fn is_supported(&self) -> bool {
        cfg!(unix)
    }

    fn supported_features(&self) -> FeatureSet {
        FeatureSet::of(&[
            MountFeature::MountWithinExistingParent,
            MountFeature::UnmountForced,
        ])
    }

    #[cfg(unix)]
    fn mount_native(&self, request: &MountRequest) -> io::Result<Box<dyn NativeMount>> {
        if !request.root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("root is not a directory: {}", request.root.display()),
            ));
        }
        std::os::unix::fs::symlink(&request.root, &request.mountpoint)?;
        tracing::debug!(
            link = %request.mountpoint.display(),
            target = %request.root.display(),
            "Symlink created"
        );
        Ok(Box::new(SymlinkMount {
            link: request.mountpoint.clone(),
            target: request.root.clone(),
        }))
    }

    #[cfg(not(unix))]
    fn mount_native(&self, _request: &MountRequest) -> io::Result<Box<dyn NativeMount>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symbolic link mounts require a Unix platform",
        ))
    }
}

#[cfg_attr(not(unix), allow(dead_code))]
struct SymlinkMount {
    link: PathBuf,
    target: PathBuf,
}

impl NativeMount for SymlinkMount {
    fn unmount(&mut self) -> io::Result<()> {
        match std::fs::read_link(&self.link) {
            Ok(target) if target == self.target => {}
            Ok(other) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "{} now points to {}, refusing to remove it",
                        self.link.display(),
                        other.display()
                    ),
                ));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        }
        remove_link(&self.link)
    }

    fn unmount_forced(&mut self) -> io::Result<()> {
        remove_link(&self.link)
    }
}

fn remove_link(link: &std::path::Path) -> io::Result<()> {
    match std::fs::remove_file(link) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
