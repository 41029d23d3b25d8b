//! Windows drive-letter mappings via `subst`.

use std::io;
use std::path::Path;
use std::process::Command;

use crate::feature::{FeatureSet, MountFeature};
use crate::force_unmount;
use crate::mount_utils::parse_drive_letter;
use crate::provider::{MountProvider, MountRequest, NativeMount};

/// Maps the root to a drive letter with `subst X: <root>`.
#[derive(Debug, Default)]
pub struct SubstProvider;

impl SubstProvider {
    /// Create the provider.
    pub fn new() -> Self {
        Self
    }
}

impl MountProvider for SubstProvider {
    fn id(&self) -> &str {
        "subst"
    }

    fn display_name(&self) -> &str {
        "Drive Letter (subst)"
    }

    fn description(&self) -> &str {
        "Windows virtual drive letter mapping"
    }

    fn is_supported(&self) -> bool {
        cfg!(windows)
    }

    fn supported_features(&self) -> FeatureSet {
        FeatureSet::of(&[MountFeature::MountAsDriveLetter, MountFeature::UnmountForced])
    }

    fn mount_native(&self, request: &MountRequest) -> io::Result<Box<dyn NativeMount>> {
        let drive = drive_token(&request.mountpoint)?;
        let mut command = Command::new("subst");
        command.arg(&drive).arg(&request.root);
        force_unmount::run_tool(command)?;
        tracing::debug!(drive = %drive, root = %request.root.display(), "Drive letter mapped");
        Ok(Box::new(SubstMount { drive }))
    }
}

fn drive_token(mountpoint: &Path) -> io::Result<String> {
    parse_drive_letter(mountpoint)
        .map(|letter| format!("{letter}:"))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a drive letter: {}", mountpoint.display()),
            )
        })
}

struct SubstMount {
    drive: String,
}

impl SubstMount {
    fn release(&self) -> io::Result<()> {
        let mut command = Command::new("subst");
        command.arg(&self.drive).arg("/D");
        force_unmount::run_tool(command)
    }
}

impl NativeMount for SubstMount {
    fn unmount(&mut self) -> io::Result<()> {
        self.release()
    }

    // subst mappings never hold handles, so forcing is the same operation.
    fn unmount_forced(&mut self) -> io::Result<()> {
        self.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_token_is_normalised() {
        assert_eq!(drive_token(Path::new("x:\\")).unwrap(), "X:");
        assert_eq!(drive_token(Path::new("Z:")).unwrap(), "Z:");
        assert_eq!(
            drive_token(Path::new("/mnt/z")).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn declares_drive_letter_target() {
        let features = SubstProvider::new().supported_features();
        assert_eq!(features.mount_target(), Some(crate::MountTarget::DriveLetter));
        assert_eq!(SubstProvider::new().is_supported(), cfg!(windows));
    }
}
