//! Error types for provider registration, mounting and unmounting.
//!
//! The taxonomy separates programmer errors from environmental ones:
//!
//! - [`UnsupportedFeature`] - a capability-gated call was made for a feature the
//!   provider never declared. Returned immediately by the offending call, and
//!   wrapped in [`MountError::Unsupported`] when propagated into a mount attempt.
//! - [`ConfigError`] - the builder's configuration can be rejected without touching
//!   the OS. Wrapped in [`MountError::Config`].
//! - [`MountError::Mount`] - the native mount operation itself failed.
//! - [`UnmountError`] - a teardown failed; the mount stays active.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::feature::{InvalidFeatureSet, MountFeature};

/// A capability-gated operation was called for an undeclared feature.
///
/// This is a usage error: the caller could have checked
/// `supports_feature` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} is not supported by this mount provider")]
pub struct UnsupportedFeature(pub MountFeature);

impl UnsupportedFeature {
    /// The feature that was not declared
    pub fn feature(&self) -> MountFeature {
        self.0
    }
}

/// Builder configuration rejected before any native mount attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No mountpoint was set and the provider cannot choose one
    #[error("no mountpoint set and the provider cannot choose one")]
    MissingMountpoint,

    /// The provider declared a system-chosen path but did not supply one
    #[error("the provider did not supply a default mountpoint for {0}")]
    NoDefaultMountpoint(String),

    /// The provider requires an existing directory
    #[error("mountpoint must be an existing directory: {}", .0.display())]
    NotAnExistingDirectory(PathBuf),

    /// The provider requires an empty directory
    #[error("mountpoint directory is not empty: {}", .0.display())]
    DirectoryNotEmpty(PathBuf),

    /// The provider requires a path that does not exist yet
    #[error("mountpoint must not exist yet: {}", .0.display())]
    MountpointExists(PathBuf),

    /// The parent of a to-be-created mountpoint is missing or not a directory
    #[error("parent of mountpoint must be an existing directory: {}", .0.display())]
    ParentNotADirectory(PathBuf),

    /// The provider requires a drive letter
    #[error("mountpoint must be a drive letter such as X: (got {})", .0.display())]
    NotADriveLetter(PathBuf),

    /// The mountpoint (or its parent) did not answer within the probe timeout
    #[error("mountpoint {} appears to be on a stale mount", .0.display())]
    StaleMountpoint(PathBuf),

    /// The mountpoint could not be inspected
    #[error("cannot inspect mountpoint {}: {reason}", .path.display())]
    Inaccessible {
        /// The path that failed to stat
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// The provider requires a volume id and none was set
    #[error("volume id is required by this provider but was not set")]
    MissingVolumeId,
}

/// Errors that can occur during mount operations
#[derive(Error, Debug)]
pub enum MountError {
    /// A capability-gated option was set for an undeclared feature
    #[error(transparent)]
    Unsupported(#[from] UnsupportedFeature),

    /// The configuration was rejected before any OS-level action
    #[error("Invalid mount configuration: {0}")]
    Config(#[from] ConfigError),

    /// OS-level mount operation failed
    #[error("Failed to mount: {0}")]
    Mount(#[from] io::Error),

    /// The requested provider is unknown or not supported on this system
    #[error("Provider not available: {0}")]
    ProviderUnavailable(String),
}

impl MountError {
    /// Whether the failure was detected without attempting a native mount.
    pub fn is_config_error(&self) -> bool {
        matches!(self, MountError::Config(_))
    }

    /// Whether the failure is a programmer error rather than an environmental one.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, MountError::Unsupported(_))
    }
}

/// Errors that can occur while tearing down a mount.
///
/// Cloneable so that every caller waiting on the same teardown receives
/// the same outcome.
#[derive(Error, Debug, Clone)]
pub enum UnmountError {
    /// Forced unmount requested on a provider that does not declare it
    #[error(transparent)]
    Unsupported(#[from] UnsupportedFeature),

    /// The filesystem is in use; the mount is still active
    #[error("Mountpoint {} is busy", .mountpoint.display())]
    Busy {
        /// Where the filesystem is mounted
        mountpoint: PathBuf,
        /// Native error reported by the mechanism
        source: Arc<io::Error>,
    },

    /// The native teardown failed; the mount is still active
    #[error("Unmount of {} failed: {source}", .mountpoint.display())]
    Failed {
        /// Where the filesystem is mounted
        mountpoint: PathBuf,
        /// Native error reported by the mechanism
        source: Arc<io::Error>,
    },
}

impl UnmountError {
    pub(crate) fn from_native(mountpoint: PathBuf, err: io::Error) -> Self {
        let source = Arc::new(err);
        if source.kind() == io::ErrorKind::ResourceBusy {
            UnmountError::Busy { mountpoint, source }
        } else {
            UnmountError::Failed { mountpoint, source }
        }
    }

    /// Whether the failure was caused by the filesystem being in use.
    pub fn is_busy(&self) -> bool {
        matches!(self, UnmountError::Busy { .. })
    }
}

/// A provider was rejected at registration time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The provider declares more than one mount-target kind
    #[error("Provider {id} declares an invalid feature set: {source}")]
    InvalidFeatures {
        /// Provider id
        id: String,
        /// Which tags conflict
        source: InvalidFeatureSet,
    },

    /// Another provider already uses this id
    #[error("A provider with id {0} is already registered")]
    DuplicateId(String),
}
