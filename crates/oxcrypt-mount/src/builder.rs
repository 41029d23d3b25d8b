//! Mount configuration builder.
//!
//! A [`MountBuilder`] is bound to one provider and one virtual filesystem
//! root. Capability-gated setters fail immediately with
//! [`UnsupportedFeature`]; everything that depends on the combination of
//! options, or on the state of the filesystem, is checked by
//! [`MountBuilder::mount`] before the provider is asked to do any native
//! work.
//!
//! # Example
//!
//! ```ignore
//! let mut builder = provider.for_file_system("/run/oxcrypt/vault-root");
//! builder.set_mountpoint("/mnt/vault");
//! if provider.supports_feature(MountFeature::ReadOnly) {
//!     builder.set_read_only(true)?;
//! }
//! let mount = builder.mount()?;
//! ```

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{ConfigError, MountError, UnsupportedFeature};
use crate::feature::{FeatureSet, MountFeature};
use crate::mount::Mount;
use crate::mount_utils::{validate_mountpoint, DEFAULT_ACCESS_TIMEOUT};
use crate::provider::{MountRequest, Provider};

/// Fallback mount name when nothing better is known
const DEFAULT_MOUNT_NAME: &str = "vault";

/// Accumulates mount options for a single [`mount`](Self::mount) call.
///
/// Setters can be called in any order. Not synchronised: configure from
/// one thread.
#[derive(Debug)]
pub struct MountBuilder {
    provider: Provider,
    root: PathBuf,
    mountpoint: Option<PathBuf>,
    mount_flags: Option<String>,
    read_only: Option<bool>,
    port: Option<u16>,
    volume_id: Option<String>,
    volume_name: Option<String>,
}

impl MountBuilder {
    pub(crate) fn new(provider: Provider, root: PathBuf) -> Self {
        Self {
            provider,
            root,
            mountpoint: None,
            mount_flags: None,
            read_only: None,
            port: None,
            volume_id: None,
            volume_name: None,
        }
    }

    /// The provider this builder mounts with
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Root of the virtual filesystem to expose
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sets the mount point.
    ///
    /// Always allowed. Whether the path is legal for the provider (existing
    /// empty directory, missing child of an existing directory, drive letter)
    /// is checked by [`mount`](Self::mount).
    pub fn set_mountpoint(&mut self, mountpoint: impl Into<PathBuf>) -> &mut Self {
        self.mountpoint = Some(mountpoint.into());
        self
    }

    /// Sets mechanism-specific mount flags, replacing the provider defaults.
    pub fn set_mount_flags(
        &mut self,
        mount_flags: impl Into<String>,
    ) -> Result<&mut Self, UnsupportedFeature> {
        self.provider.require(MountFeature::MountFlags)?;
        self.mount_flags = Some(mount_flags.into());
        Ok(self)
    }

    /// Instructs the mount to be read-only.
    pub fn set_read_only(&mut self, read_only: bool) -> Result<&mut Self, UnsupportedFeature> {
        self.provider.require(MountFeature::ReadOnly)?;
        self.read_only = Some(read_only);
        Ok(self)
    }

    /// Use the given TCP port, or 0 for a system-assigned one.
    pub fn set_port(&mut self, port: u16) -> Result<&mut Self, UnsupportedFeature> {
        self.provider.require(MountFeature::Port)?;
        self.port = Some(port);
        Ok(self)
    }

    /// Sets the volume identifier. Required before mounting if the provider
    /// declares [`MountFeature::VolumeId`].
    pub fn set_volume_id(
        &mut self,
        volume_id: impl Into<String>,
    ) -> Result<&mut Self, UnsupportedFeature> {
        self.provider.require(MountFeature::VolumeId)?;
        self.volume_id = Some(volume_id.into());
        Ok(self)
    }

    /// Sets the name the OS shows for the mount.
    pub fn set_volume_name(&mut self, volume_name: impl Into<String>) -> &mut Self {
        self.volume_name = Some(volume_name.into());
        self
    }

    /// Name of the mount as passed to the provider's defaults.
    ///
    /// In order of preference: volume name, volume id, the root's final
    /// path component, `"vault"`.
    pub fn mount_name(&self) -> String {
        self.volume_name
            .clone()
            .or_else(|| self.volume_id.clone())
            .or_else(|| {
                self.root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| DEFAULT_MOUNT_NAME.to_string())
    }

    /// Validate the configuration and mount the filesystem.
    ///
    /// Validation order:
    /// 1. resolve the mountpoint (explicit, else provider-chosen if declared)
    /// 2. check an explicit mountpoint against the provider's target kind
    /// 3. check that a required volume id is present
    ///
    /// Only then is the native mount attempted. On failure nothing stays
    /// attached and no [`Mount`] is returned.
    ///
    /// May block on native work; run it off any latency-sensitive thread.
    pub fn mount(self) -> Result<Mount, MountError> {
        let features = self.provider.supported_features();
        let mount_name = self.mount_name();

        let mountpoint = self.resolve_mountpoint(features, &mount_name)?;

        if features.contains(MountFeature::VolumeId) && self.volume_id.is_none() {
            return Err(ConfigError::MissingVolumeId.into());
        }

        let mount_flags = match self.mount_flags {
            Some(flags) => Some(flags),
            None if features.contains(MountFeature::MountFlags) => {
                Some(self.provider.native_default_mount_flags(&mount_name))
            }
            None => None,
        };
        let port = match self.port {
            Some(port) => Some(port),
            None if features.contains(MountFeature::Port) => {
                Some(self.provider.native_default_port())
            }
            None => None,
        };

        let request = MountRequest {
            root: self.root,
            mountpoint,
            mount_name,
            mount_flags,
            read_only: self.read_only.unwrap_or(false),
            port,
            volume_id: self.volume_id,
        };

        info!(
            provider = self.provider.id(),
            root = %request.root.display(),
            mountpoint = %request.mountpoint.display(),
            read_only = request.read_only,
            "Mounting filesystem"
        );

        let native = match self.provider.implementation().mount_native(&request) {
            Ok(native) => native,
            Err(e) => {
                warn!(
                    provider = self.provider.id(),
                    mountpoint = %request.mountpoint.display(),
                    error = %e,
                    "Native mount failed"
                );
                return Err(MountError::Mount(e));
            }
        };

        let mount = Mount::new(self.provider, request, native);
        info!(
            provider = mount.provider_id(),
            mountpoint = %mount.mountpoint().display(),
            "Mount active"
        );
        Ok(mount)
    }

    fn resolve_mountpoint(
        &self,
        features: FeatureSet,
        mount_name: &str,
    ) -> Result<PathBuf, ConfigError> {
        if let Some(mountpoint) = &self.mountpoint {
            if let Some(target) = features.mount_target() {
                validate_mountpoint(target, mountpoint, DEFAULT_ACCESS_TIMEOUT)?;
            }
            return Ok(mountpoint.clone());
        }

        if !features.contains(MountFeature::MountToSystemChosenPath) {
            return Err(ConfigError::MissingMountpoint);
        }
        self.provider
            .implementation()
            .default_mountpoint(mount_name)
            .ok_or_else(|| ConfigError::NoDefaultMountpoint(mount_name.to_string()))
    }
}
