//! Mount provider abstraction
//!
//! A [`MountProvider`] represents one mounting mechanism (bind mount, drive
//! letter mapping, loopback server, ...). Implementations supply the
//! mechanism-specific hooks; callers never talk to them directly but go
//! through the [`Provider`] handle, which enforces the capability gates
//! declared by [`MountProvider::supported_features`].
//!
//! # Architecture
//!
//! - [`MountProvider`]: implementor-facing trait (support check, features,
//!   mechanism defaults, native mount)
//! - [`NativeMount`]: the native resource produced by a successful mount
//! - [`Provider`]: caller-facing, cloneable handle with gated accessors and
//!   the [`for_file_system`](Provider::for_file_system) builder factory

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builder::MountBuilder;
use crate::error::UnsupportedFeature;
use crate::feature::{FeatureSet, MountFeature};

/// Effective mount configuration handed to [`MountProvider::mount_native`].
///
/// Built by [`MountBuilder::mount`] after all validation has passed, so
/// implementations can rely on it matching their declared features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    /// Root of the virtual filesystem to expose
    pub root: PathBuf,
    /// Resolved mountpoint (explicit or provider-chosen)
    pub mountpoint: PathBuf,
    /// Name of the mount as shown by the OS
    pub mount_name: String,
    /// Mechanism-specific flags, only present if MOUNT_FLAGS is declared
    pub mount_flags: Option<String>,
    /// Whether to mount read-only
    pub read_only: bool,
    /// TCP port, only present if PORT is declared (0 = system-assigned)
    pub port: Option<u16>,
    /// Volume identifier, only present if VOLUME_ID is declared
    pub volume_id: Option<String>,
}

/// An attached native mount resource.
///
/// Owned exclusively by a [`Mount`](crate::Mount); nothing else may detach it.
pub trait NativeMount: Send {
    /// Gracefully detach the filesystem.
    ///
    /// Report a busy filesystem with [`io::ErrorKind::ResourceBusy`]. On error
    /// the resource must still be attached and usable.
    fn unmount(&mut self) -> io::Result<()>;

    /// Detach the filesystem even if it is in use.
    ///
    /// Only called when the provider declares [`MountFeature::UnmountForced`].
    fn unmount_forced(&mut self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "forced unmount is not implemented by this mechanism",
        ))
    }

    /// Where the mechanism actually exposed the filesystem, if it differs
    /// from the requested mountpoint.
    fn mountpoint(&self) -> Option<&Path> {
        None
    }

    /// The port actually bound, if the mechanism assigned one.
    fn port(&self) -> Option<u16> {
        None
    }
}

/// A mechanism that can mount a virtual filesystem root.
///
/// # Thread Safety
///
/// Providers must be `Send + Sync`. [`is_supported`](Self::is_supported) may
/// be called concurrently from any thread and must not block.
pub trait MountProvider: Send + Sync {
    /// Unique identifier for this provider
    ///
    /// Used for configuration and serialization. Examples: "bind", "subst"
    fn id(&self) -> &str;

    /// Human-readable name for this provider
    fn display_name(&self) -> &str;

    /// Get a brief description of this provider
    fn description(&self) -> &str {
        ""
    }

    /// Check if this provider can be used in the current OS environment.
    ///
    /// Must return fast, in constant time, and without side effects. Return
    /// `false` on any doubt rather than failing.
    fn is_supported(&self) -> bool;

    /// Features declared by this provider.
    fn supported_features(&self) -> FeatureSet;

    /// Tests whether this provider supports the given feature.
    fn supports_feature(&self, feature: MountFeature) -> bool {
        self.supported_features().contains(feature)
    }

    /// Default mount flags for a mount named `mount_name`.
    ///
    /// Only consulted when [`MountFeature::MountFlags`] is declared. `None`
    /// means no flags.
    fn default_mount_flags(&self, _mount_name: &str) -> Option<String> {
        None
    }

    /// Default TCP port. Only consulted when [`MountFeature::Port`] is declared.
    ///
    /// `None` is treated as 0 (system-assigned).
    fn default_port(&self) -> Option<u16> {
        None
    }

    /// Mountpoint chosen by the mechanism when the caller sets none.
    ///
    /// Only consulted when [`MountFeature::MountToSystemChosenPath`] is declared.
    fn default_mountpoint(&self, _mount_name: &str) -> Option<PathBuf> {
        None
    }

    /// Perform the platform-specific mount.
    ///
    /// Either returns an attached resource or fails with nothing left
    /// attached.
    fn mount_native(&self, request: &MountRequest) -> io::Result<Box<dyn NativeMount>>;
}

/// Caller-facing handle to a registered [`MountProvider`].
///
/// Cheap to clone. All capability-gated accessors fail with
/// [`UnsupportedFeature`] when the feature is not declared, regardless of
/// what the underlying implementation would return.
#[derive(Clone)]
pub struct Provider {
    inner: Arc<dyn MountProvider>,
}

impl Provider {
    /// Wrap a provider implementation.
    pub fn new(provider: impl MountProvider + 'static) -> Self {
        Self {
            inner: Arc::new(provider),
        }
    }

    /// Wrap a shared provider implementation.
    pub fn from_arc(provider: Arc<dyn MountProvider>) -> Self {
        Self { inner: provider }
    }

    /// Unique identifier of the provider
    pub fn id(&self) -> &str {
        self.inner.id()
    }

    /// Human-readable name of the provider
    pub fn display_name(&self) -> &str {
        self.inner.display_name()
    }

    /// Brief description of the provider
    pub fn description(&self) -> &str {
        self.inner.description()
    }

    /// Whether the provider can be used right now.
    ///
    /// A panicking support check counts as "not supported".
    pub fn is_supported(&self) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| self.inner.is_supported())) {
            Ok(supported) => supported,
            Err(_) => {
                tracing::debug!(provider = self.id(), "Support check panicked, treating as unsupported");
                false
            }
        }
    }

    /// Features declared by the provider
    pub fn supported_features(&self) -> FeatureSet {
        self.inner.supported_features()
    }

    /// Whether the provider declares `feature`
    pub fn supports_feature(&self, feature: MountFeature) -> bool {
        self.supported_features().contains(feature)
    }

    /// Default mount flags for a mount named `mount_name`. May be empty.
    pub fn default_mount_flags(&self, mount_name: &str) -> Result<String, UnsupportedFeature> {
        self.require(MountFeature::MountFlags)?;
        Ok(self.native_default_mount_flags(mount_name))
    }

    /// Default TCP port, 0 meaning system-assigned.
    pub fn default_port(&self) -> Result<u16, UnsupportedFeature> {
        self.require(MountFeature::Port)?;
        Ok(self.native_default_port())
    }

    /// Mountpoint the provider would choose for a mount named `mount_name`.
    pub fn default_mountpoint(&self, mount_name: &str) -> Result<Option<PathBuf>, UnsupportedFeature> {
        self.require(MountFeature::MountToSystemChosenPath)?;
        Ok(self.inner.default_mountpoint(mount_name))
    }

    /// Create a new mount builder for the virtual filesystem at `root`.
    ///
    /// `root` must stay valid for the whole lifetime of the resulting mount.
    pub fn for_file_system(&self, root: impl Into<PathBuf>) -> MountBuilder {
        MountBuilder::new(self.clone(), root.into())
    }

    pub(crate) fn require(&self, feature: MountFeature) -> Result<(), UnsupportedFeature> {
        if self.supports_feature(feature) {
            Ok(())
        } else {
            Err(UnsupportedFeature(feature))
        }
    }

    pub(crate) fn native_default_mount_flags(&self, mount_name: &str) -> String {
        self.inner.default_mount_flags(mount_name).unwrap_or_default()
    }

    pub(crate) fn native_default_port(&self) -> u16 {
        self.inner.default_port().unwrap_or(0)
    }

    pub(crate) fn implementation(&self) -> &dyn MountProvider {
        self.inner.as_ref()
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id())
            .field("name", &self.display_name())
            .field("features", &self.supported_features())
            .finish()
    }
}

impl<P: MountProvider + 'static> From<P> for Provider {
    fn from(provider: P) -> Self {
        Self::new(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;

    #[test]
    fn gated_accessors_reject_undeclared_features() {
        let provider = Provider::new(
            MockProvider::new("plain")
                .with_default_flags("uid=1000")
                .with_default_port(8080),
        );

        assert_eq!(
            provider.default_mount_flags("vault"),
            Err(UnsupportedFeature(MountFeature::MountFlags))
        );
        assert_eq!(
            provider.default_port(),
            Err(UnsupportedFeature(MountFeature::Port))
        );
        assert_eq!(
            provider.default_mountpoint("vault"),
            Err(UnsupportedFeature(MountFeature::MountToSystemChosenPath))
        );
    }

    #[test]
    fn declared_defaults_fall_back_when_absent() {
        let provider = Provider::new(
            MockProvider::new("net").with_features(&[MountFeature::Port, MountFeature::MountFlags]),
        );
        assert_eq!(provider.default_port(), Ok(0));
        assert_eq!(provider.default_mount_flags("vault"), Ok(String::new()));
    }

    #[test]
    fn declared_defaults_are_returned() {
        let provider = Provider::new(
            MockProvider::new("net")
                .with_features(&[MountFeature::Port, MountFeature::MountFlags])
                .with_default_port(42427)
                .with_default_flags("volname=vault"),
        );
        assert_eq!(provider.default_port(), Ok(42427));
        assert_eq!(provider.default_mount_flags("vault").as_deref(), Ok("volname=vault"));
    }

    #[test]
    fn supports_feature_derives_from_feature_set() {
        let provider = Provider::new(
            MockProvider::new("ro").with_features(&[MountFeature::ReadOnly]),
        );
        assert!(provider.supports_feature(MountFeature::ReadOnly));
        assert!(!provider.supports_feature(MountFeature::UnmountForced));
    }

    #[test]
    fn panicking_support_check_is_unsupported() {
        let provider = Provider::new(MockProvider::new("broken").panicking_support_check());
        assert!(!provider.is_supported());
    }
}
