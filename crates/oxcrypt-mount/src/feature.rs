//! Capability tags a mount provider can declare.
//!
//! Callers negotiate configuration by checking a provider's [`FeatureSet`]
//! before calling any capability-gated builder setter or provider accessor.
//!
//! The four mount-target tags ([`MountFeature::MountToExistingDir`],
//! [`MountFeature::MountWithinExistingParent`], [`MountFeature::MountAsDriveLetter`],
//! [`MountFeature::MountToSystemChosenPath`]) describe where a mountpoint may
//! live. A provider declares at most one of them; [`FeatureSet::validate`]
//! enforces this when the provider is registered.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single capability a mount mechanism may support or require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MountFeature {
    /// The provider has default mount flags and the builder accepts custom ones.
    MountFlags,
    /// The mountpoint must be an existing, empty directory.
    MountToExistingDir,
    /// The mountpoint must be a non-existing child of an existing directory.
    MountWithinExistingParent,
    /// The mountpoint is a drive letter such as `X:`.
    MountAsDriveLetter,
    /// The provider picks a mountpoint when none is set.
    MountToSystemChosenPath,
    /// The mechanism listens on a TCP port (fixed, or 0 for system-assigned).
    Port,
    /// The builder can mount the filesystem read-only.
    ReadOnly,
    /// The mount can be torn down even while resources are busy.
    UnmountForced,
    /// The builder requires a volume identifier.
    VolumeId,
}

impl MountFeature {
    /// Every feature, in declaration order.
    pub const ALL: [MountFeature; 9] = [
        MountFeature::MountFlags,
        MountFeature::MountToExistingDir,
        MountFeature::MountWithinExistingParent,
        MountFeature::MountAsDriveLetter,
        MountFeature::MountToSystemChosenPath,
        MountFeature::Port,
        MountFeature::ReadOnly,
        MountFeature::UnmountForced,
        MountFeature::VolumeId,
    ];

    /// The mutually exclusive mount-target tags.
    pub const MOUNT_TARGETS: [MountFeature; 4] = [
        MountFeature::MountToExistingDir,
        MountFeature::MountWithinExistingParent,
        MountFeature::MountAsDriveLetter,
        MountFeature::MountToSystemChosenPath,
    ];

    /// Get the display name for UI presentation
    pub fn display_name(self) -> &'static str {
        match self {
            MountFeature::MountFlags => "mount flags",
            MountFeature::MountToExistingDir => "mount to existing directory",
            MountFeature::MountWithinExistingParent => "mount within existing parent",
            MountFeature::MountAsDriveLetter => "mount as drive letter",
            MountFeature::MountToSystemChosenPath => "system-chosen mountpoint",
            MountFeature::Port => "TCP port",
            MountFeature::ReadOnly => "read-only",
            MountFeature::UnmountForced => "forced unmount",
            MountFeature::VolumeId => "volume id",
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for MountFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Where a provider allows its mountpoint to live, derived from a [`FeatureSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountTarget {
    /// An existing, empty directory.
    ExistingDir,
    /// A path that does not exist yet, inside a directory that does.
    WithinExistingParent,
    /// A drive letter token.
    DriveLetter,
    /// Chosen by the mechanism when the caller sets nothing.
    SystemChosenPath,
}

impl MountTarget {
    /// The feature tag that declares this target kind.
    pub fn feature(self) -> MountFeature {
        match self {
            MountTarget::ExistingDir => MountFeature::MountToExistingDir,
            MountTarget::WithinExistingParent => MountFeature::MountWithinExistingParent,
            MountTarget::DriveLetter => MountFeature::MountAsDriveLetter,
            MountTarget::SystemChosenPath => MountFeature::MountToSystemChosenPath,
        }
    }
}

/// A feature set declares more than one mount-target kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("conflicting mount targets declared: {conflicting}")]
pub struct InvalidFeatureSet {
    /// The mount-target tags that were declared together
    pub conflicting: FeatureSet,
}

/// A closed set of [`MountFeature`]s.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<MountFeature>", into = "Vec<MountFeature>")]
pub struct FeatureSet(u16);

impl FeatureSet {
    /// A set with no features.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build a set from a slice of features.
    pub fn of(features: &[MountFeature]) -> Self {
        features.iter().copied().collect()
    }

    /// Return a copy of this set with `feature` added.
    #[must_use]
    pub fn with(self, feature: MountFeature) -> Self {
        Self(self.0 | feature.bit())
    }

    /// Return a copy of this set with `feature` removed.
    #[must_use]
    pub fn without(self, feature: MountFeature) -> Self {
        Self(self.0 & !feature.bit())
    }

    /// Whether `feature` is in this set.
    pub fn contains(self, feature: MountFeature) -> bool {
        self.0 & feature.bit() != 0
    }

    /// Whether no feature is declared.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of declared features.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate over the contained features in declaration order.
    pub fn iter(self) -> impl Iterator<Item = MountFeature> {
        MountFeature::ALL
            .into_iter()
            .filter(move |f| self.contains(*f))
    }

    /// The declared mount-target kind, if exactly one is declared.
    ///
    /// Returns `None` both when no target kind is declared and when the
    /// set is invalid; call [`validate`](Self::validate) to tell them apart.
    pub fn mount_target(self) -> Option<MountTarget> {
        let mut targets = self.targets();
        let first = targets.next()?;
        if targets.next().is_some() {
            return None;
        }
        Some(match first {
            MountFeature::MountToExistingDir => MountTarget::ExistingDir,
            MountFeature::MountWithinExistingParent => MountTarget::WithinExistingParent,
            MountFeature::MountAsDriveLetter => MountTarget::DriveLetter,
            _ => MountTarget::SystemChosenPath,
        })
    }

    /// Check that at most one mount-target kind is declared.
    pub fn validate(self) -> Result<(), InvalidFeatureSet> {
        let conflicting: FeatureSet = self.targets().collect();
        if conflicting.len() > 1 {
            return Err(InvalidFeatureSet { conflicting });
        }
        Ok(())
    }

    fn targets(self) -> impl Iterator<Item = MountFeature> {
        MountFeature::MOUNT_TARGETS
            .into_iter()
            .filter(move |f| self.contains(*f))
    }
}

impl FromIterator<MountFeature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = MountFeature>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl From<Vec<MountFeature>> for FeatureSet {
    fn from(features: Vec<MountFeature>) -> Self {
        features.into_iter().collect()
    }
}

impl From<FeatureSet> for Vec<MountFeature> {
    fn from(set: FeatureSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(MountFeature::display_name).collect();
        f.write_str(&names.join(", "))
    }
}
