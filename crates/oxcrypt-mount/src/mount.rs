//! Mounted filesystem handle and its lifecycle.
//!
//! # Lifecycle
//!
//! ```text
//!            unmount() / unmount_forced()
//!  Active ─────────────────────────────────▶ Unmounting ──success──▶ Unmounted
//!    ▲                                          │
//!    └──────────────── failure ─────────────────┘
//! ```
//!
//! 1. Created Active by [`MountBuilder::mount()`](crate::MountBuilder::mount)
//! 2. Filesystem is accessible at [`mountpoint()`](Mount::mountpoint)
//! 3. [`unmount()`](Mount::unmount) or [`unmount_forced()`](Mount::unmount_forced)
//!    detaches it; dropping an Active mount does the same on a best-effort basis
//!
//! Teardown is serialised by an internal state guard: exactly one caller runs
//! the native teardown and concurrent callers wait for it and receive its
//! outcome. A forced caller that waited on a failed graceful teardown runs
//! its own forced teardown instead. Calls after reaching Unmounted are no-ops.

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{UnmountError, UnsupportedFeature};
use crate::feature::MountFeature;
use crate::process_detection::{find_processes_using_mount, ProcessInfo};
use crate::provider::{MountRequest, NativeMount, Provider};

/// Lifecycle state of a [`Mount`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountState {
    /// Mounted and usable
    Active,
    /// A teardown is in progress
    Unmounting,
    /// Detached; terminal
    Unmounted,
}

impl fmt::Display for MountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MountState::Active => "active",
            MountState::Unmounting => "unmounting",
            MountState::Unmounted => "unmounted",
        };
        f.write_str(s)
    }
}

struct Inner {
    state: MountState,
    native: Option<Box<dyn NativeMount>>,
    completed_teardowns: u64,
    last_forced: bool,
    last_outcome: Result<(), UnmountError>,
}

/// A handle to a mounted filesystem
///
/// Exclusive owner of the native mount resource. `Send + Sync`, so it can be
/// shared (e.g. in an `Arc`) and unmounted from any thread.
pub struct Mount {
    provider: Provider,
    mountpoint: PathBuf,
    read_only: bool,
    port: Option<u16>,
    inner: Mutex<Inner>,
    teardown_done: Condvar,
}

impl Mount {
    pub(crate) fn new(provider: Provider, request: MountRequest, native: Box<dyn NativeMount>) -> Self {
        let mountpoint = native
            .mountpoint()
            .map_or(request.mountpoint, Path::to_path_buf);
        let port = native.port().or(request.port);
        Self {
            provider,
            mountpoint,
            read_only: request.read_only,
            port,
            inner: Mutex::new(Inner {
                state: MountState::Active,
                native: Some(native),
                completed_teardowns: 0,
                last_forced: false,
                last_outcome: Ok(()),
            }),
            teardown_done: Condvar::new(),
        }
    }

    /// Get the path where the filesystem is mounted
    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    /// The provider that created this mount
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Id of the provider that created this mount
    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    /// Display name of the provider that created this mount
    pub fn provider_name(&self) -> &str {
        self.provider.display_name()
    }

    /// Whether the filesystem was mounted read-only
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// TCP port the mechanism serves on, if it uses one
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Current lifecycle state
    pub fn state(&self) -> MountState {
        self.inner.lock().state
    }

    /// Whether the mount is still usable
    pub fn is_active(&self) -> bool {
        self.state() == MountState::Active
    }

    /// Processes holding files open under the mountpoint.
    ///
    /// Useful to explain an [`UnmountError::Busy`] to the user.
    pub fn blocking_processes(&self) -> Vec<ProcessInfo> {
        find_processes_using_mount(&self.mountpoint)
    }

    /// Gracefully unmount the filesystem.
    ///
    /// On failure (e.g. [`UnmountError::Busy`]) the mount stays Active and
    /// the call may be retried or escalated to
    /// [`unmount_forced`](Self::unmount_forced). No-op once Unmounted.
    pub fn unmount(&self) -> Result<(), UnmountError> {
        self.teardown(false)
    }

    /// Unmount the filesystem even if it is busy.
    ///
    /// Fails immediately with [`UnmountError::Unsupported`] if the provider
    /// does not declare [`MountFeature::UnmountForced`]. No-op once Unmounted.
    pub fn unmount_forced(&self) -> Result<(), UnmountError> {
        if !self.provider.supports_feature(MountFeature::UnmountForced) {
            return Err(UnsupportedFeature(MountFeature::UnmountForced).into());
        }
        self.teardown(true)
    }

    fn teardown(&self, forced: bool) -> Result<(), UnmountError> {
        let mut inner = self.inner.lock();
        loop {
            match inner.state {
                MountState::Unmounted => return Ok(()),
                MountState::Unmounting => {
                    let seen = inner.completed_teardowns;
                    self.teardown_done
                        .wait_while(&mut inner, |i| i.completed_teardowns == seen);
                    // A failed graceful teardown is not final for a forced caller.
                    if forced && !inner.last_forced && inner.state == MountState::Active {
                        continue;
                    }
                    return inner.last_outcome.clone();
                }
                MountState::Active => break,
            }
        }

        let Some(mut native) = inner.native.take() else {
            inner.state = MountState::Unmounted;
            return Ok(());
        };
        inner.state = MountState::Unmounting;
        drop(inner);

        info!(
            provider = self.provider_id(),
            mountpoint = %self.mountpoint.display(),
            forced,
            "Unmounting filesystem"
        );
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            if forced {
                native.unmount_forced()
            } else {
                native.unmount()
            }
        }))
        .unwrap_or_else(|_| Err(io::Error::other("native unmount panicked")));

        let mut inner = self.inner.lock();
        let outcome = match result {
            Ok(()) => {
                inner.state = MountState::Unmounted;
                info!(mountpoint = %self.mountpoint.display(), "Unmount successful");
                Ok(())
            }
            Err(e) => {
                warn!(mountpoint = %self.mountpoint.display(), forced, error = %e, "Unmount failed");
                inner.native = Some(native);
                inner.state = MountState::Active;
                Err(UnmountError::from_native(self.mountpoint.clone(), e))
            }
        };
        inner.completed_teardowns += 1;
        inner.last_forced = forced;
        inner.last_outcome = outcome.clone();
        drop(inner);
        self.teardown_done.notify_all();
        outcome
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        if self.inner.get_mut().state != MountState::Active {
            return;
        }
        debug!("Unmounting {} on drop", self.mountpoint.display());
        let Err(e) = self.unmount() else {
            return;
        };
        if self.provider.supports_feature(MountFeature::UnmountForced) {
            warn!("Graceful unmount on drop failed ({e}), forcing unmount");
            if let Err(e) = self.unmount_forced() {
                warn!("Forced unmount of {} on drop failed: {e}", self.mountpoint.display());
            }
        } else {
            warn!("Unmount of {} on drop failed: {e}", self.mountpoint.display());
        }
    }
}

impl fmt::Debug for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mount")
            .field("provider", &self.provider_id())
            .field("mountpoint", &self.mountpoint)
            .field("read_only", &self.read_only)
            .field("port", &self.port)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockProvider, MockState};
    use std::sync::Arc;

    fn mounted(features: &[MountFeature]) -> (Mount, Arc<MockState>) {
        let mock = MockProvider::new("mock")
            .with_features(features)
            .with_feature(MountFeature::MountToSystemChosenPath)
            .with_default_mountpoint("/mnt/mock");
        let state = mock.state();
        let mount = Provider::new(mock).for_file_system("/vault").mount().unwrap();
        (mount, state)
    }

    #[test]
    fn new_mount_is_active() {
        let (mount, state) = mounted(&[]);
        assert_eq!(mount.state(), MountState::Active);
        assert!(mount.is_active());
        assert_eq!(mount.mountpoint(), Path::new("/mnt/mock"));
        assert_eq!(mount.provider_id(), "mock");
        assert_eq!(state.attached(), 1);
    }

    #[test]
    fn unmount_reaches_unmounted() {
        let (mount, state) = mounted(&[]);
        mount.unmount().unwrap();
        assert_eq!(mount.state(), MountState::Unmounted);
        assert_eq!(state.unmount_calls(), 1);
        assert_eq!(state.attached(), 0);
    }

    #[test]
    fn second_unmount_is_noop() {
        let (mount, state) = mounted(&[MountFeature::UnmountForced]);
        mount.unmount().unwrap();
        mount.unmount().unwrap();
        mount.unmount_forced().unwrap();
        assert_eq!(mount.state(), MountState::Unmounted);
        assert_eq!(state.unmount_calls(), 1);
        assert_eq!(state.forced_unmount_calls(), 0);
    }

    #[test]
    fn busy_unmount_rolls_back_to_active() {
        let (mount, state) = mounted(&[]);
        state.set_busy(true);

        let err = mount.unmount().unwrap_err();
        assert!(err.is_busy());
        assert_eq!(mount.state(), MountState::Active);
        assert_eq!(state.attached(), 1);

        state.set_busy(false);
        mount.unmount().unwrap();
        assert_eq!(mount.state(), MountState::Unmounted);
    }

    #[test]
    fn forced_unmount_requires_feature() {
        let (mount, state) = mounted(&[]);
        let err = mount.unmount_forced().unwrap_err();
        assert!(matches!(
            err,
            UnmountError::Unsupported(UnsupportedFeature(MountFeature::UnmountForced))
        ));
        assert_eq!(mount.state(), MountState::Active);
        assert_eq!(state.forced_unmount_calls(), 0);
    }

    #[test]
    fn forced_unmount_ignores_busy() {
        let (mount, state) = mounted(&[MountFeature::UnmountForced]);
        state.set_busy(true);
        mount.unmount_forced().unwrap();
        assert_eq!(mount.state(), MountState::Unmounted);
        assert_eq!(state.attached(), 0);
    }

    #[test]
    fn drop_unmounts_active_mount() {
        let (mount, state) = mounted(&[]);
        drop(mount);
        assert_eq!(state.unmount_calls(), 1);
        assert_eq!(state.attached(), 0);
    }

    #[test]
    fn drop_escalates_to_forced_when_busy() {
        let (mount, state) = mounted(&[MountFeature::UnmountForced]);
        state.set_busy(true);
        drop(mount);
        assert_eq!(state.unmount_calls(), 1);
        assert_eq!(state.forced_unmount_calls(), 1);
        assert_eq!(state.attached(), 0);
    }

    #[test]
    fn drop_after_unmount_does_nothing() {
        let (mount, state) = mounted(&[]);
        mount.unmount().unwrap();
        drop(mount);
        assert_eq!(state.unmount_calls(), 1);
    }

    #[test]
    fn state_display() {
        assert_eq!(MountState::Unmounting.to_string(), "unmounting");
    }
}
