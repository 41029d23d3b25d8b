//! Testing utilities for code built on mount providers.
//!
//! [`MockProvider`] is an in-process provider whose native mounts only
//! update counters in a shared [`MockState`]. It lets tests drive the full
//! builder and lifecycle logic without touching the OS:
//!
//! - configurable feature set and mechanism defaults, recording the mount
//!   names the builder asks them for
//! - togglable support check (including a panicking one)
//! - injectable native mount failures
//! - a simulated busy filesystem that fails graceful unmounts
//! - an optional teardown delay to widen race windows in concurrency tests

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::feature::{FeatureSet, MountFeature};
use crate::provider::{MountProvider, MountRequest, NativeMount};

/// Observable state shared between a [`MockProvider`] and its mounts.
#[derive(Debug, Default)]
pub struct MockState {
    supported: AtomicBool,
    busy: AtomicBool,
    mount_calls: AtomicUsize,
    unmount_calls: AtomicUsize,
    forced_unmount_calls: AtomicUsize,
    attached: AtomicUsize,
    in_teardown: AtomicUsize,
    max_concurrent_teardowns: AtomicUsize,
    teardown_delay: Mutex<Duration>,
    last_request: Mutex<Option<MountRequest>>,
    default_name_queries: Mutex<Vec<String>>,
}

impl MockState {
    /// Change the result of the provider's support check.
    pub fn set_supported(&self, supported: bool) {
        self.supported.store(supported, Ordering::SeqCst);
    }

    /// Make graceful unmounts fail with [`io::ErrorKind::ResourceBusy`].
    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    /// Delay every native teardown by `delay`.
    pub fn set_teardown_delay(&self, delay: Duration) {
        *self.teardown_delay.lock() = delay;
    }

    /// Number of native mount attempts
    pub fn mount_calls(&self) -> usize {
        self.mount_calls.load(Ordering::SeqCst)
    }

    /// Number of graceful native unmount attempts
    pub fn unmount_calls(&self) -> usize {
        self.unmount_calls.load(Ordering::SeqCst)
    }

    /// Number of forced native unmount attempts
    pub fn forced_unmount_calls(&self) -> usize {
        self.forced_unmount_calls.load(Ordering::SeqCst)
    }

    /// Total native teardown attempts, graceful and forced
    pub fn teardown_calls(&self) -> usize {
        self.unmount_calls() + self.forced_unmount_calls()
    }

    /// Number of currently attached native mounts
    pub fn attached(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }

    /// Highest number of native teardowns observed running at once
    pub fn max_concurrent_teardowns(&self) -> usize {
        self.max_concurrent_teardowns.load(Ordering::SeqCst)
    }

    /// The request passed to the most recent native mount
    pub fn last_request(&self) -> Option<MountRequest> {
        self.last_request.lock().clone()
    }

    /// Mount names the builder passed to the provider's default hooks, in order
    pub fn default_name_queries(&self) -> Vec<String> {
        self.default_name_queries.lock().clone()
    }

    fn enter_teardown(&self) {
        let running = self.in_teardown.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_teardowns.fetch_max(running, Ordering::SeqCst);
        let delay = *self.teardown_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    fn leave_teardown(&self) {
        self.in_teardown.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An in-process [`MountProvider`] for tests.
#[derive(Debug)]
pub struct MockProvider {
    id: String,
    name: String,
    features: FeatureSet,
    default_flags: Option<String>,
    default_port: Option<u16>,
    default_mountpoint: Option<PathBuf>,
    mount_failure: Option<io::ErrorKind>,
    panic_on_check: bool,
    state: Arc<MockState>,
}

impl MockProvider {
    /// A supported provider with no features.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let state = MockState::default();
        state.set_supported(true);
        Self {
            name: format!("Mock ({id})"),
            id,
            features: FeatureSet::empty(),
            default_flags: None,
            default_port: None,
            default_mountpoint: None,
            mount_failure: None,
            panic_on_check: false,
            state: Arc::new(state),
        }
    }

    /// Replace the declared feature set.
    #[must_use]
    pub fn with_features(mut self, features: &[MountFeature]) -> Self {
        self.features = FeatureSet::of(features);
        self
    }

    /// Add one declared feature.
    #[must_use]
    pub fn with_feature(mut self, feature: MountFeature) -> Self {
        self.features = self.features.with(feature);
        self
    }

    /// Mechanism default flags (consulted only if MOUNT_FLAGS is declared).
    #[must_use]
    pub fn with_default_flags(mut self, flags: impl Into<String>) -> Self {
        self.default_flags = Some(flags.into());
        self
    }

    /// Mechanism default port (consulted only if PORT is declared).
    #[must_use]
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = Some(port);
        self
    }

    /// Mechanism-chosen mountpoint (consulted only if MOUNT_TO_SYSTEM_CHOSEN_PATH is declared).
    #[must_use]
    pub fn with_default_mountpoint(mut self, mountpoint: impl Into<PathBuf>) -> Self {
        self.default_mountpoint = Some(mountpoint.into());
        self
    }

    /// Make every native mount fail with `kind`.
    #[must_use]
    pub fn failing_mount(mut self, kind: io::ErrorKind) -> Self {
        self.mount_failure = Some(kind);
        self
    }

    /// Report the provider as unsupported.
    #[must_use]
    pub fn unsupported(self) -> Self {
        self.state.set_supported(false);
        self
    }

    /// Make the support check panic.
    #[must_use]
    pub fn panicking_support_check(mut self) -> Self {
        self.panic_on_check = true;
        self
    }

    /// Shared state for assertions; keep a clone before handing the provider off.
    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }
}

impl MountProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "In-process provider for tests"
    }

    fn is_supported(&self) -> bool {
        if self.panic_on_check {
            panic!("support check exploded");
        }
        self.state.supported.load(Ordering::SeqCst)
    }

    fn supported_features(&self) -> FeatureSet {
        self.features
    }

    fn default_mount_flags(&self, mount_name: &str) -> Option<String> {
        self.state.default_name_queries.lock().push(mount_name.to_string());
        self.default_flags.clone()
    }

    fn default_port(&self) -> Option<u16> {
        self.default_port
    }

    fn default_mountpoint(&self, mount_name: &str) -> Option<PathBuf> {
        self.state.default_name_queries.lock().push(mount_name.to_string());
        self.default_mountpoint.clone()
    }

    fn mount_native(&self, request: &MountRequest) -> io::Result<Box<dyn NativeMount>> {
        self.state.mount_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.last_request.lock() = Some(request.clone());
        if let Some(kind) = self.mount_failure {
            return Err(io::Error::new(kind, "simulated mount failure"));
        }
        self.state.attached.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockMount {
            state: Arc::clone(&self.state),
            attached: true,
        }))
    }
}

struct MockMount {
    state: Arc<MockState>,
    attached: bool,
}

impl MockMount {
    fn detach(&mut self) {
        if self.attached {
            self.attached = false;
            self.state.attached.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl NativeMount for MockMount {
    fn unmount(&mut self) -> io::Result<()> {
        self.state.unmount_calls.fetch_add(1, Ordering::SeqCst);
        self.state.enter_teardown();
        let result = if self.state.busy.load(Ordering::SeqCst) {
            Err(io::Error::new(io::ErrorKind::ResourceBusy, "simulated busy filesystem"))
        } else {
            self.detach();
            Ok(())
        };
        self.state.leave_teardown();
        result
    }

    fn unmount_forced(&mut self) -> io::Result<()> {
        self.state.forced_unmount_calls.fetch_add(1, Ordering::SeqCst);
        self.state.enter_teardown();
        self.detach();
        self.state.leave_teardown();
        Ok(())
    }
}
