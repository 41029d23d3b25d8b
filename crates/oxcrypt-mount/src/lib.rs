//! Mount provider abstraction for exposing a vault's virtual filesystem.
//!
//! A vault is presented to the operating system through one of several
//! mounting mechanisms. This crate defines the contract every mechanism
//! implements and the lifecycle every caller relies on, so the rest of the
//! application can stay mechanism-agnostic.
//!
//! # Components
//!
//! ## Capabilities
//!
//! - [`MountFeature`] - One optional capability or constraint of a provider
//! - [`FeatureSet`] - The features a provider declares; at most one mount-target kind
//! - [`MountTarget`] - Where a provider allows its mountpoint to live
//!
//! ## Providers
//!
//! - [`MountProvider`] - Trait implemented by each mounting mechanism
//! - [`Provider`] - Cloneable handle enforcing the declared capability gates
//! - [`ProviderRegistry`] - Discovery and selection in preference order
//! - [`providers`] - Built-in providers (bind mount, `subst`, symbolic link)
//!
//! ## Mounting
//!
//! - [`MountBuilder`] - Collects and validates a mount configuration
//! - [`Mount`] - A live mount with a thread-safe unmount state machine
//!
//! # Lifecycle
//!
//! ```text
//! Provider::for_file_system ──► MountBuilder ──mount()──► Mount (Active)
//!                                                          │
//!                                     unmount / unmount_forced / drop
//!                                                          ▼
//!                                                   Unmounting ──► Unmounted
//!                                                          │
//!                                              (failure) ──┴──► Active
//! ```
//!
//! Capability-gated calls on an undeclared feature fail immediately with
//! [`UnsupportedFeature`]. Configuration problems are detected in
//! [`MountBuilder::mount`] before the mechanism is invoked.
//!
//! # Example
//!
//! ```
//! use oxcrypt_mount::testing::MockProvider;
//! use oxcrypt_mount::{MountFeature, ProviderRegistry};
//!
//! let mut registry = ProviderRegistry::new();
//! registry.register(
//!     MockProvider::new("mock")
//!         .with_features(&[MountFeature::MountToSystemChosenPath, MountFeature::ReadOnly])
//!         .with_default_mountpoint("/run/vaults/mock"),
//! )?;
//!
//! let provider = registry.first_available()?;
//! let mut builder = provider.for_file_system("/srv/vault");
//! builder.set_read_only(true)?;
//! let mount = builder.mount()?;
//! assert!(mount.is_active());
//!
//! mount.unmount()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod builder;
mod error;
mod feature;
pub mod force_unmount;
mod mount;
mod mount_utils;
mod process_detection;
mod provider;
pub mod providers;
mod registry;

pub use builder::MountBuilder;
pub use error::{ConfigError, MountError, RegistryError, UnmountError, UnsupportedFeature};
pub use feature::{FeatureSet, InvalidFeatureSet, MountFeature, MountTarget};
pub use mount::{Mount, MountState};
pub use mount_utils::{
    check_mountpoint_status, is_directory_empty, is_path_accessible, parse_drive_letter,
    validate_mountpoint, MountPointStatus, DEFAULT_ACCESS_TIMEOUT,
};
pub use process_detection::{find_processes_using_mount, ProcessInfo};
pub use provider::{MountProvider, MountRequest, NativeMount, Provider};
pub use registry::{ProviderInfo, ProviderRegistry};

/// Testing utilities for code built on mount providers.
///
/// Provides an in-process [`testing::MockProvider`] with configurable
/// features, call counters and simulated failures.
pub mod testing;
