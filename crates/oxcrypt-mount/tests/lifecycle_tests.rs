//! End-to-end mount lifecycle tests driven through the in-process mock provider.
//!
//! Covers builder validation, capability gates, the unmount state machine
//! and registry discovery without touching the OS.
//!
//! Run: `cargo nextest run -p oxcrypt-mount --test lifecycle_tests`

use std::io;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use oxcrypt_mount::testing::MockProvider;
use oxcrypt_mount::{
    ConfigError, MountError, MountFeature, MountState, Provider, ProviderRegistry, UnmountError,
    UnsupportedFeature,
};
use tempfile::TempDir;

fn system_chosen(mock: MockProvider) -> MockProvider {
    mock.with_feature(MountFeature::MountToSystemChosenPath)
        .with_default_mountpoint("/run/vaults/mock")
}

// =============================================================================
// Builder scenarios
// =============================================================================

#[test]
fn test_default_mount_flags_used_when_unset() {
    let mock = system_chosen(
        MockProvider::new("flags")
            .with_feature(MountFeature::MountFlags)
            .with_default_flags("uid=1000,gid=1000"),
    );
    let state = mock.state();
    let provider = Provider::new(mock);

    let mount = provider.for_file_system("/srv/vault").mount().unwrap();

    let request = state.last_request().unwrap();
    assert_eq!(request.mount_flags.as_deref(), Some("uid=1000,gid=1000"));
    assert_eq!(request.mountpoint.to_str(), Some("/run/vaults/mock"));
    assert_eq!(mount.state(), MountState::Active);
}

/// Mount a named provider and return the names its default hooks were asked for.
fn default_hook_names(root: &str, volume_name: Option<&str>, volume_id: Option<&str>) -> Vec<String> {
    let mock = system_chosen(
        MockProvider::new("named")
            .with_features(&[MountFeature::MountFlags, MountFeature::VolumeId])
            .with_default_flags("uid=1000"),
    );
    let state = mock.state();
    let mut builder = Provider::new(mock).for_file_system(root);
    if let Some(name) = volume_name {
        builder.set_volume_name(name);
    }
    if let Some(id) = volume_id {
        builder.set_volume_id(id).unwrap();
    }
    let _mount = builder.mount().unwrap();

    let names = state.default_name_queries();
    assert_eq!(state.last_request().unwrap().mount_name, names[0]);
    names
}

#[test]
fn test_default_hooks_receive_mount_name() {
    assert_eq!(
        default_hook_names("/srv/vault", Some("Work Vault"), Some("a1b2")),
        ["Work Vault", "Work Vault"]
    );
    assert_eq!(default_hook_names("/srv/vault", None, Some("a1b2")), ["a1b2", "a1b2"]);
    assert_eq!(
        default_hook_names("/srv/vault-7", Some("Personal"), Some("a1b2")),
        ["Personal", "Personal"]
    );
}

#[test]
fn test_mount_name_falls_back_to_root_then_vault() {
    let mock = system_chosen(
        MockProvider::new("rooted")
            .with_feature(MountFeature::MountFlags)
            .with_default_flags("uid=1000"),
    );
    let state = mock.state();
    let provider = Provider::new(mock);

    let _first = provider.for_file_system("/srv/vault-7").mount().unwrap();
    let _second = provider.for_file_system("/").mount().unwrap();

    assert_eq!(state.default_name_queries(), ["vault-7", "vault-7", "vault", "vault"]);
}

#[test]
fn test_existing_dir_provider_rejects_missing_mountpoint() {
    let mock = MockProvider::new("dir").with_feature(MountFeature::MountToExistingDir);
    let state = mock.state();
    let provider = Provider::new(mock);
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("does-not-exist");

    let mut builder = provider.for_file_system("/srv/vault");
    builder.set_mountpoint(&missing);
    let err = builder.mount().unwrap_err();

    assert!(err.is_config_error());
    assert!(err.to_string().contains("mountpoint must be an existing directory"));
    assert_eq!(state.mount_calls(), 0);
}

#[test]
fn test_existing_dir_provider_accepts_empty_dir() {
    let mock = MockProvider::new("dir").with_feature(MountFeature::MountToExistingDir);
    let provider = Provider::new(mock);
    let tmp = TempDir::new().unwrap();

    let mut builder = provider.for_file_system("/srv/vault");
    builder.set_mountpoint(tmp.path());
    let mount = builder.mount().unwrap();
    assert_eq!(mount.mountpoint(), tmp.path());
}

#[test]
fn test_undeclared_port_is_usage_error_and_builder_survives() {
    let mock = system_chosen(MockProvider::new("noport"));
    let state = mock.state();
    let provider = Provider::new(mock);

    let mut builder = provider.for_file_system("/srv/vault");
    let err = builder.set_port(8080).unwrap_err();
    assert_eq!(err, UnsupportedFeature(MountFeature::Port));
    assert_eq!(state.mount_calls(), 0);

    let mount = builder.mount().unwrap();
    assert!(mount.is_active());
    assert_eq!(state.last_request().unwrap().port, None);
}

#[test]
fn test_missing_volume_id_is_config_error() {
    let mock = system_chosen(MockProvider::new("volid").with_feature(MountFeature::VolumeId));
    let state = mock.state();
    let provider = Provider::new(mock);

    let err = provider.for_file_system("/srv/vault").mount().unwrap_err();
    assert!(matches!(err, MountError::Config(ConfigError::MissingVolumeId)));
    assert!(err.to_string().contains("volume id"));
    assert_eq!(state.mount_calls(), 0);
}

#[test]
fn test_missing_mountpoint_without_system_chosen_path() {
    let mock = MockProvider::new("nowhere").with_feature(MountFeature::MountWithinExistingParent);
    let state = mock.state();
    let provider = Provider::new(mock);

    let err = provider.for_file_system("/srv/vault").mount().unwrap_err();
    assert!(matches!(err, MountError::Config(ConfigError::MissingMountpoint)));
    assert_eq!(state.mount_calls(), 0);
}

#[test]
fn test_native_failure_leaves_nothing_attached() {
    let mock = system_chosen(MockProvider::new("broken").failing_mount(io::ErrorKind::PermissionDenied));
    let state = mock.state();
    let provider = Provider::new(mock);

    let err = provider.for_file_system("/srv/vault").mount().unwrap_err();
    assert!(matches!(err, MountError::Mount(ref e) if e.kind() == io::ErrorKind::PermissionDenied));
    assert_eq!(state.mount_calls(), 1);
    assert_eq!(state.attached(), 0);
}

// =============================================================================
// Unmount state machine
// =============================================================================

#[test]
fn test_busy_unmount_then_forced() {
    let mock = system_chosen(MockProvider::new("busy").with_feature(MountFeature::UnmountForced));
    let state = mock.state();
    let mount = Provider::new(mock).for_file_system("/srv/vault").mount().unwrap();

    state.set_busy(true);
    let err = mount.unmount().unwrap_err();
    assert!(err.is_busy());
    assert_eq!(mount.state(), MountState::Active);
    assert_eq!(state.attached(), 1);

    mount.unmount_forced().unwrap();
    assert_eq!(mount.state(), MountState::Unmounted);
    assert_eq!(state.attached(), 0);
}

#[test]
fn test_unmount_twice_is_noop() {
    let mock = system_chosen(MockProvider::new("twice"));
    let state = mock.state();
    let mount = Provider::new(mock).for_file_system("/srv/vault").mount().unwrap();

    mount.unmount().unwrap();
    mount.unmount().unwrap();
    assert_eq!(mount.state(), MountState::Unmounted);
    assert_eq!(state.teardown_calls(), 1);
}

#[test]
fn test_forced_unmount_undeclared_is_usage_error() {
    let mock = system_chosen(MockProvider::new("gentle"));
    let state = mock.state();
    let mount = Provider::new(mock).for_file_system("/srv/vault").mount().unwrap();

    let err = mount.unmount_forced().unwrap_err();
    assert!(matches!(err, UnmountError::Unsupported(_)));
    assert_eq!(state.teardown_calls(), 0);
    assert!(mount.is_active());
}

#[test]
fn test_concurrent_unmount_runs_one_teardown() {
    for _ in 0..20 {
        let mock = system_chosen(MockProvider::new("race").with_feature(MountFeature::UnmountForced));
        let state = mock.state();
        state.set_teardown_delay(Duration::from_millis(20));
        let mount = Arc::new(Provider::new(mock).for_file_system("/srv/vault").mount().unwrap());
        let barrier = Arc::new(Barrier::new(2));

        let graceful = {
            let mount = Arc::clone(&mount);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                mount.unmount()
            })
        };
        let forced = {
            let mount = Arc::clone(&mount);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                mount.unmount_forced()
            })
        };

        graceful.join().unwrap().unwrap();
        forced.join().unwrap().unwrap();

        assert_eq!(mount.state(), MountState::Unmounted);
        assert_eq!(state.teardown_calls(), 1);
        assert_eq!(state.max_concurrent_teardowns(), 1);
        assert_eq!(state.attached(), 0);
    }
}

#[test]
fn test_waiters_share_failed_outcome() {
    let mock = system_chosen(MockProvider::new("shared"));
    let state = mock.state();
    state.set_busy(true);
    state.set_teardown_delay(Duration::from_millis(50));
    let mount = Arc::new(Provider::new(mock).for_file_system("/srv/vault").mount().unwrap());
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mount = Arc::clone(&mount);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                mount.unmount()
            })
        })
        .collect();

    for handle in handles {
        let err = handle.join().unwrap().unwrap_err();
        assert!(err.is_busy());
    }
    assert_eq!(mount.state(), MountState::Active);
    assert_eq!(state.max_concurrent_teardowns(), 1);

    state.set_busy(false);
    mount.unmount().unwrap();
    assert_eq!(state.attached(), 0);
}

#[test]
fn test_forced_unmount_after_busy_graceful_in_flight() {
    let mock = system_chosen(MockProvider::new("overlap").with_feature(MountFeature::UnmountForced));
    let state = mock.state();
    state.set_busy(true);
    state.set_teardown_delay(Duration::from_millis(200));
    let mount = Arc::new(Provider::new(mock).for_file_system("/srv/vault").mount().unwrap());

    let graceful = {
        let mount = Arc::clone(&mount);
        thread::spawn(move || mount.unmount())
    };
    while mount.state() != MountState::Unmounting {
        thread::sleep(Duration::from_millis(1));
    }

    mount.unmount_forced().unwrap();

    assert!(graceful.join().unwrap().unwrap_err().is_busy());
    assert_eq!(mount.state(), MountState::Unmounted);
    assert_eq!(state.forced_unmount_calls(), 1);
    assert_eq!(state.max_concurrent_teardowns(), 1);
    assert_eq!(state.attached(), 0);
}

#[test]
fn test_drop_escalates_to_forced_unmount() {
    let mock = system_chosen(MockProvider::new("drop").with_feature(MountFeature::UnmountForced));
    let state = mock.state();
    let mount = Provider::new(mock).for_file_system("/srv/vault").mount().unwrap();
    state.set_busy(true);

    drop(mount);
    assert_eq!(state.unmount_calls(), 1);
    assert_eq!(state.forced_unmount_calls(), 1);
    assert_eq!(state.attached(), 0);
}

#[test]
fn test_drop_without_forced_support_only_tries_gracefully() {
    let mock = system_chosen(MockProvider::new("stuck"));
    let state = mock.state();
    let mount = Provider::new(mock).for_file_system("/srv/vault").mount().unwrap();
    state.set_busy(true);

    drop(mount);
    assert_eq!(state.unmount_calls(), 1);
    assert_eq!(state.forced_unmount_calls(), 0);
}

// =============================================================================
// Registry discovery
// =============================================================================

#[test]
fn test_available_providers_are_stable() {
    let mut registry = ProviderRegistry::new();
    registry.register(MockProvider::new("one")).unwrap();
    registry.register(MockProvider::new("two").unsupported()).unwrap();
    registry
        .register(MockProvider::new("three").panicking_support_check())
        .unwrap();

    for provider in registry.available_providers() {
        assert!(provider.is_supported(), "{} flapped", provider.id());
    }
    assert_eq!(registry.available_providers().count(), 1);
}

#[test]
fn test_builtin_registry_is_consistent() {
    let registry = ProviderRegistry::global();
    let ids: Vec<&str> = registry.all().iter().map(Provider::id).collect();
    assert_eq!(ids, vec!["bind", "subst", "symlink"]);
    for provider in registry.available_providers() {
        assert!(provider.is_supported());
        assert!(provider.supported_features().mount_target().is_some());
    }
}
