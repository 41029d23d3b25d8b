//! Mount command - expose a directory through a mount provider.
//!
//! Runs in the foreground: mounts, prints the mountpoint, waits for Ctrl+C
//! or SIGTERM, then unmounts. A busy filesystem is force-unmounted when the
//! provider supports it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use oxcrypt_mount::{Mount, MountBuilder, MountFeature, Provider, ProviderRegistry};

use crate::config::MountDefaults;
use crate::signal;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Directory to expose (the decrypted vault view)
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Where to mount; required unless the provider picks a location itself
    #[arg(value_name = "MOUNTPOINT")]
    pub mountpoint: Option<PathBuf>,

    /// Provider to use (see `oxcrypt providers`); defaults to the first available
    #[arg(short, long, value_name = "ID")]
    pub provider: Option<String>,

    /// Mechanism-specific mount flags
    #[arg(long, value_name = "FLAGS")]
    pub flags: Option<String>,

    /// Mount read-only
    #[arg(long)]
    pub read_only: bool,

    /// TCP port for network-backed providers (0 lets the system choose)
    #[arg(long)]
    pub port: Option<u16>,

    /// Volume identifier for providers that require one
    #[arg(long, value_name = "ID")]
    pub volume_id: Option<String>,

    /// Name shown by the operating system for the mounted volume
    #[arg(long, value_name = "NAME")]
    pub volume_name: Option<String>,
}

#[instrument(level = "info", name = "cmd::mount", skip_all, fields(root = %args.root.display()))]
pub fn execute(args: &Args, defaults: &MountDefaults, registry: &ProviderRegistry) -> Result<()> {
    if !args.root.is_dir() {
        anyhow::bail!("Root is not a directory: {}", args.root.display());
    }

    let provider = choose_provider(args, defaults, registry)?;
    eprintln!("Using {} provider", provider.display_name());

    let mut builder = provider.for_file_system(&args.root);
    configure(&mut builder, args, defaults)?;

    // Before mounting, so an early signal cannot kill us with the mount attached.
    let shutdown = signal::install()?;

    let mount = builder.mount().context("Failed to mount")?;
    eprintln!("Mounted at {}", mount.mountpoint().display());
    println!("{}", mount.mountpoint().display());
    eprintln!("Press Ctrl+C to unmount and exit");

    shutdown.wait_for_shutdown();

    eprintln!("Unmounting...");
    unmount(&mount)?;
    eprintln!("Unmounted successfully");
    Ok(())
}

fn choose_provider(
    args: &Args,
    defaults: &MountDefaults,
    registry: &ProviderRegistry,
) -> Result<Provider> {
    match args.provider.as_deref().or(defaults.provider.as_deref()) {
        Some(id) => registry
            .select(id)
            .with_context(|| format!("Cannot use provider '{id}'")),
        None => registry
            .first_available()
            .context("No mount provider available"),
    }
}

/// Apply command-line options, then config defaults the provider understands.
///
/// Explicit options for undeclared features are usage errors; config
/// defaults for them are skipped.
fn configure(builder: &mut MountBuilder, args: &Args, defaults: &MountDefaults) -> Result<()> {
    let provider = builder.provider().clone();
    let declared = |feature| {
        let supported = provider.supports_feature(feature);
        if !supported {
            tracing::debug!(provider = provider.id(), "Ignoring config default for {feature}");
        }
        supported
    };

    if let Some(mountpoint) = &args.mountpoint {
        builder.set_mountpoint(mountpoint);
    }

    if let Some(flags) = &args.flags {
        builder.set_mount_flags(flags).context("Invalid option --flags")?;
    } else if let Some(flags) = &defaults.mount_flags
        && declared(MountFeature::MountFlags)
    {
        builder.set_mount_flags(flags)?;
    }

    if args.read_only {
        builder.set_read_only(true).context("Invalid option --read-only")?;
    } else if let Some(read_only) = defaults.read_only
        && declared(MountFeature::ReadOnly)
    {
        builder.set_read_only(read_only)?;
    }

    if let Some(port) = args.port {
        builder.set_port(port).context("Invalid option --port")?;
    } else if let Some(port) = defaults.port
        && declared(MountFeature::Port)
    {
        builder.set_port(port)?;
    }

    if let Some(volume_id) = &args.volume_id {
        builder.set_volume_id(volume_id).context("Invalid option --volume-id")?;
    } else if let Some(volume_id) = &defaults.volume_id
        && declared(MountFeature::VolumeId)
    {
        builder.set_volume_id(volume_id)?;
    }

    if let Some(name) = args.volume_name.as_ref().or(defaults.volume_name.as_ref()) {
        builder.set_volume_name(name);
    }

    Ok(())
}

fn unmount(mount: &Mount) -> Result<()> {
    let Err(e) = mount.unmount() else {
        return Ok(());
    };
    if !e.is_busy() || !mount.provider().supports_feature(MountFeature::UnmountForced) {
        return Err(e).context("Failed to unmount");
    }

    eprintln!("Filesystem is busy:");
    for process in mount.blocking_processes() {
        eprintln!(
            "  {} (PID {}) {}",
            process.name,
            process.pid,
            process.file_path.as_deref().unwrap_or("")
        );
    }
    eprintln!("Forcing unmount...");
    mount.unmount_forced().context("Failed to force unmount")
}
