#![deny(unsafe_code)]

mod commands;
mod config;
mod exit_code;
mod signal;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use oxcrypt_mount::{MountError, ProviderRegistry, UnmountError, UnsupportedFeature};

use crate::commands::{mount, providers};

/// Mount vault filesystems through pluggable mount providers
#[derive(Parser)]
#[command(name = "oxcrypt")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Show which mount providers work on this machine
    oxcrypt providers

    # Mount a directory read-only with a bind mount
    sudo oxcrypt mount ~/decrypted /mnt/vault --provider bind --read-only

    # Expose a directory as a new symlink inside ~/Vaults
    oxcrypt mount ~/decrypted ~/Vaults/work --provider symlink

    # Defaults live in ~/.config/oxcrypt/config.toml under [mount]
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List mount providers and their features
    Providers(providers::Args),

    /// Mount a directory and keep it mounted until interrupted
    Mount(mount::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let quiet = cli.quiet;

    match run(cli) {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);
            if !quiet {
                eprintln!("Error: {e:#}");
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let registry = ProviderRegistry::global();

    match cli.command {
        Commands::Providers(args) => providers::execute(&args, registry),
        Commands::Mount(args) => {
            let config = config::load()?;
            mount::execute(&args, &config.mount, registry)
        }
    }
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if cause.downcast_ref::<UnsupportedFeature>().is_some() {
            return exit_code::USAGE;
        }

        if let Some(mount_err) = cause.downcast_ref::<MountError>() {
            return match mount_err {
                MountError::Unsupported(_) => exit_code::USAGE,
                MountError::Config(_) => exit_code::CONFIG,
                MountError::ProviderUnavailable(_) => exit_code::UNAVAILABLE,
                MountError::Mount(_) => exit_code::MOUNT_FAILED,
            };
        }

        if let Some(unmount_err) = cause.downcast_ref::<UnmountError>() {
            return match unmount_err {
                UnmountError::Unsupported(_) => exit_code::USAGE,
                _ => exit_code::UNMOUNT_FAILED,
            };
        }

        if cause.downcast_ref::<toml::de::Error>().is_some() {
            return exit_code::CONFIG;
        }
    }
    exit_code::GENERAL_ERROR
}
