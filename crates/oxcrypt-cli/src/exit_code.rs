//! Process exit codes.
//!
//! Scripts can tell configuration mistakes apart from failures of the
//! mount mechanism without parsing error messages.

/// Success
pub const SUCCESS: u8 = 0;

/// Any failure not covered below
pub const GENERAL_ERROR: u8 = 1;

/// An option was used that the provider does not support (clap also uses 2)
pub const USAGE: u8 = 2;

/// Invalid configuration file or mount configuration
pub const CONFIG: u8 = 3;

/// The mount mechanism failed
pub const MOUNT_FAILED: u8 = 4;

/// The filesystem could not be unmounted
pub const UNMOUNT_FAILED: u8 = 5;

/// The requested provider is unknown or unsupported on this system
pub const UNAVAILABLE: u8 = 6;
