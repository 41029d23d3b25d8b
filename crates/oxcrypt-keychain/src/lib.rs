//! Keychain access for vault passphrases.
//!
//! Storing a passphrase is independent of mounting: the application may
//! offer to remember the passphrase after a successful unlock and load it
//! again before the next mount. This crate defines that boundary.
//!
//! - [`KeychainAccess`] - Trait implemented by each keychain backend
//! - [`MemoryKeychain`] - Process-local store, always supported
//! - `SystemKeychain` - OS keyring, behind the `system` feature
//!
//! Secrets are handed out as [`Zeroizing`] strings so they are wiped from
//! memory when dropped.
//!
//! # Example
//!
//! ```
//! use oxcrypt_keychain::{KeychainAccess, MemoryKeychain};
//!
//! let keychain = MemoryKeychain::new();
//! keychain.store("vault-1234", "correct horse battery staple")?;
//! let passphrase = keychain.load("vault-1234")?.expect("stored above");
//! assert_eq!(passphrase.as_str(), "correct horse battery staple");
//! # Ok::<(), oxcrypt_keychain::KeychainError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod memory;
#[cfg(feature = "system")]
mod system;

use thiserror::Error;
pub use zeroize::Zeroizing;

pub use memory::MemoryKeychain;
#[cfg(feature = "system")]
pub use system::SystemKeychain;

/// Errors reported by a keychain backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeychainError {
    /// The backend cannot be used on this system
    #[error("Keychain is not supported on this system")]
    NotSupported,

    /// The backend failed to read or write an entry
    #[error("Keychain access failed: {0}")]
    Access(String),
}

/// Result type for keychain operations
pub type Result<T> = std::result::Result<T, KeychainError>;

/// A place to keep passphrases between sessions.
///
/// Keys are opaque identifiers chosen by the caller, typically a vault id.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; all methods take `&self`.
pub trait KeychainAccess: Send + Sync {
    /// Human-readable name of the backend
    fn display_name(&self) -> &str;

    /// Whether this backend works on the current machine.
    ///
    /// Must not fail and should return quickly; `false` on any doubt.
    fn is_supported(&self) -> bool;

    /// Associate `secret` with `key`, replacing any previous value.
    fn store(&self, key: &str, secret: &str) -> Result<()>;

    /// The secret stored under `key`, or `None` if there is none.
    fn load(&self, key: &str) -> Result<Option<Zeroizing<String>>>;

    /// Remove the secret stored under `key`. Removing a missing key succeeds.
    fn delete(&self, key: &str) -> Result<()>;

    /// Replace the secret stored under `key`.
    ///
    /// No-op if nothing is stored under `key`.
    fn change(&self, key: &str, secret: &str) -> Result<()> {
        if self.load(key)?.is_none() {
            tracing::debug!(key, "No keychain entry to change");
            return Ok(());
        }
        self.store(key, secret)
    }
}
