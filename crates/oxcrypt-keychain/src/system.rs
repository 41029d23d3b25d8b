//! OS keyring backend.

use std::panic::{self, AssertUnwindSafe};

use keyring::Entry;
use zeroize::Zeroizing;

use crate::{KeychainAccess, KeychainError, Result};

/// Default service name under which entries are filed.
pub const DEFAULT_SERVICE: &str = "oxcrypt";

/// Key looked up to check that the credential store answers at all.
const PROBE_KEY: &str = "oxcrypt-availability-probe";

/// Passphrases kept in the operating system's credential store.
#[derive(Debug, Clone)]
pub struct SystemKeychain {
    service: String,
}

impl SystemKeychain {
    /// A keychain filing entries under `service`.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// The service name entries are filed under
    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).map_err(access_error)
    }
}

impl Default for SystemKeychain {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

fn access_error(e: keyring::Error) -> KeychainError {
    match e {
        keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
            KeychainError::NotSupported
        }
        other => KeychainError::Access(other.to_string()),
    }
}

/// Whether a lookup result shows a working credential store.
///
/// A missing entry still means the store answered.
fn store_reachable(lookup: &keyring::Result<String>) -> bool {
    !matches!(
        lookup,
        Err(keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_))
    )
}

impl KeychainAccess for SystemKeychain {
    fn display_name(&self) -> &str {
        "System Keychain"
    }

    fn is_supported(&self) -> bool {
        panic::catch_unwind(AssertUnwindSafe(|| {
            let lookup = Entry::new(&self.service, PROBE_KEY).and_then(|entry| entry.get_password());
            store_reachable(&lookup)
        }))
        .unwrap_or(false)
    }

    fn store(&self, key: &str, secret: &str) -> Result<()> {
        self.entry(key)?.set_password(secret).map_err(access_error)?;
        tracing::debug!(service = %self.service, key, "Passphrase stored in keychain");
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Zeroizing<String>>> {
        match self.entry(key)?.get_password() {
            Ok(secret) => Ok(Some(Zeroizing::new(secret))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(access_error(e)),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => {
                tracing::debug!(service = %self.service, key, "Passphrase deleted from keychain");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(access_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_service_name() {
        let keychain = SystemKeychain::default();
        assert_eq!(keychain.service(), DEFAULT_SERVICE);
        assert_eq!(keychain.display_name(), "System Keychain");
    }

    #[test]
    fn missing_entry_maps_to_access_error() {
        let err = access_error(keyring::Error::NoEntry);
        assert!(matches!(err, KeychainError::Access(_)));
    }

    #[test]
    fn store_reachable_when_lookup_answers() {
        assert!(store_reachable(&Err(keyring::Error::NoEntry)));
        assert!(store_reachable(&Ok("secret".to_string())));
    }

    #[test]
    fn store_unreachable_on_platform_failure() {
        let locked = keyring::Error::NoStorageAccess(Box::new(std::io::Error::other("locked")));
        assert!(!store_reachable(&Err(locked)));

        let no_daemon = keyring::Error::PlatformFailure(Box::new(std::io::Error::other("no dbus")));
        assert!(!store_reachable(&Err(no_daemon)));
    }
}
