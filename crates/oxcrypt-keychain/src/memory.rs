//! In-memory keychain.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use zeroize::Zeroizing;

use crate::{KeychainAccess, Result};

/// A keychain that lives only as long as the process.
///
/// Always supported. Used when no OS keychain is available and in tests.
#[derive(Default)]
pub struct MemoryKeychain {
    entries: Mutex<HashMap<String, Zeroizing<String>>>,
}

impl fmt::Debug for MemoryKeychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryKeychain")
            .field("entries", &self.len())
            .finish()
    }
}

impl MemoryKeychain {
    /// An empty keychain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeychainAccess for MemoryKeychain {
    fn display_name(&self) -> &str {
        "In-Memory"
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn store(&self, key: &str, secret: &str) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), Zeroizing::new(secret.to_string()));
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Zeroizing<String>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn change(&self, key: &str, secret: &str) -> Result<()> {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            *entry = Zeroizing::new(secret.to_string());
        }
        Ok(())
    }
}
