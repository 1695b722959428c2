//! Keyring-backed session storage
//!
//! Sessions are stored as JSON in the OS credential store (GNOME Keyring,
//! KDE Wallet, macOS Keychain) under the service name "microaudit". The
//! entry is keyed by the backend URL so sessions for different projects do
//! not collide.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::identity::Session;

/// Keyring service name
const KEYRING_SERVICE: &str = "microaudit";

/// Stores and retrieves sessions from the system keyring
pub struct KeyringSessionStore {
    account: String,
}

impl KeyringSessionStore {
    /// Creates a store for the project at `base_url`
    pub fn new(base_url: &str) -> Self {
        Self {
            account: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Keyring account name used for the entry
    pub fn account(&self) -> &str {
        &self.account
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, &self.account)
            .context("Failed to create keyring entry")
    }

    /// Stores the session
    pub fn store(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string(session).context("Failed to serialize session")?;
        self.entry()?
            .set_password(&json)
            .context("Failed to store session in keyring")?;
        debug!(account = %self.account, "Stored session in keyring");
        Ok(())
    }

    /// Loads the session, `None` if nothing is stored
    pub fn load(&self) -> Result<Option<Session>> {
        match self.entry()?.get_password() {
            Ok(json) => {
                let session: Session = serde_json::from_str(&json)
                    .context("Failed to deserialize session from keyring")?;
                debug!(account = %self.account, "Loaded session from keyring");
                Ok(Some(session))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(account = %self.account, "No session in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    /// Removes the stored session
    pub fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                info!(account = %self.account, "Cleared session from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!(account = %self.account, "No session to clear");
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_is_normalized_url() {
        let store = KeyringSessionStore::new("https://project.example.co/");
        assert_eq!(store.account(), "https://project.example.co");
    }
}
