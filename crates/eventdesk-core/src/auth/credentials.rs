use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

use crate::config::APP_NAME;

/// Keychain passwords for the events backend.
///
/// One email can have accounts on several backends (local, staging, ...),
/// so entries are keyed by email and API host together.
pub struct CredentialStore {
    account: String,
}

impl CredentialStore {
    pub fn new(base_url: &str, email: &str) -> Self {
        Self {
            account: format!("{}@{}", email.trim(), host_of(base_url)),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(APP_NAME, &self.account).context("Failed to open keychain entry")
    }

    pub fn store(&self, password: &str) -> Result<()> {
        self.entry()?
            .set_password(password)
            .context("Failed to store password in keychain")?;
        debug!(account = %self.account, "Stored password");
        Ok(())
    }

    pub fn password(&self) -> Result<String> {
        self.entry()?
            .get_password()
            .context("Failed to read password from keychain")
    }

    /// The stored password, if any. Keychain errors count as "none".
    pub fn lookup(&self) -> Option<String> {
        self.password().ok().filter(|p| !p.is_empty())
    }

    /// Remove the stored password. A missing entry is not an error.
    pub fn forget(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete password from keychain"),
        }
    }
}

/// `http://localhost:8000/api/v1` -> `localhost:8000`
fn host_of(base_url: &str) -> &str {
    let rest = base_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(base_url);
    rest.split('/').next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("http://localhost:8000/api/v1"), "localhost:8000");
        assert_eq!(host_of("https://events.example.com"), "events.example.com");
        assert_eq!(host_of("events.example.com/api"), "events.example.com");
    }

    #[test]
    fn test_account_includes_host() {
        let store = CredentialStore::new("https://events.example.com/api/v1", " ada@example.com ");
        assert_eq!(store.account, "ada@example.com@events.example.com");
    }
}
