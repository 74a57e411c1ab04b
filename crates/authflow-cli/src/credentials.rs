//! Remembered passwords for `login --remember`.
//!
//! Entries live in the OS keychain under a service name derived from the
//! credential service URL. A password remembered for one service is never
//! offered to another, and the simulated service has its own scope.

use anyhow::{Context, Result};
use keyring::Entry;

/// Keychain service name prefix
const SERVICE_PREFIX: &str = "authflow";

/// Scope used by `--simulate`
const SIMULATED_SCOPE: &str = "simulated";

#[derive(Debug, Clone)]
pub struct CredentialStore {
    service: String,
}

impl CredentialStore {
    /// Store scoped to `service_url`, or to the simulated service when `None`
    pub fn for_service(service_url: Option<&str>) -> Self {
        Self {
            service: service_name(service_url),
        }
    }

    fn entry(&self, username: &str) -> Result<Entry> {
        Entry::new(&self.service, username).context("Failed to create keyring entry")
    }

    pub fn remember(&self, username: &str, password: &str) -> Result<()> {
        self.entry(username)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// The remembered password, if there is one
    pub fn recall(&self, username: &str) -> Result<Option<String>> {
        match self.entry(username)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve password from keychain"),
        }
    }

    /// Returns `false` when nothing was remembered for `username`
    pub fn forget(&self, username: &str) -> Result<bool> {
        match self.entry(username)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

fn service_name(service_url: Option<&str>) -> String {
    let scope = service_url
        .map(|url| url.trim().trim_end_matches('/').to_lowercase())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| SIMULATED_SCOPE.to_string());
    format!("{}:{}", SERVICE_PREFIX, scope)
}
