use argon2::{Algorithm, Argon2, Params, Version};

use crate::config::SecretConfig;
use crate::error::CredentialError;

/// Derived secret length in bytes (hex encoded to twice this)
const SECRET_LENGTH: usize = 32;

/// Turns a password into the transport secret sent to the credential service.
///
/// The salt depends only on the username, so the same credentials always
/// produce the same secret.
#[derive(Debug, Clone)]
pub struct SecretDeriver {
    config: SecretConfig,
}

impl SecretDeriver {
    pub fn new(config: SecretConfig) -> Self {
        Self { config }
    }

    fn salt(&self, username: &str) -> String {
        format!("{}:{}", self.config.salt_prefix, username.trim().to_lowercase())
    }

    /// Derive on the calling thread. Prefer `derive` from async code.
    pub fn derive_blocking(&self, username: &str, password: &str) -> Result<String, CredentialError> {
        let params = Params::new(
            self.config.memory_kib,
            self.config.iterations,
            self.config.parallelism,
            Some(SECRET_LENGTH),
        )
        .map_err(|e| CredentialError::Derivation(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        // Argon2 rejects salts shorter than 8 bytes; short usernames are padded
        let mut salt = self.salt(username).into_bytes();
        if salt.len() < argon2::RECOMMENDED_SALT_LEN {
            salt.resize(argon2::RECOMMENDED_SALT_LEN, b'.');
        }

        let mut out = [0u8; SECRET_LENGTH];
        argon2
            .hash_password_into(password.as_bytes(), &salt, &mut out)
            .map_err(|e| CredentialError::Derivation(e.to_string()))?;

        Ok(out.iter().map(|b| format!("{:02x}", b)).collect())
    }

    /// Derive on the blocking pool.
    ///
    /// If the caller is dropped mid-derivation the hash still runs to
    /// completion and its result is discarded.
    pub async fn derive(&self, username: &str, password: &str) -> Result<String, CredentialError> {
        let deriver = self.clone();
        let username = username.to_string();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || deriver.derive_blocking(&username, &password))
            .await
            .map_err(|e| CredentialError::Derivation(e.to_string()))?
    }
}
