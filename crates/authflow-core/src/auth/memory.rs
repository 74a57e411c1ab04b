//! In-process credential service.
//!
//! Accounts live in a map keyed by username. Latency and logout failures can
//! be configured so races and error paths can be exercised without a server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use crate::error::CredentialError;
use crate::models::SessionToken;

use super::{CredentialClient, CredentialResult};

#[derive(Default)]
pub struct MemoryCredentialClient {
    accounts: Mutex<HashMap<String, String>>,
    auth_latency: Duration,
    logout_latency: Duration,
    fail_logout: AtomicBool,
    login_calls: AtomicUsize,
    register_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    issued: AtomicUsize,
}

impl MemoryCredentialClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every login and registration call
    pub fn with_auth_latency(mut self, latency: Duration) -> Self {
        self.auth_latency = latency;
        self
    }

    /// Delay applied to every logout call
    pub fn with_logout_latency(mut self, latency: Duration) -> Self {
        self.logout_latency = latency;
        self
    }

    /// Seed an account with an already derived transport secret
    pub fn with_account(self, username: &str, secret: &str) -> Self {
        self.accounts_mut()
            .insert(username.to_string(), secret.to_string());
        self
    }

    pub fn set_fail_logout(&self, fail: bool) {
        self.fail_logout.store(fail, Ordering::SeqCst);
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn has_account(&self, username: &str) -> bool {
        self.accounts_mut().contains_key(username)
    }

    fn accounts_mut(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue_token(&self, username: &str) -> SessionToken {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        SessionToken::new(format!("mem-{}-{}", username, n))
    }

    async fn do_register(&self, username: &str, secret: &str) -> CredentialResult<Option<SessionToken>> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.auth_latency).await;

        let mut accounts = self.accounts_mut();
        if accounts.contains_key(username) {
            return Err(CredentialError::Conflict("username already exists".to_string()));
        }
        accounts.insert(username.to_string(), secret.to_string());
        drop(accounts);

        debug!(%username, "Registered account");
        Ok(Some(self.issue_token(username)))
    }

    async fn do_login(&self, username: &str, secret: &str) -> CredentialResult<Option<SessionToken>> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.auth_latency).await;

        let matches = self
            .accounts_mut()
            .get(username)
            .is_some_and(|stored| stored == secret);
        if !matches {
            return Err(CredentialError::Rejected("invalid credentials".to_string()));
        }
        Ok(Some(self.issue_token(username)))
    }

    async fn do_logout(&self) -> CredentialResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.logout_latency).await;

        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(CredentialError::Server("logout unavailable".to_string()));
        }
        Ok(())
    }
}

impl CredentialClient for MemoryCredentialClient {
    fn register<'a>(
        &'a self,
        username: &'a str,
        secret: &'a str,
    ) -> BoxFuture<'a, CredentialResult<Option<SessionToken>>> {
        self.do_register(username, secret).boxed()
    }

    fn login<'a>(
        &'a self,
        username: &'a str,
        secret: &'a str,
    ) -> BoxFuture<'a, CredentialResult<Option<SessionToken>>> {
        self.do_login(username, secret).boxed()
    }

    fn logout(&self) -> BoxFuture<'_, CredentialResult<()>> {
        self.do_logout().boxed()
    }
}
