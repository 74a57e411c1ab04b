use futures::future::BoxFuture;

use crate::error::CredentialError;
use crate::models::SessionToken;

pub type CredentialResult<T> = Result<T, CredentialError>;

/// Backing identity store.
///
/// `secret` is always the derived transport secret, never the raw password.
/// Implementations are shared between routines, so calls may overlap.
pub trait CredentialClient: Send + Sync + 'static {
    fn register<'a>(
        &'a self,
        username: &'a str,
        secret: &'a str,
    ) -> BoxFuture<'a, CredentialResult<Option<SessionToken>>>;

    fn login<'a>(
        &'a self,
        username: &'a str,
        secret: &'a str,
    ) -> BoxFuture<'a, CredentialResult<Option<SessionToken>>>;

    fn logout(&self) -> BoxFuture<'_, CredentialResult<()>>;
}
