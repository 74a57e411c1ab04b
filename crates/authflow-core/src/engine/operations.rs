//! Authorize and logout operations.
//!
//! Both bracket the credential call with `RequestInFlight(true)` and
//! `RequestInFlight(false)`. The release lives in a drop guard, so it is
//! published exactly once on success, on failure, and when the operation's
//! future is dropped because it lost a race.

use tracing::{debug, info, warn};

use crate::auth::CredentialResult;
use crate::error::CredentialError;
use crate::models::{AuthMode, Credentials, Notification, OperationOutcome, SessionToken};
use crate::notify::SharedSink;

use super::OperationContext;

/// Holds the in-flight flag for the lifetime of one credential call.
struct InFlight {
    sink: SharedSink,
}

impl InFlight {
    fn acquire(sink: &SharedSink) -> Self {
        sink.publish(Notification::RequestInFlight(true));
        Self { sink: sink.clone() }
    }
}

impl Drop for InFlight {
    // When a login loses its race this is the only thing the dropped
    // authorize ever publishes; the flag raised on its behalf must come down.
    fn drop(&mut self) {
        self.sink.publish(Notification::RequestInFlight(false));
    }
}

/// Normalize a credential failure: publish it and turn it into an outcome.
fn fail(ctx: &OperationContext, operation: &str, error: CredentialError) -> OperationOutcome {
    let message = error.to_string();
    warn!(operation, error = %message, "Credential call failed");
    ctx.sink.publish(Notification::RequestError(message.clone()));
    OperationOutcome::Failure(message)
}

async fn call_service(
    ctx: &OperationContext,
    credentials: &Credentials,
    mode: AuthMode,
) -> CredentialResult<Option<SessionToken>> {
    let secret = ctx
        .deriver
        .derive(&credentials.username, &credentials.secret)
        .await?;
    match mode {
        AuthMode::Login => ctx.client.login(&credentials.username, &secret).await,
        AuthMode::Register => ctx.client.register(&credentials.username, &secret).await,
    }
}

/// Derive the transport secret and call `login` or `register`.
pub async fn authorize(
    ctx: &OperationContext,
    credentials: Credentials,
    mode: AuthMode,
) -> OperationOutcome {
    let _in_flight = InFlight::acquire(&ctx.sink);

    match call_service(ctx, &credentials, mode).await {
        Ok(token) => {
            info!(username = %credentials.username, %mode, "Credential call succeeded");
            debug!(has_token = token.is_some(), "Session token received");
            OperationOutcome::Success(token)
        }
        Err(e) => fail(ctx, &mode.to_string(), e),
    }
}

/// Call `logout` on the credential service.
pub async fn perform_logout(ctx: &OperationContext) -> OperationOutcome {
    let _in_flight = InFlight::acquire(&ctx.sink);

    match ctx.client.logout().await {
        Ok(()) => {
            info!("Logout succeeded");
            OperationOutcome::Success(None)
        }
        Err(e) => fail(ctx, "logout", e),
    }
}
