//! Orchestration engine.
//!
//! The supervisor runs four long-lived routines: the trigger dispatcher and
//! the login, logout and registration coordination loops. Each loop blocks
//! on its own queue, performs one workflow, publishes notifications and goes
//! back to listening.

pub mod dispatch;
pub mod login;
pub mod logout;
pub mod operations;
pub mod register;
pub mod supervisor;

use std::sync::Arc;

use crate::auth::{CredentialClient, SecretDeriver};
use crate::models::{Destination, Notification};
use crate::notify::SharedSink;

pub use dispatch::Triggers;
pub use operations::{authorize, perform_logout};
pub use supervisor::Supervisor;

/// Collaborators shared by every operation.
pub struct OperationContext {
    pub(crate) client: Arc<dyn CredentialClient>,
    pub(crate) sink: SharedSink,
    pub(crate) deriver: SecretDeriver,
}

impl OperationContext {
    pub fn new(client: Arc<dyn CredentialClient>, sink: SharedSink, deriver: SecretDeriver) -> Self {
        Self {
            client,
            sink,
            deriver,
        }
    }
}

/// Side effects of a successful login or registration.
pub(crate) fn signal_authenticated(ctx: &OperationContext) {
    ctx.sink.publish(Notification::AuthenticationState(true));
    ctx.sink.publish(Notification::form_reset());
    ctx.sink.publish(Notification::Navigate(Destination::Dashboard));
}

/// Side effects of a logout, including the credential call itself.
pub(crate) async fn sign_out(ctx: &OperationContext) {
    ctx.sink.publish(Notification::AuthenticationState(false));
    perform_logout(ctx).await;
    ctx.sink.publish(Notification::Navigate(Destination::Root));
}
