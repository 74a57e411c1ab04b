//! Registration coordination.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::models::{AuthMode, Credentials, OperationOutcome};

use super::{authorize, signal_authenticated, OperationContext};

pub(crate) struct RegisterRoutine {
    ctx: Arc<OperationContext>,
    requests: Mutex<mpsc::UnboundedReceiver<Credentials>>,
}

impl RegisterRoutine {
    pub(crate) fn new(ctx: Arc<OperationContext>, requests: mpsc::UnboundedReceiver<Credentials>) -> Self {
        Self {
            ctx,
            requests: Mutex::new(requests),
        }
    }

    pub(crate) async fn run(self: Arc<Self>) -> Result<(), EngineError> {
        let mut requests = self.requests.lock().await;
        while let Some(credentials) = requests.recv().await {
            info!(username = %credentials.username, "Registration requested");
            match authorize(&self.ctx, credentials, AuthMode::Register).await {
                OperationOutcome::Success(_) => signal_authenticated(&self.ctx),
                OperationOutcome::Failure(message) => {
                    debug!(%message, "Registration failed, listening again");
                }
            }
        }
        info!("Registration queue closed, routine stopping");
        Ok(())
    }
}
