//! Standalone logout coordination for logouts outside a login race.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::error::EngineError;

use super::{sign_out, OperationContext};

pub(crate) struct LogoutRoutine {
    ctx: Arc<OperationContext>,
    requests: Mutex<mpsc::UnboundedReceiver<()>>,
}

impl LogoutRoutine {
    pub(crate) fn new(ctx: Arc<OperationContext>, requests: mpsc::UnboundedReceiver<()>) -> Self {
        Self {
            ctx,
            requests: Mutex::new(requests),
        }
    }

    pub(crate) async fn run(self: Arc<Self>) -> Result<(), EngineError> {
        let mut requests = self.requests.lock().await;
        while requests.recv().await.is_some() {
            info!("Logout requested");
            sign_out(&self.ctx).await;
        }
        info!("Logout queue closed, routine stopping");
        Ok(())
    }
}
