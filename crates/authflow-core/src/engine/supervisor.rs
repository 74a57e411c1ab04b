//! Starts the routines and keeps them alive.
//!
//! Every routine runs in its own task. A routine that returns an error or
//! panics is restarted after a doubling delay; its queue is owned by the
//! routine struct, not the task, so pending triggers survive the restart.
//! A routine that returns `Ok` has seen its queue close and is not restarted.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::auth::{CredentialClient, SecretDeriver};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::notify::SharedSink;

use super::dispatch::{Dispatcher, LogoutRouter, Triggers};
use super::login::LoginRoutine;
use super::logout::LogoutRoutine;
use super::register::RegisterRoutine;
use super::OperationContext;

#[derive(Debug, Clone, Copy)]
struct Backoff {
    initial: Duration,
    max: Duration,
}

pub struct Supervisor {
    routines: Vec<(&'static str, JoinHandle<()>)>,
    shutdown: watch::Sender<bool>,
}

impl Supervisor {
    /// Start every routine. Must be called inside a Tokio runtime.
    pub fn start(
        config: &EngineConfig,
        client: Arc<dyn CredentialClient>,
        sink: SharedSink,
    ) -> (Self, Triggers) {
        let ctx = Arc::new(OperationContext::new(
            client,
            sink,
            SecretDeriver::new(config.secret.clone()),
        ));
        let buffer = config.trigger_buffer();

        let (trigger_tx, trigger_rx) = mpsc::channel(buffer);
        let (login_tx, login_rx) = mpsc::unbounded_channel();
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (logout_tx, logout_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let dispatcher = Arc::new(Dispatcher::new(
            trigger_rx,
            login_tx,
            register_tx,
            logout_tx,
            Arc::new(LogoutRouter::default()),
            shutdown_rx,
        ));
        let login = Arc::new(LoginRoutine::new(ctx.clone(), login_rx));
        let logout = Arc::new(LogoutRoutine::new(ctx.clone(), logout_rx));
        let register = Arc::new(RegisterRoutine::new(ctx, register_rx));

        let backoff = Backoff {
            initial: config.restart_backoff(),
            max: config.max_restart_backoff(),
        };

        let routines = vec![
            ("dispatcher", supervise("dispatcher", backoff, move || dispatcher.clone().run())),
            ("login", supervise("login", backoff, move || login.clone().run())),
            ("logout", supervise("logout", backoff, move || logout.clone().run())),
            ("register", supervise("register", backoff, move || register.clone().run())),
        ];

        info!(routines = routines.len(), trigger_buffer = buffer, "Engine started");
        (Self { routines, shutdown }, Triggers::new(trigger_tx))
    }

    /// True while any routine is still being supervised
    pub fn is_running(&self) -> bool {
        self.routines.iter().any(|(_, handle)| !handle.is_finished())
    }

    /// Stop accepting triggers and wait for the routines to finish the work
    /// already queued. Later sends fail with `EngineError::ChannelClosed`.
    pub async fn shutdown(self) {
        info!("Engine shutdown requested");
        self.shutdown.send_replace(true);
        self.join().await;
    }

    /// Wait for every routine to stop. Routines stop once all `Triggers`
    /// handles are dropped or `shutdown` is called.
    pub async fn join(self) {
        for (name, handle) in self.routines {
            if let Err(e) = handle.await {
                error!(routine = name, error = %e, "Supervision task failed");
            }
        }
        info!("Engine stopped");
    }
}

fn supervise<F, Fut>(name: &'static str, backoff: Backoff, mut factory: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut delay = backoff.initial;
        loop {
            let started = Instant::now();
            match tokio::spawn(factory()).await {
                Ok(Ok(())) => {
                    info!(routine = name, "Routine stopped");
                    return;
                }
                Ok(Err(e)) => error!(routine = name, error = %e, "Routine failed"),
                Err(e) if e.is_panic() => error!(routine = name, "Routine panicked"),
                Err(e) => {
                    warn!(routine = name, error = %e, "Routine cancelled, not restarting");
                    return;
                }
            }

            // A routine that stayed up longer than the max delay starts over
            if started.elapsed() > backoff.max {
                delay = backoff.initial;
            }
            warn!(routine = name, delay_ms = delay.as_millis() as u64, "Restarting routine");
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(backoff.max);
        }
    })
}
