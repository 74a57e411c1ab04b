//! Trigger distribution.
//!
//! Every trigger enters through one queue owned by the dispatcher. Register
//! triggers are forwarded to their routine. A login trigger is forwarded
//! together with a `LogoutTicket` claimed at the same moment, so a logout
//! dispatched right behind it is already aimed at that login, whether or not
//! the login routine has picked it up yet. A logout goes to the oldest claimed
//! login, otherwise to the standalone logout routine, so each physical logout
//! is consumed once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info};

use crate::error::EngineError;
use crate::models::{Credentials, OperationRequest};

/// Producer handle for triggers. Dropping every clone shuts the engine down.
///
/// Sends wait while `trigger_buffer` triggers are already waiting for the
/// dispatcher; an accepted trigger is never dropped.
#[derive(Clone)]
pub struct Triggers {
    tx: mpsc::Sender<OperationRequest>,
}

impl Triggers {
    pub(crate) fn new(tx: mpsc::Sender<OperationRequest>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, request: OperationRequest) -> Result<(), EngineError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn login(&self, username: &str, secret: &str) -> Result<(), EngineError> {
        self.send(OperationRequest::Login(Credentials::new(username, secret)))
            .await
    }

    pub async fn register(&self, username: &str, secret: &str) -> Result<(), EngineError> {
        self.send(OperationRequest::Register(Credentials::new(username, secret)))
            .await
    }

    pub async fn logout(&self) -> Result<(), EngineError> {
        self.send(OperationRequest::Logout).await
    }
}

/// A login waiting in, or taken from, the login routine's queue.
pub(crate) struct QueuedLogin {
    pub(crate) credentials: Credentials,
    pub(crate) ticket: LogoutTicket,
}

struct Claim {
    race: u64,
    tx: oneshot::Sender<()>,
}

/// Claims on logout triggers, one per login not yet settled, oldest first.
#[derive(Default)]
pub(crate) struct LogoutRouter {
    claims: Mutex<VecDeque<Claim>>,
    next_race: AtomicU64,
}

impl LogoutRouter {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Claim>> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the next logout trigger for a login about to be queued.
    pub(crate) fn arm(self: &Arc<Self>) -> LogoutTicket {
        let race = self.next_race.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        self.lock().push_back(Claim { race, tx });

        LogoutTicket {
            race,
            rx,
            router: Arc::clone(self),
        }
    }

    /// Hand a logout to the oldest claim, if any.
    ///
    /// Delivery happens under the lock, so a race that disarms afterwards is
    /// guaranteed to see it. Returns `false` when the caller must handle the
    /// logout itself.
    pub(crate) fn route(&self) -> bool {
        let mut claims = self.lock();
        while let Some(claim) = claims.pop_front() {
            if claim.tx.send(()).is_ok() {
                debug!(race = claim.race, "Logout routed to login race");
                return true;
            }
        }
        false
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        !self.lock().is_empty()
    }
}

/// A login's claim on the next logout trigger.
///
/// Dropping an undisarmed ticket withdraws the claim, so a crashed login
/// routine never leaves logouts pointed at a dead race.
pub(crate) struct LogoutTicket {
    race: u64,
    rx: oneshot::Receiver<()>,
    router: Arc<LogoutRouter>,
}

impl LogoutTicket {
    /// Resolves once a logout has been routed to this race. Cancel safe.
    pub(crate) async fn delivered(&mut self) {
        if (&mut self.rx).await.is_err() {
            // Sender dropped without a logout; this branch can never win
            std::future::pending::<()>().await;
        }
    }

    /// Withdraw the claim. Returns whether a logout was delivered first.
    pub(crate) fn disarm(mut self) -> Result<bool, EngineError> {
        let mut claims = self.router.lock();
        match claims.iter().position(|claim| claim.race == self.race) {
            Some(index) => {
                claims.remove(index);
                match self.rx.try_recv() {
                    Ok(()) => Err(EngineError::DoubleConsumption(format!(
                        "race {} received a logout while its claim was still open",
                        self.race
                    ))),
                    Err(_) => Ok(false),
                }
            }
            None => match self.rx.try_recv() {
                Ok(()) => Ok(true),
                Err(e) => Err(EngineError::RaceIntegrity(format!(
                    "race {} lost its claim without a delivered logout ({})",
                    self.race, e
                ))),
            },
        }
    }
}

impl Drop for LogoutTicket {
    fn drop(&mut self) {
        self.router.lock().retain(|claim| claim.race != self.race);
    }
}

/// Single consumer of the inbound trigger queue.
///
/// Routine queues are unbounded: the dispatcher never waits on a busy
/// routine, so a logout can always reach the login it has to cancel.
pub(crate) struct Dispatcher {
    inbound: tokio::sync::Mutex<mpsc::Receiver<OperationRequest>>,
    shutdown: watch::Receiver<bool>,
    login: mpsc::UnboundedSender<QueuedLogin>,
    register: mpsc::UnboundedSender<Credentials>,
    logout: mpsc::UnboundedSender<()>,
    router: Arc<LogoutRouter>,
}

impl Dispatcher {
    pub(crate) fn new(
        inbound: mpsc::Receiver<OperationRequest>,
        login: mpsc::UnboundedSender<QueuedLogin>,
        register: mpsc::UnboundedSender<Credentials>,
        logout: mpsc::UnboundedSender<()>,
        router: Arc<LogoutRouter>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            inbound: tokio::sync::Mutex::new(inbound),
            shutdown,
            login,
            register,
            logout,
            router,
        }
    }

    pub(crate) async fn run(self: Arc<Self>) -> Result<(), EngineError> {
        let mut inbound = self.inbound.lock().await;
        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                biased;
                () = Self::shutdown_requested(&mut shutdown) => {
                    inbound.close();
                    info!("Shutdown requested, dispatcher stopping");
                    return Ok(());
                }
                request = inbound.recv() => match request {
                    Some(request) => self.dispatch(request),
                    None => {
                        info!("Trigger source closed, dispatcher stopping");
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
        let requested = shutdown.wait_for(|stop| *stop).await.is_ok();
        if !requested {
            // Supervisor handle dropped without shutting down; keep running
            std::future::pending::<()>().await;
        }
    }

    fn dispatch(&self, request: OperationRequest) {
        debug!(kind = request.kind(), "Trigger received");
        match request {
            OperationRequest::Login(credentials) => {
                let ticket = self.router.arm();
                Self::forward(&self.login, QueuedLogin { credentials, ticket }, "login");
            }
            OperationRequest::Register(credentials) => {
                Self::forward(&self.register, credentials, "register")
            }
            OperationRequest::Logout => {
                if !self.router.route() {
                    Self::forward(&self.logout, (), "logout");
                }
            }
        }
    }

    fn forward<T>(queue: &mpsc::UnboundedSender<T>, item: T, routine: &'static str) {
        if queue.send(item).is_err() {
            error!(routine, "Routine queue closed, trigger dropped");
        }
    }
}
