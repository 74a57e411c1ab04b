//! Login coordination: races each login against a logout trigger.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::models::{AuthMode, Credentials, OperationOutcome, RaceResult};

use super::dispatch::{LogoutTicket, QueuedLogin};
use super::{authorize, sign_out, signal_authenticated, OperationContext};

pub(crate) struct LoginRoutine {
    ctx: Arc<OperationContext>,
    requests: Mutex<mpsc::UnboundedReceiver<QueuedLogin>>,
}

impl LoginRoutine {
    pub(crate) fn new(ctx: Arc<OperationContext>, requests: mpsc::UnboundedReceiver<QueuedLogin>) -> Self {
        Self {
            ctx,
            requests: Mutex::new(requests),
        }
    }

    pub(crate) async fn run(self: Arc<Self>) -> Result<(), EngineError> {
        let mut requests = self.requests.lock().await;
        while let Some(QueuedLogin { credentials, ticket }) = requests.recv().await {
            info!(username = %credentials.username, "Login requested");
            let result = self.race(credentials, ticket).await?;
            self.settle(result).await;
        }
        info!("Login queue closed, routine stopping");
        Ok(())
    }

    /// Run authorize against the logout claimed by `ticket`.
    ///
    /// Logout is polled first, so a logout delivered while the login was
    /// still queued wins before authorize ever starts, and a logout delivered
    /// by the time authorize finishes still wins. The losing authorize future
    /// is dropped before the result is acted on, which releases its in-flight
    /// flag and discards anything it would have returned.
    async fn race(&self, credentials: Credentials, mut ticket: LogoutTicket) -> Result<RaceResult, EngineError> {
        let mut auth = Box::pin(authorize(&self.ctx, credentials, AuthMode::Login));

        let winner = tokio::select! {
            biased;
            () = ticket.delivered() => RaceResult::LogoutWon,
            outcome = &mut auth => RaceResult::AuthWon(outcome),
        };
        drop(auth);

        match winner {
            RaceResult::AuthWon(outcome) => {
                if ticket.disarm()? {
                    debug!("Logout arrived alongside the authorize result, logout wins");
                    Ok(RaceResult::LogoutWon)
                } else {
                    Ok(RaceResult::AuthWon(outcome))
                }
            }
            RaceResult::LogoutWon => {
                debug!("Logout won the race, authorize cancelled");
                Ok(RaceResult::LogoutWon)
            }
        }
    }

    async fn settle(&self, result: RaceResult) {
        match result {
            RaceResult::AuthWon(OperationOutcome::Success(_)) => {
                info!("Login complete");
                signal_authenticated(&self.ctx);
            }
            RaceResult::AuthWon(OperationOutcome::Failure(message)) => {
                debug!(%message, "Login failed, listening again");
            }
            RaceResult::LogoutWon => sign_out(&self.ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::BoxFuture;

    use super::*;
    use crate::auth::{CredentialClient, CredentialResult, MemoryCredentialClient, SecretDeriver};
    use crate::config::SecretConfig;
    use crate::engine::dispatch::LogoutRouter;
    use crate::models::{Notification, SessionToken};

    /// Routes a logout to the armed race from inside `login`, then succeeds.
    struct RoutingClient {
        router: Arc<LogoutRouter>,
    }

    impl CredentialClient for RoutingClient {
        fn register<'a>(
            &'a self,
            _username: &'a str,
            _secret: &'a str,
        ) -> BoxFuture<'a, CredentialResult<Option<SessionToken>>> {
            Box::pin(async { Ok(None) })
        }

        fn login<'a>(
            &'a self,
            _username: &'a str,
            _secret: &'a str,
        ) -> BoxFuture<'a, CredentialResult<Option<SessionToken>>> {
            Box::pin(async move {
                assert!(self.router.route());
                Ok(Some(SessionToken::new("late")))
            })
        }

        fn logout(&self) -> BoxFuture<'_, CredentialResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn deriver() -> SecretDeriver {
        SecretDeriver::new(SecretConfig {
            memory_kib: 64,
            iterations: 1,
            ..Default::default()
        })
    }

    fn routine(client: Arc<dyn CredentialClient>) -> (LoginRoutine, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(OperationContext::new(client, Arc::new(tx), deriver()));
        let (_queue, requests) = mpsc::unbounded_channel();
        (LoginRoutine::new(ctx, requests), rx)
    }

    #[tokio::test]
    async fn test_logout_delivered_with_auth_result_wins() {
        let router = Arc::new(LogoutRouter::default());
        let client = Arc::new(RoutingClient {
            router: router.clone(),
        });
        let (login, _rx) = routine(client);

        let result = login
            .race(Credentials::new("carol", "pw2"), router.arm())
            .await
            .unwrap();

        assert_eq!(result, RaceResult::LogoutWon);
        assert!(!router.is_armed());
    }

    #[tokio::test]
    async fn test_auth_wins_without_logout() {
        let router = Arc::new(LogoutRouter::default());
        let (login, _rx) = routine(Arc::new(MemoryCredentialClient::new()));

        let result = login
            .race(Credentials::new("bob", "bad"), router.arm())
            .await
            .unwrap();

        assert_eq!(
            result,
            RaceResult::AuthWon(OperationOutcome::Failure("invalid credentials".into()))
        );
        // Race over, logouts go back to the standalone routine
        assert!(!router.route());
    }

    #[tokio::test]
    async fn test_logout_cancels_pending_authorize() {
        let router = Arc::new(LogoutRouter::default());
        let client = Arc::new(MemoryCredentialClient::new().with_auth_latency(Duration::from_secs(60)));
        let (login, mut rx) = routine(client);
        let ticket = router.arm();

        let routed = router.clone();
        tokio::spawn(async move {
            while !routed.route() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            login.race(Credentials::new("carol", "pw2"), ticket),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(result, RaceResult::LogoutWon);
        assert_eq!(rx.try_recv().unwrap(), Notification::RequestInFlight(true));
        assert_eq!(rx.try_recv().unwrap(), Notification::RequestInFlight(false));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_login_settles_quietly() {
        let (login, mut rx) = routine(Arc::new(MemoryCredentialClient::new()));

        login
            .settle(RaceResult::AuthWon(OperationOutcome::Failure("nope".into())))
            .await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_logout_delivered_while_queued_skips_authorize() {
        let router = Arc::new(LogoutRouter::default());
        let client = Arc::new(MemoryCredentialClient::new());
        let (login, mut rx) = routine(client.clone());
        let ticket = router.arm();
        assert!(router.route());

        let result = login
            .race(Credentials::new("carol", "pw2"), ticket)
            .await
            .unwrap();

        assert_eq!(result, RaceResult::LogoutWon);
        assert_eq!(client.login_calls(), 0);
        assert!(rx.try_recv().is_err());
    }
}
