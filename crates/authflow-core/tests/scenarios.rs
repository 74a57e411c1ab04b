use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use authflow_core::{
    CredentialClient, CredentialResult, Destination, EngineConfig, MemoryCredentialClient,
    Notification, SecretConfig, SecretDeriver, SessionToken, Supervisor, Triggers,
};
use futures::future::BoxFuture;
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

fn secret_config() -> SecretConfig {
    SecretConfig {
        memory_kib: 64,
        iterations: 1,
        ..Default::default()
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        restart_backoff_ms: 1,
        max_restart_backoff_ms: 10,
        secret: secret_config(),
        ..Default::default()
    }
}

fn derived(username: &str, password: &str) -> String {
    SecretDeriver::new(secret_config())
        .derive_blocking(username, password)
        .unwrap()
}

struct Harness {
    supervisor: Supervisor,
    triggers: Triggers,
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl Harness {
    fn start(client: Arc<dyn CredentialClient>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (supervisor, triggers) = Supervisor::start(&config(), client, Arc::new(tx));
        Self {
            supervisor,
            triggers,
            rx,
        }
    }

    async fn next(&mut self) -> Notification {
        timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for notification")
            .expect("notification channel closed")
    }

    /// Read notifications up to and including `last`
    async fn collect_until(&mut self, last: &Notification) -> Vec<Notification> {
        let mut seen = Vec::new();
        loop {
            let n = self.next().await;
            let done = &n == last;
            seen.push(n);
            if done {
                return seen;
            }
        }
    }

    async fn assert_quiet(&mut self) {
        if let Ok(Some(n)) = timeout(QUIET, self.rx.recv()).await {
            panic!("unexpected notification: {:?}", n);
        }
    }
}

fn authenticated_sequence() -> Vec<Notification> {
    vec![
        Notification::RequestInFlight(true),
        Notification::RequestInFlight(false),
        Notification::AuthenticationState(true),
        Notification::form_reset(),
        Notification::Navigate(Destination::Dashboard),
    ]
}

fn standalone_logout_sequence() -> Vec<Notification> {
    vec![
        Notification::AuthenticationState(false),
        Notification::RequestInFlight(true),
        Notification::RequestInFlight(false),
        Notification::Navigate(Destination::Root),
    ]
}

#[tokio::test]
async fn test_login_success_publishes_authenticated_sequence() {
    let client = Arc::new(MemoryCredentialClient::new().with_account("alice", &derived("alice", "pw1")));
    let mut h = Harness::start(client.clone());

    h.triggers.login("alice", "pw1").await.unwrap();
    let events = h
        .collect_until(&Notification::Navigate(Destination::Dashboard))
        .await;

    assert_eq!(events, authenticated_sequence());
    assert_eq!(client.login_calls(), 1);
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_login_failure_publishes_error_only() {
    let client = Arc::new(MemoryCredentialClient::new().with_account("bob", &derived("bob", "good")));
    let mut h = Harness::start(client);

    h.triggers.login("bob", "bad").await.unwrap();
    let events = h
        .collect_until(&Notification::RequestInFlight(false))
        .await;

    assert_eq!(
        events,
        vec![
            Notification::RequestInFlight(true),
            Notification::RequestError("invalid credentials".into()),
            Notification::RequestInFlight(false),
        ]
    );
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_logout_during_login_wins_race() {
    let client = Arc::new(
        MemoryCredentialClient::new()
            .with_account("carol", &derived("carol", "pw2"))
            .with_auth_latency(Duration::from_secs(60)),
    );
    let mut h = Harness::start(client.clone());

    h.triggers.login("carol", "pw2").await.unwrap();
    // The race is armed before authorize raises the in-flight flag
    assert_eq!(h.next().await, Notification::RequestInFlight(true));

    h.triggers.logout().await.unwrap();
    let events = h.collect_until(&Notification::Navigate(Destination::Root)).await;

    assert_eq!(
        events,
        vec![
            // released by the cancelled authorize
            Notification::RequestInFlight(false),
            Notification::AuthenticationState(false),
            Notification::RequestInFlight(true),
            Notification::RequestInFlight(false),
            Notification::Navigate(Destination::Root),
        ]
    );
    assert!(!events.contains(&Notification::AuthenticationState(true)));

    // The logout was consumed by the race only
    h.assert_quiet().await;
    assert_eq!(client.logout_calls(), 1);
}

#[tokio::test]
async fn test_registration_success_matches_login_sequence() {
    let client = Arc::new(MemoryCredentialClient::new());
    let mut h = Harness::start(client.clone());

    h.triggers.register("dave", "pw3").await.unwrap();
    let events = h
        .collect_until(&Notification::Navigate(Destination::Dashboard))
        .await;

    assert_eq!(events, authenticated_sequence());
    assert!(client.has_account("dave"));
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_duplicate_registration_fails() {
    let client = Arc::new(MemoryCredentialClient::new().with_account("dave", "existing"));
    let mut h = Harness::start(client);

    h.triggers.register("dave", "pw3").await.unwrap();
    let events = h
        .collect_until(&Notification::RequestInFlight(false))
        .await;

    assert_eq!(
        events[1],
        Notification::RequestError("username already exists".into())
    );
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_each_logout_trigger_runs_one_logout() {
    let client = Arc::new(MemoryCredentialClient::new());
    let mut h = Harness::start(client.clone());

    for _ in 0..3 {
        h.triggers.logout().await.unwrap();
    }

    let mut events = Vec::new();
    for _ in 0..3 {
        events.extend(h.collect_until(&Notification::Navigate(Destination::Root)).await);
    }

    let expected: Vec<Notification> = std::iter::repeat(standalone_logout_sequence())
        .take(3)
        .flatten()
        .collect();
    assert_eq!(events, expected);
    h.assert_quiet().await;
    assert_eq!(client.logout_calls(), 3);
}

#[tokio::test]
async fn test_failed_logout_still_signs_out() {
    let client = Arc::new(MemoryCredentialClient::new());
    client.set_fail_logout(true);
    let mut h = Harness::start(client);

    h.triggers.logout().await.unwrap();
    let events = h.collect_until(&Notification::Navigate(Destination::Root)).await;

    assert_eq!(
        events,
        vec![
            Notification::AuthenticationState(false),
            Notification::RequestInFlight(true),
            Notification::RequestError("Server error: logout unavailable".into()),
            Notification::RequestInFlight(false),
            Notification::Navigate(Destination::Root),
        ]
    );
}

#[tokio::test]
async fn test_logout_during_registration_is_independent() {
    let client = Arc::new(MemoryCredentialClient::new().with_auth_latency(Duration::from_millis(300)));
    let mut h = Harness::start(client.clone());

    h.triggers.register("erin", "pw4").await.unwrap();
    assert_eq!(h.next().await, Notification::RequestInFlight(true));
    h.triggers.logout().await.unwrap();

    let mut events = Vec::new();
    while !(events.contains(&Notification::Navigate(Destination::Root))
        && events.contains(&Notification::Navigate(Destination::Dashboard)))
    {
        events.push(h.next().await);
    }

    // Registration is not raced, so both workflows complete
    assert_eq!(client.logout_calls(), 1);
    assert!(client.has_account("erin"));
    assert!(events.contains(&Notification::AuthenticationState(false)));
    assert!(events.contains(&Notification::AuthenticationState(true)));
}

#[tokio::test]
async fn test_login_after_race_listens_again() {
    let client = Arc::new(
        MemoryCredentialClient::new()
            .with_account("carol", &derived("carol", "pw2"))
            .with_auth_latency(Duration::from_millis(200)),
    );
    let mut h = Harness::start(client.clone());

    h.triggers.login("carol", "pw2").await.unwrap();
    assert_eq!(h.next().await, Notification::RequestInFlight(true));
    h.triggers.logout().await.unwrap();
    h.collect_until(&Notification::Navigate(Destination::Root)).await;

    h.triggers.login("carol", "pw2").await.unwrap();
    let events = h
        .collect_until(&Notification::Navigate(Destination::Dashboard))
        .await;
    assert_eq!(events, authenticated_sequence());
    assert_eq!(client.login_calls(), 2);
}

#[tokio::test]
async fn test_logout_right_after_login_cancels_it() {
    let client = Arc::new(
        MemoryCredentialClient::new()
            .with_account("carol", &derived("carol", "pw2"))
            .with_auth_latency(Duration::from_millis(100)),
    );
    let mut h = Harness::start(client.clone());

    // No waiting in between: the logout may reach the engine before the
    // login routine has even picked the login up
    h.triggers.login("carol", "pw2").await.unwrap();
    h.triggers.logout().await.unwrap();

    let events = h.collect_until(&Notification::Navigate(Destination::Root)).await;
    h.assert_quiet().await;

    assert!(!events.contains(&Notification::AuthenticationState(true)));
    assert!(!events.contains(&Notification::Navigate(Destination::Dashboard)));
    assert_eq!(
        events.iter().filter(|n| **n == Notification::AuthenticationState(false)).count(),
        1
    );
    let raised = events
        .iter()
        .filter(|n| **n == Notification::RequestInFlight(true))
        .count();
    let released = events
        .iter()
        .filter(|n| **n == Notification::RequestInFlight(false))
        .count();
    assert_eq!(raised, released);
    assert_eq!(client.logout_calls(), 1);
    assert!(client.login_calls() <= 1);
}

#[tokio::test]
async fn test_every_accepted_login_runs() {
    let client = Arc::new(
        MemoryCredentialClient::new()
            .with_account("alice", &derived("alice", "pw1"))
            .with_auth_latency(Duration::from_millis(20)),
    );
    let mut h = Harness::start(client.clone());

    // More logins than the trigger buffer holds
    for _ in 0..12 {
        h.triggers.login("alice", "pw1").await.unwrap();
    }
    for _ in 0..12 {
        let events = h
            .collect_until(&Notification::Navigate(Destination::Dashboard))
            .await;
        assert_eq!(events, authenticated_sequence());
    }

    h.assert_quiet().await;
    assert_eq!(client.login_calls(), 12);
}

/// Holds every login until released, and reports when one starts.
struct GatedClient {
    inner: MemoryCredentialClient,
    gate: Arc<Notify>,
    started: mpsc::UnboundedSender<()>,
}

impl CredentialClient for GatedClient {
    fn register<'a>(
        &'a self,
        username: &'a str,
        secret: &'a str,
    ) -> BoxFuture<'a, CredentialResult<Option<SessionToken>>> {
        self.inner.register(username, secret)
    }

    fn login<'a>(
        &'a self,
        username: &'a str,
        secret: &'a str,
    ) -> BoxFuture<'a, CredentialResult<Option<SessionToken>>> {
        let _ = self.started.send(());
        Box::pin(async move {
            self.gate.notified().await;
            self.inner.login(username, secret).await
        })
    }

    fn logout(&self) -> BoxFuture<'_, CredentialResult<()>> {
        self.inner.logout()
    }
}

#[tokio::test]
async fn test_logout_ready_with_login_result_wins() {
    let gate = Arc::new(Notify::new());
    let (started_tx, mut started) = mpsc::unbounded_channel();
    let client = Arc::new(GatedClient {
        inner: MemoryCredentialClient::new().with_account("carol", &derived("carol", "pw2")),
        gate: gate.clone(),
        started: started_tx,
    });
    let mut h = Harness::start(client.clone());

    h.triggers.login("carol", "pw2").await.unwrap();
    timeout(WAIT, started.recv()).await.unwrap().unwrap();
    assert_eq!(h.next().await, Notification::RequestInFlight(true));

    // Queue the logout and let the login finish before either is handled
    h.triggers.logout().await.unwrap();
    gate.notify_one();

    let events = h.collect_until(&Notification::Navigate(Destination::Root)).await;
    assert_eq!(
        events,
        vec![
            Notification::RequestInFlight(false),
            Notification::AuthenticationState(false),
            Notification::RequestInFlight(true),
            Notification::RequestInFlight(false),
            Notification::Navigate(Destination::Root),
        ]
    );
    h.assert_quiet().await;
    assert_eq!(client.inner.logout_calls(), 1);
}

/// Panics on the first login, then delegates.
struct PanicOnceClient {
    inner: MemoryCredentialClient,
    panicked: AtomicBool,
}

impl CredentialClient for PanicOnceClient {
    fn register<'a>(
        &'a self,
        username: &'a str,
        secret: &'a str,
    ) -> BoxFuture<'a, CredentialResult<Option<SessionToken>>> {
        self.inner.register(username, secret)
    }

    fn login<'a>(
        &'a self,
        username: &'a str,
        secret: &'a str,
    ) -> BoxFuture<'a, CredentialResult<Option<SessionToken>>> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("credential backend crashed");
        }
        self.inner.login(username, secret)
    }

    fn logout(&self) -> BoxFuture<'_, CredentialResult<()>> {
        self.inner.logout()
    }
}

#[tokio::test]
async fn test_crashed_login_routine_is_restarted() {
    let client = Arc::new(PanicOnceClient {
        inner: MemoryCredentialClient::new().with_account("alice", &derived("alice", "pw1")),
        panicked: AtomicBool::new(false),
    });
    let mut h = Harness::start(client);

    h.triggers.login("alice", "pw1").await.unwrap();
    // The in-flight flag is released while the routine unwinds
    let events = h
        .collect_until(&Notification::RequestInFlight(false))
        .await;
    assert_eq!(
        events,
        vec![
            Notification::RequestInFlight(true),
            Notification::RequestInFlight(false),
        ]
    );

    // Logout outside a race still works while login restarts
    h.triggers.logout().await.unwrap();
    assert_eq!(
        h.collect_until(&Notification::Navigate(Destination::Root)).await,
        standalone_logout_sequence()
    );

    h.triggers.login("alice", "pw1").await.unwrap();
    let events = h
        .collect_until(&Notification::Navigate(Destination::Dashboard))
        .await;
    assert_eq!(events, authenticated_sequence());
}

#[tokio::test]
async fn test_dropping_triggers_stops_engine() {
    let h = Harness::start(Arc::new(MemoryCredentialClient::new()));
    assert!(h.supervisor.is_running());

    let Harness {
        supervisor,
        triggers,
        rx: _rx,
    } = h;
    let spare = triggers.clone();
    drop(triggers);
    drop(spare);

    timeout(WAIT, supervisor.join())
        .await
        .expect("engine did not stop");
}

#[tokio::test]
async fn test_send_after_shutdown_fails() {
    let h = Harness::start(Arc::new(MemoryCredentialClient::new()));
    let Harness {
        supervisor,
        triggers,
        rx: _rx,
    } = h;

    timeout(WAIT, supervisor.shutdown())
        .await
        .expect("engine did not stop");

    assert_eq!(
        triggers.logout().await,
        Err(authflow_core::EngineError::ChannelClosed)
    );
}

#[tokio::test]
async fn test_shutdown_finishes_queued_work() {
    let client = Arc::new(MemoryCredentialClient::new());
    let mut h = Harness::start(client.clone());

    h.triggers.logout().await.unwrap();
    assert_eq!(h.next().await, Notification::AuthenticationState(false));

    let Harness {
        supervisor,
        triggers: _triggers,
        mut rx,
    } = h;
    timeout(WAIT, supervisor.shutdown()).await.unwrap();

    let mut rest = Vec::new();
    while let Ok(n) = rx.try_recv() {
        rest.push(n);
    }
    assert_eq!(rest.last(), Some(&Notification::Navigate(Destination::Root)));
    assert_eq!(client.logout_calls(), 1);
}
