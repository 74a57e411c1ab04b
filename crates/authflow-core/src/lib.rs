//! Authflow core - orchestration engine for client-driven authentication.
//!
//! Login, registration and logout requests arrive as triggers. Long-lived
//! coordination routines run each workflow against a `CredentialClient`,
//! race an in-flight login against a logout, and publish ordered
//! `Notification`s to an injected `NotificationSink`.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use authflow_core::{EngineConfig, MemoryCredentialClient, Supervisor};
//! use tokio::sync::mpsc;
//!
//! # async fn demo() -> Result<(), authflow_core::EngineError> {
//! let (tx, mut notifications) = mpsc::unbounded_channel();
//! let client = Arc::new(MemoryCredentialClient::new());
//! let (supervisor, triggers) = Supervisor::start(&EngineConfig::default(), client, Arc::new(tx));
//!
//! triggers.register("dave", "pw3").await?;
//! while let Some(notification) = notifications.recv().await {
//!     println!("{}", notification);
//! }
//! drop(triggers);
//! supervisor.join().await;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod notify;

pub use auth::{CredentialClient, CredentialResult, HttpCredentialClient, MemoryCredentialClient, SecretDeriver};
pub use config::{EngineConfig, HttpClientConfig, SecretConfig};
pub use engine::{authorize, perform_logout, OperationContext, Supervisor, Triggers};
pub use error::{CredentialError, EngineError};
pub use models::{
    AuthMode, Credentials, Destination, FormState, Notification, OperationOutcome,
    OperationRequest, RaceResult, SessionToken,
};
pub use notify::{AuthState, AuthStore, NotificationSink, SharedSink};
