//! Reference state container for `AuthState`.
//!
//! `AuthStore` is what a presentation layer would subscribe to. Publishing a
//! notification reduces it into the current state and wakes every watcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::models::{Destination, FormState, Notification};

use super::NotificationSink;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AuthState {
    pub is_authenticated: bool,
    pub sending_request: bool,
    pub last_error: Option<String>,
    pub form: FormState,
    pub location: Destination,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AuthState {
    /// Fold one notification into the state
    pub fn apply(&mut self, notification: &Notification) {
        match notification {
            Notification::RequestInFlight(sending) => {
                self.sending_request = *sending;
                if *sending {
                    self.last_error = None;
                }
            }
            Notification::AuthenticationState(authenticated) => {
                self.is_authenticated = *authenticated;
            }
            Notification::RequestError(message) => {
                self.last_error = Some(message.clone());
            }
            Notification::FormReset(form) => {
                self.form = form.clone();
            }
            Notification::Navigate(destination) => {
                self.location = *destination;
            }
        }
        self.updated_at = Some(Utc::now());
    }
}

pub struct AuthStore {
    state: watch::Sender<AuthState>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self { state }
    }

    /// Current state snapshot
    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Record what the user typed into the form
    pub fn set_form(&self, form: FormState) {
        self.state.send_modify(|state| state.form = form);
    }
}

impl NotificationSink for AuthStore {
    fn publish(&self, notification: Notification) {
        self.state.send_modify(|state| state.apply(&notification));
    }
}
