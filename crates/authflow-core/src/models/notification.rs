use std::fmt;

use serde::{Deserialize, Serialize};

/// Navigation target signalled after an authentication change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Destination {
    Dashboard,
    #[default]
    Root,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Dashboard => write!(f, "/dashboard"),
            Destination::Root => write!(f, "/"),
        }
    }
}

/// Login/registration form contents as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct FormState {
    pub username: String,
    pub secret: String,
}

/// State-change event published by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Notification {
    RequestInFlight(bool),
    AuthenticationState(bool),
    RequestError(String),
    FormReset(FormState),
    Navigate(Destination),
}

impl Notification {
    /// Form reset to empty fields
    pub fn form_reset() -> Self {
        Notification::FormReset(FormState::default())
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::RequestInFlight(true) => write!(f, "request started"),
            Notification::RequestInFlight(false) => write!(f, "request finished"),
            Notification::AuthenticationState(true) => write!(f, "authenticated"),
            Notification::AuthenticationState(false) => write!(f, "signed out"),
            Notification::RequestError(message) => write!(f, "error: {}", message),
            Notification::FormReset(_) => write!(f, "form cleared"),
            Notification::Navigate(destination) => write!(f, "navigate to {}", destination),
        }
    }
}
