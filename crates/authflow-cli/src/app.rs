//! Interactive session state.
//!
//! The `App` owns the trigger handle and a reference `AuthStore`. It turns
//! console inputs into triggers and renders every notification the engine
//! publishes.

use anyhow::Result;
use authflow_core::{
    AuthState, AuthStore, Destination, FormState, Notification, NotificationSink, Triggers,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::console::{Input, SharedUsername, HELP};
use crate::credentials::CredentialStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

/// Login or registration waiting to reach the dashboard
struct PendingLogin {
    username: String,
    /// Password to keep in the keychain once the login succeeds
    remember: Option<String>,
}

pub struct App {
    config: Config,
    triggers: Triggers,
    store: AuthStore,
    output: OutputMode,
    pending: Option<PendingLogin>,
    last_username: SharedUsername,
    credentials: CredentialStore,
}

impl App {
    pub fn new(
        config: Config,
        triggers: Triggers,
        output: OutputMode,
        last_username: SharedUsername,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            config,
            triggers,
            store: AuthStore::new(),
            output,
            pending: None,
            last_username,
            credentials,
        }
    }

    /// Process inputs and notifications until the user quits or input ends.
    pub async fn run(
        &mut self,
        inputs: &mut mpsc::UnboundedReceiver<Input>,
        notifications: &mut mpsc::UnboundedReceiver<Notification>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                Some(notification) = notifications.recv() => {
                    self.handle_notification(notification)?;
                }
                input = inputs.recv() => match input {
                    Some(input) => {
                        if !self.handle_input(input).await? {
                            return Ok(());
                        }
                    }
                    None => return Ok(()),
                },
            }
        }
    }

    /// Returns `false` when the user asked to quit.
    async fn handle_input(&mut self, input: Input) -> Result<bool> {
        match input {
            Input::Login {
                username,
                password,
                remember,
            } => {
                self.fill_form(&username, &password);
                self.triggers.login(&username, &password).await?;
                self.pending = Some(PendingLogin {
                    username,
                    remember: remember.then_some(password),
                });
            }
            Input::Register { username, password } => {
                self.fill_form(&username, &password);
                self.triggers.register(&username, &password).await?;
                self.pending = Some(PendingLogin {
                    username,
                    remember: None,
                });
            }
            Input::Logout => {
                self.pending = None;
                self.triggers.logout().await?;
            }
            Input::Forget { username } => match self.credentials.forget(&username) {
                Ok(true) => println!("Forgot saved password for {}", username),
                Ok(false) => println!("No saved password for {}", username),
                Err(e) => eprintln!("Error: {:#}", e),
            },
            Input::Status => self.print_status()?,
            Input::Help => println!("{}", HELP),
            Input::Quit => return Ok(false),
        }
        Ok(true)
    }

    pub fn handle_notification(&mut self, notification: Notification) -> Result<()> {
        println!("{}", render(self.output, &notification)?);

        let reached_dashboard = notification == Notification::Navigate(Destination::Dashboard);
        self.store.publish(notification);
        if reached_dashboard {
            self.complete_login();
        }
        Ok(())
    }

    fn fill_form(&self, username: &str, password: &str) {
        self.store.set_form(FormState {
            username: username.to_string(),
            secret: mask(password),
        });
    }

    /// Persist what a successful login should be remembered by
    fn complete_login(&mut self) {
        let Some(login) = self.pending.take() else {
            debug!("Dashboard reached without a pending login");
            return;
        };

        self.config.last_username = Some(login.username.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        *self
            .last_username
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(login.username.clone());

        if let Some(password) = login.remember {
            match self.credentials.remember(&login.username, &password) {
                Ok(()) => info!(username = %login.username, "Password remembered"),
                Err(e) => warn!(error = %e, "Failed to remember password"),
            }
        }
    }

    fn print_status(&self) -> Result<()> {
        let state = self.store.snapshot();
        match self.output {
            OutputMode::Json => println!("{}", serde_json::to_string(&state)?),
            OutputMode::Text => println!("{}", describe(&state)),
        }
        Ok(())
    }
}

fn render(output: OutputMode, notification: &Notification) -> Result<String> {
    Ok(match output {
        OutputMode::Text => format!("* {}", notification),
        OutputMode::Json => serde_json::to_string(notification)?,
    })
}

fn describe(state: &AuthState) -> String {
    let mut text = format!(
        "{} at {}",
        if state.is_authenticated {
            "authenticated"
        } else {
            "signed out"
        },
        state.location
    );
    if state.sending_request {
        text.push_str(", request in flight");
    }
    if let Some(error) = &state.last_error {
        text.push_str(&format!(", last error: {}", error));
    }
    text
}

fn mask(password: &str) -> String {
    "*".repeat(password.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_text_and_json() {
        let notification = Notification::Navigate(Destination::Dashboard);

        assert_eq!(
            render(OutputMode::Text, &notification).unwrap(),
            "* navigate to /dashboard"
        );
        assert_eq!(
            render(OutputMode::Json, &notification).unwrap(),
            r#"{"type":"Navigate","payload":"Dashboard"}"#
        );
    }

    #[test]
    fn test_describe_state() {
        let mut state = AuthState::default();
        assert_eq!(describe(&state), "signed out at /");

        state.apply(&Notification::RequestInFlight(true));
        state.apply(&Notification::RequestError("invalid credentials".into()));
        assert_eq!(
            describe(&state),
            "signed out at /, request in flight, last error: invalid credentials"
        );

        state.apply(&Notification::AuthenticationState(true));
        state.apply(&Notification::Navigate(Destination::Dashboard));
        state.apply(&Notification::RequestInFlight(false));
        assert!(describe(&state).starts_with("authenticated at /dashboard"));
    }

    #[test]
    fn test_mask_hides_every_character() {
        assert_eq!(mask("pw1"), "***");
        assert_eq!(mask(""), "");
    }
}
