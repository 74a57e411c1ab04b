//! Line-based command input.
//!
//! Reading commands and prompting for usernames and passwords all happen on
//! one dedicated thread, so prompts never compete with the command reader for
//! the terminal. Fully resolved inputs are handed to the async side over a
//! channel.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::credentials::CredentialStore;

/// Username offered as the default at the next prompt
pub type SharedUsername = Arc<Mutex<Option<String>>>;

/// A parsed command line, before any prompting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: Option<String>, remember: bool },
    Register { username: Option<String> },
    Logout,
    Forget { username: Option<String> },
    Status,
    Help,
    Quit,
}

/// A command with everything it needs to run
#[derive(Debug)]
pub enum Input {
    Login {
        username: String,
        password: String,
        remember: bool,
    },
    Register {
        username: String,
        password: String,
    },
    Logout,
    Forget { username: String },
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  login [username] [--remember]  Sign in (--remember keeps the password in the keychain)
  register [username]            Create an account and sign in
  logout                         Sign out, cancelling a login in progress
  forget [username]              Remove a remembered password
  status                         Show the current authentication state
  help                           Show this help
  quit                           Exit";

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };

    let mut username = None;
    let mut remember = false;
    for word in words {
        match word {
            "--remember" if name == "login" => remember = true,
            flag if flag.starts_with("--") => {
                return Err(format!("Unknown option '{}' for '{}'", flag, name));
            }
            word if username.is_none() => username = Some(word.to_string()),
            extra => return Err(format!("Unexpected argument '{}'", extra)),
        }
    }

    let takes_username = matches!(name, "login" | "register" | "forget");
    if username.is_some() && !takes_username {
        return Err(format!("'{}' takes no arguments", name));
    }

    let command = match name {
        "login" => Command::Login { username, remember },
        "register" => Command::Register { username },
        "forget" => Command::Forget { username },
        "logout" => Command::Logout,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => {
            return Err(format!(
                "Unknown command '{}'. Type 'help' for commands.",
                other
            ))
        }
    };
    Ok(Some(command))
}

pub struct Console {
    last_username: SharedUsername,
    store: CredentialStore,
}

impl Console {
    pub fn new(last_username: SharedUsername, store: CredentialStore) -> Self {
        Self {
            last_username,
            store,
        }
    }

    /// Start reading stdin on a background thread.
    ///
    /// End of input is reported as `Input::Quit`.
    pub fn spawn(self, tx: mpsc::UnboundedSender<Input>) -> Result<()> {
        std::thread::Builder::new()
            .name("console".into())
            .spawn(move || self.run(tx))
            .context("Failed to start console thread")?;
        Ok(())
    }

    fn run(self, tx: mpsc::UnboundedSender<Input>) {
        loop {
            let line = match read_line() {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("End of input");
                    let _ = tx.send(Input::Quit);
                    return;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read input");
                    let _ = tx.send(Input::Quit);
                    return;
                }
            };

            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(message) => {
                    eprintln!("{}", message);
                    continue;
                }
            };

            let input = match self.resolve(command) {
                Ok(Some(input)) => input,
                Ok(None) => continue,
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    continue;
                }
            };

            let quit = matches!(input, Input::Quit);
            if tx.send(input).is_err() || quit {
                return;
            }
        }
    }

    /// Prompt for whatever the command is missing. `None` means the command
    /// was abandoned and the user has already been told why.
    fn resolve(&self, command: Command) -> Result<Option<Input>> {
        let input = match command {
            Command::Login { username, remember } => {
                let Some(username) = self.username(username)? else {
                    return Ok(None);
                };
                let password = self.login_password(&username)?;
                Input::Login {
                    username,
                    password,
                    remember,
                }
            }
            Command::Register { username } => {
                let Some(username) = self.username(username)? else {
                    return Ok(None);
                };
                let password = rpassword::prompt_password("Choose a password: ")?;
                let confirm = rpassword::prompt_password("Confirm password: ")?;
                if password != confirm {
                    eprintln!("Passwords do not match");
                    return Ok(None);
                }
                Input::Register { username, password }
            }
            Command::Forget { username } => {
                let Some(username) = self.username(username)? else {
                    return Ok(None);
                };
                Input::Forget { username }
            }
            Command::Logout => Input::Logout,
            Command::Status => Input::Status,
            Command::Help => Input::Help,
            Command::Quit => Input::Quit,
        };
        Ok(Some(input))
    }

    fn username(&self, given: Option<String>) -> Result<Option<String>> {
        if given.is_some() {
            return Ok(given);
        }

        let last = self
            .last_username
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match &last {
            Some(name) => print!("Username [{}]: ", name),
            None => print!("Username: "),
        }
        io::stdout().flush()?;

        let typed = read_line()?.unwrap_or_default();
        if !typed.is_empty() {
            return Ok(Some(typed));
        }
        if last.is_none() {
            eprintln!("A username is required");
        }
        Ok(last)
    }

    fn login_password(&self, username: &str) -> Result<String> {
        let saved = self.store.recall(username).unwrap_or_else(|e| {
            warn!(error = %e, "Keychain unavailable, not offering a saved password");
            None
        });
        let Some(saved) = saved else {
            return Ok(rpassword::prompt_password("Password: ")?);
        };

        let typed = rpassword::prompt_password("Password (blank to use saved): ")?;
        if typed.is_empty() {
            debug!(%username, "Using remembered password");
            Ok(saved)
        } else {
            Ok(typed)
        }
    }
}

fn read_line() -> io::Result<Option<String>> {
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
