use std::fmt;

use super::SessionToken;

/// Which credential call the authorize operation makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Login => write!(f, "login"),
            AuthMode::Register => write!(f, "register"),
        }
    }
}

/// Normalized result of an operation. Raw credential errors never cross the
/// operation boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Success(Option<SessionToken>),
    Failure(String),
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success(_))
    }
}

/// Winner of one login race. Produced and consumed exactly once per race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceResult {
    AuthWon(OperationOutcome),
    LogoutWon,
}
