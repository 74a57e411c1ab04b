use thiserror::Error;

/// Failure reported by a credential service call.
///
/// Always absorbed at the operation boundary: the coordination routines only
/// ever see an `OperationOutcome`.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Could not derive transport secret: {0}")]
    Derivation(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl CredentialError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 if truncated.trim().is_empty() => {
                CredentialError::Rejected("invalid credentials".to_string())
            }
            401 | 403 => CredentialError::Rejected(truncated),
            409 => CredentialError::Conflict(truncated),
            429 => CredentialError::RateLimited,
            500..=599 => CredentialError::Server(truncated),
            _ => CredentialError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

/// Engine invariant violations and lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A race observed a logout delivery state that cannot happen when the
    /// router hands tickets over under its lock.
    #[error("Race integrity violated: {0}")]
    RaceIntegrity(String),

    /// A logout trigger could have been claimed by more than one listener.
    #[error("Logout trigger could be consumed twice: {0}")]
    DoubleConsumption(String),

    #[error("Engine is shut down")]
    ChannelClosed,
}
