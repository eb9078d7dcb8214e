use crate::engine::rules::RulesError;

#[derive(Debug)]
pub enum SessionServiceError {
    /// Unknown match id. No state change.
    NotFound(String),
    /// Stale action against a finished match. Callers treat this as a no-op.
    AlreadyEnded(String),
    /// Rejected by the rules engine. No state change.
    IllegalMove(String),
    /// Malformed or out-of-place request (wrong participant, bad input).
    Validation(String),
    /// The user already has a non-ended match; a second one may not start.
    ActiveMatchExists(String),
}

impl std::fmt::Display for SessionServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionServiceError::NotFound(id) => write!(f, "Match not found: {}", id),
            SessionServiceError::AlreadyEnded(id) => write!(f, "Match already ended: {}", id),
            SessionServiceError::IllegalMove(msg) => write!(f, "Illegal move: {}", msg),
            SessionServiceError::Validation(msg) => write!(f, "Validation error: {}", msg),
            SessionServiceError::ActiveMatchExists(user) => {
                write!(f, "User {} already has an active match", user)
            }
        }
    }
}

impl std::error::Error for SessionServiceError {}

impl From<RulesError> for SessionServiceError {
    fn from(err: RulesError) -> Self {
        match err {
            RulesError::IllegalMove(msg) => SessionServiceError::IllegalMove(msg),
            RulesError::InvalidPosition(msg) => SessionServiceError::Validation(msg),
            RulesError::InvalidInput(msg) => SessionServiceError::Validation(msg),
        }
    }
}
