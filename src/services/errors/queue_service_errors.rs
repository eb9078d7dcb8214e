use crate::services::errors::session_service_errors::SessionServiceError;

#[derive(Debug)]
pub enum QueueServiceError {
    Session(SessionServiceError),
}

impl std::fmt::Display for QueueServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueServiceError::Session(err) => write!(f, "Session error: {}", err),
        }
    }
}

impl std::error::Error for QueueServiceError {}

impl From<SessionServiceError> for QueueServiceError {
    fn from(err: SessionServiceError) -> Self {
        QueueServiceError::Session(err)
    }
}
