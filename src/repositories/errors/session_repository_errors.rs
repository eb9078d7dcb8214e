#[derive(Debug)]
pub enum SessionRepositoryError {
    Serialization(String),
    Backend(String),
}

impl std::fmt::Display for SessionRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            SessionRepositoryError::Backend(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for SessionRepositoryError {}
