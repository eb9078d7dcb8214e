use crate::repositories::errors::user_repository_errors::UserRepositoryError;

#[derive(Debug)]
pub enum RatingServiceError {
    UnknownUser(String),
    Repository(UserRepositoryError),
}

impl std::fmt::Display for RatingServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RatingServiceError::UnknownUser(user) => write!(f, "Unknown user: {}", user),
            RatingServiceError::Repository(err) => write!(f, "Repository error: {}", err),
        }
    }
}

impl std::error::Error for RatingServiceError {}

impl From<UserRepositoryError> for RatingServiceError {
    fn from(err: UserRepositoryError) -> Self {
        RatingServiceError::Repository(err)
    }
}
