pub mod move_repository_errors;
pub mod session_repository_errors;
pub mod user_repository_errors;
