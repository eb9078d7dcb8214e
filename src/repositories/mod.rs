pub mod connection_repository;
pub mod errors;
pub mod move_repository;
pub mod session_repository;
pub mod user_repository;
