pub mod bot_service;
pub mod errors;
pub mod liveness_service;
pub mod queue_service;
pub mod rating_service;
pub mod session_service;
