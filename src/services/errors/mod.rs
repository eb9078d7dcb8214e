pub mod bot_service_errors;
pub mod queue_service_errors;
pub mod rating_service_errors;
pub mod session_service_errors;
