pub mod events;
pub mod match_session;
pub mod move_record;
pub mod participant;
pub mod queue;
pub mod user;
