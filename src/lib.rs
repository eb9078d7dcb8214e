pub mod clock;
pub mod config;
pub mod engine;
pub mod gateway;
pub mod models;
pub mod repositories;
pub mod services;
pub mod transport;
