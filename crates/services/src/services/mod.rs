pub mod cases;
pub mod config;
pub mod events;
pub mod pending_cases;
