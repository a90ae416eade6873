//! API endpoint handlers.

pub mod extract;
pub mod health;
pub mod log_level;
