//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Correlation id: assigned first so every later log line carries it
//! 2. Auth validator: optional bearer token

pub mod auth;
pub mod correlation;
