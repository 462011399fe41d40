//! Error handling
//!
//! Defines error types and the errno mapping used at the C boundary.

pub mod handlers;
pub mod types;

pub use types::*;
