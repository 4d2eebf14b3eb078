//! Domain types and collaborator contracts for the Crazy Dave bot.

pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod generation;
pub mod transport;

// Re-export common error type
pub use error::{DaveError, Result};
