//! Shared types for the letter services

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
