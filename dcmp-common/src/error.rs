//! Common error types for dcmp

use thiserror::Error;

/// Common result type for dcmp operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the dcmp crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
