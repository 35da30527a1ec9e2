//! Gate error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Invalid gate settings: {0}")]
    InvalidSettings(String),

    #[error("Failed to configure switch pin: {0}")]
    Pin(#[source] common::Error),

    /// The auto-disable thread could not be created. Not recoverable.
    #[error("Failed to create auto-disable thread: {0}")]
    Spawn(#[source] std::io::Error),
}
