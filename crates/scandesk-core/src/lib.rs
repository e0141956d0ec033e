//! Scandesk Core Library
//!
//! Domain models, error types, configuration and filename validation shared by every
//! Scandesk crate.

pub mod config;
pub mod error;
pub mod models;
pub mod validation;

pub use config::{Config, DocumentStore, ScandeskConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
