//! Scandesk API Library
//!
//! HTTP surface over the document lifecycle manager and the scan session coordinator,
//! plus application setup.

pub mod auth;
pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
