//! Database repositories for the data access layer
//!
//! `documents` holds the document repository trait and its implementations;
//! `transaction` wraps multi-statement Postgres work.

pub mod documents;
pub mod transaction;
