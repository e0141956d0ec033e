//! Scandesk persistence layer
//!
//! Document repository interface plus its Postgres and in-memory implementations.

pub mod db;

pub use db::documents::{
    DocumentRepository, InMemoryDocumentRepository, PgDocumentRepository, TransitionOutcome,
};
pub use db::transaction::TransactionGuard;
