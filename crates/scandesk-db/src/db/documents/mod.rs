mod memory;
mod postgres;
mod repository;

pub use memory::InMemoryDocumentRepository;
pub use postgres::PgDocumentRepository;
pub use repository::{DocumentRepository, TransitionOutcome};
