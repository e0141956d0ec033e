//! Scandesk Services Layer
//!
//! Business services over the document store: the integrity engine, per-type
//! validation and the document lifecycle manager. HTTP handling stays in
//! scandesk-api; scanner orchestration lives in scandesk-scanner.

pub mod integrity;
pub mod lifecycle;
pub mod validator;

pub use integrity::{compute_hash, hash_bytes, IntegrityEngine, IntegrityReport, HASH_CHUNK_SIZE};
pub use lifecycle::{DocumentLifecycleManager, DocumentUpload};
pub use validator::{DocumentValidator, ValidationReport};
