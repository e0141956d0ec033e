//! Scandesk Storage Library
//!
//! Storage abstraction for the managed document area and its local filesystem
//! implementation.
//!
//! # Storage key format
//!
//! `documents/{origin}/{yyyy}/{mm}/{document_id}.{ext}` where `{origin}` is
//! `client-42`, `vehicle-7`, `general` and so on. Keys must not contain `..` or a
//! leading `/`. Key generation lives in the `keys` module.

pub mod factory;
pub mod keys;
pub mod local;
pub mod traits;

pub use factory::create_storage;
pub use keys::generate_storage_key;
pub use local::LocalStorage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
