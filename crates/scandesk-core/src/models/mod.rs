//! Data models for the document pipeline
//!
//! Each sub-module covers one concept: where a document belongs, how it is classified,
//! its review lifecycle, who may read it, and the scanner that produces it.

mod access;
mod device;
mod document;
mod document_type;
mod lifecycle;
mod origin;
mod requirements;
mod scan;

pub use access::*;
pub use device::*;
pub use document::*;
pub use document_type::*;
pub use lifecycle::*;
pub use origin::*;
pub use requirements::*;
pub use scan::*;
