//! Upload ingestion.
//!
//! Turns uploaded file parts into image entities: enforces the size limit
//! before reading, reads the content into memory, derives the sort index
//! from the part's filename and classifies the content type against an
//! optional allow-list. Ingestion never persists anything.

mod classify;
mod error;
mod part;
mod policy;
mod progress;
mod reader;

pub use classify::{ContentClassifier, SignatureClassifier, SNIFF_LEN};
pub use error::IngestError;
pub use part::{FilePart, MemoryPart};
pub use policy::UploadPolicy;
pub use progress::ProgressReader;
pub use reader::{ingest_parts, read_from_part};
