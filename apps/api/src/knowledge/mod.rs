//! Resume knowledge extraction: text → sections → entries → domain-tagged, embedded
//! chunks in the vector index, plus the structured candidate summary used for planning.
//! Identical re-uploads (same SHA-256 for the same user) reuse the stored result.

pub mod classifier;
pub mod handlers;
pub mod ingest;
pub mod prompts;
pub mod sections;
pub mod store;
pub mod summary;
pub mod text;

pub use ingest::ResumeIngestor;
pub use store::{MemoryResumeStore, PgResumeStore, ResumeStore};
