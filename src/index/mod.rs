//! Embedding index: persistent vector storage plus similarity retrieval.

pub mod retriever;
pub mod sqlite;

pub use retriever::{IndexRetriever, Retriever};
pub use sqlite::{IngestOutcome, ScoredRecord, SqliteIndex};
