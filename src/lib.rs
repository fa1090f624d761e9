//! Krishi Sarthi backend: retrieval-augmented question answering over the
//! Kisan Call Center (KCC) agricultural Q&A dataset.
//!
//! A query flows orchestrator → retriever → embedding index; retrieved
//! chunks condition a guardrailed generative prompt, and any local-pipeline
//! failure or miss degrades to web search (or an offline simulation of it).
//! The corpus is embedded into a SQLite-backed index once at startup.

pub mod answer;
pub mod core;
pub mod corpus;
pub mod index;
pub mod llm;
pub mod pipeline;
pub mod server;
pub mod state;
pub mod tools;

pub use crate::core::errors::PipelineError;
pub use crate::pipeline::{AnswerResult, Orchestrator, QueryOptions};
