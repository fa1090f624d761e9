//! Query orchestration.
//!
//! Decides per query whether the answer comes from the local
//! retrieval+generation pipeline or from fallback search, and normalizes
//! both paths into `AnswerResult`. Local-pipeline failures are logged and
//! degrade to fallback; the only error surfaced to the caller is an empty
//! question, rejected before any provider is invoked.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::answer::AnswerGenerator;
use crate::core::errors::PipelineError;
use crate::index::Retriever;
use crate::tools::FallbackSearch;

pub const SOURCE_KCC: &str = "KCC Dataset";

/// The normalized result of one query. `source` tells the caller which
/// trust indicator to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    pub source: String,
    pub answer: String,
}

/// Per-query knobs, threaded explicitly into every pipeline call.
/// Defaults come from `AppConfig`; there is no shared mutable settings state.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// Number of nearest records retrieved as context. Must be >= 1.
    pub top_k: usize,
    /// Generation randomness in [0, 1].
    pub temperature: f32,
}

/// Per-query orchestrator, stateless across queries.
///
/// Capabilities are decided once at construction: a `None` retriever or
/// generator means the local pipeline is unconfigured and every query goes
/// straight to fallback search.
pub struct Orchestrator {
    retriever: Option<Arc<dyn Retriever>>,
    generator: Option<AnswerGenerator>,
    search: FallbackSearch,
}

impl Orchestrator {
    pub fn new(
        retriever: Option<Arc<dyn Retriever>>,
        generator: Option<AnswerGenerator>,
        search: FallbackSearch,
    ) -> Self {
        Self {
            retriever,
            generator,
            search,
        }
    }

    /// Answers `question` with the given per-query options.
    ///
    /// Terminal states: a local answer labeled `"KCC Dataset"`, or whatever
    /// the fallback search produces. There is no retry beyond the single
    /// local-to-fallback transition and no caching across queries.
    pub async fn answer(
        &self,
        question: &str,
        options: QueryOptions,
    ) -> Result<AnswerResult, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }

        if let Some(answer) = self.try_local(question, options).await {
            return Ok(answer);
        }

        Ok(self.search.search(question).await)
    }

    async fn try_local(&self, question: &str, options: QueryOptions) -> Option<AnswerResult> {
        let (retriever, generator) = match (&self.retriever, &self.generator) {
            (Some(r), Some(g)) => (r, g),
            _ => {
                tracing::debug!("Local pipeline not configured; using fallback search");
                return None;
            }
        };

        let chunks = match retriever.retrieve(question, options.top_k).await {
            Ok(chunks) => chunks,
            Err(err) => {
                tracing::warn!("Retrieval failed, falling back to search: {}", err);
                return None;
            }
        };

        if chunks.is_empty() {
            tracing::info!("No local context found for query; using fallback search");
            return None;
        }

        match generator
            .generate(question, &chunks, options.temperature)
            .await
        {
            Ok(answer) => Some(AnswerResult {
                source: SOURCE_KCC.to_string(),
                answer,
            }),
            Err(err) => {
                tracing::warn!("Generation failed, falling back to search: {}", err);
                None
            }
        }
    }
}
