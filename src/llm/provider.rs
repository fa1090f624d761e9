use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::PipelineError;

/// Abstract capability provider for generation and embeddings.
///
/// One provider instance serves both concerns; indexing and querying must go
/// through the same provider and embedding model, since vectors are only
/// comparable within one model's space.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "ollama")
    fn name(&self) -> &str;

    /// check if the provider is healthy/reachable
    async fn health_check(&self) -> Result<bool, PipelineError>;

    /// chat completion (non-streaming, single-turn)
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, PipelineError>;

    /// generate embeddings, one vector per input
    async fn embed(
        &self,
        inputs: &[String],
        model_id: &str,
    ) -> Result<Vec<Vec<f32>>, PipelineError>;
}
