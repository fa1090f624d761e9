use std::sync::Arc;

use crate::answer::AnswerGenerator;
use crate::core::config::{AppConfig, AppPaths};
use crate::core::errors::PipelineError;
use crate::corpus::load_corpus;
use crate::index::{IndexRetriever, Retriever, SqliteIndex};
use crate::llm::{LlmProvider, OllamaProvider};
use crate::pipeline::Orchestrator;
use crate::tools::FallbackSearch;

/// Global application state shared across all routes.
///
/// Built once at startup; the index is fully ingested before this function
/// returns, so the first query never races ingestion.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: AppConfig,
    pub index: Arc<SqliteIndex>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Resolving paths and loading configuration
    /// 2. Loading the KCC corpus (unreadable corpus is fatal)
    /// 3. Probing the LLM provider once; an unreachable provider leaves the
    ///    local pipeline unconfigured and every query goes to fallback search
    /// 4. Ingesting the corpus into the embedding index
    /// 5. Assembling the orchestrator's capability registry
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, PipelineError> {
        let config = AppConfig::load(&paths)?;

        let records = load_corpus(&paths.corpus_path)?;
        tracing::info!("Loaded {} corpus records", records.len());

        let index = Arc::new(SqliteIndex::open(paths.index_path.clone()).await?);

        let provider: Arc<dyn LlmProvider> =
            Arc::new(OllamaProvider::new(config.llm.base_url.clone()));
        let provider_healthy = provider.health_check().await.unwrap_or(false);

        let local_pipeline = if provider_healthy {
            match index
                .ensure_indexed(provider.as_ref(), &config.llm.embedding_model, &records)
                .await
            {
                Ok(outcome) => {
                    let entries = index.count().await?;
                    tracing::info!("Embedding index ready ({:?}, {} entries)", outcome, entries);
                    let retriever: Arc<dyn Retriever> = Arc::new(IndexRetriever::new(
                        index.clone(),
                        provider.clone(),
                        config.llm.embedding_model.clone(),
                    ));
                    let generator =
                        AnswerGenerator::new(provider.clone(), config.llm.chat_model.clone());
                    Some((retriever, generator))
                }
                Err(err) => {
                    tracing::warn!(
                        "Indexing failed; queries will use fallback search only: {}",
                        err
                    );
                    None
                }
            }
        } else {
            tracing::warn!(
                "LLM provider '{}' unreachable at {}; queries will use fallback search only",
                provider.name(),
                config.llm.base_url
            );
            None
        };

        let search = FallbackSearch::new(&config.search);
        let orchestrator = match local_pipeline {
            Some((retriever, generator)) => {
                Arc::new(Orchestrator::new(Some(retriever), Some(generator), search))
            }
            None => Arc::new(Orchestrator::new(None, None, search)),
        };

        Ok(Arc::new(AppState {
            paths,
            config,
            index,
            orchestrator,
        }))
    }
}
