//! SQLite-backed embedding index.
//!
//! Persists one `(id, content, embedding)` row per corpus record, with
//! embeddings stored as little-endian f32 BLOBs, and serves similarity
//! search by brute-force cosine scan. A corpus fingerprint in `index_meta`
//! gates re-ingestion: it is written only after a complete ingestion
//! transaction, so an interrupted ingestion is retried in full instead of
//! being mistaken for a finished index.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::core::errors::PipelineError;
use crate::corpus::Record;
use crate::llm::LlmProvider;

const EMBED_BATCH_SIZE: usize = 32;

/// A record returned from similarity search, nearest-first.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: Record,
    /// Cosine similarity to the query (higher = closer).
    pub score: f32,
}

/// Outcome of `ensure_indexed`, for startup logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Fingerprint matched; nothing embedded.
    Skipped,
    /// Fresh or interrupted location; all records embedded and inserted.
    Ingested(usize),
    /// Fingerprint differed; the index was wiped and rebuilt.
    Reindexed(usize),
}

pub struct SqliteIndex {
    pool: SqlitePool,
    #[allow(dead_code)]
    index_path: PathBuf,
}

impl SqliteIndex {
    pub async fn open(index_path: PathBuf) -> Result<Self, PipelineError> {
        let options = SqliteConnectOptions::new()
            .filename(&index_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(storage_err)?;

        let index = Self { pool, index_path };
        index.init_schema().await?;
        Ok(index)
    }

    async fn init_schema(&self) -> Result<(), PipelineError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kcc_records (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    /// Embeds and inserts `records` unless the stored corpus fingerprint
    /// already matches. A differing fingerprint wipes and rebuilds the
    /// index; embedding failure leaves the fingerprint unwritten so a
    /// retry ingests again from scratch.
    pub async fn ensure_indexed(
        &self,
        provider: &dyn LlmProvider,
        model_id: &str,
        records: &[Record],
    ) -> Result<IngestOutcome, PipelineError> {
        let corpus_fp = corpus_fingerprint(records);
        let stored_fp = self.fingerprint().await?;

        let stale = match stored_fp {
            Some(ref fp) if *fp == corpus_fp => return Ok(IngestOutcome::Skipped),
            Some(_) => true,
            None => false,
        };

        if stale {
            tracing::info!("Corpus changed since last ingestion; rebuilding index");
            sqlx::query("DELETE FROM kcc_records")
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }

        let mut embedded: Vec<(usize, Vec<f32>)> = Vec::with_capacity(records.len());
        for (batch_idx, batch) in records.chunks(EMBED_BATCH_SIZE).enumerate() {
            let inputs: Vec<String> = batch.iter().map(|r| r.content.clone()).collect();
            let vectors = provider.embed(&inputs, model_id).await?;
            if vectors.len() != inputs.len() {
                return Err(PipelineError::EmbeddingProvider(format!(
                    "provider returned {} embeddings for {} inputs",
                    vectors.len(),
                    inputs.len()
                )));
            }
            for (offset, vector) in vectors.into_iter().enumerate() {
                embedded.push((batch_idx * EMBED_BATCH_SIZE + offset, vector));
            }
        }

        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        for (idx, vector) in &embedded {
            let record = &records[*idx];
            let blob = serialize_embedding(vector);
            sqlx::query(
                "INSERT OR REPLACE INTO kcc_records (id, content, embedding)
                 VALUES (?1, ?2, ?3)",
            )
            .bind(&record.id)
            .bind(&record.content)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        sqlx::query(
            "INSERT OR REPLACE INTO index_meta (key, value, updated_at)
             VALUES ('corpus_fingerprint', ?1, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(&corpus_fp)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;

        let count = records.len();
        if stale {
            Ok(IngestOutcome::Reindexed(count))
        } else {
            Ok(IngestOutcome::Ingested(count))
        }
    }

    /// Embeds `query_text` with the same provider the index was built with
    /// and returns the `k` nearest records. An empty index yields an empty
    /// result rather than an error.
    pub async fn search(
        &self,
        provider: &dyn LlmProvider,
        model_id: &str,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<ScoredRecord>, PipelineError> {
        let query_embedding = provider
            .embed(&[query_text.to_string()], model_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                PipelineError::EmbeddingProvider("provider returned no query embedding".into())
            })?;

        let rows = sqlx::query("SELECT id, content, embedding FROM kcc_records")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        let mut scored: Vec<ScoredRecord> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = deserialize_embedding(&embedding_bytes);
                let score = cosine_similarity(&query_embedding, &stored);

                Some(ScoredRecord {
                    record: Record {
                        id: row.get("id"),
                        content: row.get("content"),
                    },
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    pub async fn count(&self) -> Result<usize, PipelineError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kcc_records")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(count as usize)
    }

    pub async fn fingerprint(&self) -> Result<Option<String>, PipelineError> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT value FROM index_meta WHERE key = 'corpus_fingerprint'",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(value)
    }
}

fn storage_err(err: sqlx::Error) -> PipelineError {
    PipelineError::EmbeddingProvider(format!("index storage error: {}", err))
}

/// SHA-256 over the ordered record ids and contents. Any change in row
/// order, identifiers, or text produces a different fingerprint.
fn corpus_fingerprint(records: &[Record]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        hasher.update(record.id.as_bytes());
        hasher.update([0x1f]);
        hasher.update(record.content.as_bytes());
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::llm::ChatRequest;

    /// Deterministic embedder: letter-frequency vector over a–z.
    /// Identical texts embed identically, so an indexed record queried by
    /// its own content scores 1.0.
    pub struct CountingEmbedder {
        pub embed_calls: AtomicUsize,
    }

    impl CountingEmbedder {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                embed_calls: AtomicUsize::new(0),
            })
        }
    }

    pub fn letter_freq_embedding(text: &str) -> Vec<f32> {
        let mut counts = vec![0.0f32; 26];
        for c in text.to_lowercase().chars() {
            if c.is_ascii_lowercase() {
                counts[(c as u8 - b'a') as usize] += 1.0;
            }
        }
        counts
    }

    #[async_trait]
    impl LlmProvider for CountingEmbedder {
        fn name(&self) -> &str {
            "counting-embedder"
        }

        async fn health_check(&self) -> Result<bool, PipelineError> {
            Ok(true)
        }

        async fn chat(
            &self,
            _request: ChatRequest,
            _model_id: &str,
        ) -> Result<String, PipelineError> {
            Err(PipelineError::GenerationProvider("not a chat model".into()))
        }

        async fn embed(
            &self,
            inputs: &[String],
            _model_id: &str,
        ) -> Result<Vec<Vec<f32>>, PipelineError> {
            self.embed_calls.fetch_add(1, Ordering::SeqCst);
            Ok(inputs.iter().map(|s| letter_freq_embedding(s)).collect())
        }
    }

    async fn test_index() -> SqliteIndex {
        let path = std::env::temp_dir().join(format!("krishi-index-test-{}.db", uuid::Uuid::new_v4()));
        SqliteIndex::open(path).await.unwrap()
    }

    fn make_records(contents: &[&str]) -> Vec<Record> {
        contents
            .iter()
            .enumerate()
            .map(|(i, c)| Record {
                id: i.to_string(),
                content: c.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn second_ensure_indexed_is_a_no_op() {
        let index = test_index().await;
        let provider = CountingEmbedder::new();
        let records = make_records(&["paddy pest control", "wheat sowing season"]);

        let first = index
            .ensure_indexed(provider.as_ref(), "test-model", &records)
            .await
            .unwrap();
        assert_eq!(first, IngestOutcome::Ingested(2));
        let calls_after_first = provider.embed_calls.load(Ordering::SeqCst);
        assert!(calls_after_first > 0);

        let second = index
            .ensure_indexed(provider.as_ref(), "test-model", &records)
            .await
            .unwrap();
        assert_eq!(second, IngestOutcome::Skipped);
        assert_eq!(provider.embed_calls.load(Ordering::SeqCst), calls_after_first);
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn changed_corpus_triggers_reindex() {
        let index = test_index().await;
        let provider = CountingEmbedder::new();

        let records = make_records(&["old corpus row"]);
        index
            .ensure_indexed(provider.as_ref(), "test-model", &records)
            .await
            .unwrap();

        let changed = make_records(&["new corpus row", "another row"]);
        let outcome = index
            .ensure_indexed(provider.as_ref(), "test-model", &changed)
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Reindexed(2));
        assert_eq!(index.count().await.unwrap(), 2);

        let results = index
            .search(provider.as_ref(), "test-model", "new corpus row", 5)
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.record.content != "old corpus row"));
    }

    #[tokio::test]
    async fn search_caps_results_and_ranks_exact_match_first() {
        let index = test_index().await;
        let provider = CountingEmbedder::new();
        let records = make_records(&[
            "how to control pests in paddy",
            "fertilizer dose for sugarcane",
            "weather forecast for sowing wheat",
        ]);
        index
            .ensure_indexed(provider.as_ref(), "test-model", &records)
            .await
            .unwrap();

        let results = index
            .search(
                provider.as_ref(),
                "test-model",
                "how to control pests in paddy",
                2,
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.content, "how to control pests in paddy");
        assert!(results[0].score > 0.99);
        assert!(results[0].score >= results[1].score);

        let indexed: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        assert!(results
            .iter()
            .all(|r| indexed.contains(&r.record.content.as_str())));
    }

    #[tokio::test]
    async fn empty_index_returns_empty_result() {
        let index = test_index().await;
        let provider = CountingEmbedder::new();

        let results = index
            .search(provider.as_ref(), "test-model", "anything", 5)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn failed_ingestion_leaves_no_fingerprint() {
        struct FailingEmbedder;

        #[async_trait]
        impl LlmProvider for FailingEmbedder {
            fn name(&self) -> &str {
                "failing"
            }

            async fn health_check(&self) -> Result<bool, PipelineError> {
                Ok(false)
            }

            async fn chat(
                &self,
                _request: ChatRequest,
                _model_id: &str,
            ) -> Result<String, PipelineError> {
                Err(PipelineError::GenerationProvider("down".into()))
            }

            async fn embed(
                &self,
                _inputs: &[String],
                _model_id: &str,
            ) -> Result<Vec<Vec<f32>>, PipelineError> {
                Err(PipelineError::EmbeddingProvider("down".into()))
            }
        }

        let index = test_index().await;
        let records = make_records(&["some row"]);

        let err = index
            .ensure_indexed(&FailingEmbedder, "test-model", &records)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmbeddingProvider(_)));
        assert!(index.fingerprint().await.unwrap().is_none());

        // A retry with a working provider ingests in full.
        let provider = CountingEmbedder::new();
        let outcome = index
            .ensure_indexed(provider.as_ref(), "test-model", &records)
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Ingested(1));
        assert!(index.fingerprint().await.unwrap().is_some());
    }

    #[test]
    fn embedding_blob_round_trip() {
        let original = vec![0.5f32, -1.25, 3.0];
        let blob = serialize_embedding(&original);
        assert_eq!(deserialize_embedding(&blob), original);
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        let a = make_records(&["one", "two"]);
        let b = make_records(&["two", "one"]);
        assert_ne!(corpus_fingerprint(&a), corpus_fingerprint(&b));
        assert_eq!(corpus_fingerprint(&a), corpus_fingerprint(&make_records(&["one", "two"])));
    }
}
