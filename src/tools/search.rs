//! Fallback web search.
//!
//! Wraps the DuckDuckGo Instant Answer API into the pipeline's uniform
//! `AnswerResult` shape. Search failure is never fatal: it degrades to an
//! error-labeled answer. When no search capability is configured, a
//! deterministic canned result is returned after a simulated network delay,
//! so the system stays demoable offline.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::core::config::settings::SearchConfig;
use crate::core::errors::PipelineError;
use crate::pipeline::AnswerResult;

pub const SOURCE_DDG: &str = "DuckDuckGo Search";
pub const SOURCE_DDG_ERROR: &str = "DuckDuckGo Search (Error)";
pub const SOURCE_OFFLINE: &str = "Internet Search (Fallback)";

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub struct FallbackSearch {
    web: Option<DuckDuckGoClient>,
    simulated_delay: Duration,
}

impl FallbackSearch {
    pub fn new(config: &SearchConfig) -> Self {
        let web = config.enable_web.then(DuckDuckGoClient::new);
        Self {
            web,
            simulated_delay: Duration::from_secs(config.simulated_delay_secs),
        }
    }

    /// Searches the web for `question`, or simulates a search offline.
    /// Always produces an `AnswerResult`; failures become the answer text.
    pub async fn search(&self, question: &str) -> AnswerResult {
        let Some(client) = &self.web else {
            tokio::time::sleep(self.simulated_delay).await;
            return AnswerResult {
                source: SOURCE_OFFLINE.to_string(),
                answer: offline_answer(question),
            };
        };

        match client.search(question).await {
            Ok(answer) => AnswerResult {
                source: SOURCE_DDG.to_string(),
                answer,
            },
            Err(err) => AnswerResult {
                source: SOURCE_DDG_ERROR.to_string(),
                answer: format!("An error occurred while searching DuckDuckGo: {}", err),
            },
        }
    }
}

fn offline_answer(question: &str) -> String {
    format!(
        "No relevant information found in local data. Here is a general result from the \
         internet for '{}': Modern agricultural practices focus on soil health, water \
         conservation, and integrated pest management.",
        question
    )
}

struct DuckDuckGoClient {
    client: reqwest::Client,
}

impl DuckDuckGoClient {
    fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn search(&self, query: &str) -> Result<String, PipelineError> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_redirect=1&no_html=1",
            urlencoding::encode(query)
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::SearchProvider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::SearchProvider(format!(
                "DuckDuckGo request failed: {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| PipelineError::SearchProvider(e.to_string()))?;

        let results = extract_results(&payload);
        if results.is_empty() {
            return Err(PipelineError::SearchProvider(
                "no results extracted from response".to_string(),
            ));
        }

        Ok(join_snippets(&results))
    }
}

fn extract_results(payload: &Value) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if let Some(abstract_text) = payload.get("AbstractText").and_then(|v| v.as_str()) {
        if let Some(url) = payload.get("AbstractURL").and_then(|v| v.as_str()) {
            if !abstract_text.is_empty() && !url.is_empty() {
                results.push(SearchResult {
                    title: abstract_text
                        .split(" - ")
                        .next()
                        .unwrap_or(abstract_text)
                        .to_string(),
                    url: url.to_string(),
                    snippet: abstract_text.to_string(),
                });
            }
        }
    }

    if let Some(items) = payload.get("Results").and_then(|v| v.as_array()) {
        extract_topics(items, &mut results);
    }
    if let Some(items) = payload.get("RelatedTopics").and_then(|v| v.as_array()) {
        extract_topics(items, &mut results);
    }

    results
}

fn extract_topics(items: &[Value], results: &mut Vec<SearchResult>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            extract_topics(topics, results);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        let url = item.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        results.push(SearchResult {
            title: text.split(" - ").next().unwrap_or(text).to_string(),
            url: url.to_string(),
            snippet: text.to_string(),
        });
    }
}

fn join_snippets(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("{} ({})", r.snippet, r.url))
        .collect::<Vec<_>>()
        .join("\n\n")
}
