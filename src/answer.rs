//! Answer generation over retrieved KCC context.
//!
//! Renders the fixed guardrailed prompt around the retrieved chunks and the
//! user's question, then calls the generative provider. Temperature arrives
//! with the query options; the provider may still be stochastic even at 0,
//! so determinism is best-effort only.

use std::sync::Arc;

use crate::core::errors::PipelineError;
use crate::index::ScoredRecord;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

const SYSTEM_PROMPT: &str = "\
You are an expert in answering agricultural questions from the Kisan Call Center (KCC) dataset, \
operated by the Government of India to support Indian farmers with reliable, localized advice. \
Provide accurate, actionable, and legally compliant responses based on the data and best \
practices recognized by Indian authorities.

Guidelines and Guardrails:
- Use only the information from the provided KCC data chunks and your verified agricultural \
knowledge as recognized by Indian agricultural authorities.
- Ensure your answer is factually correct, practical, and tailored to the context of Indian \
agriculture and the needs of Indian farmers.
- If the answer involves chemical usage (fertilizers, pesticides), specify only those approved \
by the Government of India and include appropriate safety precautions.
- Do not provide medical, veterinary, or legal advice beyond what is present in the dataset or \
officially recognized by Indian government sources.
- Do not make guarantees about outcomes; offer best practices or likely results based on Indian \
agricultural experience.
- If the question cannot be answered with the available data, clearly state the limitation and \
suggest the user contact a local agricultural officer, Kisan Call Center, or government \
extension service.
- Never fabricate information, speculate, or provide unverified advice.
- Always write in en-India unless the user requests otherwise.
- Do not include personal opinions or promotional content.
- Respect user privacy; do not request or infer personal data.

Legal and Compliance Requirements:
- Adhere strictly to Indian government agricultural guidelines, standards, and safety regulations.
- Do not recommend banned or restricted substances or practices as per Indian law.
- Ensure advice complies with Indian laws, government schemes, and environmental regulations.
- Reference only officially recognized sources and practices as reflected in the KCC data and \
Indian government advisories.

Format your response as follows:
1. **Summary**: Briefly state the main advice or answer.
2. **Details**: Provide step-by-step recommendations or supporting information.
3. **Precautions/Legal Notes**: List any safety, legal, or regulatory considerations relevant \
to the advice, specifically referencing Indian government guidelines where applicable.
4. **Further Assistance**: If needed, suggest contacting local agricultural officers, the Kisan \
Call Center, or Indian government extension services for complex or unresolved issues.";

pub struct AnswerGenerator {
    provider: Arc<dyn LlmProvider>,
    chat_model: String,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, chat_model: String) -> Self {
        Self {
            provider,
            chat_model,
        }
    }

    /// Generates a formatted answer to `question` from `chunks`.
    ///
    /// Provider failures surface as `PipelineError::GenerationProvider`;
    /// the orchestrator decides whether to degrade to fallback search.
    pub async fn generate(
        &self,
        question: &str,
        chunks: &[ScoredRecord],
        temperature: f32,
    ) -> Result<String, PipelineError> {
        let context = render_chunks(chunks);

        let messages = vec![
            ChatMessage::system(format!(
                "{}\n\nHere are the relevant KCC data chunks:\n{}",
                SYSTEM_PROMPT, context
            )),
            ChatMessage::user(format!("Here is the question to answer: {}", question)),
        ];

        let request = ChatRequest::new(messages).with_temperature(temperature);
        self.provider.chat(request, &self.chat_model).await
    }
}

fn render_chunks(chunks: &[ScoredRecord]) -> String {
    let mut rendered = String::new();
    for (i, scored) in chunks.iter().enumerate() {
        rendered.push_str(&format!(
            "[{}] (record {}, relevance: {:.2})\n{}\n\n",
            i + 1,
            scored.record.id,
            scored.score,
            scored.record.content
        ));
    }
    rendered.trim_end().to_string()
}
