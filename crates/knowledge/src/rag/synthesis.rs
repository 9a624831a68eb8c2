//! Answer synthesis: one prompt, one generation call.

use crate::rag::types::NO_INFORMATION_RESPONSE;
use crate::types::CandidatePassage;
use roleflow_core::{AppError, AppResult};
use roleflow_llm::{LlmClient, LlmRequest};
use roleflow_prompt::{build_prompt, PromptDefinition};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Turns candidate passages and a question into an answer.
pub struct AnswerSynthesizer {
    client: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(
        client: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            prompt,
            model: model.into(),
            temperature,
            timeout,
        }
    }

    /// Generate an answer grounded in `candidates`.
    ///
    /// With no candidates the LLM is not called and the no-information
    /// sentinel is returned. Generation errors and timeouts are returned as
    /// errors; there is no retry.
    pub async fn synthesize(&self, candidates: &[CandidatePassage], query: &str) -> AppResult<String> {
        if candidates.is_empty() {
            return Ok(NO_INFORMATION_RESPONSE.to_string());
        }

        let mut variables = HashMap::new();
        variables.insert("context".to_string(), build_context(candidates));
        variables.insert("question".to_string(), query.to_string());
        let built = build_prompt(&self.prompt, variables)?;

        let mut request =
            LlmRequest::new(built.user, self.model.as_str()).with_temperature(self.temperature);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        tracing::debug!(
            "Calling {} ({}) with {} passages",
            self.client.provider_name(),
            self.model,
            candidates.len()
        );

        let response = tokio::time::timeout(self.timeout, self.client.complete(&request))
            .await
            .map_err(|_| AppError::SynthesisTimeout(self.timeout))?
            .map_err(|e| AppError::Synthesis(e.to_string()))?;

        Ok(response.content)
    }
}

/// Passage contents joined by blank lines, in retrieval order.
pub fn build_context(candidates: &[CandidatePassage]) -> String {
    candidates
        .iter()
        .map(|c| c.content())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileType, PassageChunk};
    use roleflow_llm::{LlmResponse, LlmUsage};
    use roleflow_prompt::{builtin_prompt, CONSOLIDATED_PROMPT_ID};
    use std::sync::Mutex;

    struct RecordingClient {
        reply: AppResult<String>,
        delay: Duration,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingClient {
        fn replying(reply: AppResult<String>) -> Self {
            Self {
                reply,
                delay: Duration::ZERO,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for RecordingClient {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok(content) => Ok(LlmResponse {
                    content: content.clone(),
                    model: request.model.clone(),
                    usage: LlmUsage::default(),
                }),
                Err(e) => Err(AppError::Llm(e.to_string())),
            }
        }
    }

    fn passage(content: &str) -> CandidatePassage {
        CandidatePassage::new(
            PassageChunk::new(content, "finance", "q3.md", FileType::Markdown, "data/finance/q3.md"),
            0.2,
        )
    }

    fn synthesizer(client: Arc<RecordingClient>, timeout: Duration) -> AnswerSynthesizer {
        let prompt = builtin_prompt(CONSOLIDATED_PROMPT_ID).unwrap().unwrap();
        AnswerSynthesizer::new(client, prompt, "test-model", 0.7, timeout)
    }

    #[tokio::test]
    async fn test_no_candidates_skips_llm() {
        let client = Arc::new(RecordingClient::replying(Ok("unused".to_string())));
        let answer = synthesizer(client.clone(), Duration::from_secs(5))
            .synthesize(&[], "Anything?")
            .await
            .unwrap();

        assert_eq!(answer, NO_INFORMATION_RESPONSE);
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_call_with_joined_context() {
        let client = Arc::new(RecordingClient::replying(Ok("Revenue grew.".to_string())));
        let candidates = vec![passage("Revenue grew 12%"), passage("Costs fell 3%")];

        let answer = synthesizer(client.clone(), Duration::from_secs(5))
            .synthesize(&candidates, "How did Q3 go?")
            .await
            .unwrap();

        assert_eq!(answer, "Revenue grew.");
        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Revenue grew 12%\n\nCosts fell 3%"));
        assert!(prompts[0].contains("How did Q3 go?"));
    }

    #[tokio::test]
    async fn test_llm_failure_is_synthesis_error() {
        let client = Arc::new(RecordingClient::replying(Err(AppError::Llm(
            "502 from gateway".to_string(),
        ))));

        let err = synthesizer(client, Duration::from_secs(5))
            .synthesize(&[passage("Revenue grew 12%")], "How did Q3 go?")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Synthesis(_)));
        assert!(err.to_string().contains("502 from gateway"));
    }

    #[tokio::test]
    async fn test_slow_llm_times_out() {
        let client = Arc::new(RecordingClient {
            reply: Ok("late".to_string()),
            delay: Duration::from_secs(5),
            prompts: Mutex::new(Vec::new()),
        });

        let err = synthesizer(client, Duration::from_millis(20))
            .synthesize(&[passage("Revenue grew 12%")], "How did Q3 go?")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::SynthesisTimeout(_)));
    }
}
