use crate::config::Settings;
use crate::domain::generation::{GenerationRequest, GenerationResponse};
use crate::llm::openai::OpenAiClient;
use crate::llm::{json, LlmClient};
use crate::prompt::Prompt;
use std::sync::Arc;

/// Prompt → LLM → shaped response, one request at a time. Holds no mutable
/// state, so a single instance is shared across all in-flight requests.
#[derive(Clone)]
pub struct FinancialModelService {
    llm: Arc<dyn LlmClient>,
}

impl FinancialModelService {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let llm = OpenAiClient::from_settings(settings)?;
        Ok(Self::new(Arc::new(llm)))
    }

    pub async fn generate(&self, req: &GenerationRequest) -> anyhow::Result<GenerationResponse> {
        let prompt = Prompt::for_request(req);
        tracing::info!(
            company_name = %req.company_name,
            provider = ?self.llm.provider(),
            refinement = req.user_feedback().is_some(),
            prompt_chars = prompt.user.len(),
            "generating financial model"
        );

        let completion = self.llm.complete(&prompt).await?;
        let response = json::shape_response(&completion.text);

        let model = &response.structured_data.financial_model;
        tracing::info!(
            company_name = %req.company_name,
            finish_reason = completion.finish_reason.as_deref().unwrap_or("unknown"),
            structured = !model.is_empty(),
            costs_len = model.costs.len(),
            total_costs = model.total_costs(),
            total_revenue_uplift = model.total_revenue_uplift(),
            "financial model generated"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Completion, Provider};
    use std::sync::Mutex;

    struct RecordingLlm {
        reply: String,
        seen: Mutex<Vec<Prompt>>,
    }

    #[async_trait::async_trait]
    impl LlmClient for RecordingLlm {
        fn provider(&self) -> Provider {
            Provider::OpenAI
        }

        async fn complete(&self, prompt: &Prompt) -> anyhow::Result<Completion> {
            self.seen.lock().unwrap().push(prompt.clone());
            Ok(Completion {
                text: self.reply.clone(),
                finish_reason: Some("stop".to_string()),
            })
        }
    }

    struct FailingLlm;

    #[async_trait::async_trait]
    impl LlmClient for FailingLlm {
        fn provider(&self) -> Provider {
            Provider::OpenAI
        }

        async fn complete(&self, _prompt: &Prompt) -> anyhow::Result<Completion> {
            anyhow::bail!("upstream unavailable")
        }
    }

    #[tokio::test]
    async fn passes_assembled_prompt_and_shapes_reply() {
        let llm = Arc::new(RecordingLlm {
            reply: "Narrative.\n[JSON_START]{\"financial_model\": {\"total_investment\": 42}}[JSON_END]"
                .to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let service = FinancialModelService::new(llm.clone());

        let res = service
            .generate(&GenerationRequest::new("Example Corp"))
            .await
            .unwrap();

        assert_eq!(res.generated_output, "Narrative.");
        assert_eq!(res.structured_data.financial_model.total_investment, 42.0);

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].user.contains("Example Corp"));
        assert!(seen[0].system.contains("[JSON_START]"));
    }

    #[tokio::test]
    async fn upstream_failure_is_propagated() {
        let service = FinancialModelService::new(Arc::new(FailingLlm));
        let err = service
            .generate(&GenerationRequest::new("Example Corp"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("upstream unavailable"));
    }

    #[test]
    fn from_settings_requires_api_key() {
        assert!(FinancialModelService::from_settings(&Settings::default()).is_err());
    }
}
