use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{Completion, LlmClient, Provider};
use crate::prompt::Prompt;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const MODEL: &str = "gpt-4";
const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 2500;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?.to_string();
        let base_url = settings
            .openai_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        // No timeout unless the operator asks for one.
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = settings.openai_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
        })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn request_for(prompt: &Prompt) -> ChatCompletionRequest<'_> {
        ChatCompletionRequest {
            model: MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }

    async fn create_chat_completion(
        &self,
        req: &ChatCompletionRequest<'_>,
    ) -> anyhow::Result<ChatCompletionResponse> {
        let res = self
            .http
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await
            .map_err(|e| LlmDiagnosticsError {
                provider: Provider::OpenAI,
                stage: "request",
                status: None,
                detail: e.to_string(),
                raw_output: None,
            })?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read OpenAI response body")?;
        if !status.is_success() {
            let detail = api_error_message(&text).unwrap_or_else(|| format!("status={status}"));
            return Err(LlmDiagnosticsError {
                provider: Provider::OpenAI,
                stage: "http",
                status: Some(status),
                detail,
                raw_output: Some(text),
            }
            .into());
        }

        if let Some(message) = api_error_message(&text) {
            return Err(LlmDiagnosticsError {
                provider: Provider::OpenAI,
                stage: "api",
                status: Some(status),
                detail: message,
                raw_output: Some(text),
            }
            .into());
        }

        serde_json::from_str::<ChatCompletionResponse>(&text).map_err(|e| {
            LlmDiagnosticsError {
                provider: Provider::OpenAI,
                stage: "decode",
                status: Some(status),
                detail: format!("failed to decode chat completion: {e}"),
                raw_output: Some(text),
            }
            .into()
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    async fn complete(&self, prompt: &Prompt) -> anyhow::Result<Completion> {
        let req = Self::request_for(prompt);
        let res = self.create_chat_completion(&req).await?;

        let Some(choice) = res.choices.into_iter().next() else {
            return Err(LlmDiagnosticsError {
                provider: Provider::OpenAI,
                stage: "response",
                status: None,
                detail: "chat completion returned no choices".to_string(),
                raw_output: None,
            }
            .into());
        };

        if choice.finish_reason.as_deref() == Some("length") {
            tracing::warn!(
                max_tokens = MAX_TOKENS,
                "OpenAI finish_reason=length; completion may be truncated"
            );
        }

        if let Some(usage) = &res.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "OpenAI usage"
            );
        }

        Ok(Completion {
            text: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
        })
    }
}

fn api_error_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .or_else(|| error.as_str().map(str::to_string))
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'static str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
