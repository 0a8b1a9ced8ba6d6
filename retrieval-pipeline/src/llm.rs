use std::{sync::Arc, time::Duration};

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use common::{error::AppError, utils::config::AppConfig};

/// Text-completion capability behind the agents.
///
/// Kept as a seam so tests can substitute a scripted backend; the production
/// implementation talks to the configured OpenAI-compatible endpoint.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AppError>;
}

pub struct OpenAiCompletion {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
}

impl OpenAiCompletion {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: String) -> Self {
        Self { client, model }
    }

    /// Builds a client against the configured base url with the configured
    /// request timeout. Local-model inference is slow, so the timeout is
    /// minutes rather than seconds.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm_request_timeout_secs))
            .build()?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url);

        Ok(Self {
            client: Arc::new(Client::build(http_client, openai_config, Default::default())),
            model: config.llm_model.clone(),
        })
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompletion {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AppError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessage::from(system_prompt).into(),
                ChatCompletionRequestUserMessage::from(user_prompt).into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(AppError::LLMParsing(
                "No content found in LLM response".into(),
            ))
    }
}
