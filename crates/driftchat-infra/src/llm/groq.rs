//! Groq completion provider.
//!
//! Implements [`CompletionProvider`] against Groq's OpenAI-compatible chat
//! completions endpoint using [`async_openai`] for type-safe
//! request/response handling and built-in SSE streaming.
//!
//! The streaming side converts every upstream error into a
//! [`StreamChunk::Failed`] item instead of an error branch; the consumer
//! decides whether to fall back.

use std::pin::Pin;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use async_openai::Client;
use futures_util::Stream;
use secrecy::{ExposeSecret, SecretString};

use driftchat_core::llm::provider::CompletionProvider;
use driftchat_types::config::ServerConfig;
use driftchat_types::error::GenerationError;
use driftchat_types::llm::StreamChunk;

/// Completion provider backed by Groq's OpenAI-compatible API.
///
/// Does NOT derive Debug to prevent accidental exposure of the API key
/// stored inside the `async_openai::Client`.
pub struct GroqProvider {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl GroqProvider {
    /// Create a provider from the server configuration and an API key
    /// (typically the `GROQ_API_KEY` environment variable).
    pub fn new(api_key: &SecretString, config: &ServerConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key.expose_secret())
            .with_api_base(&config.base_url);

        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Build a chat completion request carrying the prompt as a single user
    /// message. Each cycle is independent; the transcript is not replayed.
    fn build_request(&self, prompt: &str, stream: bool) -> CreateChatCompletionRequest {
        let messages = vec![ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(prompt.to_string()),
                name: None,
            },
        )];

        CreateChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_completion_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature as f32),
            stream: if stream { Some(true) } else { None },
            ..Default::default()
        }
    }
}

impl CompletionProvider for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    fn stream(&self, prompt: &str) -> Pin<Box<dyn Stream<Item = StreamChunk> + Send + 'static>> {
        let request = self.build_request(prompt, true);
        // Clone the client for the 'static stream closure
        let client = self.client.clone();

        Box::pin(async_stream::stream! {
            let mut upstream = match client.chat().create_stream(request).await {
                Ok(s) => s,
                Err(e) => {
                    yield StreamChunk::Failed(map_openai_error(e).to_string());
                    return;
                }
            };

            use futures_util::StreamExt;
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(chunk) => {
                        let delta = chunk
                            .choices
                            .first()
                            .and_then(|c| c.delta.content.clone());
                        if let Some(content) = delta {
                            if !content.is_empty() {
                                yield StreamChunk::Delta(content);
                            }
                        }
                    }
                    Err(e) => {
                        yield StreamChunk::Failed(map_openai_error(e).to_string());
                        return;
                    }
                }
            }
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = self.build_request(prompt, false);

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| GenerationError::Malformed("response carried no content".to_string()))?;

        Ok(content)
    }
}

/// Map an `async_openai::error::OpenAIError` to a [`GenerationError`].
fn map_openai_error(err: async_openai::error::OpenAIError) -> GenerationError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "authentication_error"
                || error_type == "authentication_error"
                || api_err.message.contains("Invalid API Key")
            {
                GenerationError::AuthenticationFailed
            } else if code == "rate_limit_exceeded" || error_type == "rate_limit_error" {
                GenerationError::RateLimited {
                    retry_after_ms: None,
                }
            } else {
                GenerationError::Upstream(err.to_string())
            }
        }
        OpenAIError::Reqwest(reqwest_err) => match reqwest_err.status().map(|s| s.as_u16()) {
            Some(401) => GenerationError::AuthenticationFailed,
            Some(429) => GenerationError::RateLimited {
                retry_after_ms: None,
            },
            _ => GenerationError::Upstream(err.to_string()),
        },
        OpenAIError::JSONDeserialize(_, content) => {
            GenerationError::Malformed(format!("failed to parse response: {content}"))
        }
        _ => GenerationError::Upstream(err.to_string()),
    }
}
