use std::time::Duration;

use doccrawl_core::config::ApiCredentials;
use doccrawl_core::error::AppError;
use doccrawl_core::traits::{Extractor, TextTransform};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "Pro/deepseek-ai/DeepSeek-R1";
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);

const TRANSFORM_SYSTEM_PROMPT: &str = "You are a professional documentation optimization assistant. \
You turn raw web documentation into clear, well-structured Markdown in the language you are asked for. \
Keep every technical detail, command and code sample. Respond with the document only.";

const EXTRACT_SYSTEM_PROMPT: &str = "You are a data extraction assistant. Extract the requested fields from the provided web content. Respond ONLY with valid JSON matching the requested schema. Do not include explanations.";

/// Minimal client for an OpenAI-compatible `chat/completions` endpoint.
///
/// Works with any OpenAI-compatible API (OpenAI itself, SiliconFlow,
/// DeepSeek, Gemini's compatibility layer, local servers).
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl ChatClient {
    pub fn new(credentials: &ApiCredentials, model: &str) -> Result<Self, AppError> {
        Self::with_timeout(credentials, model, DEFAULT_LLM_TIMEOUT)
    }

    pub fn with_timeout(
        credentials: &ApiCredentials,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key.clone(),
            model: model.to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one system + user exchange and return the reply text.
    async fn complete(
        &self,
        system: &str,
        user: String,
        temperature: Option<f32>,
        response_format: Option<ResponseFormat>,
    ) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system.to_string(),
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            response_format,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimitExceeded);
        }
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status_code}: {body}"));
            return Err(AppError::LlmError {
                message,
                status_code,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse LLM response: {e}")))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::LlmError {
                message: "Empty response from LLM".into(),
                status_code: status.as_u16(),
            })
    }
}

// ---- OpenAI API types ----

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaWrapper,
}

#[derive(Serialize)]
struct JsonSchemaWrapper {
    name: String,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Rewrites page content into a Markdown document.
#[derive(Clone)]
pub struct OpenAiTransformer {
    chat: ChatClient,
    system_prompt: String,
    temperature: f32,
}

impl OpenAiTransformer {
    pub fn new(chat: ChatClient) -> Self {
        Self {
            chat,
            system_prompt: TRANSFORM_SYSTEM_PROMPT.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

impl TextTransform for OpenAiTransformer {
    async fn transform(&self, instruction: &str, content: &str) -> Result<String, AppError> {
        tracing::debug!(model = self.chat.model(), chars = content.chars().count(), "Calling model");
        let reply = self
            .chat
            .complete(
                &self.system_prompt,
                format!("{instruction}\n\n{content}"),
                Some(self.temperature),
                None,
            )
            .await?;
        if reply.trim().is_empty() {
            return Err(AppError::TransformError("model returned an empty reply".into()));
        }
        Ok(reply)
    }
}

/// Schema-driven structured extraction.
#[derive(Clone)]
pub struct OpenAiExtractor {
    chat: ChatClient,
    schema_name: String,
}

impl OpenAiExtractor {
    pub fn new(chat: ChatClient, schema_name: &str) -> Self {
        Self {
            chat,
            schema_name: schema_name.to_string(),
        }
    }
}

impl Extractor for OpenAiExtractor {
    async fn extract(
        &self,
        content: &str,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, AppError> {
        let user = format!(
            "Extract data according to this JSON schema:\n```json\n{}\n```\n\nFrom the following web content:\n\n{}",
            serde_json::to_string_pretty(schema)?,
            content
        );
        let format = ResponseFormat {
            format_type: "json_schema",
            json_schema: JsonSchemaWrapper {
                name: self.schema_name.clone(),
                strict: true,
                schema: schema.clone(),
            },
        };
        let reply = self
            .chat
            .complete(EXTRACT_SYSTEM_PROMPT, user, None, Some(format))
            .await?;

        serde_json::from_str(&reply).map_err(|e| {
            AppError::SchemaValidationError(format!("LLM returned invalid JSON: {e}. Raw: {reply}"))
        })
    }
}
