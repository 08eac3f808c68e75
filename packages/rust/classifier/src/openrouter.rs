//! OpenRouter chat-completions client implementing [`CategoryService`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use leadflow_shared::{
    CategoryService, ClassificationRequest, LeadflowError, OpenRouterConfig, Result,
};

/// User-Agent string for classification requests.
const USER_AGENT: &str = concat!("leadflow/", env!("CARGO_PKG_VERSION"));

/// A one-word answer needs very few tokens.
const MAX_COMPLETION_TOKENS: u32 = 10;

/// How much of an error body to keep in error messages.
const ERROR_BODY_SNIPPET: usize = 200;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Connection settings for [`OpenRouterClient`].
#[derive(Debug, Clone)]
pub struct OpenRouterSettings {
    /// API base URL, without the trailing `/chat/completions`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenRouterSettings {
    /// Build settings from the `[openrouter]` config section and a resolved key.
    pub fn from_config(config: &OpenRouterConfig, api_key: String) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key,
            model: config.default_model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Long-lived handle to the OpenRouter API, shared by all classification calls.
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(settings: OpenRouterSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LeadflowError::Network(format!("failed to build HTTP client: {e}")))?;

        let endpoint = format!(
            "{}/chat/completions",
            settings.base_url.trim_end_matches('/')
        );

        Ok(Self {
            client,
            endpoint,
            api_key: settings.api_key,
            model: settings.model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CategoryService for OpenRouterClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, request: &ClassificationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.instructions,
                },
                ChatMessage {
                    role: "user",
                    content: &request.description,
                },
            ],
            temperature: 0.0,
            max_tokens: MAX_COMPLETION_TOKENS,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LeadflowError::Classification(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(ERROR_BODY_SNIPPET).collect();
            return Err(LeadflowError::Classification(format!(
                "HTTP {status}: {snippet}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LeadflowError::Classification(format!("invalid response body: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!(answer = %content.trim(), "classification response");
        Ok(content)
    }
}
