use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{ChatCompletionRequest, ChatCompletionResponse, InferenceClient, InferenceError, WireMessage};
use crate::provider::{Provider, ProviderConfig};

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: String,
    messages: &'a [WireMessage],
}

/// Chat-completions client for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct HttpInferenceClient {
    client: Client,
    provider: Provider,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpInferenceClient {
    pub fn new(provider: Provider, api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            provider,
            endpoint: provider.endpoint().to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.provider, config.api_key.as_deref())
    }

    /// Point the client at another chat-completions URL (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// Reuse a preconfigured reqwest client (timeouts, proxies).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The router selects its upstream from a `model:provider` suffix.
    fn wire_model(&self, request: &ChatCompletionRequest) -> String {
        match self.provider {
            Provider::HuggingFace if !request.provider.is_empty() => {
                format!("{}:{}", request.model, request.provider)
            }
            _ => request.model.clone(),
        }
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, InferenceError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| InferenceError::MissingApiKey(self.provider.as_str().to_string()))?;

        let body = CompletionBody {
            model: self.wire_model(&request),
            messages: &request.messages,
        };

        debug!(
            provider = self.provider.as_str(),
            model = %body.model,
            messages = request.messages.len(),
            "sending chat completion"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|e| InferenceError::Decode(e.to_string()))?;
        if parsed.choices.is_empty() {
            return Err(InferenceError::Decode("response carried no choices".to_string()));
        }
        Ok(parsed)
    }
}
