use crate::config::AdvisorConfig;
use crate::errors::AdvisorError;
use crate::llm::{LLMResponse, Message, ModelParameters, Role, Usage, LLM};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Client for OpenAI-compatible `/chat/completions` endpoints (Groq, OpenAI, local servers).
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: "https://api.openai.com/v1".to_string(),
            model,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Build a client from advisor settings; fails when no API key was resolved.
    pub fn from_config(config: &AdvisorConfig) -> Result<Self, AdvisorError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(AdvisorError::NotConfigured)?;

        Self::new(api_key, config.model.clone())
            .with_api_base(config.api_base.clone())
            .with_temperature(config.temperature)
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs))
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self, AdvisorError> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdvisorError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request_body(&self, messages: &[Message], params: &ModelParameters) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.format_messages(messages),
        });

        if let Some(temp) = params.temperature.or(self.temperature) {
            body["temperature"] = temp.into();
        }

        if let Some(max_tokens) = params.max_tokens.or(self.max_tokens) {
            body["max_tokens"] = max_tokens.into();
        }

        body
    }

    fn format_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                json!({
                    "role": self.format_role(&msg.role),
                    "content": msg.content
                })
            })
            .collect()
    }

    fn format_role(&self, role: &Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    fn parse_response(&self, response: Value) -> Result<LLMResponse, AdvisorError> {
        let choices = response["choices"]
            .as_array()
            .ok_or_else(|| AdvisorError::Parsing("No choices in response".to_string()))?;

        let choice = choices
            .first()
            .ok_or_else(|| AdvisorError::Parsing("Empty choices array".to_string()))?;

        let content = choice["message"]["content"].as_str().map(|s| s.to_string());
        if content.is_none() {
            return Err(AdvisorError::Parsing(
                "Response message has no content".to_string(),
            ));
        }

        let finish_reason = choice["finish_reason"].as_str().map(|s| s.to_string());
        let usage = serde_json::from_value::<Usage>(response["usage"].clone()).ok();

        Ok(LLMResponse {
            content,
            finish_reason,
            usage,
        })
    }
}

#[async_trait]
impl LLM for OpenAIClient {
    async fn generate(
        &self,
        messages: Vec<Message>,
        params: &ModelParameters,
    ) -> Result<LLMResponse, AdvisorError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request_body(&messages, params);

        log::debug!(
            "Chat completion request to {} ({} messages, model {})",
            url,
            messages.len(),
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AdvisorError::Unavailable(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| AdvisorError::Unavailable(format!("Failed to read response: {}", e)))?;

        log::debug!("Chat completion response ({}): {}", status, response_text);

        if !status.is_success() {
            return Err(AdvisorError::Unavailable(format!(
                "API request failed with status {}: {}",
                status, response_text
            )));
        }

        let response_json: Value = serde_json::from_str(&response_text)
            .map_err(|e| AdvisorError::Parsing(format!("Invalid JSON response: {}", e)))?;

        self.parse_response(response_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mock_llm_server::{MockLLMServer, MockReply};

    fn client() -> OpenAIClient {
        OpenAIClient::new("test-key".to_string(), "llama3-70b-8192".to_string())
    }

    #[test]
    fn test_openai_client_creation() {
        let client = client()
            .with_api_base("https://api.groq.com/openai/v1/".to_string())
            .with_temperature(0.3)
            .with_max_tokens(100);

        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.model(), "llama3-70b-8192");
        assert_eq!(client.api_base, "https://api.groq.com/openai/v1");
        assert_eq!(client.temperature, Some(0.3));
        assert_eq!(client.max_tokens, Some(100));
    }

    #[test]
    fn test_from_config_requires_key() {
        let mut config = AdvisorConfig::default();
        assert!(matches!(
            OpenAIClient::from_config(&config),
            Err(AdvisorError::NotConfigured)
        ));

        config.api_key = Some("k".to_string());
        let client = OpenAIClient::from_config(&config).unwrap();
        assert_eq!(client.api_base, "https://api.groq.com/openai/v1");
        assert_eq!(client.temperature, Some(0.3));
    }

    #[test]
    fn test_call_parameters_override_defaults() {
        let client = client().with_temperature(0.9).with_max_tokens(500);
        let messages = vec![Message::system("sys"), Message::user("hi")];

        let body = client.build_request_body(&messages, &ModelParameters::new(0.3, 60));
        assert_eq!(body["max_tokens"], 60);
        assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");

        let body = client.build_request_body(&messages, &ModelParameters::default());
        assert_eq!(body["max_tokens"], 500);
    }

    #[test]
    fn test_parse_response() {
        let response = json!({
            "choices": [{"message": {"role": "assistant", "content": "Time: O(n)"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
        });
        let parsed = client().parse_response(response).unwrap();
        assert_eq!(parsed.text(), "Time: O(n)");
        assert_eq!(parsed.finish_reason.as_deref(), Some("stop"));
        assert_eq!(parsed.usage.unwrap().total_tokens, 14);

        assert!(client().parse_response(json!({"choices": []})).is_err());
        assert!(client().parse_response(json!({"error": "x"})).is_err());
    }

    #[tokio::test]
    async fn test_generate_against_mock_server() {
        let server = MockLLMServer::start(vec![MockReply::content("Space: O(1)")]).await;
        let client = client().with_api_base(server.api_base());

        let response = client
            .generate(vec![Message::user("analyze")], &ModelParameters::new(0.3, 100))
            .await
            .unwrap();

        assert_eq!(response.text(), "Space: O(1)");
        let requests = server.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["model"], "llama3-70b-8192");
        assert_eq!(requests[0]["max_tokens"], 100);
        assert_eq!(server.authorization_headers(), vec!["Bearer test-key".to_string()]);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_generate_maps_http_errors() {
        let server = MockLLMServer::start(vec![MockReply::status(429)]).await;
        let client = client().with_api_base(server.api_base());

        let err = client
            .generate(vec![Message::user("x")], &ModelParameters::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AdvisorError::Unavailable(_)));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_request_timeout_is_unavailable() {
        let server = MockLLMServer::start(vec![MockReply::Delayed(
            Duration::from_secs(1),
            "too late".to_string(),
        )])
        .await;
        let client = client()
            .with_api_base(server.api_base())
            .with_request_timeout(Duration::from_millis(100))
            .unwrap();

        let started = std::time::Instant::now();
        let err = client
            .generate(vec![Message::user("x")], &ModelParameters::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AdvisorError::Unavailable(_)));
        assert!(started.elapsed() < Duration::from_millis(900));
        server.shutdown().await;
    }
}
