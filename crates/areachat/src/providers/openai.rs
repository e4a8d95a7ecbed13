use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::errors::ProviderError;
use super::utils::{context_length_error, format_messages, format_tools, response_to_message};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let usage = data.get("usage");
        let field = |name: &str| {
            usage
                .and_then(|u| u.get(name))
                .and_then(|v| v.as_i64())
                .map(|v| v as i32)
        };

        let input_tokens = field("prompt_tokens");
        let output_tokens = field("completion_tokens");
        let total_tokens = field("total_tokens").or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });

        let usage = Usage::new(input_tokens, output_tokens, total_tokens);
        match data.get("model").and_then(|m| m.as_str()) {
            Some(model) => usage.with_model(model),
            None => usage,
        }
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Err(ProviderError::Authentication(status.as_u16()))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
            status if status.is_server_error() => Err(ProviderError::Server(status.as_u16())),
            status => {
                let body = response.text().await.unwrap_or_default();
                // Context length errors come back as 400 with an error body
                if let Ok(value) = serde_json::from_str::<Value>(&body) {
                    if let Some(err) = value.get("error").and_then(context_length_error) {
                        return Err(err);
                    }
                }
                Err(ProviderError::Request {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let mut messages_array = vec![system_message];
        messages_array.extend(format_messages(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array
        });

        if !tools.is_empty() {
            payload["tools"] = json!(format_tools(tools)?);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            if let Some(err) = context_length_error(error) {
                return Err(err);
            }
            return Err(ProviderError::Api(error.to_string()));
        }

        let message = response_to_message(&response)?;
        let usage = Self::get_usage(&response);
        tracing::debug!(
            model = usage.model.as_deref().unwrap_or(&self.config.model),
            total_tokens = usage.total(),
            tool_requests = message.tool_requests().count(),
            "model completion received"
        );

        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> OpenAiProviderConfig {
        OpenAiProviderConfig {
            host: server.uri(),
            api_key: "test_api_key".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.5),
            max_tokens: None,
        }
    }

    async fn setup_mock_server(status: u16, response_body: Value) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test_api_key"))
            .respond_with(ResponseTemplate::new(status).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::new(config_for(&mock_server)).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() -> anyhow::Result<()> {
        let response_body = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "¡Hola! ¿En qué zona buscas área?",
                    "tool_calls": null
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 15,
                "total_tokens": 27
            }
        });

        let (_server, provider) = setup_mock_server(200, response_body).await;
        let messages = vec![Message::user().with_text("Hola")];

        let (message, usage) = provider
            .complete("Eres un asistente.", &messages, &[])
            .await?;

        assert_eq!(message.text(), "¡Hola! ¿En qué zona buscas área?");
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        assert_eq!(usage.total_tokens, Some(27));
        assert_eq!(usage.model.as_deref(), Some("gpt-4o-mini-2024-07-18"));
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_sends_tools_and_temperature() -> anyhow::Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "temperature": 0.5,
                "tools": [{"type": "function", "function": {"name": "getAreasByCountry"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_123",
                            "type": "function",
                            "function": {
                                "name": "getAreasByCountry",
                                "arguments": "{\"country\":\"Portugal\"}"
                            }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 20, "completion_tokens": 15}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::new(config_for(&mock_server))?;
        let tool = Tool::new(
            "getAreasByCountry",
            "List areas in a country",
            json!({
                "type": "object",
                "properties": {"country": {"type": "string"}},
                "required": ["country"]
            }),
        );

        let (message, usage) = provider
            .complete(
                "Eres un asistente.",
                &[Message::user().with_text("áreas en Portugal")],
                &[tool],
            )
            .await?;

        let request = message.tool_requests().next().unwrap();
        assert_eq!(request.id, "call_123");
        let tool_call = request.tool_call.as_ref().unwrap();
        assert_eq!(tool_call.name, "getAreasByCountry");
        assert_eq!(tool_call.arguments, json!({"country": "Portugal"}));
        assert_eq!(usage.total_tokens, Some(35));
        Ok(())
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication_error() {
        let (_server, provider) = setup_mock_server(
            401,
            json!({"error": {"message": "Incorrect API key provided", "code": "invalid_api_key"}}),
        )
        .await;

        let result = provider
            .complete("system", &[Message::user().with_text("Hola")], &[])
            .await;
        assert!(matches!(result, Err(ProviderError::Authentication(401))));
    }

    #[tokio::test]
    async fn test_rate_limit_and_server_errors() {
        let (_server, provider) = setup_mock_server(429, json!({})).await;
        let result = provider
            .complete("system", &[Message::user().with_text("Hola")], &[])
            .await;
        assert!(matches!(result, Err(ProviderError::RateLimited)));

        let (_server, provider) = setup_mock_server(503, json!({})).await;
        let result = provider
            .complete("system", &[Message::user().with_text("Hola")], &[])
            .await;
        assert!(matches!(result, Err(ProviderError::Server(503))));
    }

    #[tokio::test]
    async fn test_context_length_error_body() {
        let (_server, provider) = setup_mock_server(
            400,
            json!({"error": {"code": "context_length_exceeded", "message": "too long"}}),
        )
        .await;

        let result = provider
            .complete("system", &[Message::user().with_text("Hola")], &[])
            .await;
        match result {
            Err(ProviderError::ContextLengthExceeded(msg)) => assert_eq!(msg, "too long"),
            other => panic!("Expected context length error, got {:?}", other.map(|_| ())),
        }
    }
}
