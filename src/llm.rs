use crate::config::LlmConfig;
use crate::models::{ChatMessage, Role};
use crate::prompts::SCORER_SYSTEM_PROMPT;
use anyhow::{Context, Result};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
};
use async_openai::{Client, config::OpenAIConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Score returned when the scorer cannot produce one
pub const DEFAULT_SCORE: u8 = 5;

/// The text-generation capability the validator depends on.
///
/// `generate_text` may fail with a transport or provider error.
/// `extract_score` never fails: it falls back to a best guess and always
/// returns a value in `1..=10`.
#[async_trait]
pub trait Collaborator: Send + Sync {
    async fn generate_text(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;

    async fn extract_score(&self, reasoning: &str) -> u8;
}

/// Collaborator backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiCollaborator {
    client: Client<OpenAIConfig>,
    model: String,
    scorer_model: String,
    temperature: f32,
    rate_limit_rps: f64,
    /// Time of the last request, shared by every call through this collaborator
    last_request: Mutex<Option<Instant>>,
}

impl OpenAiCollaborator {
    /// Build a collaborator, reading the API key from the configured environment variable
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.env_var_api_key)
            .with_context(|| format!("Environment variable {} not found", config.env_var_api_key))?;
        Ok(Self::with_api_key(config, api_key))
    }

    /// Build a collaborator with an explicit API key
    pub fn with_api_key(config: &LlmConfig, api_key: impl Into<String>) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.api_endpoint);

        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            scorer_model: config.scorer_model().to_string(),
            temperature: config.temperature as f32,
            rate_limit_rps: config.rate_limit_rps,
            last_request: Mutex::new(None),
        }
    }

    /// Enforce rate limiting for API requests
    async fn enforce_rate_limit(last_request: &mut Option<Instant>, rate_limit_rps: f64) {
        if rate_limit_rps <= 0.0 {
            return;
        }

        let min_interval = Duration::from_secs_f64(1.0 / rate_limit_rps);

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < min_interval {
                sleep(min_interval - elapsed).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    /// Send one chat completion and return the first choice's text
    async fn complete(
        &self,
        model: &str,
        temperature: f32,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String> {
        {
            let mut last_request = self.last_request.lock().await;
            Self::enforce_rate_limit(&mut last_request, self.rate_limit_rps).await;
        }

        let request = build_request(model, temperature, system, messages)?;
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .with_context(|| format!("Chat completion request to {} failed", model))?;

        Ok(extract_content(response))
    }

    /// Ask the scorer model for a score and parse its reply
    async fn request_score(&self, reasoning: &str) -> Result<u8> {
        let reply = self
            .complete(
                &self.scorer_model,
                0.1,
                SCORER_SYSTEM_PROMPT,
                &[ChatMessage::user(reasoning)],
            )
            .await?;

        parse_score(&reply).with_context(|| format!("No score found in scorer reply: {}", reply))
    }
}

#[async_trait]
impl Collaborator for OpenAiCollaborator {
    async fn generate_text(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        self.complete(&self.model, self.temperature, system, messages)
            .await
            .context("Failed to generate text")
    }

    async fn extract_score(&self, reasoning: &str) -> u8 {
        match self.request_score(reasoning).await {
            Ok(score) => score,
            Err(e) => {
                let reason = format!("{:#}", e);
                tracing::warn!(error = %reason, default = DEFAULT_SCORE, "Score extraction failed, using default");
                DEFAULT_SCORE
            }
        }
    }
}

/// Build a chat completion request: system instruction first, then the conversation
fn build_request(
    model: &str,
    temperature: f32,
    system: &str,
    messages: &[ChatMessage],
) -> Result<CreateChatCompletionRequest> {
    let mut request_messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(messages.len() + 1);

    request_messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system.to_string())
            .build()
            .context("Failed to build system message")?
            .into(),
    );

    for message in messages {
        let converted: ChatCompletionRequestMessage = match message.role {
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(message.content.clone())
                .build()
                .context("Failed to build user message")?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(message.content.clone())
                .build()
                .context("Failed to build assistant message")?
                .into(),
        };
        request_messages.push(converted);
    }

    CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(request_messages)
        .temperature(temperature)
        .build()
        .context("Failed to build chat completion request")
}

/// Text of the first choice, or an empty string
fn extract_content(response: CreateChatCompletionResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default()
}

/// Pull a score out of a scorer reply and clamp it into `1..=10`.
///
/// Tries the whole reply as JSON, then the outermost `{...}` span, then the
/// first integer in the text.
pub fn parse_score(reply: &str) -> Option<u8> {
    let from_json = parse_json_response(reply)
        .ok()
        .and_then(|parsed| parsed.get("score").and_then(Value::as_f64));

    let raw = match from_json {
        Some(score) => score,
        None => first_integer(reply)? as f64,
    };

    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(1.0, 10.0) as u8)
}

/// Parse JSON from the response, handling embedded JSON
fn parse_json_response(response: &str) -> Result<Value> {
    match serde_json::from_str(response) {
        Ok(parsed) => Ok(parsed),
        Err(_) => try_extract_embedded_json(response),
    }
}

/// Try to extract JSON that might be embedded in text
fn try_extract_embedded_json(response: &str) -> Result<Value> {
    match response.find('{') {
        Some(start) => match response.rfind('}') {
            Some(end) if end > start => serde_json::from_str(&response[start..=end])
                .context("Failed to parse extracted JSON"),
            _ => anyhow::bail!("Found opening brace but no closing brace in response"),
        },
        None => anyhow::bail!("No JSON found in response"),
    }
}

fn first_integer(text: &str) -> Option<i64> {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|token| !token.is_empty())
        .and_then(|token| token.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use tokio::time::Instant as TokioInstant;

    fn completion_body(content: &str) -> String {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 1_700_000_000u32,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        })
        .to_string()
    }

    fn test_config(endpoint: String) -> LlmConfig {
        LlmConfig {
            api_endpoint: endpoint,
            env_var_api_key: "EVAL_PROMPT_VALIDATOR_TEST_KEY_UNSET".to_string(),
            model: "judge-model".to_string(),
            scorer_model: Some("scorer-model".to_string()),
            temperature: 0.7,
            rate_limit_rps: 0.0,
        }
    }

    #[test]
    fn test_parse_score_json() {
        assert_eq!(parse_score(r#"{"score": 8}"#), Some(8));
        assert_eq!(parse_score(r#"{"score": 7.6}"#), Some(8));
    }

    #[test]
    fn test_parse_score_embedded_json() {
        assert_eq!(parse_score(r#"Sure! {"score": 3} Hope that helps."#), Some(3));
    }

    #[test]
    fn test_parse_score_plain_number_fallback() {
        assert_eq!(parse_score("The score is 9 out of 10."), Some(9));
    }

    #[test]
    fn test_parse_score_clamps() {
        assert_eq!(parse_score(r#"{"score": 14}"#), Some(10));
        assert_eq!(parse_score(r#"{"score": 0}"#), Some(1));
        assert_eq!(parse_score(r#"{"score": -3}"#), Some(1));
    }

    #[test]
    fn test_parse_score_nothing_found() {
        assert_eq!(parse_score("no idea"), None);
    }

    #[test]
    fn test_build_request_orders_messages() {
        let messages = vec![ChatMessage::assistant("Question?"), ChatMessage::user("Answer.")];
        let request = build_request("m", 0.5, "system text", &messages).unwrap();
        assert_eq!(request.model, "m");
        assert_eq!(request.messages.len(), 3);
        assert!(matches!(request.messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(request.messages[1], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(request.messages[2], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_from_config_missing_env_var() {
        let config = test_config("http://127.0.0.1:9".to_string());
        let result = OpenAiCollaborator::from_config(&config);
        assert!(result.is_err());
        assert!(result.err().unwrap().to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_enforce_rate_limit_no_limit() {
        let mut last_request = None;
        let start = TokioInstant::now();

        OpenAiCollaborator::enforce_rate_limit(&mut last_request, 0.0).await;

        assert!(start.elapsed() < Duration::from_millis(10));
        assert!(last_request.is_none());
    }

    #[tokio::test]
    async fn test_enforce_rate_limit_with_sleep() {
        let mut last_request = Some(Instant::now());
        let start = TokioInstant::now();

        OpenAiCollaborator::enforce_rate_limit(&mut last_request, 100.0).await;

        assert!(start.elapsed() >= Duration::from_millis(8));
    }

    #[tokio::test]
    async fn test_generate_text_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({ "model": "judge-model" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("Solid pun work. 8/10."))
            .create_async()
            .await;

        let collaborator = OpenAiCollaborator::with_api_key(&test_config(server.url()), "sk-test");
        let text = collaborator
            .generate_text("judge", &[ChatMessage::user("item")])
            .await
            .unwrap();

        assert_eq!(text, "Solid pun work. 8/10.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_text_provider_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error":{"message":"Invalid API key","type":"invalid_request_error","param":null,"code":"invalid_api_key"}}"#,
            )
            .create_async()
            .await;

        let collaborator = OpenAiCollaborator::with_api_key(&test_config(server.url()), "sk-bad");
        let result = collaborator.generate_text("judge", &[ChatMessage::user("item")]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_extract_score_uses_scorer_model() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({ "model": "scorer-model" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body(r#"{"score": 7}"#))
            .create_async()
            .await;

        let collaborator = OpenAiCollaborator::with_api_key(&test_config(server.url()), "sk-test");
        assert_eq!(collaborator.extract_score("Pretty good, a 7.").await, 7);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_extract_score_falls_back_to_default() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error":{"message":"Invalid API key","type":"invalid_request_error","param":null,"code":null}}"#,
            )
            .create_async()
            .await;

        let collaborator = OpenAiCollaborator::with_api_key(&test_config(server.url()), "sk-bad");
        assert_eq!(collaborator.extract_score("anything").await, DEFAULT_SCORE);
    }
}
