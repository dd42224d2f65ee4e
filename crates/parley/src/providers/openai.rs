use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::base::{CompletionEngine, ResponseStream};
use super::utils::{get_usage, messages_to_openai_spec, openai_delta_to_text, SseLines};
use crate::errors::{ChatError, ChatResult};
use crate::memory::ConversationMemory;
use crate::models::content::MultimodalContent;
use crate::models::event::ResponseEvent;
use crate::models::message::ConversationMessage;

/// Settings for any server speaking the OpenAI chat completions api
#[derive(Debug, Clone)]
pub struct OpenAiEngineConfig {
    pub host: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

#[derive(Clone)]
pub struct OpenAiEngine {
    client: Client,
    config: OpenAiEngineConfig,
}

impl OpenAiEngine {
    pub fn new(config: OpenAiEngineConfig) -> ChatResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn payload(&self, messages: Vec<Value>) -> Value {
        let mut payload = serde_json::Map::new();
        payload.insert("model".to_string(), json!(self.config.model));
        payload.insert("messages".to_string(), json!(messages));
        payload.insert("stream".to_string(), json!(true));
        if let Some(temp) = self.config.temperature {
            payload.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            payload.insert("max_tokens".to_string(), json!(tokens));
        }
        Value::Object(payload)
    }

    async fn post(&self, payload: Value) -> ChatResult<Response> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let mut request = self.client.post(&url).json(&payload);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(ChatError::Engine(format!("Server error: {}", status)))
            }
            status => Err(ChatError::Engine(format!("Request failed: {}", status))),
        }
    }

    fn log_usage(&self, chunk: &Value) {
        if let Some(usage) = get_usage(chunk) {
            tracing::debug!(
                model = %self.config.model,
                input_tokens = ?usage.input_tokens,
                output_tokens = ?usage.output_tokens,
                total_tokens = ?usage.total_tokens,
                "completion finished"
            );
        }
    }
}

#[async_trait]
impl CompletionEngine for OpenAiEngine {
    /// Streams the reply delta by delta. The exchange is remembered once the
    /// server ends the stream, so a failed or abandoned reply leaves memory
    /// untouched.
    async fn completion(
        &self,
        instruction: &str,
        input: MultimodalContent,
        memory: Arc<dyn ConversationMemory>,
    ) -> ChatResult<ResponseStream> {
        let engine = self.clone();
        let instruction = instruction.to_string();

        Ok(Box::pin(async_stream::try_stream! {
            let history = memory.recall().await?;
            let messages = messages_to_openai_spec(&instruction, &history, &input);
            let response = engine.post(engine.payload(messages)).await?;

            let mut body = response.bytes_stream();
            let mut lines = SseLines::default();
            let mut reply = String::new();
            let mut done = false;
            while !done {
                let payloads = match body.next().await {
                    Some(bytes) => lines.push(&bytes?),
                    None => {
                        done = true;
                        lines.finish()
                    }
                };
                for data in payloads {
                    if data == "[DONE]" {
                        done = true;
                        break;
                    }
                    let chunk: Value = serde_json::from_str(&data)
                        .map_err(|e| ChatError::Engine(format!("malformed stream chunk: {}", e)))?;
                    engine.log_usage(&chunk);
                    if let Some(text) = openai_delta_to_text(&chunk)? {
                        reply.push_str(&text);
                        yield ResponseEvent::text(text);
                    }
                }
            }

            memory
                .remember(vec![
                    ConversationMessage::user().with_content(input),
                    ConversationMessage::assistant().with_text(reply),
                ])
                .await?;
        }))
    }
}
