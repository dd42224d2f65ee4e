use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::ChatResult;
use crate::memory::ConversationMemory;
use crate::models::content::MultimodalContent;
use crate::models::event::ResponseEvent;

/// Events of one response, in emission order
pub type ResponseStream = BoxStream<'static, ChatResult<ResponseEvent>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Base trait for conversation completion engines (OpenAI compatible hosts, mocks)
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    /// Start a response to `input` under `instruction`.
    ///
    /// The engine reads the conversation so far from `memory` and appends the
    /// exchange once the response is complete. The instruction and memory
    /// contents are not interpreted by the caller.
    async fn completion(
        &self,
        instruction: &str,
        input: MultimodalContent,
        memory: Arc<dyn ConversationMemory>,
    ) -> ChatResult<ResponseStream>;
}
