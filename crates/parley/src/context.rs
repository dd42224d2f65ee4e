use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::memory::ConversationMemory;

/// Everything one inbound message needs, built once and never shared
/// between messages.
#[derive(Clone)]
pub struct RequestContext {
    instruction: String,
    memory: Arc<dyn ConversationMemory>,
    cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new<S: Into<String>>(instruction: S, memory: Arc<dyn ConversationMemory>) -> Self {
        Self {
            instruction: instruction.into(),
            memory,
            cancellation: CancellationToken::new(),
        }
    }

    /// Use a token owned by the caller, so the host can abort the reply
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn memory(&self) -> Arc<dyn ConversationMemory> {
        Arc::clone(&self.memory)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}
