use async_trait::async_trait;
use futures::stream;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::ChatResult;
use crate::memory::ConversationMemory;
use crate::models::content::MultimodalContent;
use crate::models::event::ResponseEvent;
use crate::providers::base::{CompletionEngine, ResponseStream};

/// A completion request as the engine received it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub instruction: String,
    pub input: MultimodalContent,
}

/// An engine that replays pre-configured event scripts, one per completion
#[derive(Clone, Default)]
pub struct MockEngine {
    scripts: Arc<Mutex<Vec<Vec<ChatResult<ResponseEvent>>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockEngine {
    /// Create a new mock engine with a sequence of scripted responses
    pub fn new(scripts: Vec<Vec<ChatResult<ResponseEvent>>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl CompletionEngine for MockEngine {
    async fn completion(
        &self,
        instruction: &str,
        input: MultimodalContent,
        _memory: Arc<dyn ConversationMemory>,
    ) -> ChatResult<ResponseStream> {
        lock(&self.requests).push(RecordedRequest {
            instruction: instruction.to_string(),
            input,
        });

        let mut scripts = lock(&self.scripts);
        // An exhausted mock answers with an empty response
        let events = if scripts.is_empty() {
            Vec::new()
        } else {
            scripts.remove(0)
        };
        Ok(Box::pin(stream::iter(events)))
    }
}
