use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

use crate::errors::ChatResult;
use crate::models::message::ConversationMessage;

/// Number of messages returned to the engine when no limit is configured
pub const DEFAULT_MEMORY_LIMIT: usize = 8;

/// Conversation history the engine reads before and appends to after a reply
#[async_trait]
pub trait ConversationMemory: Send + Sync {
    async fn recall(&self) -> ChatResult<Vec<ConversationMessage>>;

    async fn remember(&self, messages: Vec<ConversationMessage>) -> ChatResult<()>;
}

/// In-process memory keeping only the most recent messages
#[derive(Debug)]
pub struct VolatileMemory {
    limit: usize,
    messages: Mutex<VecDeque<ConversationMessage>>,
}

impl VolatileMemory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            messages: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }
}

impl Default for VolatileMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_LIMIT)
    }
}

#[async_trait]
impl ConversationMemory for VolatileMemory {
    async fn recall(&self) -> ChatResult<Vec<ConversationMessage>> {
        Ok(self.messages.lock().await.iter().cloned().collect())
    }

    async fn remember(&self, messages: Vec<ConversationMessage>) -> ChatResult<()> {
        let mut stored = self.messages.lock().await;
        stored.extend(messages);
        while stored.len() > self.limit {
            stored.pop_front();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recall_is_bounded() -> anyhow::Result<()> {
        let memory = VolatileMemory::new(3);
        for i in 0..5 {
            memory
                .remember(vec![ConversationMessage::user().with_text(format!("m{}", i))])
                .await?;
        }

        let recalled = memory.recall().await?;
        let texts: Vec<String> = recalled.iter().map(|m| m.content.as_string()).collect();
        assert_eq!(texts, vec!["m2", "m3", "m4"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_default_limit() -> anyhow::Result<()> {
        let memory = VolatileMemory::default();
        let batch = (0..10)
            .map(|i| ConversationMessage::assistant().with_text(i.to_string()))
            .collect();
        memory.remember(batch).await?;
        assert_eq!(memory.recall().await?.len(), DEFAULT_MEMORY_LIMIT);
        Ok(())
    }
}
