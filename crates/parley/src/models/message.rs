use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::content::{ContentPart, MultimodalContent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message kept in conversation memory
pub struct ConversationMessage {
    pub role: Role,
    pub created: i64,
    pub content: MultimodalContent,
}

impl ConversationMessage {
    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self {
            role: Role::User,
            created: Utc::now().timestamp(),
            content: MultimodalContent::new(),
        }
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self {
            role: Role::Assistant,
            created: Utc::now().timestamp(),
            content: MultimodalContent::new(),
        }
    }

    pub fn with_part(mut self, part: ContentPart) -> Self {
        self.content.push(part);
        self
    }

    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_part(ContentPart::text(text))
    }

    pub fn with_content(mut self, content: MultimodalContent) -> Self {
        self.content.extend(content.into_parts());
        self
    }
}
