use serde::{Deserialize, Serialize};

use super::content::MultimodalContent;

/// Lifecycle reported by the engine for a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolCallStatus {
    Started,
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStatus {
    pub identifier: String,
    pub tool: String,
    pub status: ToolCallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ToolStatus {
    pub fn new<I: Into<String>, T: Into<String>>(
        identifier: I,
        tool: T,
        status: ToolCallStatus,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            tool: tool.into(),
            status,
            content: None,
        }
    }

    pub fn with_content<S: Into<String>>(mut self, content: S) -> Self {
        self.content = Some(content.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
/// One item of a streamed response
pub enum ResponseEvent {
    Chunk { content: MultimodalContent },
    ToolStatus(ToolStatus),
}

impl ResponseEvent {
    pub fn chunk<C: Into<MultimodalContent>>(content: C) -> Self {
        ResponseEvent::Chunk {
            content: content.into(),
        }
    }

    pub fn text<S: Into<String>>(text: S) -> Self {
        ResponseEvent::chunk(MultimodalContent::text(text))
    }

    pub fn tool<I: Into<String>, T: Into<String>>(
        identifier: I,
        tool: T,
        status: ToolCallStatus,
    ) -> Self {
        ResponseEvent::ToolStatus(ToolStatus::new(identifier, tool, status))
    }
}
