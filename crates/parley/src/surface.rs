use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::{ChatError, ChatResult};
use crate::models::element::Element;
use crate::render_loop::ResponseSession;
use crate::steps::ToolStep;

/// Identifies a response message on the front end
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display primitives offered by the host front end.
///
/// Messages and steps are addressable: tokens are appended to them and full
/// updates replace what is shown.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Show a new, empty response message
    async fn send_message(&self, id: &MessageId) -> ChatResult<()>;

    /// Append text to a shown message
    async fn stream_token(&self, id: &MessageId, token: &str) -> ChatResult<()>;

    /// Replace a shown message with the session's current text and elements
    async fn update_message(&self, session: &ResponseSession) -> ChatResult<()>;

    async fn remove_message(&self, id: &MessageId) -> ChatResult<()>;

    /// Show a standalone error message
    async fn send_error(&self, content: &str) -> ChatResult<()>;

    async fn send_step(&self, step: &ToolStep) -> ChatResult<()>;

    /// Append progress text to a shown step
    async fn stream_step_token(&self, step: &ToolStep, token: &str) -> ChatResult<()>;

    async fn update_step(&self, step: &ToolStep) -> ChatResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisibleMessage {
    pub id: MessageId,
    pub content: String,
    pub elements: Vec<Element>,
}

/// What a user would currently see
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibleState {
    pub messages: Vec<VisibleMessage>,
    pub errors: Vec<String>,
    pub steps: Vec<ToolStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    SendMessage(MessageId),
    StreamToken(MessageId, String),
    UpdateMessage(MessageId),
    RemoveMessage(MessageId),
    SendError(String),
    SendStep(String),
    StreamStepToken(String, String),
    UpdateStep(String),
}

#[derive(Debug, Default)]
struct Recording {
    visible: VisibleState,
    calls: Vec<SurfaceCall>,
}

/// A surface that keeps the visible state in memory and logs every call
#[derive(Debug, Default)]
pub struct RecordingSurface {
    recording: Mutex<Recording>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.recording.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn visible(&self) -> VisibleState {
        self.lock().visible.clone()
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.lock().calls.clone()
    }
}

fn unknown_message(id: &MessageId) -> ChatError {
    ChatError::Display(format!("message {} is not shown", id))
}

fn unknown_step(identifier: &str) -> ChatError {
    ChatError::Display(format!("step {} is not shown", identifier))
}

fn replace_step(visible: &mut VisibleState, step: &ToolStep) -> ChatResult<()> {
    let shown = visible
        .steps
        .iter_mut()
        .find(|shown| shown.identifier == step.identifier)
        .ok_or_else(|| unknown_step(&step.identifier))?;
    *shown = step.clone();
    Ok(())
}

#[async_trait]
impl Surface for RecordingSurface {
    async fn send_message(&self, id: &MessageId) -> ChatResult<()> {
        let mut recording = self.lock();
        recording.calls.push(SurfaceCall::SendMessage(id.clone()));
        recording.visible.messages.push(VisibleMessage {
            id: id.clone(),
            content: String::new(),
            elements: Vec::new(),
        });
        Ok(())
    }

    async fn stream_token(&self, id: &MessageId, token: &str) -> ChatResult<()> {
        let mut recording = self.lock();
        recording
            .calls
            .push(SurfaceCall::StreamToken(id.clone(), token.to_string()));
        let message = recording
            .visible
            .messages
            .iter_mut()
            .find(|message| &message.id == id)
            .ok_or_else(|| unknown_message(id))?;
        message.content.push_str(token);
        Ok(())
    }

    async fn update_message(&self, session: &ResponseSession) -> ChatResult<()> {
        let mut recording = self.lock();
        recording
            .calls
            .push(SurfaceCall::UpdateMessage(session.id().clone()));
        let message = recording
            .visible
            .messages
            .iter_mut()
            .find(|message| &message.id == session.id())
            .ok_or_else(|| unknown_message(session.id()))?;
        message.content = session.text().to_string();
        message.elements = session.elements().to_vec();
        Ok(())
    }

    async fn remove_message(&self, id: &MessageId) -> ChatResult<()> {
        let mut recording = self.lock();
        recording.calls.push(SurfaceCall::RemoveMessage(id.clone()));
        recording.visible.messages.retain(|message| &message.id != id);
        Ok(())
    }

    async fn send_error(&self, content: &str) -> ChatResult<()> {
        let mut recording = self.lock();
        recording
            .calls
            .push(SurfaceCall::SendError(content.to_string()));
        recording.visible.errors.push(content.to_string());
        Ok(())
    }

    async fn send_step(&self, step: &ToolStep) -> ChatResult<()> {
        let mut recording = self.lock();
        recording
            .calls
            .push(SurfaceCall::SendStep(step.identifier.clone()));
        recording.visible.steps.push(step.clone());
        Ok(())
    }

    async fn stream_step_token(&self, step: &ToolStep, token: &str) -> ChatResult<()> {
        let mut recording = self.lock();
        recording.calls.push(SurfaceCall::StreamStepToken(
            step.identifier.clone(),
            token.to_string(),
        ));
        replace_step(&mut recording.visible, step)
    }

    async fn update_step(&self, step: &ToolStep) -> ChatResult<()> {
        let mut recording = self.lock();
        recording
            .calls
            .push(SurfaceCall::UpdateStep(step.identifier.clone()));
        replace_step(&mut recording.visible, step)
    }
}
