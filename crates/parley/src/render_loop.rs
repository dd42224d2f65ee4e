use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::errors::{ChatError, ChatResult};
use crate::models::element::Element;
use crate::models::event::ResponseEvent;
use crate::providers::base::ResponseStream;
use crate::render::render_content;
use crate::steps::ToolStepTracker;
use crate::surface::{MessageId, Surface};

/// The single response message being built for one inbound message
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSession {
    id: MessageId,
    text: String,
    elements: Vec<Element>,
}

impl ResponseSession {
    pub fn new() -> Self {
        Self {
            id: MessageId::generate(),
            text: String::new(),
            elements: Vec::new(),
        }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Concatenation of all streamed text, in arrival order
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Non-text elements, in arrival order
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }
}

impl Default for ResponseSession {
    fn default() -> Self {
        Self::new()
    }
}

/// How a response ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Committed,
    Failed(ChatError),
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed)
    }
}

/// Drives the rendering of one streamed response.
///
/// The response either commits as a whole or is replaced by a single error
/// message; partial output never survives a failure.
pub struct RenderLoop<'a> {
    surface: &'a dyn Surface,
    session: ResponseSession,
    steps: ToolStepTracker,
    cancellation: CancellationToken,
}

impl<'a> RenderLoop<'a> {
    /// Show an empty response message so the front end displays progress
    pub async fn start(
        surface: &'a dyn Surface,
        cancellation: CancellationToken,
    ) -> ChatResult<RenderLoop<'a>> {
        let session = ResponseSession::new();
        surface.send_message(session.id()).await?;
        Ok(Self {
            surface,
            session,
            steps: ToolStepTracker::new(),
            cancellation,
        })
    }

    pub fn session(&self) -> &ResponseSession {
        &self.session
    }

    pub fn steps(&self) -> &ToolStepTracker {
        &self.steps
    }

    /// Consume the stream to the end and commit, or fail on the first error.
    ///
    /// Cancellation is observed at every suspension point and takes the
    /// failure path.
    pub async fn run(mut self, stream: ResponseStream) -> Outcome {
        let cancellation = self.cancellation.clone();
        let result = tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(ChatError::Cancelled),
            result = self.consume(stream) => result,
        };

        let result = match result {
            Ok(()) => self.surface.update_message(&self.session).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Outcome::Committed,
            Err(e) => self.fail(e).await,
        }
    }

    /// Retract the response and show the error in its place
    pub async fn fail(self, error: ChatError) -> Outcome {
        tracing::error!(message_id = %self.session.id(), error = %error, "response failed");

        if let Err(e) = self.surface.remove_message(self.session.id()).await {
            tracing::warn!(message_id = %self.session.id(), error = %e, "failed to remove response");
        }
        if let Err(e) = self.surface.send_error(&error.to_string()).await {
            tracing::warn!(error = %e, "failed to show error message");
        }
        Outcome::Failed(error)
    }

    async fn consume(&mut self, mut stream: ResponseStream) -> ChatResult<()> {
        while let Some(event) = stream.next().await {
            self.apply(event?).await?;
        }
        Ok(())
    }

    async fn apply(&mut self, event: ResponseEvent) -> ChatResult<()> {
        match event {
            ResponseEvent::Chunk { content } => {
                for element in render_content(&content)? {
                    match element {
                        Element::Text { content } => {
                            self.session.text.push_str(&content);
                            self.surface
                                .stream_token(self.session.id(), &content)
                                .await?;
                        }
                        other => {
                            self.session.elements.push(other);
                            self.surface.update_message(&self.session).await?;
                        }
                    }
                }
                Ok(())
            }
            ResponseEvent::ToolStatus(status) => self.steps.apply(&status, self.surface).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::{ContentPart, MultimodalContent};
    use crate::models::event::ToolCallStatus;
    use crate::steps::ToolStepState;
    use crate::surface::{RecordingSurface, SurfaceCall, VisibleMessage};
    use futures::stream;

    fn stream_of(events: Vec<ChatResult<ResponseEvent>>) -> ResponseStream {
        Box::pin(stream::iter(events))
    }

    #[tokio::test]
    async fn test_commits_text_and_media() {
        let surface = RecordingSurface::new();
        let render_loop = RenderLoop::start(&surface, CancellationToken::new())
            .await
            .unwrap();
        let id = render_loop.session().id().clone();

        let outcome = render_loop
            .run(stream_of(vec![
                Ok(ResponseEvent::text("Hello")),
                Ok(ResponseEvent::chunk(MultimodalContent::of([
                    ContentPart::text(", "),
                    ContentPart::image_url("https://example.com/cat.png", None),
                    ContentPart::text("world"),
                ]))),
            ]))
            .await;

        assert_eq!(outcome, Outcome::Committed);
        let visible = surface.visible();
        assert_eq!(
            visible.messages,
            vec![VisibleMessage {
                id: id.clone(),
                content: "Hello, world".into(),
                elements: vec![Element::Image {
                    url: "https://example.com/cat.png".into()
                }],
            }]
        );
        assert!(visible.errors.is_empty());
        assert_eq!(
            surface.calls(),
            vec![
                SurfaceCall::SendMessage(id.clone()),
                SurfaceCall::StreamToken(id.clone(), "Hello".into()),
                SurfaceCall::StreamToken(id.clone(), ", ".into()),
                SurfaceCall::UpdateMessage(id.clone()),
                SurfaceCall::StreamToken(id.clone(), "world".into()),
                SurfaceCall::UpdateMessage(id),
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_replaces_partial_output() {
        let surface = RecordingSurface::new();
        let render_loop = RenderLoop::start(&surface, CancellationToken::new())
            .await
            .unwrap();

        let outcome = render_loop
            .run(stream_of(vec![
                Ok(ResponseEvent::text("first ")),
                Ok(ResponseEvent::text("second")),
                Err(ChatError::Engine("connection reset".into())),
                Ok(ResponseEvent::text("never shown")),
            ]))
            .await;

        assert_eq!(
            outcome,
            Outcome::Failed(ChatError::Engine("connection reset".into()))
        );
        let visible = surface.visible();
        assert!(visible.messages.is_empty());
        assert_eq!(
            visible.errors,
            vec!["Completion failed: connection reset".to_string()]
        );
    }

    #[tokio::test]
    async fn test_inline_output_is_fatal() {
        let surface = RecordingSurface::new();
        let render_loop = RenderLoop::start(&surface, CancellationToken::new())
            .await
            .unwrap();

        let outcome = render_loop
            .run(stream_of(vec![
                Ok(ResponseEvent::text("here is a picture")),
                Ok(ResponseEvent::chunk(ContentPart::image_data("AAAA", None))),
            ]))
            .await;

        assert!(matches!(outcome, Outcome::Failed(ChatError::NotSupported(_))));
        let visible = surface.visible();
        assert!(visible.messages.is_empty());
        assert_eq!(visible.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_status_updates_steps() {
        let surface = RecordingSurface::new();
        let render_loop = RenderLoop::start(&surface, CancellationToken::new())
            .await
            .unwrap();

        let outcome = render_loop
            .run(stream_of(vec![
                Ok(ResponseEvent::tool("call-1", "weather", ToolCallStatus::Started)),
                Ok(ResponseEvent::ToolStatus(
                    crate::models::event::ToolStatus::new(
                        "call-1",
                        "weather",
                        ToolCallStatus::Running,
                    )
                    .with_content("fetching"),
                )),
                Ok(ResponseEvent::tool("call-1", "weather", ToolCallStatus::Finished)),
                Ok(ResponseEvent::text("It is sunny.")),
            ]))
            .await;

        assert!(outcome.is_committed());
        let visible = surface.visible();
        assert_eq!(visible.steps.len(), 1);
        assert_eq!(visible.steps[0].state, ToolStepState::Finished);
        assert_eq!(visible.steps[0].progress, "fetching");
        assert_eq!(visible.messages[0].content, "It is sunny.");
    }

    #[tokio::test]
    async fn test_cancellation_takes_failure_path() {
        let surface = RecordingSurface::new();
        let cancellation = CancellationToken::new();
        let render_loop = RenderLoop::start(&surface, cancellation.clone())
            .await
            .unwrap();

        let pending: ResponseStream = Box::pin(
            stream::iter(vec![Ok(ResponseEvent::text("partial"))]).chain(stream::pending()),
        );
        let handle = tokio::spawn({
            let cancellation = cancellation.clone();
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                cancellation.cancel();
            }
        });

        let outcome = render_loop.run(pending).await;
        handle.await.unwrap();

        assert_eq!(outcome, Outcome::Failed(ChatError::Cancelled));
        let visible = surface.visible();
        assert!(visible.messages.is_empty());
        assert_eq!(visible.errors, vec!["Response cancelled".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_stream_commits_empty_message() {
        let surface = RecordingSurface::new();
        let render_loop = RenderLoop::start(&surface, CancellationToken::new())
            .await
            .unwrap();

        let outcome = render_loop.run(stream_of(vec![])).await;
        assert_eq!(outcome, Outcome::Committed);
        assert_eq!(surface.visible().messages.len(), 1);
        assert_eq!(surface.visible().messages[0].content, "");
    }
}
