use crate::error::SessionError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::Stream;
use parley::errors::{ChatError, ChatResult};
use parley::models::attachment::{
    Attachment, FileAttachment, MediaAttachment, MediaReference, TextAttachment,
};
use parley::models::element::Element;
use parley::render_loop::{Outcome, ResponseSession};
use parley::steps::ToolStep;
use parley::surface::{MessageId, Surface};
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    path::PathBuf,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

#[derive(Debug, Deserialize)]
struct ReplyRequest {
    #[serde(default)]
    content: String,
    #[serde(default)]
    elements: Vec<IncomingElement>,
}

#[derive(Debug, Deserialize)]
struct MediaElement {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    mime: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileElement {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    mime: Option<String>,
}

/// An element as the front end attaches it to a message
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum IncomingElement {
    Text {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        content: String,
    },
    Image(MediaElement),
    Audio(MediaElement),
    Video(MediaElement),
    Pdf(FileElement),
    File(FileElement),
}

impl MediaElement {
    async fn into_attachment(self, state: &AppState) -> Result<MediaAttachment, SessionError> {
        let path = state.confine_upload(self.path).await?;
        Ok(MediaAttachment {
            name: self.name,
            reference: MediaReference::from_parts(self.url, path),
            mime_type: self.mime,
        })
    }
}

impl FileElement {
    async fn into_attachment(self, state: &AppState) -> Result<FileAttachment, SessionError> {
        Ok(FileAttachment {
            name: self.name,
            path: state.confine_upload(self.path).await?,
            mime_type: self.mime,
        })
    }
}

impl IncomingElement {
    /// Paths must point into the upload directory; anything else rejects the
    /// whole request before the engine sees it.
    async fn into_attachment(self, state: &AppState) -> Result<Attachment, SessionError> {
        Ok(match self {
            IncomingElement::Text { name, content } => {
                Attachment::Text(TextAttachment { name, content })
            }
            IncomingElement::Image(media) => Attachment::Image(media.into_attachment(state).await?),
            IncomingElement::Audio(media) => Attachment::Audio(media.into_attachment(state).await?),
            IncomingElement::Video(media) => Attachment::Video(media.into_attachment(state).await?),
            IncomingElement::Pdf(file) => Attachment::Document(file.into_attachment(state).await?),
            IncomingElement::File(file) => Attachment::File(file.into_attachment(state).await?),
        })
    }
}

/// One display operation, sent to the front end as an event-stream line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum DisplayOp {
    SendMessage {
        id: MessageId,
    },
    StreamToken {
        id: MessageId,
        token: String,
    },
    UpdateMessage {
        id: MessageId,
        content: String,
        elements: Vec<Element>,
    },
    RemoveMessage {
        id: MessageId,
    },
    ErrorMessage {
        content: String,
    },
    SendStep {
        step: ToolStep,
    },
    StreamStepToken {
        id: String,
        token: String,
    },
    UpdateStep {
        step: ToolStep,
    },
    Finish {
        outcome: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error: Option<String>,
    },
}

impl DisplayOp {
    fn finish(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Committed => DisplayOp::Finish {
                outcome: "committed".to_string(),
                error: None,
            },
            Outcome::Failed(e) => DisplayOp::Finish {
                outcome: "failed".to_string(),
                error: Some(e.to_string()),
            },
        }
    }
}

/// Forwards display calls to the client of one reply request
struct ChannelSurface {
    tx: mpsc::Sender<String>,
}

impl ChannelSurface {
    fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    async fn send(&self, op: DisplayOp) -> ChatResult<()> {
        let encoded =
            serde_json::to_string(&op).map_err(|e| ChatError::Display(e.to_string()))?;
        self.tx
            .send(format!("data: {}\n\n", encoded))
            .await
            .map_err(|_| ChatError::Display("client disconnected".to_string()))
    }
}

#[async_trait]
impl Surface for ChannelSurface {
    async fn send_message(&self, id: &MessageId) -> ChatResult<()> {
        self.send(DisplayOp::SendMessage { id: id.clone() }).await
    }

    async fn stream_token(&self, id: &MessageId, token: &str) -> ChatResult<()> {
        self.send(DisplayOp::StreamToken {
            id: id.clone(),
            token: token.to_string(),
        })
        .await
    }

    async fn update_message(&self, session: &ResponseSession) -> ChatResult<()> {
        self.send(DisplayOp::UpdateMessage {
            id: session.id().clone(),
            content: session.text().to_string(),
            elements: session.elements().to_vec(),
        })
        .await
    }

    async fn remove_message(&self, id: &MessageId) -> ChatResult<()> {
        self.send(DisplayOp::RemoveMessage { id: id.clone() }).await
    }

    async fn send_error(&self, content: &str) -> ChatResult<()> {
        self.send(DisplayOp::ErrorMessage {
            content: content.to_string(),
        })
        .await
    }

    async fn send_step(&self, step: &ToolStep) -> ChatResult<()> {
        self.send(DisplayOp::SendStep { step: step.clone() }).await
    }

    async fn stream_step_token(&self, step: &ToolStep, token: &str) -> ChatResult<()> {
        self.send(DisplayOp::StreamStepToken {
            id: step.identifier.clone(),
            token: token.to_string(),
        })
        .await
    }

    async fn update_step(&self, step: &ToolStep) -> ChatResult<()> {
        self.send(DisplayOp::UpdateStep { step: step.clone() }).await
    }
}

// Event stream body; dropping it (client gone) cancels the reply
pub struct SseResponse {
    rx: ReceiverStream<String>,
    _cancel_on_drop: DropGuard,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>, cancellation: CancellationToken) -> Self {
        Self {
            rx,
            _cancel_on_drop: cancellation.drop_guard(),
        }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            Body::from_stream(self),
        )
            .into_response()
    }
}

async fn handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ReplyRequest>,
) -> Result<SseResponse, SessionError> {
    let session = state.session(&session_id).await?;
    let mut attachments = Vec::with_capacity(request.elements.len());
    for element in request.elements {
        attachments.push(element.into_attachment(&state).await?);
    }

    let (tx, rx) = mpsc::channel(100);
    let cancellation = CancellationToken::new();
    let ctx = session.request_context(cancellation.clone()).await;
    let content = request.content;

    tokio::spawn(async move {
        let surface = ChannelSurface::new(tx);
        let outcome = session
            .handler()
            .handle(&ctx, &content, &attachments, &surface)
            .await;
        if let Err(e) = surface.send(DisplayOp::finish(&outcome)).await {
            tracing::debug!(session_id = %session_id, error = %e, "reply finished without a client");
        }
    });

    Ok(SseResponse::new(ReceiverStream::new(rx), cancellation))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/sessions/:id/reply", post(handler))
        .with_state(state)
}
