use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::try_join_all;
use std::path::Path;
use std::sync::Arc;

use crate::errors::{ChatError, ChatResult};
use crate::knowledge::DocumentIndexer;
use crate::models::attachment::{Attachment, FileAttachment, MediaAttachment, MediaReference};
use crate::models::content::{ContentPart, MultimodalContent};

#[derive(Debug, Clone, Copy)]
enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    fn name(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    fn url_part(&self, url: &str, mime_type: Option<&String>) -> ContentPart {
        match self {
            MediaKind::Image => ContentPart::image_url(url, mime_type.map(String::as_str)),
            MediaKind::Audio => ContentPart::audio_url(url, mime_type.cloned()),
            MediaKind::Video => ContentPart::video_url(url, mime_type.cloned()),
        }
    }

    fn data_part(&self, data: String, mime_type: Option<&String>) -> ContentPart {
        match self {
            MediaKind::Image => ContentPart::image_data(data, mime_type.map(String::as_str)),
            MediaKind::Audio => ContentPart::audio_data(data, mime_type.cloned()),
            MediaKind::Video => ContentPart::video_data(data, mime_type.cloned()),
        }
    }
}

/// Converts a front-end message into engine content.
///
/// Documents are handed to the indexer instead of becoming content.
pub struct ContentAdapter {
    indexer: Arc<dyn DocumentIndexer>,
}

impl ContentAdapter {
    pub fn new(indexer: Arc<dyn DocumentIndexer>) -> Self {
        Self { indexer }
    }

    /// Normalize free text plus attachments, keeping the attachment order.
    ///
    /// The free text is always the first part, even when empty. Attachments
    /// are resolved concurrently.
    pub async fn normalize(
        &self,
        free_text: &str,
        attachments: &[Attachment],
    ) -> ChatResult<MultimodalContent> {
        let resolved = try_join_all(attachments.iter().map(|a| self.resolve(a))).await?;

        let mut content = MultimodalContent::text(free_text);
        content.extend(resolved.into_iter().flatten());
        Ok(content)
    }

    async fn resolve(&self, attachment: &Attachment) -> ChatResult<Option<ContentPart>> {
        match attachment {
            Attachment::Text(text) => Ok(Some(ContentPart::text(text.content.clone()))),
            Attachment::Image(media) => resolve_media(MediaKind::Image, media).await.map(Some),
            Attachment::Audio(media) => resolve_media(MediaKind::Audio, media).await.map(Some),
            Attachment::Video(media) => resolve_media(MediaKind::Video, media).await.map(Some),
            Attachment::Document(document) => {
                let path = require_path("document", document)?;
                self.indexer.index_document(path).await?;
                Ok(None)
            }
            Attachment::File(file) => {
                let path = require_path("file", file)?;
                self.resolve_file(path).await
            }
        }
    }

    async fn resolve_file(&self, path: &Path) -> ChatResult<Option<ContentPart>> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("pdf") => {
                self.indexer.index_document(path).await?;
                Ok(None)
            }
            Some("mp3") => Ok(Some(ContentPart::audio_data(
                load_file_base64(path).await?,
                Some("audio/mp3".to_string()),
            ))),
            Some("wav") => Ok(Some(ContentPart::audio_data(
                load_file_base64(path).await?,
                Some("audio/wav".to_string()),
            ))),
            Some("mp4") => Ok(Some(ContentPart::video_data(
                load_file_base64(path).await?,
                Some("video/mp4".to_string()),
            ))),
            // Unrecognized files are dropped without a part or an error
            _ => {
                tracing::debug!(path = %path.display(), "skipping file with unrecognized extension");
                Ok(None)
            }
        }
    }
}

async fn resolve_media(kind: MediaKind, media: &MediaAttachment) -> ChatResult<ContentPart> {
    match &media.reference {
        Some(MediaReference::Url(url)) => Ok(kind.url_part(url, media.mime_type.as_ref())),
        Some(MediaReference::Path(path)) => {
            let data = load_file_base64(path).await?;
            Ok(kind.data_part(data, media.mime_type.as_ref()))
        }
        None => Err(ChatError::UnsupportedContent(format!(
            "{} attachment has neither a url nor a path",
            kind.name()
        ))),
    }
}

fn require_path<'a>(kind: &str, file: &'a FileAttachment) -> ChatResult<&'a Path> {
    file.path().ok_or_else(|| {
        ChatError::UnsupportedContent(format!("{} attachment has no local path", kind))
    })
}

/// Read a local file without blocking the runtime and encode it as base64
pub async fn load_file_base64(path: &Path) -> ChatResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ChatError::Io(format!("failed to read {}: {}", path.display(), e)))?;
    Ok(STANDARD.encode(bytes))
}
