use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Image formats the engine accepts with an explicit type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageMimeType {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/gif")]
    Gif,
}

impl ImageMimeType {
    /// Parse a declared mime type, returning None for anything outside the allow-list
    pub fn parse(mime_type: &str) -> Option<Self> {
        match mime_type {
            "image/jpeg" => Some(ImageMimeType::Jpeg),
            "image/png" => Some(ImageMimeType::Png),
            "image/gif" => Some(ImageMimeType::Gif),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMimeType::Jpeg => "image/jpeg",
            ImageMimeType::Png => "image/png",
            ImageMimeType::Gif => "image/gif",
        }
    }
}

impl fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUrlContent {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<ImageMimeType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDataContent {
    /// Base64 encoded bytes
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<ImageMimeType>,
}

/// A url-referenced audio or video payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUrlContent {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// An inline audio or video payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDataContent {
    /// Base64 encoded bytes
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordContent {
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
/// A single unit of content passed to or from the completion engine
pub enum ContentPart {
    Text(TextContent),
    ImageUrl(ImageUrlContent),
    ImageData(ImageDataContent),
    AudioUrl(MediaUrlContent),
    AudioData(MediaDataContent),
    VideoUrl(MediaUrlContent),
    VideoData(MediaDataContent),
    Record(RecordContent),
}

impl ContentPart {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ContentPart::Text(TextContent { text: text.into() })
    }

    /// Image by reference; undeclared or unknown mime types become unspecified
    pub fn image_url<S: Into<String>>(url: S, mime_type: Option<&str>) -> Self {
        ContentPart::ImageUrl(ImageUrlContent {
            url: url.into(),
            mime_type: mime_type.and_then(ImageMimeType::parse),
        })
    }

    pub fn image_data<S: Into<String>>(data: S, mime_type: Option<&str>) -> Self {
        ContentPart::ImageData(ImageDataContent {
            data: data.into(),
            mime_type: mime_type.and_then(ImageMimeType::parse),
        })
    }

    pub fn audio_url<S: Into<String>>(url: S, mime_type: Option<String>) -> Self {
        ContentPart::AudioUrl(MediaUrlContent {
            url: url.into(),
            mime_type,
        })
    }

    pub fn audio_data<S: Into<String>>(data: S, mime_type: Option<String>) -> Self {
        ContentPart::AudioData(MediaDataContent {
            data: data.into(),
            mime_type,
        })
    }

    pub fn video_url<S: Into<String>>(url: S, mime_type: Option<String>) -> Self {
        ContentPart::VideoUrl(MediaUrlContent {
            url: url.into(),
            mime_type,
        })
    }

    pub fn video_data<S: Into<String>>(data: S, mime_type: Option<String>) -> Self {
        ContentPart::VideoData(MediaDataContent {
            data: data.into(),
            mime_type,
        })
    }

    pub fn record(fields: Map<String, Value>) -> Self {
        ContentPart::Record(RecordContent { fields })
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    /// Whether the part carries an inline payload rather than a reference
    pub fn is_inline_data(&self) -> bool {
        matches!(
            self,
            ContentPart::ImageData(_) | ContentPart::AudioData(_) | ContentPart::VideoData(_)
        )
    }
}

/// Ordered content, the order is both presentation and prompt order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultimodalContent {
    parts: Vec<ContentPart>,
}

impl MultimodalContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of<I: IntoIterator<Item = ContentPart>>(parts: I) -> Self {
        Self {
            parts: parts.into_iter().collect(),
        }
    }

    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::of([ContentPart::text(text)])
    }

    pub fn push(&mut self, part: ContentPart) {
        self.parts.push(part);
    }

    pub fn with_part(mut self, part: ContentPart) -> Self {
        self.push(part);
        self
    }

    pub fn parts(&self) -> &[ContentPart] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<ContentPart> {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Concatenated text of all text parts, other parts are ignored
    pub fn as_string(&self) -> String {
        self.parts
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// Drop text parts with no characters, keeping the order of everything else
    pub fn without_empty_text(self) -> Self {
        Self {
            parts: self
                .parts
                .into_iter()
                .filter(|part| part.as_text().map_or(true, |text| !text.is_empty()))
                .collect(),
        }
    }
}

impl Extend<ContentPart> for MultimodalContent {
    fn extend<T: IntoIterator<Item = ContentPart>>(&mut self, iter: T) {
        self.parts.extend(iter);
    }
}

impl From<ContentPart> for MultimodalContent {
    fn from(part: ContentPart) -> Self {
        Self::of([part])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_mime_allow_list() {
        let part = ContentPart::image_url("https://example.com/a.png", Some("image/png"));
        assert_eq!(
            part,
            ContentPart::ImageUrl(ImageUrlContent {
                url: "https://example.com/a.png".to_string(),
                mime_type: Some(ImageMimeType::Png),
            })
        );

        for declared in ["image/webp", "image/svg+xml", "text/plain", ""] {
            match ContentPart::image_data("AAAA", Some(declared)) {
                ContentPart::ImageData(image) => assert_eq!(image.mime_type, None),
                other => panic!("Expected image data, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_audio_mime_passes_through() {
        let part = ContentPart::audio_url("https://example.com/a.ogg", Some("audio/ogg".into()));
        match part {
            ContentPart::AudioUrl(audio) => assert_eq!(audio.mime_type.as_deref(), Some("audio/ogg")),
            other => panic!("Expected audio url, got {:?}", other),
        }
    }

    #[test]
    fn test_as_string_and_empty_text() {
        let content = MultimodalContent::of([
            ContentPart::text(""),
            ContentPart::text("Hello"),
            ContentPart::image_url("https://example.com/a.gif", None),
            ContentPart::text(", world"),
        ]);
        assert_eq!(content.as_string(), "Hello, world");

        let trimmed = content.without_empty_text();
        assert_eq!(trimmed.len(), 3);
        assert_eq!(trimmed.parts()[0].as_text(), Some("Hello"));
        assert!(matches!(trimmed.parts()[1], ContentPart::ImageUrl(_)));
    }

    #[test]
    fn test_serialization_shape() -> anyhow::Result<()> {
        let content = MultimodalContent::text("hi")
            .with_part(ContentPart::image_url("https://example.com/x.jpg", Some("image/jpeg")));
        let value = serde_json::to_value(&content)?;
        assert_eq!(
            value,
            json!([
                {"type": "text", "text": "hi"},
                {"type": "imageUrl", "url": "https://example.com/x.jpg", "mimeType": "image/jpeg"}
            ])
        );
        Ok(())
    }
}
