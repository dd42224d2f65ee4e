use std::path::{Path, PathBuf};

/// Where an attachment's payload lives
#[derive(Debug, Clone, PartialEq)]
pub enum MediaReference {
    Url(String),
    Path(PathBuf),
}

impl MediaReference {
    /// Pick a reference from the optional fields a front end sends.
    ///
    /// The remote reference is checked first and empty values count as absent.
    pub fn from_parts(url: Option<String>, path: Option<PathBuf>) -> Option<Self> {
        match (url, path) {
            (Some(url), _) if !url.is_empty() => Some(MediaReference::Url(url)),
            (_, Some(path)) if !path.as_os_str().is_empty() => Some(MediaReference::Path(path)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextAttachment {
    pub name: Option<String>,
    pub content: String,
}

/// An image, audio or video attachment
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAttachment {
    pub name: Option<String>,
    pub reference: Option<MediaReference>,
    pub mime_type: Option<String>,
}

/// A document or a generic file, only ever referenced by a local path
#[derive(Debug, Clone, PartialEq)]
pub struct FileAttachment {
    pub name: Option<String>,
    pub path: Option<PathBuf>,
    pub mime_type: Option<String>,
}

impl FileAttachment {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            name: None,
            path: Some(path.into()),
            mime_type: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
/// An element attached to a front-end message
pub enum Attachment {
    Text(TextAttachment),
    Image(MediaAttachment),
    Audio(MediaAttachment),
    Video(MediaAttachment),
    Document(FileAttachment),
    File(FileAttachment),
}

impl Attachment {
    pub fn text<S: Into<String>>(content: S) -> Self {
        Attachment::Text(TextAttachment {
            name: None,
            content: content.into(),
        })
    }

    pub fn image(reference: MediaReference, mime_type: Option<&str>) -> Self {
        Attachment::Image(MediaAttachment::new(Some(reference), mime_type))
    }

    pub fn audio(reference: MediaReference, mime_type: Option<&str>) -> Self {
        Attachment::Audio(MediaAttachment::new(Some(reference), mime_type))
    }

    pub fn video(reference: MediaReference, mime_type: Option<&str>) -> Self {
        Attachment::Video(MediaAttachment::new(Some(reference), mime_type))
    }

    pub fn document<P: Into<PathBuf>>(path: P) -> Self {
        Attachment::Document(FileAttachment::new(path))
    }

    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Attachment::File(FileAttachment::new(path))
    }

    /// A short label used in logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Attachment::Text(_) => "text",
            Attachment::Image(_) => "image",
            Attachment::Audio(_) => "audio",
            Attachment::Video(_) => "video",
            Attachment::Document(_) => "document",
            Attachment::File(_) => "file",
        }
    }
}

impl MediaAttachment {
    pub fn new(reference: Option<MediaReference>, mime_type: Option<&str>) -> Self {
        Self {
            name: None,
            reference,
            mime_type: mime_type.map(String::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_prefers_url() {
        let reference = MediaReference::from_parts(
            Some("https://example.com/a.png".to_string()),
            Some(PathBuf::from("/tmp/a.png")),
        );
        assert_eq!(
            reference,
            Some(MediaReference::Url("https://example.com/a.png".to_string()))
        );
    }

    #[test]
    fn test_reference_empty_values_are_absent() {
        assert_eq!(
            MediaReference::from_parts(Some(String::new()), Some(PathBuf::from("/tmp/a.wav"))),
            Some(MediaReference::Path(PathBuf::from("/tmp/a.wav")))
        );
        assert_eq!(
            MediaReference::from_parts(Some(String::new()), Some(PathBuf::new())),
            None
        );
        assert_eq!(MediaReference::from_parts(None, None), None);
    }
}
