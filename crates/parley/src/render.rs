use crate::errors::{ChatError, ChatResult};
use crate::models::content::{ContentPart, MultimodalContent};
use crate::models::element::Element;

/// Map one engine content part to something the front end can display.
///
/// Inline payloads cannot be displayed yet, only url-backed media renders.
/// Every text part becomes a text element, empty ones included.
pub fn render(part: &ContentPart) -> ChatResult<Option<Element>> {
    match part {
        ContentPart::Text(text) => Ok(Some(Element::Text {
            content: text.text.clone(),
        })),
        ContentPart::ImageUrl(image) => Ok(Some(Element::Image {
            url: image.url.clone(),
        })),
        ContentPart::AudioUrl(audio) => Ok(Some(Element::Audio {
            url: audio.url.clone(),
        })),
        ContentPart::VideoUrl(video) => Ok(Some(Element::Video {
            url: video.url.clone(),
        })),
        ContentPart::Record(record) => Ok(Some(Element::Component {
            props: record.fields.clone(),
        })),
        ContentPart::ImageData(_) => Err(inline_not_supported("image")),
        ContentPart::AudioData(_) => Err(inline_not_supported("audio")),
        ContentPart::VideoData(_) => Err(inline_not_supported("video")),
    }
}

/// Render every part in order, failing on the first part that cannot be shown
pub fn render_content(content: &MultimodalContent) -> ChatResult<Vec<Element>> {
    let mut elements = Vec::with_capacity(content.len());
    for part in content.parts() {
        if let Some(element) = render(part)? {
            elements.push(element);
        }
    }
    Ok(elements)
}

fn inline_not_supported(kind: &str) -> ChatError {
    ChatError::NotSupported(format!("inline {} content cannot be displayed yet", kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ContentAdapter;
    use crate::knowledge::VolatileKnowledgeBase;
    use crate::models::attachment::{Attachment, MediaReference};
    use serde_json::{json, Map, Value};
    use std::sync::Arc;

    #[test]
    fn test_text_and_url_media() -> anyhow::Result<()> {
        assert_eq!(
            render(&ContentPart::text("hello"))?,
            Some(Element::Text {
                content: "hello".into()
            })
        );
        assert_eq!(
            render(&ContentPart::audio_url("https://example.com/a.mp3", None))?,
            Some(Element::Audio {
                url: "https://example.com/a.mp3".into()
            })
        );
        assert_eq!(
            render(&ContentPart::video_url("https://example.com/v.mp4", Some("video/mp4".into())))?,
            Some(Element::Video {
                url: "https://example.com/v.mp4".into()
            })
        );
        assert_eq!(
            render(&ContentPart::text(""))?,
            Some(Element::Text {
                content: String::new()
            })
        );
        Ok(())
    }

    #[test]
    fn test_record_becomes_component() -> anyhow::Result<()> {
        let fields: Map<String, Value> = json!({"city": "Gdańsk", "temperature": 12})
            .as_object()
            .cloned()
            .unwrap_or_default();
        let element = render(&ContentPart::record(fields.clone()))?;
        assert_eq!(element, Some(Element::Component { props: fields }));
        Ok(())
    }

    #[test]
    fn test_inline_data_is_never_rendered() {
        let large = "QUJD".repeat(4096);
        let payloads = ["", "AAAA", large.as_str()];
        for payload in payloads {
            for part in [
                ContentPart::image_data(payload, Some("image/png")),
                ContentPart::audio_data(payload, None),
                ContentPart::video_data(payload, Some("video/mp4".into())),
            ] {
                assert!(matches!(render(&part), Err(ChatError::NotSupported(_))));
            }
        }
    }

    #[test]
    fn test_render_content_stops_on_inline_part() {
        let content = MultimodalContent::of([
            ContentPart::text("before"),
            ContentPart::image_data("AAAA", None),
            ContentPart::text("after"),
        ]);
        assert!(matches!(
            render_content(&content),
            Err(ChatError::NotSupported(_))
        ));
    }

    #[tokio::test]
    async fn test_normalized_urls_render_to_same_url() -> anyhow::Result<()> {
        let adapter = ContentAdapter::new(Arc::new(VolatileKnowledgeBase::new()));
        let image = "https://example.com/cat.gif";
        let audio = "https://example.com/meow.wav";
        let video = "https://example.com/cat.mp4";
        let attachments = vec![
            Attachment::image(MediaReference::Url(image.into()), Some("image/gif")),
            Attachment::audio(MediaReference::Url(audio.into()), None),
            Attachment::video(MediaReference::Url(video.into()), None),
        ];

        let content = adapter.normalize("", &attachments).await?;
        let elements = render_content(&content)?;
        assert_eq!(
            elements,
            vec![
                Element::Text {
                    content: String::new()
                },
                Element::Image { url: image.into() },
                Element::Audio { url: audio.into() },
                Element::Video { url: video.into() },
            ]
        );
        Ok(())
    }
}
