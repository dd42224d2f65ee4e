use serde_json::{json, Value};

use super::base::Usage;
use crate::errors::{ChatError, ChatResult};
use crate::models::content::{ContentPart, MultimodalContent};
use crate::models::message::ConversationMessage;

/// Mime type assumed for inline images declared without one
const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Convert content parts to OpenAI's content part specification
///
/// Chat completions only accept text, images and wav/mp3 audio as input, other
/// media is described to the model in text so the order of parts is kept.
pub fn content_to_openai_spec(content: &MultimodalContent) -> Vec<Value> {
    content
        .parts()
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => json!({"type": "text", "text": text.text}),
            ContentPart::ImageUrl(image) => json!({
                "type": "image_url",
                "image_url": {"url": image.url}
            }),
            ContentPart::ImageData(image) => json!({
                "type": "image_url",
                "image_url": {
                    "url": format!(
                        "data:{};base64,{}",
                        image.mime_type.map_or(DEFAULT_IMAGE_MIME, |m| m.as_str()),
                        image.data
                    )
                }
            }),
            ContentPart::AudioData(audio) => match audio_format(audio.mime_type.as_deref()) {
                Some(format) => json!({
                    "type": "input_audio",
                    "input_audio": {"data": audio.data, "format": format}
                }),
                None => text_part("[An audio attachment in an unsupported format was omitted]"),
            },
            ContentPart::AudioUrl(audio) => text_part(&format!("[Audio: {}]", audio.url)),
            ContentPart::VideoUrl(video) => text_part(&format!("[Video: {}]", video.url)),
            ContentPart::VideoData(_) => text_part("[A video attachment was omitted]"),
            ContentPart::Record(record) => text_part(&Value::Object(record.fields.clone()).to_string()),
        })
        .collect()
}

fn text_part(text: &str) -> Value {
    json!({"type": "text", "text": text})
}

fn audio_format(mime_type: Option<&str>) -> Option<&'static str> {
    match mime_type? {
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mp3" | "audio/mpeg" => Some("mp3"),
        _ => None,
    }
}

/// Build the message list: instruction, recalled history, then the new input
pub fn messages_to_openai_spec(
    instruction: &str,
    history: &[ConversationMessage],
    input: &MultimodalContent,
) -> Vec<Value> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if !instruction.is_empty() {
        messages.push(json!({"role": "system", "content": instruction}));
    }

    for message in history {
        if message.content.is_empty() {
            continue;
        }
        messages.push(json!({
            "role": message.role,
            "content": content_to_openai_spec(&message.content),
        }));
    }

    messages.push(json!({
        "role": "user",
        "content": content_to_openai_spec(input),
    }));
    messages
}

/// Text carried by one streamed completion chunk, if any
///
/// Chunks look like `{"choices":[{"delta":{"content":"..."}}]}`; role-only,
/// finish and usage chunks carry no text.
pub fn openai_delta_to_text(chunk: &Value) -> ChatResult<Option<String>> {
    if let Some(error) = chunk.get("error") {
        return Err(ChatError::Engine(format!("API error: {}", error)));
    }

    Ok(chunk
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string))
}

/// Splits an event-stream body into `data:` payloads as bytes arrive.
///
/// Bytes are buffered until a full line is seen, so chunks may split a line
/// (or a multi-byte character) anywhere.
#[derive(Debug, Default)]
pub struct SseLines {
    buffer: Vec<u8>,
}

impl SseLines {
    /// Payloads of every line completed by `bytes`
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            payloads.extend(data_payload(&line));
        }
        payloads
    }

    /// Payload of a last line the server did not terminate
    pub fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line).into_iter().collect()
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let data = line.trim().strip_prefix("data:")?.trim_start();
    Some(data.to_string())
}

pub fn get_usage(data: &Value) -> Option<Usage> {
    let usage = data.get("usage")?;

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok());

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok());

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok())
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => input.checked_add(output),
            _ => None,
        });

    Some(Usage::new(input_tokens, output_tokens, total_tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn test_content_to_openai_spec_keeps_order() {
        let mut fields = Map::new();
        fields.insert("answer".to_string(), json!(42));
        let content = MultimodalContent::of([
            ContentPart::text("describe"),
            ContentPart::image_data("iVBOR", None),
            ContentPart::image_url("https://example.com/a.gif", Some("image/gif")),
            ContentPart::audio_data("UklGR", Some("audio/wav".into())),
            ContentPart::audio_data("T2dn", Some("audio/ogg".into())),
            ContentPart::video_url("https://example.com/v.mp4", None),
            ContentPart::record(fields),
        ]);

        let spec = content_to_openai_spec(&content);
        assert_eq!(spec.len(), 7);
        assert_eq!(spec[0], json!({"type": "text", "text": "describe"}));
        assert_eq!(
            spec[1]["image_url"]["url"],
            json!("data:image/png;base64,iVBOR")
        );
        assert_eq!(spec[2]["image_url"]["url"], json!("https://example.com/a.gif"));
        assert_eq!(
            spec[3],
            json!({"type": "input_audio", "input_audio": {"data": "UklGR", "format": "wav"}})
        );
        assert_eq!(spec[4]["type"], json!("text"));
        assert_eq!(spec[5]["text"], json!("[Video: https://example.com/v.mp4]"));
        assert_eq!(spec[6]["text"], json!("{\"answer\":42}"));
    }

    #[test]
    fn test_messages_to_openai_spec() {
        let history = vec![
            ConversationMessage::user().with_text("Hi"),
            ConversationMessage::assistant().with_text("Hello!"),
        ];
        let messages =
            messages_to_openai_spec("Be nice.", &history, &MultimodalContent::text("How are you?"));

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], json!({"role": "system", "content": "Be nice."}));
        assert_eq!(messages[1]["role"], json!("user"));
        assert_eq!(messages[2]["role"], json!("assistant"));
        assert_eq!(messages[2]["content"][0]["text"], json!("Hello!"));
        assert_eq!(messages[3]["content"][0]["text"], json!("How are you?"));
    }

    #[test]
    fn test_openai_delta_to_text() -> anyhow::Result<()> {
        let chunk = json!({
            "choices": [{"index": 0, "delta": {"content": "Dzień dobry!"}, "finish_reason": null}]
        });
        assert_eq!(openai_delta_to_text(&chunk)?, Some("Dzień dobry!".to_string()));

        let role_only = json!({"choices": [{"index": 0, "delta": {"role": "assistant"}}]});
        assert_eq!(openai_delta_to_text(&role_only)?, None);
        let finish = json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]});
        assert_eq!(openai_delta_to_text(&finish)?, None);

        let error = json!({"error": {"message": "model not found"}});
        assert!(matches!(
            openai_delta_to_text(&error),
            Err(ChatError::Engine(_))
        ));
        Ok(())
    }

    #[test]
    fn test_sse_lines_across_chunk_boundaries() {
        let body = "data: {\"a\":\"żółw\"}\n\n: keep-alive\n\ndata: [DONE]\n\n".as_bytes();
        let mut lines = SseLines::default();
        let mut payloads = Vec::new();
        // One byte at a time splits the multi-byte characters too
        for byte in body {
            payloads.extend(lines.push(std::slice::from_ref(byte)));
        }
        payloads.extend(lines.finish());
        assert_eq!(payloads, vec!["{\"a\":\"żółw\"}", "[DONE]"]);

        let mut lines = SseLines::default();
        assert!(lines.push(b"data: {}").is_empty());
        assert_eq!(lines.finish(), vec!["{}"]);
    }

    #[test]
    fn test_get_usage_fills_total() {
        let usage = get_usage(&json!({"usage": {"prompt_tokens": 10, "completion_tokens": 20}}));
        assert_eq!(usage, Some(Usage::new(Some(10), Some(20), Some(30))));
        assert_eq!(get_usage(&json!({})), None);
    }

    #[test]
    fn test_get_usage_drops_counts_out_of_range() {
        let huge = i64::from(i32::MAX) + 1;
        let usage = get_usage(&json!({"usage": {
            "prompt_tokens": huge,
            "completion_tokens": 5,
            "total_tokens": huge + 5
        }}));
        assert_eq!(usage, Some(Usage::new(None, Some(5), None)));

        let usage = get_usage(&json!({"usage": {
            "prompt_tokens": i32::MAX,
            "completion_tokens": 1
        }}));
        assert_eq!(usage, Some(Usage::new(Some(i32::MAX), Some(1), None)));
    }
}
