use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
/// Something the front end knows how to display inside a response
pub enum Element {
    Text { content: String },
    Image { url: String },
    Audio { url: String },
    Video { url: String },
    Component { props: Map<String, Value> },
}

impl Element {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Element::Text { content } => Some(content),
            _ => None,
        }
    }
}
