use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Longest preview a conversation summary keeps, in characters.
pub const SUMMARY_MAX_CHARS: usize = 200;

/// Typed message payload.
///
/// On the wire every element is `{ "type": <kind>, "data": {...} }`. Known
/// kinds are decoded into their own variant; anything else is kept verbatim
/// in [`MessageElement::Other`] so newer clients can send kinds this server
/// does not know yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawElement", into = "RawElement")]
pub enum MessageElement {
    Text {
        text: String,
    },
    Image {
        url: String,
        width: Option<u32>,
        height: Option<u32>,
    },
    CharacterAction {
        action: String,
        text: Option<String>,
    },
    Other {
        kind: String,
        data: Value,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ElementError {
    #[error("element type must not be empty")]
    EmptyKind,

    #[error("malformed {kind} element: {source}")]
    Malformed {
        kind: &'static str,
        source: serde_json::Error,
    },
}

#[derive(Clone, Serialize, Deserialize)]
struct RawElement {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct TextData {
    text: String,
}

#[derive(Deserialize)]
struct ImageData {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize)]
struct CharacterActionData {
    action: String,
    text: Option<String>,
}

fn decode<T: DeserializeOwned>(kind: &'static str, data: Value) -> Result<T, ElementError> {
    serde_json::from_value(data).map_err(|source| ElementError::Malformed { kind, source })
}

impl TryFrom<RawElement> for MessageElement {
    type Error = ElementError;

    fn try_from(raw: RawElement) -> Result<Self, Self::Error> {
        let element = match raw.kind.as_str() {
            "" => return Err(ElementError::EmptyKind),
            "text" => {
                let d: TextData = decode("text", raw.data)?;
                Self::Text { text: d.text }
            }
            "image" => {
                let d: ImageData = decode("image", raw.data)?;
                Self::Image {
                    url: d.url,
                    width: d.width,
                    height: d.height,
                }
            }
            "character_action" => {
                let d: CharacterActionData = decode("character_action", raw.data)?;
                Self::CharacterAction {
                    action: d.action,
                    text: d.text,
                }
            }
            _ => Self::Other {
                kind: raw.kind,
                data: raw.data,
            },
        };
        Ok(element)
    }
}

impl From<MessageElement> for RawElement {
    fn from(element: MessageElement) -> Self {
        let kind = element.kind().to_string();
        let data = match element {
            MessageElement::Text { text } => json!({ "text": text }),
            MessageElement::Image { url, width, height } => {
                json!({ "url": url, "width": width, "height": height })
            }
            MessageElement::CharacterAction { action, text } => {
                json!({ "action": action, "text": text })
            }
            MessageElement::Other { data, .. } => data,
        };
        RawElement { kind, data }
    }
}

impl MessageElement {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The wire type tag.
    pub fn kind(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::CharacterAction { .. } => "character_action",
            Self::Other { kind, .. } => kind.as_str(),
        }
    }

    /// Plain text carried by the payload, if any.
    pub fn plain_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text.as_str()),
            Self::CharacterAction { text, .. } => text.as_deref(),
            Self::Other { data, .. } => data.get("text").and_then(Value::as_str),
            Self::Image { .. } => None,
        }
    }

    /// Preview used for conversation summaries: the payload's text,
    /// falling back to its type tag.
    pub fn summary(&self) -> String {
        let text = self.plain_text().unwrap_or_else(|| self.kind());
        text.chars().take(SUMMARY_MAX_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_decode_into_variants() {
        let el: MessageElement =
            serde_json::from_str(r#"{"type":"text","data":{"text":"hello"}}"#).unwrap();
        assert_eq!(el, MessageElement::text("hello"));

        let el: MessageElement =
            serde_json::from_str(r#"{"type":"image","data":{"url":"https://x/y.png","width":64}}"#)
                .unwrap();
        assert_eq!(
            el,
            MessageElement::Image {
                url: "https://x/y.png".into(),
                width: Some(64),
                height: None,
            }
        );
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let el: MessageElement =
            serde_json::from_str(r#"{"type":"sticker","data":{"pack":"cats","id":7}}"#).unwrap();
        assert_eq!(el.kind(), "sticker");

        let out = serde_json::to_value(&el).unwrap();
        assert_eq!(out, json!({"type":"sticker","data":{"pack":"cats","id":7}}));
    }

    #[test]
    fn malformed_known_kind_is_rejected() {
        let err = serde_json::from_str::<MessageElement>(r#"{"type":"text","data":{"body":1}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("malformed text element"));

        assert!(serde_json::from_str::<MessageElement>(r#"{"type":"","data":{}}"#).is_err());
    }

    #[test]
    fn summary_prefers_text_then_kind() {
        assert_eq!(MessageElement::text("hi there").summary(), "hi there");

        let action = MessageElement::CharacterAction {
            action: "wave".into(),
            text: None,
        };
        assert_eq!(action.summary(), "character_action");

        let other = MessageElement::Other {
            kind: "card".into(),
            data: json!({"text": "from a card"}),
        };
        assert_eq!(other.summary(), "from a card");

        let image = MessageElement::Image {
            url: "u".into(),
            width: None,
            height: None,
        };
        assert_eq!(image.summary(), "image");
    }

    #[test]
    fn summary_is_truncated_on_char_boundary() {
        let long = "é".repeat(SUMMARY_MAX_CHARS + 10);
        let summary = MessageElement::text(long).summary();
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS);
    }
}
