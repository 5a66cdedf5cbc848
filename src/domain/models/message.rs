#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrlRef {
    pub url: String,
}

/// One entry of a multimodal message body, serialized in the provider's
/// wire shape (`{"type": "text", ...}` / `{"type": "image_url", ...}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrlRef },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A single exchange entry replayed to the model for context. Ordering is
/// significant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ConversationMessage {
    pub fn system(text: &str) -> ConversationMessage {
        return ConversationMessage {
            role: Role::System,
            content: MessageContent::Text(text.to_string()),
        };
    }

    pub fn user(text: &str) -> ConversationMessage {
        return ConversationMessage {
            role: Role::User,
            content: MessageContent::Text(text.to_string()),
        };
    }

    pub fn assistant(text: &str) -> ConversationMessage {
        return ConversationMessage {
            role: Role::Assistant,
            content: MessageContent::Text(text.to_string()),
        };
    }

    pub fn user_with_image(text: &str, image_url: &str) -> ConversationMessage {
        return ConversationMessage {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: text.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrlRef {
                        url: image_url.to_string(),
                    },
                },
            ]),
        };
    }

    /// The text of the message, with image parts skipped.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => return text.to_string(),
            MessageContent::Parts(parts) => {
                return parts
                    .iter()
                    .filter_map(|part| {
                        if let ContentPart::Text { text } = part {
                            return Some(text.as_str());
                        }
                        return None;
                    })
                    .collect::<Vec<&str>>()
                    .join("\n");
            }
        }
    }
}
