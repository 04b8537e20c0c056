//! Conversation message types.

use serde::{Deserialize, Serialize};

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
    /// System-generated message.
    System,
}

/// A file or image attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A single message in a session.
///
/// Position in `Session::messages` defines replay order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The message body.
    pub text: String,
    /// Creation time in epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp,
            attachments: Vec::new(),
        }
    }

    pub fn user(text: impl Into<String>, timestamp: i64) -> Self {
        Self::new(MessageRole::User, text, timestamp)
    }

    pub fn assistant(text: impl Into<String>, timestamp: i64) -> Self {
        Self::new(MessageRole::Assistant, text, timestamp)
    }
}
