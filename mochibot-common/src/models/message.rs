use serde::{Deserialize, Serialize};

/// A single inbound chat message, already decoded from the wire by the
/// protocol client. The dispatch pipeline canonicalizes `sender`, `chat`
/// and `mentioned` in place before any plugin sees the message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform message id, used for read receipts and deletion.
    pub id: String,
    /// Chat the message arrived in (direct jid or group jid).
    pub chat: String,
    /// Raw sender identifier as delivered by the platform.
    pub sender: String,
    pub text: String,
    /// Push-name the sender advertises, if any.
    pub pushname: Option<String>,
    pub is_group: bool,
    pub from_me: bool,
    /// Identifiers referenced in the message body. May contain opaque
    /// linked identifiers until the mention processor has run.
    pub mentioned: Vec<String>,
    /// Sender of the quoted message, when this message is a reply.
    pub quoted_sender: Option<String>,
}

impl InboundMessage {
    pub fn new(id: &str, chat: &str, sender: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            chat: chat.to_string(),
            sender: sender.to_string(),
            text: text.to_string(),
            is_group: chat.ends_with("@g.us"),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

/// A media attachment a plugin hands to the protocol client for delivery.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub kind: MediaKind,
    pub data: Vec<u8>,
    pub caption: Option<String>,
}
