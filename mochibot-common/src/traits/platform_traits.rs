use async_trait::async_trait;

use crate::error::Error;
use crate::models::{
    ContactRecord, GroupMetadata, InboundMessage, MediaPayload, ParticipantAction, PresenceState,
};

/// The capabilities the dispatch core consumes from the messaging-protocol
/// client. Connection lifecycle and wire-level framing stay on the other
/// side of this trait.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// The bot's own canonical identity.
    fn self_jid(&self) -> String;

    /// Strip a device-index suffix (`12345:7@host` -> `12345@host`) from a
    /// native identifier. Clients with richer addressing may override.
    fn decode_jid(&self, raw: &str) -> String {
        if let Some((user, server)) = raw.split_once('@') {
            if let Some((bare, device)) = user.split_once(':') {
                if !device.is_empty() && device.chars().all(|c| c.is_ascii_hexdigit()) {
                    return format!("{bare}@{server}");
                }
            }
        }
        raw.to_string()
    }

    /// Fetch the participant roster and subject for a group.
    async fn group_metadata(&self, chat: &str) -> Result<GroupMetadata, Error>;

    /// Ask the platform whether a number is registered, and under which jid
    /// and linked identifier.
    async fn contact_lookup(&self, jid: &str) -> Result<Option<ContactRecord>, Error>;

    /// Contact-book display name, if the client knows one.
    async fn get_name(&self, jid: &str) -> Option<String>;

    /// Send a text message, optionally quoting another message.
    async fn send_text(
        &self,
        chat: &str,
        text: &str,
        quoted: Option<&InboundMessage>,
    ) -> Result<(), Error>;

    /// Send a media attachment, optionally quoting another message.
    async fn send_media(
        &self,
        chat: &str,
        media: &MediaPayload,
        quoted: Option<&InboundMessage>,
    ) -> Result<(), Error>;

    /// React to a message with a single emoji.
    async fn react(&self, msg: &InboundMessage, emoji: &str) -> Result<(), Error>;

    async fn send_presence(&self, chat: &str, state: PresenceState) -> Result<(), Error>;

    /// Mark messages as read.
    async fn read_messages(&self, ids: &[String]) -> Result<(), Error>;

    /// Promote or demote group participants.
    async fn group_participants_update(
        &self,
        chat: &str,
        participants: &[String],
        action: ParticipantAction,
    ) -> Result<(), Error>;

    /// Delete a message sent by `participant` in `chat`.
    async fn delete_message(
        &self,
        chat: &str,
        message_id: &str,
        participant: &str,
    ) -> Result<(), Error>;
}
