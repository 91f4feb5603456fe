use serde::{Deserialize, Serialize};

/// Administrator rank a group participant can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminRank {
    Admin,
    SuperAdmin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupParticipant {
    /// Participant identifier as the group roster reports it. Depending on
    /// the platform's addressing mode this can be a phone-number jid or an
    /// opaque linked identifier.
    pub id: String,
    /// Phone-number jid, when the roster carries it alongside `id`.
    pub jid: Option<String>,
    pub admin: Option<AdminRank>,
    pub name: Option<String>,
}

impl GroupParticipant {
    pub fn is_admin(&self) -> bool {
        self.admin.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMetadata {
    pub id: String,
    pub subject: String,
    pub participants: Vec<GroupParticipant>,
}

/// Result of asking the platform whether a number is registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    pub jid: String,
    /// The opaque linked identifier the platform has assigned, if any.
    pub lid: Option<String>,
    pub exists: bool,
}

/// Outbound presence states the dispatch engine emits around a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Composing,
    Paused,
}

impl std::fmt::Display for PresenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresenceState::Composing => write!(f, "composing"),
            PresenceState::Paused => write!(f, "paused"),
        }
    }
}

/// Membership mutations the bot can request on a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantAction {
    Promote,
    Demote,
}
