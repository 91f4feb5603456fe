use serde::{Deserialize, Serialize};

/// Per-identity capability snapshot computed for one message.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RoleFlags {
    pub is_owner: bool,
    pub is_root_owner: bool,
    pub is_premium: bool,
    pub is_admin: bool,
    pub is_bot_admin: bool,
}

/// Display label summarizing an identity's status. Derivation order is
/// fixed: root owner supersedes owner, then admin, premium, bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Badge {
    Creator,
    Owner,
    Admin,
    Premium,
    Bot,
}

impl std::fmt::Display for Badge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Badge::Creator => write!(f, "CREATOR"),
            Badge::Owner => write!(f, "OWNER"),
            Badge::Admin => write!(f, "ADMIN"),
            Badge::Premium => write!(f, "PREMIUM"),
            Badge::Bot => write!(f, "BOT"),
        }
    }
}
