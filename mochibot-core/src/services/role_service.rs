// File: src/services/role_service.rs

use std::collections::HashMap;

use mochibot_common::models::{Badge, GroupMetadata, RoleFlags, UserRecord};

use crate::identity::normalize_core;

/// One configured bot operator. Root owners are owners with extra rights.
#[derive(Debug, Clone)]
pub struct OwnerEntry {
    /// Digits-only phone number.
    pub number: String,
    pub root: bool,
}

impl OwnerEntry {
    pub fn new(number: &str, root: bool) -> Self {
        Self {
            number: normalize_core(number),
            root,
        }
    }
}

/// Computes owner/premium/admin capability snapshots for one identity.
/// Admin checks run against the roster snapshot the dispatch engine already
/// holds; nothing here performs I/O.
pub struct RoleService {
    owners: Vec<OwnerEntry>,
    premium_numbers: Vec<String>,
}

impl RoleService {
    pub fn new(owners: Vec<OwnerEntry>, premium_numbers: Vec<String>) -> Self {
        Self {
            owners,
            premium_numbers: premium_numbers
                .iter()
                .map(|n| normalize_core(n))
                .collect(),
        }
    }

    pub fn is_owner(&self, jid: &str) -> bool {
        let num = normalize_core(jid);
        self.owners.iter().any(|o| o.number == num)
    }

    pub fn is_root_owner(&self, jid: &str) -> bool {
        let num = normalize_core(jid);
        self.owners.iter().any(|o| o.number == num && o.root)
    }

    /// Premium comes from the static allow-list or the user's own record;
    /// expiring the record flag is the record owner's concern, not ours.
    pub fn is_premium(&self, jid: &str, users: &HashMap<String, UserRecord>) -> bool {
        let num = normalize_core(jid);
        if self.premium_numbers.contains(&num) {
            return true;
        }
        users
            .get(&format!("{num}@s.whatsapp.net"))
            .map(|u| u.premium)
            .unwrap_or(false)
    }

    /// Full capability snapshot for `jid`. Admin and bot-admin are always
    /// false outside groups.
    pub fn role_for(
        &self,
        jid: &str,
        snapshot: Option<&GroupMetadata>,
        bot_jid: &str,
        users: &HashMap<String, UserRecord>,
    ) -> RoleFlags {
        let mut flags = RoleFlags {
            is_owner: self.is_owner(jid),
            is_root_owner: self.is_root_owner(jid),
            is_premium: self.is_premium(jid, users),
            ..Default::default()
        };
        if let Some(metadata) = snapshot {
            flags.is_admin = participant_is_admin(metadata, jid);
            flags.is_bot_admin = participant_is_admin(metadata, bot_jid);
        }
        flags
    }

    /// Badge list in fixed precedence order; root owner and owner are
    /// mutually exclusive.
    pub fn badges_for(&self, jid: &str, flags: &RoleFlags, bot_jid: &str) -> Vec<Badge> {
        let mut badges = Vec::new();
        if flags.is_root_owner {
            badges.push(Badge::Creator);
        } else if flags.is_owner {
            badges.push(Badge::Owner);
        }
        if flags.is_admin {
            badges.push(Badge::Admin);
        }
        if flags.is_premium {
            badges.push(Badge::Premium);
        }
        if normalize_core(jid) == normalize_core(bot_jid) {
            badges.push(Badge::Bot);
        }
        badges
    }
}

/// Whether the roster lists `jid` with an administrator rank. Roster rows
/// may address members by either encoding, so comparison is on the digit
/// core of whichever jid the row carries.
pub fn participant_is_admin(metadata: &GroupMetadata, jid: &str) -> bool {
    let num = normalize_core(jid);
    if num.is_empty() {
        return false;
    }
    metadata.participants.iter().any(|p| {
        let wid = p.jid.as_deref().unwrap_or(&p.id);
        normalize_core(wid) == num && p.is_admin()
    })
}
