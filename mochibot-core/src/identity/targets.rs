// File: src/identity/targets.rs

use super::{normalize_jid, DIRECT_SUFFIX};

/// Hard cap on how many targets one invocation may address.
const MAX_TARGETS: usize = 50;

/// Shortest digit run accepted as a phone number.
const MIN_NUMBER_LEN: usize = 8;

/// Extract the identities a command is aimed at.
///
/// Resolved mentions come first, then tokens parsed out of the free text:
/// `@123…` tags, phone-number-looking strings, explicit jids, and bare digit
/// runs. The result is normalized, deduplicated in order, and capped.
pub fn parse_user_targets(input: &str, mentioned: &[String]) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();

    for jid in mentioned {
        push_unique(&mut targets, normalize_jid(jid));
    }

    for item in input.split([',', ';', ' ', '\n']) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }

        if let Some(tag) = item.strip_prefix('@') {
            if !tag.is_empty() {
                push_unique(&mut targets, normalize_jid(tag));
            }
            continue;
        }

        if item.contains('@') {
            push_unique(&mut targets, normalize_jid(item));
            continue;
        }

        let digits: String = item.chars().filter(char::is_ascii_digit).collect();
        let looks_numeric = item
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' '));
        if looks_numeric && digits.len() >= MIN_NUMBER_LEN {
            push_unique(&mut targets, format!("{digits}{DIRECT_SUFFIX}"));
        }
    }

    targets.truncate(MAX_TARGETS);
    targets
}

fn push_unique(targets: &mut Vec<String>, jid: String) {
    if !jid.is_empty() && !targets.contains(&jid) {
        targets.push(jid);
    }
}
