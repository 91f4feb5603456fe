// File: src/identity/mod.rs
//
// Canonicalization of raw platform identifiers. The platform hands us
// several encodings for the same participant: bare numbers, numbers with a
// device suffix (`:7`), jids with extra path segments, group jids, and
// opaque linked identifiers that can only be resolved against a group
// roster (see `lid_resolver`).

pub mod lid_resolver;
pub mod targets;

pub use lid_resolver::LidResolver;

/// Domain suffix of a canonical one-to-one identity.
pub const DIRECT_SUFFIX: &str = "@s.whatsapp.net";
/// Domain suffix of a group identity.
pub const GROUP_SUFFIX: &str = "@g.us";
/// Domain suffix of an opaque linked identifier.
pub const LID_SUFFIX: &str = "@lid";

pub fn is_group_jid(jid: &str) -> bool {
    jid.ends_with(GROUP_SUFFIX)
}

pub fn is_lid_jid(jid: &str) -> bool {
    jid.ends_with(LID_SUFFIX)
}

/// Leading path segment of an identifier: everything before the first
/// `@`, `:`, `/` or `,`.
pub fn local_part(raw: &str) -> &str {
    raw.split(['@', ':', '/', ','])
        .next()
        .unwrap_or(raw)
}

fn digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Digits-only core of an identifier.
pub fn normalize_core(raw: &str) -> String {
    digits(local_part(raw))
}

/// Render a canonical direct identity for display (`+<digits>`). Returns an
/// empty string when the input carries no digits; never call this on group
/// or unresolved linked identities.
pub fn pretty_num(raw: &str) -> String {
    let core = normalize_core(raw);
    if core.is_empty() {
        String::new()
    } else {
        format!("+{core}")
    }
}

/// Strip a device-index suffix (`12345:7@host` -> `12345@host`).
pub fn decode_jid(raw: &str) -> String {
    if let Some((user, server)) = raw.split_once('@') {
        if let Some((bare, device)) = user.split_once(':') {
            if !device.is_empty() && device.chars().all(|c| c.is_ascii_hexdigit()) {
                return format!("{bare}@{server}");
            }
        }
    }
    raw.to_string()
}

/// Canonicalize any raw identifier form.
///
/// Group jids pass through verbatim; linked identifiers stay unchanged
/// (they cannot be normalized without a roster lookup); everything else is
/// reduced to `<digits>@s.whatsapp.net`. An input without a single digit is
/// returned unmodified — an identity is never fabricated from nothing.
pub fn normalize_jid(raw: &str) -> String {
    let mut v = raw.trim();
    if v.is_empty() {
        return String::new();
    }
    if let Some(stripped) = v.strip_prefix('@') {
        v = stripped;
    }
    if v.ends_with(GROUP_SUFFIX) {
        return v.to_string();
    }
    if v.contains(DIRECT_SUFFIX) {
        let n = normalize_core(v);
        return if n.is_empty() {
            v.to_string()
        } else {
            format!("{n}{DIRECT_SUFFIX}")
        };
    }
    if v.contains(LID_SUFFIX) {
        return v.to_string();
    }
    let n = normalize_core(v);
    if n.is_empty() {
        v.to_string()
    } else {
        format!("{n}{DIRECT_SUFFIX}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_gets_direct_suffix() {
        assert_eq!(normalize_jid("5215512345678"), "5215512345678@s.whatsapp.net");
        assert_eq!(normalize_jid("+52 1551-234-5678"), "5215512345678@s.whatsapp.net");
    }

    #[test]
    fn normalization_is_idempotent_on_canonical_input() {
        let canon = normalize_jid("5215512345678:12@s.whatsapp.net");
        assert_eq!(canon, "5215512345678@s.whatsapp.net");
        assert_eq!(normalize_jid(&canon), canon);
    }

    #[test]
    fn group_jids_pass_through_verbatim() {
        let g = "123456789-987654@g.us";
        assert_eq!(normalize_jid(g), g);
    }

    #[test]
    fn linked_identifiers_stay_unchanged() {
        let lid = "98765432109876@lid";
        assert_eq!(normalize_jid(lid), lid);
    }

    #[test]
    fn digit_free_input_is_returned_unmodified() {
        assert_eq!(normalize_jid("status@broadcast"), "status@broadcast");
        assert_eq!(normalize_jid("not-a-number"), "not-a-number");
    }

    #[test]
    fn mention_prefix_is_stripped() {
        assert_eq!(normalize_jid("@5511999887766"), "5511999887766@s.whatsapp.net");
    }

    #[test]
    fn local_part_stops_at_any_separator() {
        assert_eq!(local_part("123:4@s.whatsapp.net"), "123");
        assert_eq!(local_part("123/extra"), "123");
        assert_eq!(local_part("123,456"), "123");
    }

    #[test]
    fn pretty_num_renders_plus_digits() {
        assert_eq!(pretty_num("5215512345678@s.whatsapp.net"), "+5215512345678");
        assert_eq!(pretty_num("no-digits"), "");
    }

    #[test]
    fn decode_jid_strips_device_suffix() {
        assert_eq!(decode_jid("123:7f@s.whatsapp.net"), "123@s.whatsapp.net");
        assert_eq!(decode_jid("123@s.whatsapp.net"), "123@s.whatsapp.net");
        assert_eq!(decode_jid("plain"), "plain");
    }
}
