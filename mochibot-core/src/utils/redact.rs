// File: src/utils/redact.rs

/// Placeholder substituted for configured secret values.
const MASK: &str = "#HIDDEN#";

/// Blank out every occurrence of the configured secrets in `text`.
/// Error messages relayed to a chat pass through here first so API keys
/// embedded in upstream errors never reach users.
pub fn redact_secrets(text: &str, secrets: &[String]) -> String {
    let mut out = text.to_string();
    for secret in secrets {
        if secret.is_empty() {
            continue;
        }
        out = out.replace(secret.as_str(), MASK);
    }
    out
}
