use regex::Regex;

/// How a plugin claims a command token. Matching is case-insensitive only in
/// the sense that the dispatch engine lowercases the token first.
#[derive(Debug, Clone)]
pub enum CommandMatcher {
    Exact(String),
    AnyOf(Vec<CommandMatcher>),
    Pattern(Regex),
}

impl CommandMatcher {
    pub fn accepts(&self, command: &str) -> bool {
        match self {
            CommandMatcher::Exact(s) => s == command,
            CommandMatcher::AnyOf(list) => list.iter().any(|m| m.accepts(command)),
            CommandMatcher::Pattern(re) => re.is_match(command),
        }
    }

    /// Convenience constructor for the common "any of these literals" case.
    pub fn any(commands: &[&str]) -> Self {
        CommandMatcher::AnyOf(
            commands
                .iter()
                .map(|c| CommandMatcher::Exact((*c).to_string()))
                .collect(),
        )
    }
}

/// A plugin's custom prefix. `None` on the descriptor means the engine's
/// default punctuation class applies.
#[derive(Debug, Clone)]
pub enum PrefixMatcher {
    Literal(String),
    Pattern(Regex),
    AnyOf(Vec<PrefixMatcher>),
}

impl PrefixMatcher {
    /// Returns the prefix substring when `text` starts with this prefix.
    pub fn matched(&self, text: &str) -> Option<String> {
        match self {
            PrefixMatcher::Literal(lit) => text.starts_with(lit.as_str()).then(|| lit.clone()),
            PrefixMatcher::Pattern(re) => re
                .find(text)
                .filter(|m| m.start() == 0)
                .map(|m| m.as_str().to_string()),
            PrefixMatcher::AnyOf(list) => list.iter().find_map(|p| p.matched(text)),
        }
    }
}

/// Static description of a registered command handler: what it matches and
/// which gates apply before its main handler may run.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub name: String,
    pub command: CommandMatcher,
    pub prefix: Option<PrefixMatcher>,
    pub tags: Vec<String>,
    pub help: Vec<String>,
    pub disabled: bool,

    // Gating flags, checked in the fixed order documented on the dispatch
    // engine.
    pub root_owner: bool,
    pub owner: bool,
    pub mods: bool,
    pub premium: bool,
    pub group: bool,
    pub admin: bool,
    pub bot_admin: bool,
    pub private: bool,
    pub register: bool,

    /// Experience charged on a match; the engine default applies when unset.
    pub exp_cost: Option<i64>,
    /// Minimum credit balance required, charged on success.
    pub limit: Option<i64>,
}

impl PluginDescriptor {
    pub fn new(name: &str, command: CommandMatcher) -> Self {
        Self {
            name: name.to_string(),
            command,
            prefix: None,
            tags: Vec::new(),
            help: Vec::new(),
            disabled: false,
            root_owner: false,
            owner: false,
            mods: false,
            premium: false,
            group: false,
            admin: false,
            bot_admin: false,
            private: false,
            register: false,
            exp_cost: None,
            limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matcher_variants_accept_and_reject() {
        assert!(CommandMatcher::Exact("ping".into()).accepts("ping"));
        assert!(!CommandMatcher::Exact("ping".into()).accepts("pong"));

        let set = CommandMatcher::any(&["pay", "transfer"]);
        assert!(set.accepts("transfer"));
        assert!(!set.accepts("promote"));

        let pat = CommandMatcher::Pattern(Regex::new(r"^promote$").unwrap());
        assert!(pat.accepts("promote"));
        assert!(!pat.accepts("promoted"));
    }

    #[test]
    fn prefix_matches_only_at_start() {
        let lit = PrefixMatcher::Literal("#".into());
        assert_eq!(lit.matched("#menu"), Some("#".into()));
        assert_eq!(lit.matched("menu#"), None);

        let pat = PrefixMatcher::Pattern(Regex::new(r"^[./!#]").unwrap());
        assert_eq!(pat.matched(".menu"), Some(".".into()));
        assert_eq!(pat.matched("menu"), None);
    }
}
