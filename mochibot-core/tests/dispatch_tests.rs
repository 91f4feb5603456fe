// tests/dispatch_tests.rs
//
// End-to-end exercises of the dispatch pipeline against the recording
// client: matching precedence, gating, charging, fault isolation, presence
// and bookkeeping.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mochibot_common::models::{
    AdminRank, CommandMatcher, InboundMessage, PluginDescriptor, PresenceState, UserRecord,
};
use mochibot_common::Error;
use mochibot_core::plugins::{CommandPlugin, PluginContext};
use mochibot_core::services::role_service::OwnerEntry;
use mochibot_core::state::StateRoot;
use mochibot_core::test_utils::helpers::{participant, RecordingClient};
use mochibot_core::{DispatchConfig, DispatchService};

const GROUP: &str = "1203630-2222@g.us";
const SENDER: &str = "111@s.whatsapp.net";
const OTHER: &str = "222@s.whatsapp.net";
const BOT: &str = "999@s.whatsapp.net";

struct TestPlugin {
    descriptor: PluginDescriptor,
    handled: AtomicUsize,
    all_seen: AtomicUsize,
    fail_with: Option<String>,
    seen_mentions: Mutex<Vec<String>>,
}

impl TestPlugin {
    fn new(name: &str, commands: &[&str]) -> Arc<Self> {
        Self::with(name, commands, |_| {})
    }

    fn with(
        name: &str,
        commands: &[&str],
        tweak: impl FnOnce(&mut PluginDescriptor),
    ) -> Arc<Self> {
        let mut descriptor = PluginDescriptor::new(name, CommandMatcher::any(commands));
        tweak(&mut descriptor);
        Arc::new(Self {
            descriptor,
            handled: AtomicUsize::new(0),
            all_seen: AtomicUsize::new(0),
            fail_with: None,
            seen_mentions: Mutex::new(Vec::new()),
        })
    }

    fn failing(name: &str, commands: &[&str], error: &str) -> Arc<Self> {
        let mut plugin = Self::with(name, commands, |_| {});
        Arc::get_mut(&mut plugin).unwrap().fail_with = Some(error.to_string());
        plugin
    }

    fn handled(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandPlugin for TestPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn all(&self, _msg: &InboundMessage, _ctx: &PluginContext) -> Result<(), Error> {
        self.all_seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn handle(&self, _msg: &InboundMessage, ctx: &PluginContext) -> Result<(), Error> {
        self.handled.fetch_add(1, Ordering::SeqCst);
        self.seen_mentions
            .lock()
            .unwrap()
            .extend(ctx.mentioned.iter().cloned());
        match &self.fail_with {
            Some(e) => Err(Error::Plugin(e.clone())),
            None => Ok(()),
        }
    }
}

fn dyn_plugin(p: Arc<TestPlugin>) -> Arc<dyn CommandPlugin> {
    p
}

fn engine(
    client: &Arc<RecordingClient>,
    state: StateRoot,
    plugins: Vec<Arc<dyn CommandPlugin>>,
    config: DispatchConfig,
) -> DispatchService {
    DispatchService::new(client.clone(), state, plugins, config)
}

fn group_msg(text: &str) -> InboundMessage {
    InboundMessage::new("m1", GROUP, SENDER, text)
}

fn direct_msg(text: &str) -> InboundMessage {
    InboundMessage::new("m1", SENDER, SENDER, text)
}

fn seed_group(client: &Arc<RecordingClient>, bot_is_admin: bool) {
    client.add_group(
        GROUP,
        "dispatch test",
        vec![
            participant(SENDER, Some(AdminRank::Admin)),
            participant(OTHER, None),
            participant(
                BOT,
                if bot_is_admin {
                    Some(AdminRank::Admin)
                } else {
                    None
                },
            ),
        ],
    );
}

#[tokio::test]
async fn first_matching_plugin_wins() {
    let client = Arc::new(RecordingClient::new(BOT));
    let first = TestPlugin::new("first", &["ping"]);
    let second = TestPlugin::new("second", &["ping"]);
    let svc = engine(
        &client,
        StateRoot::new(),
        vec![dyn_plugin(first.clone()), dyn_plugin(second.clone())],
        DispatchConfig::default(),
    );

    svc.handle_event(vec![group_msg(".ping")]).await;

    assert_eq!(first.handled(), 1);
    assert_eq!(second.handled(), 0);
    // Scanning stopped at the winner; the second plugin never even saw the
    // message through its all-hook.
    assert_eq!(second.all_seen.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn group_gate_denies_in_private_and_scanning_continues() {
    let client = Arc::new(RecordingClient::new(BOT));
    let gated = TestPlugin::with("gated", &["ping"], |d| d.group = true);
    let open = TestPlugin::new("open", &["ping"]);
    let svc = engine(
        &client,
        StateRoot::new(),
        vec![dyn_plugin(gated.clone()), dyn_plugin(open.clone())],
        DispatchConfig::default(),
    );

    svc.handle_event(vec![direct_msg(".ping")]).await;

    assert_eq!(gated.handled(), 0);
    assert_eq!(open.handled(), 1);
    let texts = client.sent_texts();
    assert!(texts.iter().any(|t| t.contains("only works in groups")));
    let reactions = client.reactions.lock().unwrap();
    assert!(reactions.iter().any(|(_, e)| e == "✖️"));
}

#[tokio::test]
async fn bot_admin_gate_denies_without_charging() {
    let client = Arc::new(RecordingClient::new(BOT));
    seed_group(&client, false);
    let plugin = TestPlugin::with("kick", &["kick"], |d| {
        d.group = true;
        d.bot_admin = true;
        d.limit = Some(5);
    });
    let svc = engine(
        &client,
        StateRoot::new(),
        vec![dyn_plugin(plugin.clone())],
        DispatchConfig::default(),
    );

    svc.handle_event(vec![group_msg(".kick")]).await;

    assert_eq!(plugin.handled(), 0);
    let state = svc.state();
    let state = state.lock().await;
    let user = state.users.get(SENDER).unwrap();
    assert_eq!(user.limit, 10, "no credits charged on a denied gate");
    assert!(client
        .sent_texts()
        .iter()
        .any(|t| t.contains("need to be a group admin")));
}

#[tokio::test]
async fn declared_cost_and_limit_are_charged_on_success() {
    let client = Arc::new(RecordingClient::new(BOT));
    let plugin = TestPlugin::with("paid", &["paid"], |d| {
        d.exp_cost = Some(5);
        d.limit = Some(2);
    });
    let svc = engine(
        &client,
        StateRoot::new(),
        vec![dyn_plugin(plugin.clone())],
        DispatchConfig::default(),
    );

    svc.handle_event(vec![direct_msg(".paid")]).await;

    assert_eq!(plugin.handled(), 1);
    let state = svc.state();
    let state = state.lock().await;
    let user = state.users.get(SENDER).unwrap();
    // Base roll (1..=10) plus the declared cost of 5.
    assert!((6..=15).contains(&user.exp), "exp was {}", user.exp);
    assert_eq!(user.limit, 8);
    assert!(client
        .sent_texts()
        .iter()
        .any(|t| t.contains("You spent 2 credits")));
}

#[tokio::test]
async fn insufficient_credits_deny_and_scanning_continues() {
    let client = Arc::new(RecordingClient::new(BOT));
    let mut state = StateRoot::new();
    state.users.insert(
        SENDER.to_string(),
        UserRecord {
            limit: 1,
            ..Default::default()
        },
    );
    let expensive = TestPlugin::with("expensive", &["go"], |d| d.limit = Some(5));
    let cheap = TestPlugin::new("cheap", &["go"]);
    let svc = engine(
        &client,
        state,
        vec![dyn_plugin(expensive.clone()), dyn_plugin(cheap.clone())],
        DispatchConfig::default(),
    );

    svc.handle_event(vec![direct_msg(".go")]).await;

    assert_eq!(expensive.handled(), 0);
    assert_eq!(cheap.handled(), 1);
    assert!(client
        .sent_texts()
        .iter()
        .any(|t| t.contains("out of credits")));
}

#[tokio::test]
async fn banned_chat_short_circuits_the_whole_message() {
    let client = Arc::new(RecordingClient::new(BOT));
    let mut state = StateRoot::new();
    let defaults = Default::default();
    state.ensure_chat(GROUP, &defaults).is_banned = true;
    let plugin = TestPlugin::new("ping", &["ping"]);
    let second = TestPlugin::new("pong", &["ping"]);
    let svc = engine(
        &client,
        state,
        vec![dyn_plugin(plugin.clone()), dyn_plugin(second.clone())],
        DispatchConfig::default(),
    );

    svc.handle_event(vec![group_msg(".ping")]).await;

    assert_eq!(plugin.handled(), 0);
    assert_eq!(second.handled(), 0);
    assert!(client.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn banned_user_blocked_except_for_the_unban_plugin() {
    let client = Arc::new(RecordingClient::new(BOT));
    let mut state = StateRoot::new();
    state.users.insert(
        SENDER.to_string(),
        UserRecord {
            banned: true,
            ..Default::default()
        },
    );
    let unban = TestPlugin::new("unbanuser", &["unban"]);
    let normal = TestPlugin::new("ping", &["ping"]);
    let svc = engine(
        &client,
        state,
        vec![dyn_plugin(normal.clone()), dyn_plugin(unban.clone())],
        DispatchConfig::default(),
    );

    svc.handle_event(vec![group_msg(".ping")]).await;
    assert_eq!(normal.handled(), 0);

    svc.handle_event(vec![group_msg(".unban")]).await;
    assert_eq!(unban.handled(), 1);
}

#[tokio::test]
async fn moderator_gate_denies_everyone() {
    let client = Arc::new(RecordingClient::new(BOT));
    let modded = TestPlugin::with("modded", &["ping"], |d| d.mods = true);
    let open = TestPlugin::new("open", &["ping"]);
    let config = DispatchConfig {
        owners: vec![OwnerEntry::new("111", true)],
        ..Default::default()
    };
    let svc = engine(
        &client,
        StateRoot::new(),
        vec![dyn_plugin(modded.clone()), dyn_plugin(open.clone())],
        config,
    );

    // Even a root owner is denied; no moderator role exists.
    svc.handle_event(vec![group_msg(".ping")]).await;

    assert_eq!(modded.handled(), 0);
    assert_eq!(open.handled(), 1);
    assert!(client
        .sent_texts()
        .iter()
        .any(|t| t.contains("Only moderators")));
}

#[tokio::test]
async fn restrict_mode_skips_admin_tagged_plugins() {
    let client = Arc::new(RecordingClient::new(BOT));
    let tagged = TestPlugin::with("tagged", &["ping"], |d| {
        d.tags = vec!["admin".to_string()];
    });
    let open = TestPlugin::new("open", &["ping"]);
    let config = DispatchConfig {
        restrict_admin_plugins: true,
        ..Default::default()
    };
    let svc = engine(
        &client,
        StateRoot::new(),
        vec![dyn_plugin(tagged.clone()), dyn_plugin(open.clone())],
        config,
    );

    svc.handle_event(vec![group_msg(".ping")]).await;

    assert_eq!(tagged.handled(), 0);
    // The all-hook still observed the message before the skip.
    assert_eq!(tagged.all_seen.load(Ordering::SeqCst), 1);
    assert_eq!(open.handled(), 1);
}

#[tokio::test]
async fn handler_fault_is_relayed_with_secrets_redacted() {
    let client = Arc::new(RecordingClient::new(BOT));
    let plugin = TestPlugin::failing("leaky", &["leak"], "upstream rejected key sk-123-topsecret");
    let config = DispatchConfig {
        secret_values: vec!["sk-123-topsecret".to_string()],
        ..Default::default()
    };
    let svc = engine(&client, StateRoot::new(), vec![dyn_plugin(plugin.clone())], config);

    svc.handle_event(vec![group_msg(".leak")]).await;

    let texts = client.sent_texts();
    assert!(texts.iter().any(|t| t.contains("#HIDDEN#")));
    assert!(texts.iter().all(|t| !t.contains("sk-123-topsecret")));

    // The fault is recorded as an unsuccessful invocation.
    let state = svc.state();
    let state = state.lock().await;
    let stat = state.stats.get("leaky").unwrap();
    assert_eq!((stat.total, stat.success), (1, 0));
    assert!(stat.last.is_some());
    assert!(stat.last_success.is_none());
}

#[tokio::test]
async fn successful_invocation_updates_usage_stats() {
    let client = Arc::new(RecordingClient::new(BOT));
    let plugin = TestPlugin::new("ping", &["ping"]);
    let svc = engine(
        &client,
        StateRoot::new(),
        vec![dyn_plugin(plugin.clone())],
        DispatchConfig::default(),
    );

    svc.handle_event(vec![group_msg(".ping")]).await;
    svc.handle_event(vec![group_msg(".ping")]).await;

    let state = svc.state();
    let state = state.lock().await;
    let stat = state.stats.get("ping").unwrap();
    assert_eq!((stat.total, stat.success), (2, 2));
    assert!(stat.last_success.is_some());
}

#[tokio::test]
async fn typing_indicator_cycles_only_for_dot_prefix_when_enabled() {
    let client = Arc::new(RecordingClient::new(BOT));
    let plugin = TestPlugin::new("ping", &["ping"]);
    let svc = engine(
        &client,
        StateRoot::new(),
        vec![dyn_plugin(plugin.clone())],
        DispatchConfig::default(),
    );
    svc.state()
        .lock()
        .await
        .ensure_settings(BOT)
        .autotype_dot_only = true;

    svc.handle_event(vec![group_msg(".ping")]).await;
    {
        let updates = client.presence_updates.lock().unwrap();
        assert_eq!(
            *updates,
            vec![
                (GROUP.to_string(), PresenceState::Composing),
                (GROUP.to_string(), PresenceState::Paused),
            ]
        );
    }

    // A different prefix emits nothing.
    svc.handle_event(vec![group_msg("!ping")]).await;
    assert_eq!(client.presence_updates.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn presence_gate_blocks_unarmed_updates() {
    let client = Arc::new(RecordingClient::new(BOT));
    let svc = engine(&client, StateRoot::new(), vec![], DispatchConfig::default());

    let gate = svc.presence();
    gate.send(GROUP, PresenceState::Composing).await.unwrap();
    assert!(client.presence_updates.lock().unwrap().is_empty());

    gate.arm(GROUP);
    gate.send(GROUP, PresenceState::Composing).await.unwrap();
    assert_eq!(client.presence_updates.lock().unwrap().len(), 1);
    gate.disarm(GROUP);
}

#[tokio::test]
async fn autoread_follows_bot_settings() {
    let client = Arc::new(RecordingClient::new(BOT));
    let svc = engine(&client, StateRoot::new(), vec![], DispatchConfig::default());
    svc.state().lock().await.ensure_settings(BOT).autoread = true;

    svc.handle_event(vec![group_msg("hello there")]).await;

    assert_eq!(*client.reads.lock().unwrap(), vec!["m1".to_string()]);
}

#[tokio::test]
async fn base_experience_applies_even_without_a_match() {
    let client = Arc::new(RecordingClient::new(BOT));
    let svc = engine(&client, StateRoot::new(), vec![], DispatchConfig::default());

    svc.handle_event(vec![group_msg("just chatting")]).await;

    let state = svc.state();
    let state = state.lock().await;
    let user = state.users.get(SENDER).unwrap();
    assert!((1..=10).contains(&user.exp), "exp was {}", user.exp);
    assert!(state.stats.is_empty());
}

#[tokio::test]
async fn unregistered_sender_is_denied_until_registered() {
    let client = Arc::new(RecordingClient::new(BOT));
    let plugin = TestPlugin::with("profile", &["profile"], |d| d.register = true);
    let svc = engine(
        &client,
        StateRoot::new(),
        vec![dyn_plugin(plugin.clone())],
        DispatchConfig::default(),
    );

    svc.handle_event(vec![group_msg(".profile")]).await;
    assert_eq!(plugin.handled(), 0);
    assert!(client
        .sent_texts()
        .iter()
        .any(|t| t.contains("not registered")));

    svc.state()
        .lock()
        .await
        .ensure_user(SENDER, None)
        .registered = true;
    svc.handle_event(vec![group_msg(".profile")]).await;
    assert_eq!(plugin.handled(), 1);
}

#[tokio::test]
async fn mentions_are_canonical_before_the_handler_runs() {
    let client = Arc::new(RecordingClient::new(BOT));
    seed_group(&client, true);
    client.add_contact(OTHER, Some("777002@lid"));
    let plugin = TestPlugin::new("tag", &["tag"]);
    let svc = engine(
        &client,
        StateRoot::new(),
        vec![dyn_plugin(plugin.clone())],
        DispatchConfig::default(),
    );

    let mut msg = group_msg(".tag @777002");
    msg.mentioned = vec!["777002@lid".to_string()];
    svc.handle_event(vec![msg]).await;

    assert_eq!(plugin.handled(), 1);
    assert_eq!(
        *plugin.seen_mentions.lock().unwrap(),
        vec![OTHER.to_string()]
    );
}

#[tokio::test]
async fn primary_bot_silences_secondary_instances() {
    let client = Arc::new(RecordingClient::new(BOT));
    seed_group(&client, true);
    let mut state = StateRoot::new();
    let defaults = Default::default();
    // Another bot, present in the roster, is the designated primary.
    state.ensure_chat(GROUP, &defaults).primary_bot = Some(OTHER.to_string());
    let plugin = TestPlugin::new("ping", &["ping"]);
    let svc = engine(
        &client,
        state,
        vec![dyn_plugin(plugin.clone())],
        DispatchConfig::default(),
    );

    svc.handle_event(vec![group_msg(".ping")]).await;

    assert_eq!(plugin.handled(), 0);
    assert!(client.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn absent_primary_bot_is_cleared_and_dispatch_proceeds() {
    let client = Arc::new(RecordingClient::new(BOT));
    seed_group(&client, true);
    let mut state = StateRoot::new();
    let defaults = Default::default();
    state.ensure_chat(GROUP, &defaults).primary_bot = Some("555000111222@s.whatsapp.net".into());
    let plugin = TestPlugin::new("ping", &["ping"]);
    let svc = engine(
        &client,
        state,
        vec![dyn_plugin(plugin.clone())],
        DispatchConfig::default(),
    );

    svc.handle_event(vec![group_msg(".ping")]).await;

    assert_eq!(plugin.handled(), 1);
    let state = svc.state();
    let state = state.lock().await;
    assert_eq!(state.chats.get(GROUP).unwrap().primary_bot, None);
}

struct WhoisProbe {
    descriptor: PluginDescriptor,
    captured: Mutex<Option<mochibot_core::plugins::UserInfo>>,
}

#[async_trait]
impl CommandPlugin for WhoisProbe {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn handle(&self, _msg: &InboundMessage, ctx: &PluginContext) -> Result<(), Error> {
        let info = ctx.user_info(&ctx.sender).await;
        *self.captured.lock().unwrap() = info;
        Ok(())
    }
}

#[tokio::test]
async fn user_info_helper_assembles_record_roles_and_tag() {
    let client = Arc::new(RecordingClient::new(BOT));
    seed_group(&client, true);
    client.add_name(SENDER, "Rin");
    let probe = Arc::new(WhoisProbe {
        descriptor: PluginDescriptor::new("whois", CommandMatcher::any(&["whois"])),
        captured: Mutex::new(None),
    });
    let config = DispatchConfig {
        owners: vec![OwnerEntry::new("111", false)],
        ..Default::default()
    };
    let plugins: Vec<Arc<dyn CommandPlugin>> = vec![probe.clone()];
    let svc = engine(&client, StateRoot::new(), plugins, config);

    svc.handle_event(vec![group_msg(".whois")]).await;

    let captured = probe.captured.lock().unwrap();
    let info = captured.as_ref().expect("user info assembled");
    assert_eq!(info.jid, SENDER);
    assert_eq!(info.number, "+111");
    assert_eq!(info.display_tag, "Rin");
    assert!(info.roles.is_owner);
    assert!(info.roles.is_admin);
    assert!(info.record.is_some());
}

#[tokio::test]
async fn self_only_mode_ignores_everyone_else() {
    let client = Arc::new(RecordingClient::new(BOT));
    let plugin = TestPlugin::new("ping", &["ping"]);
    let config = DispatchConfig {
        self_only: true,
        ..Default::default()
    };
    let svc = engine(&client, StateRoot::new(), vec![dyn_plugin(plugin.clone())], config);

    svc.handle_event(vec![group_msg(".ping")]).await;
    assert_eq!(plugin.handled(), 0);

    let mut own = group_msg(".ping");
    own.from_me = true;
    own.sender = BOT.to_string();
    svc.handle_event(vec![own]).await;
    assert_eq!(plugin.handled(), 1);
}
