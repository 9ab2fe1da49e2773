//! Scenario tests for the responder engine: routing, keyword precedence,
//! the add-keyword flow and the kill-switch, driven through test doubles.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use super::content::{ContentStore, CustomRuleStore};
use super::engine::Responder;
use super::event::MessagingEvent;
use super::graph::{Transport, TransportError};
use super::news::{Headline, NewsSource};
use super::outbound::{Attachment, OutboundMessage, SenderAction, TemplatePayload};
use super::session::{FlowState, Profile};
use super::stats::{
    render_top10, CountrySummary, RankMetric, RegionStat, RegionalSnapshot, StatsSource,
};

// =============================================================================
// TEST DOUBLES
// =============================================================================

struct RecordingTransport {
    sent: Mutex<Vec<(String, OutboundMessage)>>,
    profile: Option<Profile>,
    profile_fetches: AtomicUsize,
    menu_installs: AtomicUsize,
    menu_removals: AtomicUsize,
}

impl RecordingTransport {
    fn new(profile: Option<Profile>) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            profile,
            profile_fetches: AtomicUsize::new(0),
            menu_installs: AtomicUsize::new(0),
            menu_removals: AtomicUsize::new(0),
        })
    }

    fn sent(&self) -> Vec<(String, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }

    fn last_sent(&self) -> Option<(String, OutboundMessage)> {
        self.sent.lock().unwrap().last().cloned()
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        recipient_id: &str,
        message: &OutboundMessage,
    ) -> Result<Option<String>, TransportError> {
        self.sent.lock().unwrap().push((recipient_id.to_string(), message.clone()));
        Ok(Some("mid.test".to_string()))
    }

    async fn fetch_profile(&self, _user_id: &str) -> Result<Profile, TransportError> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        self.profile
            .clone()
            .ok_or_else(|| TransportError::Http("profile service down".to_string()))
    }

    async fn install_menu(&self) -> Result<(), TransportError> {
        self.menu_installs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove_menu(&self) -> Result<(), TransportError> {
        self.menu_removals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct StaticStats {
    snapshot: RegionalSnapshot,
    countries: Vec<CountrySummary>,
    fail: bool,
}

impl Default for StaticStats {
    fn default() -> Self {
        Self {
            snapshot: RegionalSnapshot {
                vietnam: RegionStat { cases: 10, recovered: 5, deaths: 1 },
                global: RegionStat { cases: 1000, recovered: 500, deaths: 100 },
            },
            countries: vec![
                country("Italy", "IT", 1_100, 400, 110),
                country("United States of America", "US", 1_200, 300, 60),
                country("Spain", "ES", 1_000, 350, 80),
            ],
            fail: false,
        }
    }
}

#[async_trait]
impl StatsSource for StaticStats {
    async fn snapshot(&self) -> Result<RegionalSnapshot, TransportError> {
        if self.fail {
            return Err(TransportError::Http("stats down".to_string()));
        }
        Ok(self.snapshot.clone())
    }

    async fn countries(&self) -> Result<Vec<CountrySummary>, TransportError> {
        if self.fail {
            return Err(TransportError::Http("stats down".to_string()));
        }
        Ok(self.countries.clone())
    }
}

#[derive(Default)]
struct StaticNews {
    articles: Vec<Headline>,
}

#[async_trait]
impl NewsSource for StaticNews {
    async fn headlines(&self) -> Result<Vec<Headline>, TransportError> {
        Ok(self.articles.clone())
    }
}

fn country(name: &str, code: &str, confirmed: u64, recovered: u64, deaths: u64) -> CountrySummary {
    CountrySummary {
        country: name.to_string(),
        country_code: code.to_string(),
        confirmed,
        recovered,
        deaths,
    }
}

// =============================================================================
// HARNESS
// =============================================================================

const ADMIN: &str = "admin-1";

struct Harness {
    responder: Responder,
    transport: Arc<RecordingTransport>,
    custom_dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self::build(StaticStats::default(), StaticNews::default(), Some(ada()))
    }

    fn without_profile() -> Self {
        Self::build(StaticStats::default(), StaticNews::default(), None)
    }

    fn with_stats(stats: StaticStats) -> Self {
        Self::build(stats, StaticNews::default(), Some(ada()))
    }

    fn with_news(news: StaticNews) -> Self {
        Self::build(StaticStats::default(), news, Some(ada()))
    }

    fn build(stats: StaticStats, news: StaticNews, profile: Option<Profile>) -> Self {
        let custom_dir = TempDir::new().unwrap();
        let transport = RecordingTransport::new(profile);
        let responder = Responder::new(
            Some(ADMIN.to_string()),
            transport.clone(),
            Arc::new(stats),
            Arc::new(news),
            ContentStore::builtin(),
            CustomRuleStore::load(custom_dir.path().to_path_buf()),
        );
        Self { responder, transport, custom_dir }
    }

    async fn text(&self, sender: &str, text: &str) {
        self.responder.handle_event(&text_event(sender, text)).await;
    }

    async fn quick_reply(&self, sender: &str, payload: &str) {
        self.responder.handle_event(&quick_reply_event(sender, payload)).await;
    }

    fn state(&self, sender: &str) -> FlowState {
        self.responder.sessions.get(sender).state
    }
}

fn ada() -> Profile {
    Profile { first_name: "Ada".to_string(), last_name: "Lovelace".to_string() }
}

fn event(value: serde_json::Value) -> MessagingEvent {
    serde_json::from_value(value).unwrap()
}

fn text_event(sender: &str, text: &str) -> MessagingEvent {
    event(json!({
        "sender": {"id": sender}, "recipient": {"id": "page-1"},
        "timestamp": 1712000000000i64,
        "message": {"mid": "m.1", "text": text}
    }))
}

fn quick_reply_event(sender: &str, payload: &str) -> MessagingEvent {
    event(json!({
        "sender": {"id": sender}, "recipient": {"id": "page-1"},
        "timestamp": 1712000000000i64,
        "message": {"mid": "m.2", "text": "tap", "quick_reply": {"payload": payload}}
    }))
}

fn postback_event(sender: &str, payload: &str) -> MessagingEvent {
    event(json!({
        "sender": {"id": sender}, "recipient": {"id": "page-1"},
        "timestamp": 1712000000000i64,
        "postback": {"payload": payload}
    }))
}

fn message_text(message: &OutboundMessage) -> Option<&str> {
    match message {
        OutboundMessage::Message(payload) => payload.text.as_deref(),
        OutboundMessage::Action(_) => None,
    }
}

// =============================================================================
// ROUTER COMMANDS
// =============================================================================

mod router_commands {
    use super::*;

    #[tokio::test]
    async fn test_image_command_emits_fixed_template() {
        let h = Harness::new();
        h.text("7", "image").await;
        let (to, message) = h.transport.last_sent().unwrap();
        assert_eq!(to, "7");
        assert_eq!(
            message,
            OutboundMessage::image("https://messengerdemo.parseapp.com/img/rift.png")
        );
    }

    #[tokio::test]
    async fn test_commands_match_case_insensitively() {
        let h = Harness::new();
        h.text("7", "  IMAGE ").await;
        assert_eq!(
            h.transport.last_sent().unwrap().1,
            OutboundMessage::image("https://messengerdemo.parseapp.com/img/rift.png")
        );
    }

    #[tokio::test]
    async fn test_typing_and_read_receipt_send_actions() {
        let h = Harness::new();
        h.text("7", "typing on").await;
        h.text("7", "typing off").await;
        h.text("7", "read receipt").await;
        let actions: Vec<_> = h.transport.sent().into_iter().map(|(_, m)| m).collect();
        assert_eq!(actions[0], OutboundMessage::action(SenderAction::TypingOn));
        assert_eq!(actions[1], OutboundMessage::action(SenderAction::TypingOff));
        assert_eq!(actions[2], OutboundMessage::action(SenderAction::MarkSeen));
    }

    #[tokio::test]
    async fn test_user_info_sends_cached_first_name() {
        let h = Harness::new();
        h.text("7", "user info").await;
        assert_eq!(message_text(&h.transport.last_sent().unwrap().1), Some("Ada"));
    }

    #[tokio::test]
    async fn test_user_info_without_profile_sends_sentinel() {
        let h = Harness::without_profile();
        h.text("7", "user info").await;
        assert_eq!(message_text(&h.transport.last_sent().unwrap().1), Some("undefined"));
    }

    #[tokio::test]
    async fn test_menu_commands_hit_transport() {
        let h = Harness::new();
        h.text("7", "add menu").await;
        h.text("7", "remove menu").await;
        assert_eq!(h.transport.menu_installs.load(Ordering::SeqCst), 1);
        assert_eq!(h.transport.menu_removals.load(Ordering::SeqCst), 1);
        // Menu management produces no chat reply.
        assert_eq!(h.transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_echo_is_ignored() {
        let h = Harness::new();
        let echo = event(json!({
            "sender": {"id": "page-1"}, "recipient": {"id": "7"},
            "message": {"mid": "m.9", "text": "hi", "is_echo": true, "app_id": 1}
        }));
        h.responder.handle_event(&echo).await;
        assert_eq!(h.transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_optin_acknowledged() {
        let h = Harness::new();
        let optin = event(json!({
            "sender": {"id": "7"}, "recipient": {"id": "page-1"},
            "optin": {"ref": "PLUGIN"}
        }));
        h.responder.handle_event(&optin).await;
        assert_eq!(
            message_text(&h.transport.last_sent().unwrap().1),
            Some("Authentication successful")
        );
    }
}

// =============================================================================
// KEYWORD ENGINE
// =============================================================================

mod keyword_engine {
    use super::*;

    #[tokio::test]
    async fn test_content_lookup_is_case_insensitive() {
        let h = Harness::new();
        h.text("7", "home").await;
        h.text("7", "HOME").await;
        h.text("7", "HoMe").await;
        let sent = h.transport.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].1, sent[1].1);
        assert_eq!(sent[1].1, sent[2].1);
    }

    #[tokio::test]
    async fn test_custom_rule_never_shadows_builtin() {
        let h = Harness::new();
        h.responder.custom.add("HOME", "shadow attempt").unwrap();
        h.text("7", "home").await;
        let (_, message) = h.transport.last_sent().unwrap();
        // The built-in generic card wins, not the custom text.
        assert!(matches!(
            message,
            OutboundMessage::Message(ref payload)
                if matches!(payload.attachment, Some(Attachment::Template(TemplatePayload::Generic { .. })))
        ));
    }

    #[tokio::test]
    async fn test_unknown_keyword_terminal_reply_is_idempotent() {
        let h = Harness::new();
        h.text("7", "frobnicate").await;
        h.text("7", "frobnicate").await;
        let sent = h.transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, sent[1].1);
        assert!(message_text(&sent[0].1).unwrap().contains("\"frobnicate\""));
        assert_eq!(
            h.responder.sessions.get("7").last_keyword.as_deref(),
            Some("frobnicate")
        );
    }

    #[tokio::test]
    async fn test_postback_dispatches_like_keyword() {
        let h = Harness::new();
        h.responder.handle_event(&postback_event("7", "HOME")).await;
        assert_eq!(h.transport.sent_count(), 1);
        assert_eq!(h.responder.sessions.get("7").last_keyword.as_deref(), Some("home"));
    }

    #[tokio::test]
    async fn test_attachment_url_falls_through_to_unknown() {
        let h = Harness::new();
        let attachment = event(json!({
            "sender": {"id": "7"}, "recipient": {"id": "page-1"},
            "message": {"mid": "m.3", "attachments": [
                {"type": "image", "payload": {"url": "https://cdn.example/cat.png"}}
            ]}
        }));
        h.responder.handle_event(&attachment).await;
        let (_, message) = h.transport.last_sent().unwrap();
        assert!(message_text(&message).unwrap().contains("cdn.example/cat.png"));
    }

    #[tokio::test]
    async fn test_top10_matches_pure_rendering() {
        let stats = StaticStats::default();
        let expected = render_top10(&stats.countries, RankMetric::Cases);
        let h = Harness::with_stats(stats);
        h.quick_reply("7", "top10_cases").await;
        assert_eq!(message_text(&h.transport.last_sent().unwrap().1), Some(expected.as_str()));
        // Substitution applied inside the rendering.
        assert!(expected.contains("United States:"));
    }

    #[tokio::test]
    async fn test_top10_deaths_carries_nav_quick_replies() {
        let h = Harness::new();
        h.quick_reply("7", "top10_deaths").await;
        let OutboundMessage::Message(payload) = h.transport.last_sent().unwrap().1 else {
            panic!("expected message");
        };
        let payloads: Vec<String> = payload
            .quick_replies
            .unwrap()
            .into_iter()
            .map(|q| q.payload)
            .collect();
        assert_eq!(payloads, vec!["fatality_rate".to_string(), "HOME".to_string()]);
    }

    #[tokio::test]
    async fn test_stats_failure_degrades_to_fixed_reply() {
        let h = Harness::with_stats(StaticStats { fail: true, ..StaticStats::default() });
        h.quick_reply("7", "VN").await;
        assert_eq!(
            message_text(&h.transport.last_sent().unwrap().1),
            Some(crate::bot::keyword::DATA_UNAVAILABLE)
        );
    }

    #[tokio::test]
    async fn test_news_keywords() {
        let news = StaticNews {
            articles: vec![
                Headline {
                    title: "First".into(),
                    description: "first summary".into(),
                    link: "https://news.example/1".into(),
                    image: None,
                },
                Headline {
                    title: "Second".into(),
                    description: "second summary".into(),
                    link: "https://news.example/2".into(),
                    image: None,
                },
            ],
        };
        let h = Harness::with_news(news);
        h.quick_reply("7", "news").await;
        let OutboundMessage::Message(payload) = h.transport.last_sent().unwrap().1 else {
            panic!("expected message");
        };
        assert!(matches!(
            payload.attachment,
            Some(Attachment::Template(TemplatePayload::Generic { ref elements })) if elements.len() == 2
        ));

        h.quick_reply("7", "read-2").await;
        assert_eq!(
            message_text(&h.transport.last_sent().unwrap().1),
            Some("second summary")
        );
    }

    #[tokio::test]
    async fn test_list_keywords() {
        let h = Harness::new();
        h.quick_reply("7", "list keywords").await;
        assert_eq!(
            message_text(&h.transport.last_sent().unwrap().1),
            Some("No custom keywords defined yet")
        );

        h.responder.custom.add("weather", "sunny").unwrap();
        h.responder.custom.add("coffee", "espresso").unwrap();
        h.quick_reply("7", "list keywords").await;
        assert_eq!(
            message_text(&h.transport.last_sent().unwrap().1),
            Some("COFFEE\nWEATHER")
        );
    }
}

// =============================================================================
// ADD-KEYWORD FLOW
// =============================================================================

mod add_keyword_flow {
    use super::*;

    #[tokio::test]
    async fn test_text_rule_round_trip() {
        let h = Harness::new();

        h.text("7", "add keyword").await;
        assert_eq!(h.state("7"), FlowState::AwaitingKeywordName);

        h.text("7", "WEATHER").await;
        assert_eq!(h.state("7"), FlowState::ChoosingReplyKind);
        assert_eq!(
            h.responder.sessions.get("7").pending_keyword.as_deref(),
            Some("WEATHER")
        );

        h.quick_reply("7", "addkeyword_text").await;
        assert_eq!(h.state("7"), FlowState::AwaitingKeywordText);

        h.text("7", "It is sunny").await;
        assert_eq!(h.state("7"), FlowState::Idle);
        assert!(h.responder.sessions.get("7").pending_keyword.is_none());
        assert_eq!(
            message_text(&h.transport.last_sent().unwrap().1),
            Some("Keyword added. Try it out!")
        );
        assert!(h.custom_dir.path().join("WEATHER.json").exists());

        // The new rule resolves case-insensitively.
        h.text("7", "weather").await;
        assert_eq!(message_text(&h.transport.last_sent().unwrap().1), Some("It is sunny"));
    }

    #[tokio::test]
    async fn test_flow_is_per_sender() {
        let h = Harness::new();
        h.text("7", "add keyword").await;
        h.text("8", "hello").await;
        // Sender 8 got the unknown-keyword reply, not a flow step.
        assert_eq!(h.state("8"), FlowState::Idle);
        assert_eq!(h.state("7"), FlowState::AwaitingKeywordName);
    }

    #[tokio::test]
    async fn test_step_in_wrong_state_recovers() {
        let h = Harness::new();
        h.quick_reply("7", "addkeyword_button1").await;
        assert_eq!(h.state("7"), FlowState::Idle);
        assert!(h.responder.sessions.get("7").pending_keyword.is_none());
        assert!(
            message_text(&h.transport.last_sent().unwrap().1)
                .unwrap()
                .contains("confused")
        );
        // Nothing was persisted.
        assert_eq!(h.responder.custom.len(), 0);
    }

    #[tokio::test]
    async fn test_choose_text_from_idle_recovers() {
        let h = Harness::new();
        h.quick_reply("7", "addkeyword_text").await;
        assert_eq!(h.state("7"), FlowState::Idle);
        assert!(message_text(&h.transport.last_sent().unwrap().1).unwrap().contains("confused"));
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_retry_state() {
        let h = Harness::new();
        h.text("7", "add keyword").await;
        h.text("7", "bad/slash").await;
        h.quick_reply("7", "addkeyword_text").await;
        let before = h.transport.sent_count();

        h.text("7", "some reply").await;
        // No reply on failure; the sender may retry the same step.
        assert_eq!(h.transport.sent_count(), before);
        assert_eq!(h.state("7"), FlowState::AwaitingKeywordText);
        assert_eq!(h.responder.custom.len(), 0);
    }

    #[tokio::test]
    async fn test_button_branch_previews_and_rests() {
        let h = Harness::new();
        h.text("7", "add keyword").await;
        h.text("7", "SUPPORT").await;
        h.quick_reply("7", "addkeyword_button").await;
        assert_eq!(h.state("7"), FlowState::AwaitingButtonTitle);

        h.text("7", "Contact us").await;
        assert_eq!(h.state("7"), FlowState::AwaitingButtonCount);

        h.quick_reply("7", "addkeyword_button2").await;
        assert_eq!(h.state("7"), FlowState::Idle);
        let OutboundMessage::Message(payload) = h.transport.last_sent().unwrap().1 else {
            panic!("expected message");
        };
        let Some(Attachment::Template(TemplatePayload::Button { buttons, .. })) = payload.attachment
        else {
            panic!("expected button template");
        };
        assert_eq!(buttons.len(), 2);
        // Button rules are not persisted.
        assert_eq!(h.responder.custom.len(), 0);
    }

    #[tokio::test]
    async fn test_free_text_while_choosing_falls_through() {
        let h = Harness::new();
        h.text("7", "add keyword").await;
        h.text("7", "WEATHER").await;
        // Free text instead of a choice command: plain keyword handling,
        // flow state untouched.
        h.text("7", "frobnicate").await;
        assert_eq!(h.state("7"), FlowState::ChoosingReplyKind);
        assert!(message_text(&h.transport.last_sent().unwrap().1).unwrap().contains("frobnicate"));
    }

    #[tokio::test]
    async fn test_emoji_reaction_precedes_keyword_lookup() {
        let h = Harness::new();
        h.text("7", "😀 good morning").await;
        let reply = message_text(&h.transport.last_sent().unwrap().1).unwrap().to_string();
        assert!(crate::bot::emoji::is_known_emoji(&reply));
    }

    #[tokio::test]
    async fn test_relay_shortcut_forwards_to_admin() {
        let h = Harness::new();
        h.text("7", "send a message").await;
        // The phrase itself is an unknown keyword; the reply goes to sender 7.
        assert_eq!(h.transport.last_sent().unwrap().0, "7");

        h.text("7", "please call me back").await;
        let (to, message) = h.transport.last_sent().unwrap();
        assert_eq!(to, ADMIN);
        assert_eq!(message_text(&message), Some("please call me back"));
    }
}

// =============================================================================
// KILL-SWITCH
// =============================================================================

mod kill_switch {
    use super::*;

    #[tokio::test]
    async fn test_stop_is_noop_for_non_admin() {
        let h = Harness::new();
        h.text("7", "stop").await;
        h.text("7", "hello").await;
        // Still responding: the unknown-keyword reply arrived.
        assert_eq!(h.transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_admin_stop_silences_until_start() {
        let h = Harness::new();
        h.text(ADMIN, "stop").await;
        assert_eq!(h.transport.sent_count(), 0);

        h.text("7", "hello").await;
        h.text(ADMIN, "image").await;
        assert_eq!(h.transport.sent_count(), 0);

        // Non-admin "start" passes the router but does not flip the switch.
        h.text("7", "start").await;
        h.text("7", "hello").await;
        assert_eq!(h.transport.sent_count(), 0);

        h.text(ADMIN, "start").await;
        h.text("7", "hello").await;
        assert_eq!(h.transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_quick_replies_bypass_kill_switch() {
        let h = Harness::new();
        h.text(ADMIN, "stop").await;
        h.quick_reply("7", "HOME").await;
        // Quick replies are evaluated before the kill-switch check.
        assert_eq!(h.transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_postbacks_are_gated() {
        let h = Harness::new();
        h.text(ADMIN, "stop").await;
        h.responder.handle_event(&postback_event("7", "HOME")).await;
        assert_eq!(h.transport.sent_count(), 0);
    }
}

// =============================================================================
// PROFILES
// =============================================================================

mod profiles {
    use super::*;

    #[tokio::test]
    async fn test_profile_fetched_once_then_cached() {
        let h = Harness::new();
        h.text("7", "hello").await;
        h.text("7", "hello again").await;
        assert_eq!(h.transport.profile_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.responder.sessions.get("7").profile,
            Some(Profile { first_name: "Ada".into(), last_name: "Lovelace".into() })
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_retried_on_next_event() {
        let h = Harness::without_profile();
        h.text("7", "hello").await;
        h.text("7", "hello again").await;
        // No cache entry, so each event attempts a fetch.
        assert_eq!(h.transport.profile_fetches.load(Ordering::SeqCst), 2);
        assert!(h.responder.sessions.get("7").profile.is_none());
    }

    #[tokio::test]
    async fn test_delivery_events_skip_profile_fetch() {
        let h = Harness::new();
        let delivery = event(json!({
            "sender": {"id": "7"}, "recipient": {"id": "page-1"},
            "delivery": {"mids": ["m.1"], "watermark": 1712000000000i64}
        }));
        h.responder.handle_event(&delivery).await;
        assert_eq!(h.transport.profile_fetches.load(Ordering::SeqCst), 0);
        assert_eq!(h.transport.sent_count(), 0);
    }
}
