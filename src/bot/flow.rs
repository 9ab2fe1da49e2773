//! Free-text dispatch and the add-keyword authoring flow.
//!
//! The flow is a per-session state machine (see [`FlowState`]). Every step
//! handler validates that the session is in its expected predecessor state
//! and falls back to the single [`Responder::state_machine_error`] recovery
//! transition otherwise.

use tracing::{error, info, warn};

use crate::bot::emoji;
use crate::bot::engine::Responder;
use crate::bot::outbound::{Button, OutboundMessage, QuickReply};
use crate::bot::session::FlowState;

/// Sentinel last-keyword that turns the next text into a direct relay.
const SEND_A_MESSAGE: &str = "send a message";

const KEYWORD_NAME_PROMPT: &str = "A keyword triggers one of my replies. It can be typed or \
     carried by a link, and may contain letters, digits and spaces. Please type the keyword:";
const KEYWORD_TEXT_PROMPT: &str =
    "Please type the text I should send back whenever this keyword is used.";
const BUTTON_TITLE_PROMPT: &str = "Please type the title for the button.";
const KEYWORD_ADDED: &str = "Keyword added. Try it out!";
const CONFUSED: &str = "Sorry, I got confused. We will have to start again.";

impl Responder {
    /// Idle dispatch ordering: relay shortcut, active flow step, emoji
    /// reaction, keyword engine.
    pub(crate) async fn handle_free_text(&self, sender: &str, text: &str) {
        let session = self.sessions.get(sender);

        if session.last_keyword.as_deref() == Some(SEND_A_MESSAGE) {
            match &self.admin_sender_id {
                Some(admin) => {
                    info!("relaying message from {sender} to admin");
                    self.deliver(admin, OutboundMessage::text(text)).await;
                }
                None => warn!("relay requested by {sender} but no admin is configured"),
            }
            return;
        }

        match session.state {
            FlowState::AwaitingKeywordName => self.capture_keyword_name(sender, text).await,
            FlowState::AwaitingKeywordText => self.persist_text_rule(sender, text).await,
            FlowState::AwaitingButtonTitle => self.capture_button_title(sender, text).await,
            // ChoosingReplyKind and AwaitingButtonCount wait for commands,
            // not free text; anything else falls through like Idle.
            _ => {
                if emoji::is_emoji_trigger(text) {
                    self.deliver(sender, OutboundMessage::text(emoji::random_emoji())).await;
                } else {
                    self.dispatch_keyword(sender, text).await;
                }
            }
        }
    }

    /// `add keyword`: enter the flow from any state.
    pub(crate) async fn start_add_keyword(&self, sender: &str) {
        self.sessions.update(sender, |s| {
            s.reset_flow();
            s.state = FlowState::AwaitingKeywordName;
        });
        self.deliver(sender, OutboundMessage::text(KEYWORD_NAME_PROMPT)).await;
    }

    async fn capture_keyword_name(&self, sender: &str, text: &str) {
        let keyword = text.trim().to_string();
        self.sessions.update(sender, |s| {
            s.pending_keyword = Some(keyword.clone());
            s.state = FlowState::ChoosingReplyKind;
        });
        let prompt = OutboundMessage::text_with_quick_replies(
            format!("Should \"{keyword}\" reply with plain text or with buttons?"),
            vec![
                QuickReply::text("Text", "addkeyword_text"),
                QuickReply::text("Buttons", "addkeyword_button"),
            ],
        );
        self.deliver(sender, prompt).await;
    }

    /// `addkeyword_text`: the sender chose a plain-text reply.
    pub(crate) async fn choose_text_reply(&self, sender: &str) {
        if self.sessions.get(sender).state != FlowState::ChoosingReplyKind {
            self.state_machine_error(sender).await;
            return;
        }
        self.sessions.update(sender, |s| s.state = FlowState::AwaitingKeywordText);
        self.deliver(sender, OutboundMessage::text(KEYWORD_TEXT_PROMPT)).await;
    }

    async fn persist_text_rule(&self, sender: &str, text: &str) {
        let Some(keyword) = self.sessions.get(sender).pending_keyword else {
            self.state_machine_error(sender).await;
            return;
        };
        match self.custom.add(&keyword, text) {
            Ok(()) => {
                info!("custom keyword registered: {keyword}");
                self.sessions.update(sender, |s| s.reset_flow());
                self.deliver(sender, OutboundMessage::text(KEYWORD_ADDED)).await;
            }
            Err(e) => {
                // Stay in this state so the sender can simply retry.
                error!("failed to persist rule for '{keyword}': {e}");
            }
        }
    }

    /// `addkeyword_button`: the sender chose a button-based reply.
    pub(crate) async fn choose_button_reply(&self, sender: &str) {
        if self.sessions.get(sender).state != FlowState::ChoosingReplyKind {
            self.state_machine_error(sender).await;
            return;
        }
        self.sessions.update(sender, |s| s.state = FlowState::AwaitingButtonTitle);
        self.deliver(sender, OutboundMessage::text(BUTTON_TITLE_PROMPT)).await;
    }

    async fn capture_button_title(&self, sender: &str, text: &str) {
        self.sessions.update(sender, |s| {
            s.pending_button_title = Some(text.trim().to_string());
            s.state = FlowState::AwaitingButtonCount;
        });
        let prompt = OutboundMessage::text_with_quick_replies(
            "How many buttons should the reply carry?",
            vec![
                QuickReply::text("1", "addkeyword_button1"),
                QuickReply::text("2", "addkeyword_button2"),
                QuickReply::text("3", "addkeyword_button3"),
            ],
        );
        self.deliver(sender, prompt).await;
    }

    /// `addkeyword_buttonN`: record the count and show the preview. Button
    /// rules are not persisted; the custom-rule format is plain text only.
    pub(crate) async fn choose_button_count(&self, sender: &str, count: u8) {
        let session = self.sessions.get(sender);
        if session.state != FlowState::AwaitingButtonCount {
            self.state_machine_error(sender).await;
            return;
        }
        self.sessions.update(sender, |s| s.pending_button_count = Some(count));

        let title = session
            .pending_button_title
            .unwrap_or_else(|| "Button".to_string());
        let buttons = (1..=count)
            .map(|n| Button::postback(format!("{title} {n}"), format!("button_{n}")))
            .collect();
        let preview = OutboundMessage::buttons(
            format!("Here is how a {count}-button reply will look."),
            buttons,
        );
        self.sessions.update(sender, |s| s.reset_flow());
        self.deliver(sender, preview).await;
    }

    /// Universal recovery: apologize, return to Idle, drop authoring
    /// scratch. Never touches the content or custom stores.
    pub(crate) async fn state_machine_error(&self, sender: &str) {
        warn!("state machine error for {sender}, resetting flow");
        self.sessions.update(sender, |s| s.reset_flow());
        self.deliver(sender, OutboundMessage::text(CONFUSED)).await;
    }
}
