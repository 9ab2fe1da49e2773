//! Event decision table and the first-level system command set.

use tracing::{debug, info, warn};

use crate::bot::engine::Responder;
use crate::bot::event::{format_timestamp, InboundEvent, MessagingEvent};
use crate::bot::graph::UNKNOWN_NAME;
use crate::bot::outbound::{Button, Element, OutboundMessage, QuickReply, SenderAction};

const DEMO_IMAGE_URL: &str = "https://messengerdemo.parseapp.com/img/rift.png";
const DEMO_GIF_URL: &str = "https://messengerdemo.parseapp.com/img/instagram_logo.gif";
const DEMO_AUDIO_URL: &str = "https://messengerdemo.parseapp.com/audio/sample.mp3";
const DEMO_VIDEO_URL: &str = "https://messengerdemo.parseapp.com/video/allofus480.mov";
const DEMO_FILE_URL: &str = "https://messengerdemo.parseapp.com/files/test.txt";

/// First-level system commands, matched exactly against lowercased trimmed
/// text before any keyword handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Image,
    Gif,
    Audio,
    Video,
    File,
    Button,
    Generic,
    QuickReplyDemo,
    ReadReceipt,
    TypingOn,
    TypingOff,
    UserInfo,
    AddMenu,
    RemoveMenu,
    Stop,
    Start,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "image" => Some(Self::Image),
            "gif" => Some(Self::Gif),
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            "file" => Some(Self::File),
            "button" => Some(Self::Button),
            "generic" => Some(Self::Generic),
            "quick reply" => Some(Self::QuickReplyDemo),
            "read receipt" => Some(Self::ReadReceipt),
            "typing on" => Some(Self::TypingOn),
            "typing off" => Some(Self::TypingOff),
            "user info" => Some(Self::UserInfo),
            "add menu" => Some(Self::AddMenu),
            "remove menu" => Some(Self::RemoveMenu),
            "stop" => Some(Self::Stop),
            "start" => Some(Self::Start),
            _ => None,
        }
    }
}

impl Responder {
    /// Decision table over one classified event; first match wins. Never
    /// lets an error escape past this boundary.
    pub(crate) async fn route(&self, event: &MessagingEvent) {
        let sender = event.sender.id.as_str();
        match event.classify() {
            InboundEvent::Echo => {
                debug!("echo from {sender}, ignoring");
            }
            InboundEvent::QuickReply(payload) => {
                info!("quick reply from {sender}: {payload}");
                let payload = payload.to_string();
                self.dispatch_keyword(sender, &payload).await;
            }
            InboundEvent::Text(text) => {
                // Kill-switch: only the exact reinstatement text passes.
                if self.is_stopped() && text != "start" {
                    debug!("kill-switch active, dropping text from {sender}");
                    return;
                }
                info!(
                    "message from {sender} at {}: {:?}",
                    format_timestamp(event.timestamp),
                    text
                );
                let text = text.to_string();
                match Command::parse(&text.trim().to_lowercase()) {
                    Some(command) => self.exec_command(sender, command).await,
                    None => self.handle_free_text(sender, &text).await,
                }
            }
            InboundEvent::Attachment(url) => {
                info!("attachment from {sender}: {url}");
                let url = url.to_string();
                self.dispatch_keyword(sender, &url).await;
            }
            InboundEvent::Postback(payload) => {
                if self.is_stopped() {
                    return;
                }
                info!("postback from {sender}: {payload}");
                let payload = payload.to_string();
                self.dispatch_keyword(sender, &payload).await;
            }
            InboundEvent::Optin => {
                if self.is_stopped() {
                    return;
                }
                self.deliver(sender, OutboundMessage::text("Authentication successful")).await;
            }
            InboundEvent::Delivery(watermark) => {
                if self.is_stopped() {
                    return;
                }
                debug!("messages to {sender} delivered up to {watermark:?}");
            }
            InboundEvent::Read(watermark) => {
                if self.is_stopped() {
                    return;
                }
                debug!("messages to {sender} read up to {watermark:?}");
            }
            InboundEvent::Unknown => {}
        }
    }

    async fn exec_command(&self, sender: &str, command: Command) {
        match command {
            Command::Image => self.deliver(sender, OutboundMessage::image(DEMO_IMAGE_URL)).await,
            Command::Gif => self.deliver(sender, OutboundMessage::image(DEMO_GIF_URL)).await,
            Command::Audio => self.deliver(sender, OutboundMessage::audio(DEMO_AUDIO_URL)).await,
            Command::Video => self.deliver(sender, OutboundMessage::video(DEMO_VIDEO_URL)).await,
            Command::File => self.deliver(sender, OutboundMessage::file(DEMO_FILE_URL)).await,
            Command::Button => self.deliver(sender, demo_buttons()).await,
            Command::Generic => self.deliver(sender, demo_generic()).await,
            Command::QuickReplyDemo => self.deliver(sender, demo_quick_replies()).await,
            Command::ReadReceipt => {
                self.deliver(sender, OutboundMessage::action(SenderAction::MarkSeen)).await
            }
            Command::TypingOn => {
                self.deliver(sender, OutboundMessage::action(SenderAction::TypingOn)).await
            }
            Command::TypingOff => {
                self.deliver(sender, OutboundMessage::action(SenderAction::TypingOff)).await
            }
            Command::UserInfo => {
                let name = self
                    .sessions
                    .get(sender)
                    .profile
                    .map(|p| p.first_name)
                    .unwrap_or_else(|| UNKNOWN_NAME.to_string());
                self.deliver(sender, OutboundMessage::text(name)).await;
            }
            Command::AddMenu => {
                if let Err(e) = self.transport.install_menu().await {
                    warn!("menu install failed: {e}");
                }
            }
            Command::RemoveMenu => {
                if let Err(e) = self.transport.remove_menu().await {
                    warn!("menu removal failed: {e}");
                }
            }
            Command::Stop => {
                if self.is_admin(sender) {
                    info!("kill-switch engaged by {sender}");
                    self.set_stopped(true);
                }
            }
            Command::Start => {
                if self.is_admin(sender) {
                    info!("kill-switch released by {sender}");
                    self.set_stopped(false);
                }
            }
        }
    }
}

pub(crate) fn demo_buttons() -> OutboundMessage {
    OutboundMessage::buttons(
        "This is test text",
        vec![
            Button::web_url("Open Web URL", "https://www.rust-lang.org/"),
            Button::postback("Trigger Postback", "HOME"),
            Button::phone_number("Call Phone Number", "+16505551234"),
        ],
    )
}

pub(crate) fn demo_generic() -> OutboundMessage {
    OutboundMessage::generic(vec![Element {
        title: "COVID-19".to_string(),
        subtitle: Some("Epidemic statistics".to_string()),
        item_url: None,
        image_url: None,
        buttons: Some(vec![
            Button::postback("Vietnam", "VN"),
            Button::postback("Global", "GB"),
            Button::postback("Top 10", "top10_cases"),
        ]),
    }])
}

pub(crate) fn demo_quick_replies() -> OutboundMessage {
    OutboundMessage::text_with_quick_replies(
        "Pick something",
        vec![
            QuickReply::text("Vietnam", "VN"),
            QuickReply::text("Global", "GB"),
            QuickReply::text("Home", "HOME"),
        ],
    )
}
