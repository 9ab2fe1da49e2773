//! Outbound message model for the platform Send API.
//!
//! Every reply the bot produces is one of these values. The same structs
//! serialize to the Send API wire shape and deserialize from content-store
//! template files, so a canned reply on disk is written exactly the way it
//! goes over the wire.

use serde::{Deserialize, Serialize};

/// A button inside a button or generic template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Button {
    WebUrl { title: String, url: String },
    Postback { title: String, payload: String },
    PhoneNumber { title: String, payload: String },
}

impl Button {
    pub fn web_url(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self::WebUrl { title: title.into(), url: url.into() }
    }

    pub fn postback(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Postback { title: title.into(), payload: payload.into() }
    }

    pub fn phone_number(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::PhoneNumber { title: title.into(), payload: payload.into() }
    }
}

/// One quick-reply chip under a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReply {
    pub content_type: String,
    pub title: String,
    pub payload: String,
}

impl QuickReply {
    /// Text quick reply; tapping it delivers `payload` back as the keyword.
    pub fn text(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { content_type: "text".to_string(), title: title.into(), payload: payload.into() }
    }
}

/// One card in a generic template carousel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<Button>>,
}

/// Media payload carrying a hosted URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub url: String,
}

/// Structured template payloads, discriminated by `template_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "template_type", rename_all = "lowercase")]
pub enum TemplatePayload {
    Button { text: String, buttons: Vec<Button> },
    Generic { elements: Vec<Element> },
}

/// Message attachment: hosted media or a structured template.
///
/// Wire shape is `{"type": "...", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum Attachment {
    Image(MediaPayload),
    Audio(MediaPayload),
    Video(MediaPayload),
    File(MediaPayload),
    Template(TemplatePayload),
}

/// The `message` object of a Send API request. Also the on-disk format of a
/// content-store template file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_replies: Option<Vec<QuickReply>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl MessagePayload {
    /// A template file must carry something sendable.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.attachment.is_none()
    }
}

/// Non-message sender actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderAction {
    MarkSeen,
    TypingOn,
    TypingOff,
}

/// A reply the engine hands to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Message(MessagePayload),
    Action(SenderAction),
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Message(MessagePayload { text: Some(text.into()), ..Default::default() })
    }

    pub fn text_with_quick_replies(text: impl Into<String>, replies: Vec<QuickReply>) -> Self {
        Self::Message(MessagePayload {
            text: Some(text.into()),
            quick_replies: Some(replies),
            ..Default::default()
        })
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::attachment(Attachment::Image(MediaPayload { url: url.into() }))
    }

    pub fn audio(url: impl Into<String>) -> Self {
        Self::attachment(Attachment::Audio(MediaPayload { url: url.into() }))
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self::attachment(Attachment::Video(MediaPayload { url: url.into() }))
    }

    pub fn file(url: impl Into<String>) -> Self {
        Self::attachment(Attachment::File(MediaPayload { url: url.into() }))
    }

    pub fn buttons(text: impl Into<String>, buttons: Vec<Button>) -> Self {
        Self::attachment(Attachment::Template(TemplatePayload::Button {
            text: text.into(),
            buttons,
        }))
    }

    pub fn generic(elements: Vec<Element>) -> Self {
        Self::attachment(Attachment::Template(TemplatePayload::Generic { elements }))
    }

    pub fn action(action: SenderAction) -> Self {
        Self::Action(action)
    }

    fn attachment(attachment: Attachment) -> Self {
        Self::Message(MessagePayload { attachment: Some(attachment), ..Default::default() })
    }

    /// Wrap into the Send API envelope for the given recipient.
    pub fn to_request<'a>(&'a self, recipient_id: &'a str) -> SendRequest<'a> {
        match self {
            Self::Message(message) => SendRequest {
                recipient: Recipient { id: recipient_id },
                message: Some(message),
                sender_action: None,
            },
            Self::Action(action) => SendRequest {
                recipient: Recipient { id: recipient_id },
                message: None,
                sender_action: Some(*action),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Recipient<'a> {
    pub id: &'a str,
}

/// Top-level Send API request body.
#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    pub recipient: Recipient<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a MessagePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_action: Option<SenderAction>,
}
