//! Inbound webhook payload types and event classification.
//!
//! The delivery endpoint posts a batch of page entries, each carrying a batch
//! of messaging events. The core never mutates these; it classifies each
//! event once and routes on the result.

use chrono::DateTime;
use serde::Deserialize;

/// Top-level webhook delivery body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<PageEntry>,
}

/// One page entry in a delivery batch.
#[derive(Debug, Clone, Deserialize)]
pub struct PageEntry {
    pub id: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Party {
    pub id: String,
}

/// A single messaging event. Exactly one of the optional payload fields is
/// populated per event; the platform never combines them.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    pub sender: Party,
    pub recipient: Party,
    #[serde(default)]
    pub timestamp: i64,
    pub message: Option<IncomingMessage>,
    pub postback: Option<Postback>,
    pub delivery: Option<Delivery>,
    pub read: Option<ReadReceipt>,
    pub optin: Option<Optin>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub mid: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
    pub app_id: Option<i64>,
    pub metadata: Option<String>,
    pub quick_reply: Option<QuickReplyPayload>,
    #[serde(default)]
    pub attachments: Vec<IncomingAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuickReplyPayload {
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingAttachment {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub payload: Option<AttachmentRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentRef {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postback {
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Delivery {
    #[serde(default)]
    pub mids: Vec<String>,
    pub watermark: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadReceipt {
    pub watermark: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Optin {
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

/// Classified view of a messaging event, borrowed from the raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundEvent<'a> {
    /// Our own outbound message echoed back.
    Echo,
    /// Quick-reply tap; the payload is the effective keyword.
    QuickReply(&'a str),
    /// Free-form text.
    Text(&'a str),
    /// Attachment whose first entry carries a payload URL.
    Attachment(&'a str),
    /// Structured-message button tap; the payload is the effective keyword.
    Postback(&'a str),
    /// Plugin opt-in.
    Optin,
    /// Delivery confirmation up to a watermark.
    Delivery(Option<i64>),
    /// Read receipt up to a watermark.
    Read(Option<i64>),
    /// Nothing the router acts on.
    Unknown,
}

impl MessagingEvent {
    /// Classify this event. Within a message, echo wins over everything,
    /// then quick reply, then text, then attachment.
    pub fn classify(&self) -> InboundEvent<'_> {
        if let Some(message) = &self.message {
            if message.is_echo {
                return InboundEvent::Echo;
            }
            if let Some(quick_reply) = &message.quick_reply {
                return InboundEvent::QuickReply(&quick_reply.payload);
            }
            if let Some(text) = &message.text {
                return InboundEvent::Text(text);
            }
            if let Some(url) = message
                .attachments
                .first()
                .and_then(|a| a.payload.as_ref())
                .and_then(|p| p.url.as_deref())
            {
                return InboundEvent::Attachment(url);
            }
            return InboundEvent::Unknown;
        }
        if let Some(postback) = &self.postback {
            return InboundEvent::Postback(&postback.payload);
        }
        if let Some(delivery) = &self.delivery {
            return InboundEvent::Delivery(delivery.watermark);
        }
        if let Some(read) = &self.read {
            return InboundEvent::Read(read.watermark);
        }
        if self.optin.is_some() {
            return InboundEvent::Optin;
        }
        InboundEvent::Unknown
    }

    /// Events that carry user intent and therefore warrant a profile lookup.
    pub fn wants_profile(&self) -> bool {
        self.message.as_ref().is_some_and(|m| !m.is_echo) || self.postback.is_some()
    }
}

/// Millisecond event timestamp rendered for logs.
pub fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: serde_json::Value) -> MessagingEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_delivery_batch() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "object": "page",
            "entry": [{
                "id": "99", "time": 1712000000000i64,
                "messaging": [{
                    "sender": {"id": "7"}, "recipient": {"id": "99"},
                    "timestamp": 1712000000000i64,
                    "message": {"mid": "m.1", "text": "hi"}
                }]
            }]
        }))
        .unwrap();
        assert_eq!(payload.object, "page");
        assert_eq!(payload.entry[0].messaging.len(), 1);
        assert_eq!(payload.entry[0].messaging[0].sender.id, "7");
    }

    #[test]
    fn test_echo_wins_over_text() {
        let ev = event(json!({
            "sender": {"id": "7"}, "recipient": {"id": "99"},
            "message": {"mid": "m.1", "text": "hi", "is_echo": true}
        }));
        assert_eq!(ev.classify(), InboundEvent::Echo);
    }

    #[test]
    fn test_quick_reply_wins_over_text() {
        let ev = event(json!({
            "sender": {"id": "7"}, "recipient": {"id": "99"},
            "message": {"mid": "m.1", "text": "Top", "quick_reply": {"payload": "top10_cases"}}
        }));
        assert_eq!(ev.classify(), InboundEvent::QuickReply("top10_cases"));
    }

    #[test]
    fn test_text_classification() {
        let ev = event(json!({
            "sender": {"id": "7"}, "recipient": {"id": "99"},
            "message": {"mid": "m.1", "text": "hello"}
        }));
        assert_eq!(ev.classify(), InboundEvent::Text("hello"));
        assert!(ev.wants_profile());
    }

    #[test]
    fn test_attachment_url_classification() {
        let ev = event(json!({
            "sender": {"id": "7"}, "recipient": {"id": "99"},
            "message": {"mid": "m.1", "attachments": [
                {"type": "image", "payload": {"url": "https://cdn.example/x.png"}}
            ]}
        }));
        assert_eq!(ev.classify(), InboundEvent::Attachment("https://cdn.example/x.png"));
    }

    #[test]
    fn test_attachment_without_url_is_unknown() {
        let ev = event(json!({
            "sender": {"id": "7"}, "recipient": {"id": "99"},
            "message": {"mid": "m.1", "attachments": [{"type": "fallback"}]}
        }));
        assert_eq!(ev.classify(), InboundEvent::Unknown);
    }

    #[test]
    fn test_postback_classification() {
        let ev = event(json!({
            "sender": {"id": "7"}, "recipient": {"id": "99"},
            "postback": {"payload": "VN"}
        }));
        assert_eq!(ev.classify(), InboundEvent::Postback("VN"));
        assert!(ev.wants_profile());
    }

    #[test]
    fn test_delivery_and_read_do_not_want_profile() {
        let delivery = event(json!({
            "sender": {"id": "7"}, "recipient": {"id": "99"},
            "delivery": {"mids": ["m.1"], "watermark": 1712000000000i64}
        }));
        assert_eq!(delivery.classify(), InboundEvent::Delivery(Some(1712000000000)));
        assert!(!delivery.wants_profile());

        let read = event(json!({
            "sender": {"id": "7"}, "recipient": {"id": "99"},
            "read": {"watermark": 1712000000001i64}
        }));
        assert_eq!(read.classify(), InboundEvent::Read(Some(1712000000001)));
        assert!(!read.wants_profile());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00");
    }
}
