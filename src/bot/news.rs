//! Headline feed: external source and rendering.
//!
//! The `news` keyword renders up to three headlines as a generic template;
//! each card carries a `read-N` postback that replies with the article's
//! summary text.

use async_trait::async_trait;
use serde::Deserialize;

use crate::bot::graph::TransportError;
use crate::bot::outbound::{Button, Element, MessagePayload, OutboundMessage, QuickReply};

/// Default headline feed endpoint.
pub const FEED_URL: &str = "https://feeds.example.com/health/latest.json";

/// How many headlines a `news` reply carries.
pub const HEADLINE_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Headline {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub link: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// External headline fetch the keyword engine depends on.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn headlines(&self) -> Result<Vec<Headline>, TransportError>;
}

#[derive(Deserialize)]
struct FeedResponse {
    articles: Vec<Headline>,
}

/// Production source over the headline feed.
pub struct HttpNewsSource {
    http: reqwest::Client,
    feed_url: String,
}

impl HttpNewsSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_url(http, FEED_URL.to_string())
    }

    pub fn with_url(http: reqwest::Client, feed_url: String) -> Self {
        Self { http, feed_url }
    }
}

#[async_trait]
impl NewsSource for HttpNewsSource {
    async fn headlines(&self) -> Result<Vec<Headline>, TransportError> {
        let response = self
            .http
            .get(&self.feed_url)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Api(format!("{}: {}", response.status(), self.feed_url)));
        }
        let body: FeedResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))?;
        Ok(body.articles)
    }
}

/// Generic template with one card per headline, or `None` when the feed is
/// empty.
pub fn render_headlines(articles: &[Headline]) -> Option<OutboundMessage> {
    if articles.is_empty() {
        return None;
    }
    let elements = articles
        .iter()
        .take(HEADLINE_COUNT)
        .enumerate()
        .map(|(index, article)| Element {
            title: article.title.clone(),
            subtitle: None,
            item_url: Some(article.link.clone()),
            image_url: article.image.clone(),
            buttons: Some(vec![
                Button::postback("Quick read", format!("read-{}", index + 1)),
                Button::web_url("Open", article.link.clone()),
            ]),
        })
        .collect();
    Some(OutboundMessage::generic(elements))
}

/// Summary text for the `read-N` keyword (zero-based index), or `None` when
/// the feed has no such article.
pub fn render_article(articles: &[Headline], index: usize) -> Option<OutboundMessage> {
    let article = articles.get(index)?;
    let text = if article.description.is_empty() {
        article.title.clone()
    } else {
        article.description.clone()
    };
    Some(OutboundMessage::Message(MessagePayload {
        text: Some(text),
        quick_replies: Some(vec![
            QuickReply::text("More news", "news"),
            QuickReply::text("Home", "HOME"),
        ]),
        ..Default::default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::outbound::{Attachment, TemplatePayload};

    fn feed() -> Vec<Headline> {
        vec![
            Headline {
                title: "First".into(),
                description: "first summary".into(),
                link: "https://news.example/1".into(),
                image: Some("https://news.example/1.jpg".into()),
            },
            Headline {
                title: "Second".into(),
                description: String::new(),
                link: "https://news.example/2".into(),
                image: None,
            },
        ]
    }

    #[test]
    fn test_render_headlines_builds_cards() {
        let message = render_headlines(&feed()).unwrap();
        let OutboundMessage::Message(payload) = message else {
            panic!("expected message payload");
        };
        let Some(Attachment::Template(TemplatePayload::Generic { elements })) = payload.attachment
        else {
            panic!("expected generic template");
        };
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].title, "First");
        assert_eq!(
            elements[1].buttons.as_ref().unwrap()[0],
            Button::postback("Quick read", "read-2")
        );
    }

    #[test]
    fn test_render_headlines_empty_feed() {
        assert!(render_headlines(&[]).is_none());
    }

    #[test]
    fn test_render_article_prefers_description() {
        let articles = feed();
        let OutboundMessage::Message(first) = render_article(&articles, 0).unwrap() else {
            panic!("expected message");
        };
        assert_eq!(first.text.as_deref(), Some("first summary"));

        // Falls back to the title when the description is empty.
        let OutboundMessage::Message(second) = render_article(&articles, 1).unwrap() else {
            panic!("expected message");
        };
        assert_eq!(second.text.as_deref(), Some("Second"));
    }

    #[test]
    fn test_render_article_out_of_range() {
        assert!(render_article(&feed(), 5).is_none());
    }
}
