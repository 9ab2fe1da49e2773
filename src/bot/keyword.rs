//! Keyword resolution: second-level commands, content and custom lookup,
//! external-data keywords and the unknown-keyword fallback.

use tracing::{info, warn};

use crate::bot::content::normalize_keyword;
use crate::bot::engine::Responder;
use crate::bot::news::{render_article, render_headlines};
use crate::bot::outbound::{OutboundMessage, QuickReply};
use crate::bot::stats::{
    highest_fatality, render_fatality, render_region, render_top10, RankMetric,
};

/// Reply sent when an external data fetch fails or comes back malformed.
pub const DATA_UNAVAILABLE: &str = "That information is unavailable right now, try again later.";

/// Second-level commands reachable only through keyword dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCommand {
    AddKeyword,
    ListKeywords,
    ChooseText,
    ChooseButton,
    ButtonCount(u8),
}

impl FlowCommand {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "add keyword" => Some(Self::AddKeyword),
            "list keywords" => Some(Self::ListKeywords),
            "addkeyword_text" => Some(Self::ChooseText),
            "addkeyword_button" => Some(Self::ChooseButton),
            "addkeyword_button1" => Some(Self::ButtonCount(1)),
            "addkeyword_button2" => Some(Self::ButtonCount(2)),
            "addkeyword_button3" => Some(Self::ButtonCount(3)),
            _ => None,
        }
    }
}

impl Responder {
    /// Resolve one keyword input for a sender. Always records the normalized
    /// input as the session's last keyword, whatever the outcome.
    pub(crate) async fn dispatch_keyword(&self, sender: &str, input: &str) {
        let normalized = input.trim().to_lowercase();
        match FlowCommand::parse(&normalized) {
            Some(FlowCommand::AddKeyword) => self.start_add_keyword(sender).await,
            Some(FlowCommand::ListKeywords) => self.send_keyword_list(sender).await,
            Some(FlowCommand::ChooseText) => self.choose_text_reply(sender).await,
            Some(FlowCommand::ChooseButton) => self.choose_button_reply(sender).await,
            Some(FlowCommand::ButtonCount(count)) => self.choose_button_count(sender, count).await,
            None => self.lookup_keyword(sender, input).await,
        }
        self.sessions.update(sender, |s| s.last_keyword = Some(normalized));
    }

    /// Lookup precedence: content store, custom rules, external-data
    /// keywords, then the terminal unknown-keyword reply.
    async fn lookup_keyword(&self, sender: &str, input: &str) {
        let keyword = normalize_keyword(input);
        info!("keyword lookup for {sender}: {keyword}");

        if let Some(template) = self.content.get(&keyword) {
            self.deliver(sender, OutboundMessage::Message(template.clone())).await;
            return;
        }
        if let Some(text) = self.custom.get(&keyword) {
            self.deliver(sender, OutboundMessage::text(text)).await;
            return;
        }

        match input.trim().to_lowercase().as_str() {
            "vn" => self.send_vietnam_snapshot(sender).await,
            "gb" => self.send_global_snapshot(sender).await,
            "top10_cases" => self.send_top10(sender, RankMetric::Cases).await,
            "top10_recovered" => self.send_top10(sender, RankMetric::Recovered).await,
            "top10_deaths" => self.send_top10(sender, RankMetric::Deaths).await,
            "fatality_rate" => self.send_fatality(sender).await,
            "news" => self.send_headlines(sender).await,
            "read-1" => self.send_article(sender, 0).await,
            "read-2" => self.send_article(sender, 1).await,
            "read-3" => self.send_article(sender, 2).await,
            _ => {
                self.deliver(
                    sender,
                    OutboundMessage::text(format!(
                        "I don't know {:?} yet. Type \"add keyword\" to teach me.",
                        input.trim()
                    )),
                )
                .await;
            }
        }
    }

    async fn send_keyword_list(&self, sender: &str) {
        let keywords = self.custom.keywords();
        let message = if keywords.is_empty() {
            OutboundMessage::text("No custom keywords defined yet")
        } else {
            OutboundMessage::text(keywords.join("\n"))
        };
        self.deliver(sender, message).await;
    }

    async fn send_vietnam_snapshot(&self, sender: &str) {
        match self.stats.snapshot().await {
            Ok(snapshot) => {
                let message = OutboundMessage::text_with_quick_replies(
                    render_region("Vietnam", &snapshot.vietnam),
                    vec![
                        QuickReply::text("Global", "GB"),
                        QuickReply::text("Top 10", "top10_cases"),
                        QuickReply::text("Home", "HOME"),
                    ],
                );
                self.deliver(sender, message).await;
            }
            Err(e) => self.send_data_unavailable(sender, "snapshot", e).await,
        }
    }

    async fn send_global_snapshot(&self, sender: &str) {
        match self.stats.snapshot().await {
            Ok(snapshot) => {
                let message = OutboundMessage::text(render_region("Global", &snapshot.global));
                self.deliver(sender, message).await;
            }
            Err(e) => self.send_data_unavailable(sender, "snapshot", e).await,
        }
    }

    async fn send_top10(&self, sender: &str, metric: RankMetric) {
        match self.stats.countries().await {
            Ok(countries) => {
                let text = render_top10(&countries, metric);
                let message = if metric == RankMetric::Deaths {
                    OutboundMessage::text_with_quick_replies(
                        text,
                        vec![
                            QuickReply::text("Fatality rate", "fatality_rate"),
                            QuickReply::text("Home", "HOME"),
                        ],
                    )
                } else {
                    OutboundMessage::text(text)
                };
                self.deliver(sender, message).await;
            }
            Err(e) => self.send_data_unavailable(sender, "summary", e).await,
        }
    }

    async fn send_fatality(&self, sender: &str) {
        match self.stats.countries().await {
            Ok(countries) => match highest_fatality(&countries) {
                Some((country, rate)) => {
                    let message = OutboundMessage::text_with_quick_replies(
                        render_fatality(country, rate),
                        vec![
                            QuickReply::text("More", "MORE_INFO"),
                            QuickReply::text("Home", "HOME"),
                        ],
                    );
                    self.deliver(sender, message).await;
                }
                None => {
                    self.deliver(sender, OutboundMessage::text(DATA_UNAVAILABLE)).await;
                }
            },
            Err(e) => self.send_data_unavailable(sender, "summary", e).await,
        }
    }

    async fn send_headlines(&self, sender: &str) {
        match self.news.headlines().await {
            Ok(articles) => match render_headlines(&articles) {
                Some(message) => self.deliver(sender, message).await,
                None => self.deliver(sender, OutboundMessage::text(DATA_UNAVAILABLE)).await,
            },
            Err(e) => self.send_data_unavailable(sender, "headlines", e).await,
        }
    }

    async fn send_article(&self, sender: &str, index: usize) {
        match self.news.headlines().await {
            Ok(articles) => match render_article(&articles, index) {
                Some(message) => self.deliver(sender, message).await,
                None => self.deliver(sender, OutboundMessage::text(DATA_UNAVAILABLE)).await,
            },
            Err(e) => self.send_data_unavailable(sender, "headlines", e).await,
        }
    }

    async fn send_data_unavailable(
        &self,
        sender: &str,
        what: &str,
        error: crate::bot::graph::TransportError,
    ) {
        warn!("{what} fetch failed: {error}");
        self.deliver(sender, OutboundMessage::text(DATA_UNAVAILABLE)).await;
    }
}
