//! Graph API transport: message send, profile fetch, persistent menu.
//!
//! The engine talks to the platform exclusively through the [`Transport`]
//! trait; [`GraphClient`] is the production implementation. Delivery is
//! best-effort: failures are surfaced as [`TransportError`] and logged by
//! the caller, never retried.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::bot::outbound::OutboundMessage;
use crate::bot::session::Profile;

/// Default Graph API root.
pub const GRAPH_BASE: &str = "https://graph.facebook.com/v21.0";

/// Name shown for a profile field the platform did not return.
pub const UNKNOWN_NAME: &str = "undefined";

#[derive(Debug)]
pub enum TransportError {
    Http(String),
    Api(String),
    Parse(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "HTTP error: {e}"),
            Self::Api(e) => write!(f, "API error: {e}"),
            Self::Parse(e) => write!(f, "parse error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// The platform calls the core depends on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit one structured message; success echoes a message id when the
    /// platform assigns one (sender actions do not get one).
    async fn send(
        &self,
        recipient_id: &str,
        message: &OutboundMessage,
    ) -> Result<Option<String>, TransportError>;

    /// Fetch a sender's display name.
    async fn fetch_profile(&self, user_id: &str) -> Result<Profile, TransportError>;

    async fn install_menu(&self) -> Result<(), TransportError>;

    async fn remove_menu(&self) -> Result<(), TransportError>;
}

/// Production transport over the Graph API.
pub struct GraphClient {
    http: reqwest::Client,
    base: String,
    access_token: String,
}

#[derive(Deserialize)]
struct SendResponse {
    message_id: Option<String>,
}

#[derive(Deserialize)]
struct ProfileResponse {
    first_name: Option<String>,
    last_name: Option<String>,
}

impl GraphClient {
    pub fn new(http: reqwest::Client, access_token: String) -> Self {
        Self::with_base(http, GRAPH_BASE.to_string(), access_token)
    }

    pub fn with_base(http: reqwest::Client, base: String, access_token: String) -> Self {
        Self { http, base, access_token }
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Api(format!("{status}: {body}")))
    }
}

#[async_trait]
impl Transport for GraphClient {
    async fn send(
        &self,
        recipient_id: &str,
        message: &OutboundMessage,
    ) -> Result<Option<String>, TransportError> {
        let response = self
            .http
            .post(format!("{}/me/messages", self.base))
            .query(&[("access_token", self.access_token.as_str())])
            .json(&message.to_request(recipient_id))
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let response = self.check(response).await?;
        let body: SendResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))?;
        if let Some(id) = &body.message_id {
            debug!("sent message {id} to {recipient_id}");
        }
        Ok(body.message_id)
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Profile, TransportError> {
        let response = self
            .http
            .get(format!("{}/{}", self.base, user_id))
            .query(&[
                ("fields", "first_name,last_name"),
                ("access_token", self.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let response = self.check(response).await?;
        let body: ProfileResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))?;
        Ok(Profile {
            first_name: body.first_name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            last_name: body.last_name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        })
    }

    async fn install_menu(&self) -> Result<(), TransportError> {
        let url = format!("{}/me/messenger_profile", self.base);
        let body = json!({
            "get_started": {"payload": "HOME"},
            "persistent_menu": [{
                "locale": "default",
                "composer_input_disabled": false,
                "call_to_actions": [
                    {"type": "postback", "title": "Statistics", "payload": "HOME"},
                    {"type": "postback", "title": "News", "payload": "news"},
                    {"type": "postback", "title": "About", "payload": "ABOUT_ME"}
                ]
            }]
        });
        let response = self
            .http
            .post(&url)
            .query(&[("access_token", self.access_token.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        self.check(response).await?;
        info!("persistent menu installed");
        Ok(())
    }

    async fn remove_menu(&self) -> Result<(), TransportError> {
        let url = format!("{}/me/messenger_profile", self.base);
        let response = self
            .http
            .delete(&url)
            .query(&[("access_token", self.access_token.as_str())])
            .json(&json!({"fields": ["persistent_menu"]}))
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        self.check(response).await?;
        info!("persistent menu removed");
        Ok(())
    }
}
