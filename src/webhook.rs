//! HTTP boundary: the verification handshake and the signed delivery
//! endpoint.
//!
//! The delivery handler validates the payload signature, spawns one task
//! per messaging event and acknowledges immediately; everything downstream
//! is the engine's problem.

use std::fmt;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::bot::{Responder, WebhookPayload};

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Shared state for the webhook routes.
pub struct AppState {
    pub responder: Arc<Responder>,
    pub app_secret: String,
    pub verify_token: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .with_state(state)
}

#[derive(Debug)]
pub enum SignatureError {
    /// Header absent or not `sha256=<hex>`.
    MalformedHeader,
    /// Digest does not match the body.
    Mismatch,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedHeader => write!(f, "signature header missing or malformed"),
            Self::Mismatch => write!(f, "signature does not match payload"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// Check an `x-hub-signature-256` header against the raw body.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str) -> Result<(), SignatureError> {
    let digest_hex = header
        .trim()
        .strip_prefix("sha256=")
        .ok_or(SignatureError::MalformedHeader)?;
    let digest = hex::decode(digest_hex).map_err(|_| SignatureError::MalformedHeader)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::MalformedHeader)?;
    mac.update(payload);
    mac.verify_slice(&digest).map_err(|_| SignatureError::Mismatch)
}

/// Sign a payload the way the platform does; used by tests and tooling.
pub fn sign(payload: &[u8], secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("hmac accepts any key length");
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    if params.mode.as_deref() == Some("subscribe")
        && params.verify_token.as_deref() == Some(state.verify_token.as_str())
    {
        info!("webhook verification handshake accepted");
        (StatusCode::OK, params.challenge.unwrap_or_default())
    } else {
        warn!("webhook verification failed; check that the tokens match");
        (StatusCode::FORBIDDEN, String::new())
    }
}

async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if let Err(e) = verify_signature(body.as_bytes(), signature, &state.app_secret) {
        warn!("rejecting delivery: {e}");
        return StatusCode::UNAUTHORIZED;
    }

    let payload: WebhookPayload = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("rejecting delivery: invalid payload: {e}");
            return StatusCode::BAD_REQUEST;
        }
    };
    if payload.object != "page" {
        debug!("ignoring non-page object '{}'", payload.object);
        return StatusCode::NOT_FOUND;
    }

    // Acknowledge promptly; event handling continues in the background.
    for entry in payload.entry {
        for event in entry.messaging {
            let responder = state.responder.clone();
            tokio::spawn(async move {
                responder.handle_event(&event).await;
            });
        }
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "shhh";

    #[test]
    fn test_sign_and_verify_round_trip() {
        let body = br#"{"object":"page","entry":[]}"#;
        let header = sign(body, SECRET);
        assert!(header.starts_with("sha256="));
        assert!(verify_signature(body, &header, SECRET).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign(b"original", SECRET);
        assert!(matches!(
            verify_signature(b"tampered", &header, SECRET),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = sign(b"body", SECRET);
        assert!(matches!(
            verify_signature(b"body", &header, "other"),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn test_malformed_headers_rejected() {
        assert!(matches!(
            verify_signature(b"body", "", SECRET),
            Err(SignatureError::MalformedHeader)
        ));
        assert!(matches!(
            verify_signature(b"body", "sha1=abcdef", SECRET),
            Err(SignatureError::MalformedHeader)
        ));
        assert!(matches!(
            verify_signature(b"body", "sha256=not-hex", SECRET),
            Err(SignatureError::MalformedHeader)
        ));
    }
}
