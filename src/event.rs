//! Inbound event normalization.
//!
//! The transport posts channel-native payloads; everything past the webhook
//! boundary works with [`InboundEvent`] and the bare [`Identity`].

use serde::{Deserialize, Serialize};

/// Bare user identity — the phone number with any channel prefix stripped.
///
/// Transports qualify the sender as e.g. `whatsapp:+9613334444`; the session
/// key is the `+9613334444` part only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Parse a channel-qualified sender address, stripping the channel prefix.
    pub fn from_channel_address(address: &str) -> Self {
        let bare = match address.split_once(':') {
            Some((_, rest)) => rest,
            None => address,
        };
        Self(bare.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe form: alphanumerics kept, everything else dropped.
    /// Used to key uploaded KYC documents.
    pub fn sanitized(&self) -> String {
        self.0.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normalized inbound message from the transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Free text body.
    #[serde(default)]
    pub text: String,
    /// Discrete button-payload identifier, if the user tapped a button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_payload: Option<String>,
    /// URL of the first attachment, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    /// Content type of the first attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_content_type: Option<String>,
    /// Number of attachments on the message.
    #[serde(default)]
    pub media_count: u32,
}

impl InboundEvent {
    /// Text-only event (convenient in tests and the CLI).
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            text: body.into(),
            ..Default::default()
        }
    }

    /// Button-press event.
    pub fn button(payload: impl Into<String>) -> Self {
        Self {
            button_payload: Some(payload.into()),
            ..Default::default()
        }
    }

    /// The effective input: a button payload takes precedence over free text.
    pub fn input(&self) -> &str {
        match &self.button_payload {
            Some(payload) => payload.as_str(),
            None => self.text.trim(),
        }
    }

    /// Whether the event carries at least one attachment.
    pub fn has_media(&self) -> bool {
        self.media_count > 0 && self.media_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_strips_channel_prefix() {
        let id = Identity::from_channel_address("whatsapp:+9613334444");
        assert_eq!(id.as_str(), "+9613334444");

        let bare = Identity::from_channel_address("+15550001111");
        assert_eq!(bare.as_str(), "+15550001111");
    }

    #[test]
    fn identity_sanitized_keeps_alphanumerics() {
        let id = Identity::from_channel_address("whatsapp:+961 333-4444");
        assert_eq!(id.sanitized(), "9613334444");
    }

    #[test]
    fn button_payload_takes_precedence() {
        let mut event = InboundEvent::text("  hello  ");
        assert_eq!(event.input(), "hello");

        event.button_payload = Some("CONFIRM_TRANSFER".to_string());
        assert_eq!(event.input(), "CONFIRM_TRANSFER");
    }

    #[test]
    fn has_media_requires_url_and_count() {
        let mut event = InboundEvent::text("doc");
        assert!(!event.has_media());

        event.media_count = 1;
        assert!(!event.has_media());

        event.media_url = Some("https://example.com/a.jpg".to_string());
        assert!(event.has_media());
    }
}
