//! Outbound message descriptors.
//!
//! Handlers return an immutable ordered list of these; the transport layer
//! performs the actual send and owns the per-channel rendering of templates.

use serde::{Deserialize, Serialize};

/// One outbound message: free text or a named template invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text { body: String },
    Template { template: Template },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    pub fn template(template: Template) -> Self {
        Self::Template { template }
    }
}

/// The fixed catalog of named templates the transport knows how to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Template {
    /// Supported-language picker shown on first contact.
    LanguagePicker,
    /// Login / sign-up choice for identities with no linked account.
    AuthChoice,
    /// The financial main menu.
    MainMenu,
    /// KYC introduction with start/skip buttons.
    KycStart,
    /// Confirmation that KYC was skipped, with how to resume.
    KycSkip,
    /// Demo/real trading-account creation choice.
    TradingAccountCreate,
    /// Deposit payment-method picker.
    DepositOptions { methods: Vec<String> },
    /// Withdrawal payment-method picker.
    WithdrawOptions { methods: Vec<String> },
    /// Transfer confirmation card with the summary line.
    TransferConfirmation { summary: String },
    /// Generic "back to the menu" with a leading message.
    GoBack { message: String },
}

/// An ordered reply. Thin wrapper so handlers can compose messages
/// without mutating shared builder state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    messages: Vec<OutboundMessage>,
}

impl Reply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::new().with_text(body)
    }

    pub fn template(template: Template) -> Self {
        Self::new().with_template(template)
    }

    pub fn with_text(mut self, body: impl Into<String>) -> Self {
        self.messages.push(OutboundMessage::text(body));
        self
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.messages.push(OutboundMessage::template(template));
        self
    }

    pub fn messages(&self) -> &[OutboundMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<OutboundMessage> {
        self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_preserves_order() {
        let reply = Reply::text("first")
            .with_template(Template::MainMenu)
            .with_text("last");

        let messages = reply.into_messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], OutboundMessage::text("first"));
        assert_eq!(
            messages[1],
            OutboundMessage::template(Template::MainMenu)
        );
        assert_eq!(messages[2], OutboundMessage::text("last"));
    }

    #[test]
    fn template_serde_is_tagged() {
        let msg = OutboundMessage::template(Template::TransferConfirmation {
            summary: "25 USD from Main Wallet to MT-1001".to_string(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["kind"], "template");
        assert_eq!(json["template"]["name"], "transfer_confirmation");
        assert_eq!(
            json["template"]["summary"],
            "25 USD from Main Wallet to MT-1001"
        );
    }
}
