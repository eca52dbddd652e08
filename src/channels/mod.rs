//! Channel seam — the messaging transport is an external collaborator.

pub mod webhook;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::event::Identity;
use crate::outbound::OutboundMessage;

/// Sends rendered outbound messages to a user. Implemented by the real
/// transport adapter outside this crate; the bundled webhook instead
/// returns descriptors in the HTTP response.
#[async_trait]
pub trait OutboundSender: Send + Sync {
    async fn send(
        &self,
        to: &Identity,
        messages: &[OutboundMessage],
    ) -> Result<(), ChannelError>;
}
