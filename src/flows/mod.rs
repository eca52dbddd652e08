//! Step handlers — one per FSM state, grouped by flow.

pub mod account;
pub mod auth;
pub mod funding;
pub mod kyc;
pub mod menu;
pub mod transfer;
pub mod validate;

use std::sync::Arc;

use crate::error::GatewayError;
use crate::gateway::FinancialGateway;
use crate::gateway::types::KycStatus;
use crate::media::MediaStore;
use crate::outbound::{Reply, Template};
use crate::session::{FlowData, KycDraft, Session, Step};
use crate::store::Database;

/// Shared dependencies handed to every step handler.
#[derive(Clone)]
pub struct FlowContext {
    pub store: Arc<dyn Database>,
    pub gateway: Arc<dyn FinancialGateway>,
    pub media: Arc<MediaStore>,
}

/// Route an authenticated user by KYC status.
///
/// Used after login and by the greeting recompute: not-submitted lands on
/// `kyc-start`, pending/rejected on the `kyc-complete` holding state,
/// approved on the main menu.
pub fn route_by_kyc(session: &mut Session, status: KycStatus) -> Reply {
    match status {
        KycStatus::NotSubmitted => {
            session.start_flow(Step::KycStart, FlowData::Kyc(KycDraft::default()));
            Reply::text("Before you can trade we need to verify your identity.")
                .with_template(Template::KycStart)
        }
        KycStatus::Pending => {
            session.end_flow(Step::KycComplete);
            Reply::text(
                "Your identity verification is pending review. \
                 We will notify you as soon as it is approved.",
            )
        }
        KycStatus::Rejected => {
            session.end_flow(Step::KycComplete);
            Reply::text(
                "Your identity verification was rejected. \
                 Please contact support to resolve this.",
            )
        }
        KycStatus::Approved => {
            session.end_flow(Step::MainMenu);
            Reply::text("Welcome back!").with_template(Template::MainMenu)
        }
    }
}

/// User-safe text for a gateway failure (error tier 2).
pub fn gateway_failure_text(err: &GatewayError) -> String {
    match err.status() {
        Some(401) => "Your session with our service has expired. Please log in again.".to_string(),
        Some(409) => "That already exists on your account.".to_string(),
        _ => "We could not reach our service right now. Please try again in a moment.".to_string(),
    }
}
