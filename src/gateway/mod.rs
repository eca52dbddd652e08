//! Financial gateway (CRM) integration.
//!
//! Handlers talk to [`FinancialGateway`]; the production implementation is
//! [`client::CrmClient`]. Tests substitute a mock.

pub mod client;
pub mod types;

use async_trait::async_trait;

pub use client::CrmClient;

use crate::error::GatewayError;
use crate::event::Identity;
use types::{
    Agreement, AuthSession, KycStatus, KycSubmission, NewTradingAccount, NewTransaction,
    PaymentGatewayInfo, SignupRequest, TradingAccount, TradingAccountKind, TransactionOutcome,
    TransactionRecord, TransferRequest, Wallet,
};

/// The CRM's REST surface, one method per operation the bot uses.
///
/// Every method except `signup` and `login` is authenticated by a bearer
/// token the implementation obtains (and re-obtains) transparently for the
/// given identity.
#[async_trait]
pub trait FinancialGateway: Send + Sync {
    async fn signup(&self, req: SignupRequest) -> Result<(), GatewayError>;

    /// Authenticate with explicit credentials, caching the token for
    /// subsequent calls on behalf of `identity`.
    async fn login(
        &self,
        identity: &Identity,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, GatewayError>;

    /// Current KYC review status for a linked identity.
    async fn kyc_status(&self, identity: &Identity) -> Result<KycStatus, GatewayError>;

    /// Submit the KYC profile plus downloaded documents.
    async fn submit_kyc(
        &self,
        identity: &Identity,
        submission: KycSubmission,
    ) -> Result<(), GatewayError>;

    async fn list_agreements(&self, identity: &Identity) -> Result<Vec<Agreement>, GatewayError>;

    async fn accept_agreement(
        &self,
        identity: &Identity,
        agreement_id: &str,
    ) -> Result<(), GatewayError>;

    async fn complete_kyc(&self, identity: &Identity) -> Result<(), GatewayError>;

    async fn list_wallets(&self, identity: &Identity) -> Result<Vec<Wallet>, GatewayError>;

    async fn list_accounts(
        &self,
        identity: &Identity,
        kind: TradingAccountKind,
    ) -> Result<Vec<TradingAccount>, GatewayError>;

    async fn list_payment_gateways(
        &self,
        identity: &Identity,
    ) -> Result<Vec<PaymentGatewayInfo>, GatewayError>;

    async fn create_transaction(
        &self,
        identity: &Identity,
        req: NewTransaction,
    ) -> Result<TransactionOutcome, GatewayError>;

    /// Wallet → trading-account transfer.
    async fn transfer_from_wallet(
        &self,
        identity: &Identity,
        req: TransferRequest,
    ) -> Result<(), GatewayError>;

    /// Trading-account → wallet transfer.
    async fn transfer_from_account(
        &self,
        identity: &Identity,
        req: TransferRequest,
    ) -> Result<(), GatewayError>;

    async fn transaction_history(
        &self,
        identity: &Identity,
    ) -> Result<Vec<TransactionRecord>, GatewayError>;

    /// Generate (or fetch) the identity's referral link.
    async fn referral_link(&self, identity: &Identity) -> Result<String, GatewayError>;

    async fn create_trading_account(
        &self,
        identity: &Identity,
        kind: TradingAccountKind,
        req: NewTradingAccount,
    ) -> Result<TradingAccount, GatewayError>;
}
