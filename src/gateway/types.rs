//! Wire types for the financial gateway (CRM) REST surface.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// KYC review status as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    NotSubmitted,
    Pending,
    Approved,
    Rejected,
}

/// A payment gateway supported for deposits/withdrawals, matched by its
/// stable `uniqueName`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "match2pay")]
    Match2pay,
    #[serde(rename = "bankTransfer")]
    BankTransfer,
    #[serde(rename = "whishMoney")]
    WhishMoney,
}

impl PaymentMethod {
    /// The gateway's stable unique name.
    pub fn unique_name(&self) -> &'static str {
        match self {
            Self::Match2pay => "match2pay",
            Self::BankTransfer => "bankTransfer",
            Self::WhishMoney => "whishMoney",
        }
    }

    /// Match a fetched gateway record's unique name.
    pub fn from_unique_name(name: &str) -> Option<Self> {
        match name {
            "match2pay" => Some(Self::Match2pay),
            "bankTransfer" => Some(Self::BankTransfer),
            "whishMoney" => Some(Self::WhishMoney),
            _ => None,
        }
    }

    /// Human label for pickers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Match2pay => "Match2Pay (crypto)",
            Self::BankTransfer => "Bank transfer",
            Self::WhishMoney => "Whish Money",
        }
    }
}

/// Which kind of trading account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingAccountKind {
    Demo,
    Real,
}

impl TradingAccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Real => "real",
        }
    }
}

/// One KYC agreement, presented and accepted one at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: String,
    pub title: String,
}

/// Signup payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
}

/// Authenticated gateway session returned by login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub user_id: String,
    pub kyc_status: KycStatus,
}

/// KYC profile + document submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KycSubmission {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    /// `MM/DD/YYYY`.
    pub date_of_birth: String,
    /// Local path of the downloaded identity document.
    pub id_document: String,
    /// Local path of the utility bill, if the user did not skip it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utility_document: Option<String>,
}

/// A wallet owned by the user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,
    pub currency: String,
    pub balance: Decimal,
}

/// A trading account owned by the user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingAccount {
    pub id: String,
    pub name: String,
    pub account_type: TradingAccountKind,
    pub currency: String,
    pub balance: Decimal,
}

/// A payment gateway record from the gateway list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentGatewayInfo {
    pub unique_name: String,
    pub display_name: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Deposit or withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

/// Transaction submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub wallet_id: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    /// Payment gateway unique name.
    pub payment_gateway: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swift_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beneficiary_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// Result of a transaction submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutcome {
    pub id: String,
    /// Hosted payment URL for match2pay/whishMoney deposits.
    #[serde(default)]
    pub payment_url: Option<String>,
}

/// Internal transfer submission. The directional endpoint (from-wallet vs
/// from-account) is chosen by the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_id: String,
    pub destination_id: String,
    pub amount: Decimal,
}

/// One row of transaction history.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Trading-account creation payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTradingAccount {
    pub name: String,
    /// Demo accounts: requested starting balance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
    /// Real accounts: opaque external product identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn payment_method_unique_names_roundtrip() {
        for method in [
            PaymentMethod::Match2pay,
            PaymentMethod::BankTransfer,
            PaymentMethod::WhishMoney,
        ] {
            assert_eq!(
                PaymentMethod::from_unique_name(method.unique_name()),
                Some(method)
            );
        }
        assert_eq!(PaymentMethod::from_unique_name("paypal"), None);
    }

    #[test]
    fn new_transaction_omits_absent_extras() {
        let tx = NewTransaction {
            wallet_id: "w-1".to_string(),
            transaction_type: TransactionType::Deposit,
            amount: dec!(10),
            payment_gateway: "match2pay".to_string(),
            bank_name: None,
            bank_address: None,
            swift_code: None,
            beneficiary_account: None,
            destination_address: None,
            phone_number: None,
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["walletId"], "w-1");
        assert_eq!(json["transactionType"], "deposit");
        assert!(json.get("bankName").is_none());
        assert!(json.get("destinationAddress").is_none());
    }

    #[test]
    fn auth_session_parses_camel_case() {
        let json = r#"{"token":"tok-1","userId":"u-9","kycStatus":"pending"}"#;
        let auth: AuthSession = serde_json::from_str(json).unwrap();
        assert_eq!(auth.token, "tok-1");
        assert_eq!(auth.kyc_status, KycStatus::Pending);
    }
}
