//! The closed set of FSM states.
//!
//! Every inbound event is routed to the handler registered for the
//! session's current step. Keeping this an enum (rather than a raw string)
//! lets the dispatch table be checked for exhaustiveness.

use serde::{Deserialize, Serialize};

/// A named point in the conversation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    #[serde(rename = "language-selection")]
    LanguageSelection,
    #[serde(rename = "main-menu")]
    MainMenu,

    // Signup wizard
    #[serde(rename = "signup-firstname")]
    SignupFirstName,
    #[serde(rename = "signup-lastname")]
    SignupLastName,
    #[serde(rename = "signup-email")]
    SignupEmail,
    #[serde(rename = "signup-phone")]
    SignupPhone,
    #[serde(rename = "signup-password")]
    SignupPassword,
    #[serde(rename = "signup-confirm-password")]
    SignupConfirmPassword,
    #[serde(rename = "signup-review")]
    SignupReview,

    // Login
    #[serde(rename = "login-email")]
    LoginEmail,
    #[serde(rename = "login-password")]
    LoginPassword,

    // KYC
    #[serde(rename = "kyc-start")]
    KycStart,
    #[serde(rename = "kyc-street")]
    KycStreet,
    #[serde(rename = "kyc-city")]
    KycCity,
    #[serde(rename = "kyc-postal")]
    KycPostal,
    #[serde(rename = "kyc-country")]
    KycCountry,
    #[serde(rename = "kyc-dob")]
    KycDob,
    #[serde(rename = "kyc-upload-id")]
    KycUploadId,
    #[serde(rename = "kyc-upload-utility")]
    KycUploadUtility,
    #[serde(rename = "kyc-agreements")]
    KycAgreements,
    #[serde(rename = "kyc-accept-terms")]
    KycAcceptTerms,
    #[serde(rename = "kyc-complete")]
    KycComplete,

    // Deposit
    #[serde(rename = "dashboard-deposit-options")]
    DepositOptions,
    #[serde(rename = "dashboard-deposit-amount")]
    DepositAmount,
    #[serde(rename = "dashboard-deposit-bank-name")]
    DepositBankName,
    #[serde(rename = "dashboard-deposit-bank-address")]
    DepositBankAddress,
    #[serde(rename = "dashboard-deposit-swift-code")]
    DepositSwiftCode,
    #[serde(rename = "dashboard-deposit-beneficiary-account")]
    DepositBeneficiaryAccount,

    // Withdrawal
    #[serde(rename = "dashboard-withdraw-options")]
    WithdrawOptions,
    #[serde(rename = "dashboard-withdraw-amount")]
    WithdrawAmount,
    #[serde(rename = "dashboard-withdraw-match2pay-address")]
    WithdrawMatch2payAddress,
    #[serde(rename = "dashboard-withdraw-wishmoney-phone")]
    WithdrawWishmoneyPhone,
    #[serde(rename = "dashboard-withdraw-bank-name")]
    WithdrawBankName,
    #[serde(rename = "dashboard-withdraw-bank-address")]
    WithdrawBankAddress,
    #[serde(rename = "dashboard-withdraw-swift-code")]
    WithdrawSwiftCode,
    #[serde(rename = "dashboard-withdraw-beneficiary-account")]
    WithdrawBeneficiaryAccount,

    // Internal transfer
    #[serde(rename = "dashboard-transfer-select-source")]
    TransferSelectSource,
    #[serde(rename = "dashboard-transfer-select-destination")]
    TransferSelectDestination,
    #[serde(rename = "dashboard-transfer-amount")]
    TransferAmount,
    #[serde(rename = "dashboard-transfer-confirmation")]
    TransferConfirmation,

    // Trading-account creation
    #[serde(rename = "account-create-demo-name")]
    AccountCreateDemoName,
    #[serde(rename = "account-create-demo-balance")]
    AccountCreateDemoBalance,
    #[serde(rename = "account-create-real-name")]
    AccountCreateRealName,
    #[serde(rename = "account-create-real-product")]
    AccountCreateRealProduct,
}

impl Step {
    /// The persisted string id of this step.
    pub fn as_str(&self) -> &'static str {
        // serde renames are the single source of truth; keep this table in sync.
        match self {
            Self::LanguageSelection => "language-selection",
            Self::MainMenu => "main-menu",
            Self::SignupFirstName => "signup-firstname",
            Self::SignupLastName => "signup-lastname",
            Self::SignupEmail => "signup-email",
            Self::SignupPhone => "signup-phone",
            Self::SignupPassword => "signup-password",
            Self::SignupConfirmPassword => "signup-confirm-password",
            Self::SignupReview => "signup-review",
            Self::LoginEmail => "login-email",
            Self::LoginPassword => "login-password",
            Self::KycStart => "kyc-start",
            Self::KycStreet => "kyc-street",
            Self::KycCity => "kyc-city",
            Self::KycPostal => "kyc-postal",
            Self::KycCountry => "kyc-country",
            Self::KycDob => "kyc-dob",
            Self::KycUploadId => "kyc-upload-id",
            Self::KycUploadUtility => "kyc-upload-utility",
            Self::KycAgreements => "kyc-agreements",
            Self::KycAcceptTerms => "kyc-accept-terms",
            Self::KycComplete => "kyc-complete",
            Self::DepositOptions => "dashboard-deposit-options",
            Self::DepositAmount => "dashboard-deposit-amount",
            Self::DepositBankName => "dashboard-deposit-bank-name",
            Self::DepositBankAddress => "dashboard-deposit-bank-address",
            Self::DepositSwiftCode => "dashboard-deposit-swift-code",
            Self::DepositBeneficiaryAccount => "dashboard-deposit-beneficiary-account",
            Self::WithdrawOptions => "dashboard-withdraw-options",
            Self::WithdrawAmount => "dashboard-withdraw-amount",
            Self::WithdrawMatch2payAddress => "dashboard-withdraw-match2pay-address",
            Self::WithdrawWishmoneyPhone => "dashboard-withdraw-wishmoney-phone",
            Self::WithdrawBankName => "dashboard-withdraw-bank-name",
            Self::WithdrawBankAddress => "dashboard-withdraw-bank-address",
            Self::WithdrawSwiftCode => "dashboard-withdraw-swift-code",
            Self::WithdrawBeneficiaryAccount => "dashboard-withdraw-beneficiary-account",
            Self::TransferSelectSource => "dashboard-transfer-select-source",
            Self::TransferSelectDestination => "dashboard-transfer-select-destination",
            Self::TransferAmount => "dashboard-transfer-amount",
            Self::TransferConfirmation => "dashboard-transfer-confirmation",
            Self::AccountCreateDemoName => "account-create-demo-name",
            Self::AccountCreateDemoBalance => "account-create-demo-balance",
            Self::AccountCreateRealName => "account-create-real-name",
            Self::AccountCreateRealProduct => "account-create-real-product",
        }
    }

    /// Parse a persisted step id. `None` for unknown/corrupted ids — the
    /// dispatcher falls back to `language-selection` in that case.
    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }

    /// Whether global interrupts (greeting, logout) are honored here.
    /// `language-selection` suppresses them: the user must confirm a
    /// supported language before any other command is recognized.
    pub fn honors_interrupts(&self) -> bool {
        !matches!(self, Self::LanguageSelection)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::LanguageSelection
    }
}
