//! Session record and per-flow draft models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::event::Identity;
use crate::gateway::types::{Agreement, PaymentMethod, TradingAccountKind};
use crate::session::Step;

/// Persisted per-identity conversation state.
///
/// Exactly one session exists per identity at any time. `data` is scoped to
/// the current flow and discarded wholesale on logout or explicit restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub identity: Identity,
    pub step: Step,
    /// Confirmed interaction language; survives flow resets, cleared on logout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(default)]
    pub data: FlowData,
    /// Optimistic-locking version; incremented by the store on every upsert.
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session at the initial step.
    pub fn bootstrap(identity: Identity) -> Self {
        let now = Utc::now();
        Self {
            identity,
            step: Step::LanguageSelection,
            language: None,
            data: FlowData::Idle,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Full reset: back to language selection with no draft and no language.
    pub fn reset(&mut self) {
        self.step = Step::LanguageSelection;
        self.language = None;
        self.data = FlowData::Idle;
    }

    /// Drop the current draft and land on `step`.
    pub fn end_flow(&mut self, step: Step) {
        self.step = step;
        self.data = FlowData::Idle;
    }

    /// Begin a flow: install `data` and move to `step`.
    pub fn start_flow(&mut self, step: Step, data: FlowData) {
        self.step = step;
        self.data = data;
    }

    // Draft accessors. Each returns the typed draft for the active flow,
    // installing a fresh one if the session is not in that flow — the
    // dispatcher keeps step and flow in lockstep, so the install path only
    // runs at flow entry.

    pub fn signup_mut(&mut self) -> &mut SignupDraft {
        if !matches!(self.data, FlowData::Signup(_)) {
            self.data = FlowData::Signup(SignupDraft::default());
        }
        match &mut self.data {
            FlowData::Signup(draft) => draft,
            _ => unreachable!(),
        }
    }

    pub fn login_mut(&mut self) -> &mut LoginDraft {
        if !matches!(self.data, FlowData::Login(_)) {
            self.data = FlowData::Login(LoginDraft::default());
        }
        match &mut self.data {
            FlowData::Login(draft) => draft,
            _ => unreachable!(),
        }
    }

    pub fn kyc_mut(&mut self) -> &mut KycDraft {
        if !matches!(self.data, FlowData::Kyc(_)) {
            self.data = FlowData::Kyc(KycDraft::default());
        }
        match &mut self.data {
            FlowData::Kyc(draft) => draft,
            _ => unreachable!(),
        }
    }

    pub fn deposit_mut(&mut self) -> &mut FundingDraft {
        if !matches!(self.data, FlowData::Deposit(_)) {
            self.data = FlowData::Deposit(FundingDraft::default());
        }
        match &mut self.data {
            FlowData::Deposit(draft) => draft,
            _ => unreachable!(),
        }
    }

    pub fn withdraw_mut(&mut self) -> &mut FundingDraft {
        if !matches!(self.data, FlowData::Withdraw(_)) {
            self.data = FlowData::Withdraw(FundingDraft::default());
        }
        match &mut self.data {
            FlowData::Withdraw(draft) => draft,
            _ => unreachable!(),
        }
    }

    pub fn transfer_mut(&mut self) -> &mut TransferDraft {
        if !matches!(self.data, FlowData::Transfer(_)) {
            self.data = FlowData::Transfer(TransferDraft::default());
        }
        match &mut self.data {
            FlowData::Transfer(draft) => draft,
            _ => unreachable!(),
        }
    }

    pub fn account_mut(&mut self) -> &mut AccountDraft {
        if !matches!(self.data, FlowData::Account(_)) {
            self.data = FlowData::Account(AccountDraft::default());
        }
        match &mut self.data {
            FlowData::Account(draft) => draft,
            _ => unreachable!(),
        }
    }
}

/// Supported interaction languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    Spanish,
    French,
    Arabic,
}

impl Language {
    /// Parse a picker selection: number, name, or ISO code.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "1" | "english" | "en" => Some(Self::English),
            "2" | "spanish" | "español" | "es" => Some(Self::Spanish),
            "3" | "french" | "français" | "fr" => Some(Self::French),
            "4" | "arabic" | "ar" => Some(Self::Arabic),
            _ => None,
        }
    }
}

/// The accumulating draft for the current flow — a tagged union so each
/// wizard gets typed fields instead of a stringly-keyed bag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "flow", content = "draft", rename_all = "snake_case")]
pub enum FlowData {
    #[default]
    Idle,
    Signup(SignupDraft),
    Login(LoginDraft),
    Kyc(KycDraft),
    Deposit(FundingDraft),
    Withdraw(FundingDraft),
    Transfer(TransferDraft),
    Account(AccountDraft),
}

/// Signup wizard draft, filled one field per step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignupDraft {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Written once at the password step, purged as soon as the signup
    /// submit resolves (or the wizard is restarted).
    pub password: Option<Sensitive>,
}

impl SignupDraft {
    /// Full name as submitted to the gateway.
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

/// Login draft. The password is never stored here — it is forwarded to the
/// gateway in the same turn it arrives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginDraft {
    pub email: Option<String>,
}

/// KYC wizard draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KycDraft {
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal: Option<String>,
    pub country: Option<String>,
    /// `MM/DD/YYYY`, already calendar-validated.
    pub dob: Option<String>,
    pub id_document: Option<String>,
    pub utility_document: Option<String>,
    /// Agreement snapshot captured once per KYC pass; acceptance advances
    /// `current_agreement_index` into this list, never re-fetching.
    pub agreements: Vec<Agreement>,
    pub current_agreement_index: usize,
}

impl KycDraft {
    /// The agreement currently awaiting acceptance, if any remain.
    pub fn current_agreement(&self) -> Option<&Agreement> {
        self.agreements.get(self.current_agreement_index)
    }
}

/// Shared deposit/withdrawal draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundingDraft {
    /// Implicitly selected wallet (first wallet the gateway returns).
    pub wallet_id: Option<String>,
    /// Method unique-names cached for the options picker.
    pub available_methods: Vec<String>,
    pub method: Option<PaymentMethod>,
    pub amount: Option<Decimal>,
    // Bank-transfer extra fields.
    pub bank_name: Option<String>,
    pub bank_address: Option<String>,
    pub swift_code: Option<String>,
    pub beneficiary_account: Option<String>,
    // Withdrawal-only extra fields.
    pub destination_address: Option<String>,
    pub phone_number: Option<String>,
}

/// Which side of a transfer an endpoint is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Wallet,
    TradingAccount,
}

/// A wallet or trading account cached for the duration of a transfer
/// selection, balance included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEndpoint {
    pub kind: EndpointKind,
    pub id: String,
    pub label: String,
    pub balance: Decimal,
}

/// Transfer wizard draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferDraft {
    /// Combined numbered list: wallets first, then trading accounts.
    pub endpoints: Vec<TransferEndpoint>,
    /// How many of `endpoints` are wallets (index arithmetic pivot).
    pub wallet_count: usize,
    pub source: Option<TransferEndpoint>,
    /// Complementary-type candidates offered for the destination pick.
    pub destinations: Vec<TransferEndpoint>,
    pub destination: Option<TransferEndpoint>,
    pub amount: Option<Decimal>,
}

/// Trading-account creation draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDraft {
    pub kind: TradingAccountKind,
    pub name: Option<String>,
    pub balance: Option<Decimal>,
    pub product_id: Option<String>,
}

impl Default for AccountDraft {
    fn default() -> Self {
        Self {
            kind: TradingAccountKind::Demo,
            name: None,
            balance: None,
            product_id: None,
        }
    }
}

/// A string that must not leak through `Debug` or logs.
///
/// Serializes transparently (session records survive process restarts
/// between wizard steps); the only read path is `expose()`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Sensitive(String);

impl Sensitive {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Sensitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Sensitive(***)")
    }
}
