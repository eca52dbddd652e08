//! End-to-end dispatcher tests over an in-memory store and a mock gateway.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;

use fin_assist::dispatch::Dispatcher;
use fin_assist::error::GatewayError;
use fin_assist::event::{Identity, InboundEvent};
use fin_assist::flows::menu::WELCOME;
use fin_assist::gateway::FinancialGateway;
use fin_assist::gateway::types::{
    Agreement, AuthSession, KycStatus, KycSubmission, NewTradingAccount, NewTransaction,
    PaymentGatewayInfo, SignupRequest, TradingAccount, TradingAccountKind, TransactionOutcome,
    TransactionRecord, TransferRequest, Wallet,
};
use fin_assist::media::MediaStore;
use fin_assist::outbound::{OutboundMessage, Template};
use fin_assist::session::{
    EndpointKind, FlowData, FundingDraft, Session, Step, TransferDraft, TransferEndpoint,
};
use fin_assist::store::{Database, LibSqlBackend, LinkedAccount};

// ── Mock gateway ────────────────────────────────────────────────────

struct MockGateway {
    login_ok: bool,
    kyc_status: Mutex<KycStatus>,
    wallets: Vec<Wallet>,
    accounts: Vec<TradingAccount>,
    payment_gateways: Vec<PaymentGatewayInfo>,
    agreements: Vec<Agreement>,
    transactions: Mutex<Vec<NewTransaction>>,
    wallet_transfers: AtomicUsize,
    account_transfers: AtomicUsize,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            login_ok: true,
            kyc_status: Mutex::new(KycStatus::Approved),
            wallets: vec![wallet("w-1", dec!(100))],
            accounts: vec![account("a-1", "MT-1001", dec!(500))],
            payment_gateways: vec![
                gateway_info("match2pay"),
                gateway_info("bankTransfer"),
                gateway_info("whishMoney"),
            ],
            agreements: Vec::new(),
            transactions: Mutex::new(Vec::new()),
            wallet_transfers: AtomicUsize::new(0),
            account_transfers: AtomicUsize::new(0),
        }
    }
}

fn wallet(id: &str, balance: rust_decimal::Decimal) -> Wallet {
    Wallet {
        id: id.to_string(),
        currency: "USD".to_string(),
        balance,
    }
}

fn account(id: &str, name: &str, balance: rust_decimal::Decimal) -> TradingAccount {
    TradingAccount {
        id: id.to_string(),
        name: name.to_string(),
        account_type: TradingAccountKind::Real,
        currency: "USD".to_string(),
        balance,
    }
}

fn gateway_info(unique_name: &str) -> PaymentGatewayInfo {
    PaymentGatewayInfo {
        unique_name: unique_name.to_string(),
        display_name: unique_name.to_string(),
        enabled: true,
    }
}

#[async_trait]
impl FinancialGateway for MockGateway {
    async fn signup(&self, _req: SignupRequest) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn login(
        &self,
        _identity: &Identity,
        _email: &str,
        _password: &str,
    ) -> Result<AuthSession, GatewayError> {
        if !self.login_ok {
            return Err(GatewayError::Unauthorized);
        }
        Ok(AuthSession {
            token: "tok-1".to_string(),
            user_id: "u-1".to_string(),
            kyc_status: *self.kyc_status.lock().await,
        })
    }

    async fn kyc_status(&self, _identity: &Identity) -> Result<KycStatus, GatewayError> {
        Ok(*self.kyc_status.lock().await)
    }

    async fn submit_kyc(
        &self,
        _identity: &Identity,
        _submission: KycSubmission,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn list_agreements(&self, _identity: &Identity) -> Result<Vec<Agreement>, GatewayError> {
        Ok(self.agreements.clone())
    }

    async fn accept_agreement(
        &self,
        _identity: &Identity,
        _agreement_id: &str,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn complete_kyc(&self, _identity: &Identity) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn list_wallets(&self, _identity: &Identity) -> Result<Vec<Wallet>, GatewayError> {
        Ok(self.wallets.clone())
    }

    async fn list_accounts(
        &self,
        _identity: &Identity,
        _kind: TradingAccountKind,
    ) -> Result<Vec<TradingAccount>, GatewayError> {
        Ok(self.accounts.clone())
    }

    async fn list_payment_gateways(
        &self,
        _identity: &Identity,
    ) -> Result<Vec<PaymentGatewayInfo>, GatewayError> {
        Ok(self.payment_gateways.clone())
    }

    async fn create_transaction(
        &self,
        _identity: &Identity,
        req: NewTransaction,
    ) -> Result<TransactionOutcome, GatewayError> {
        self.transactions.lock().await.push(req);
        Ok(TransactionOutcome {
            id: "tx-1".to_string(),
            payment_url: Some("https://pay.example.com/tx-1".to_string()),
        })
    }

    async fn transfer_from_wallet(
        &self,
        _identity: &Identity,
        _req: TransferRequest,
    ) -> Result<(), GatewayError> {
        self.wallet_transfers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn transfer_from_account(
        &self,
        _identity: &Identity,
        _req: TransferRequest,
    ) -> Result<(), GatewayError> {
        self.account_transfers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn transaction_history(
        &self,
        _identity: &Identity,
    ) -> Result<Vec<TransactionRecord>, GatewayError> {
        Ok(Vec::new())
    }

    async fn referral_link(&self, _identity: &Identity) -> Result<String, GatewayError> {
        Ok("https://example.com/ref/u-1".to_string())
    }

    async fn create_trading_account(
        &self,
        _identity: &Identity,
        _kind: TradingAccountKind,
        req: NewTradingAccount,
    ) -> Result<TradingAccount, GatewayError> {
        Ok(account("a-new", &req.name, dec!(0)))
    }
}

// ── Harness ─────────────────────────────────────────────────────────

struct Harness {
    dispatcher: Dispatcher,
    store: Arc<dyn Database>,
    gateway: Arc<MockGateway>,
    _media_dir: tempfile::TempDir,
}

async fn harness(gateway: MockGateway) -> Harness {
    let store: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let gateway = Arc::new(gateway);
    let media_dir = tempfile::tempdir().unwrap();
    let media = Arc::new(MediaStore::new(media_dir.path(), Duration::from_secs(1)).unwrap());
    let dispatcher = Dispatcher::new(
        Arc::clone(&store),
        Arc::clone(&gateway) as Arc<dyn FinancialGateway>,
        media,
    );
    Harness {
        dispatcher,
        store,
        gateway,
        _media_dir: media_dir,
    }
}

fn identity() -> Identity {
    Identity::from_channel_address("whatsapp:+9613334444")
}

async fn seed_session(store: &Arc<dyn Database>, step: Step, data: FlowData) {
    let mut session = Session::bootstrap(identity());
    session.step = step;
    session.data = data;
    store.upsert_session(&session).await.unwrap();
}

async fn seed_linked_account(store: &Arc<dyn Database>) {
    store
        .upsert_linked_account(&LinkedAccount {
            identity: identity(),
            email: "rami@example.com".to_string(),
            login_secret: fin_assist::session::Sensitive::new("Secret1!"),
            crm_user_id: "u-1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
}

async fn step_of(store: &Arc<dyn Database>) -> Step {
    store.get_session(&identity()).await.unwrap().unwrap().step
}

fn text_of(messages: &[OutboundMessage]) -> String {
    messages
        .iter()
        .filter_map(|m| match m {
            OutboundMessage::Text { body } => Some(body.clone()),
            OutboundMessage::Template { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn has_template(messages: &[OutboundMessage], want: impl Fn(&Template) -> bool) -> bool {
    messages.iter().any(|m| match m {
        OutboundMessage::Template { template } => want(template),
        OutboundMessage::Text { .. } => false,
    })
}

// ── First contact ───────────────────────────────────────────────────

#[tokio::test]
async fn first_event_bootstraps_language_selection() {
    let h = harness(MockGateway::default()).await;

    let messages = h
        .dispatcher
        .dispatch(identity(), InboundEvent::text("anything at all"))
        .await;

    assert_eq!(step_of(&h.store).await, Step::LanguageSelection);
    assert!(text_of(&messages).contains(WELCOME));
    assert!(has_template(&messages, |t| matches!(
        t,
        Template::LanguagePicker
    )));
}

// ── Global interrupts ───────────────────────────────────────────────

#[tokio::test]
async fn greeting_routes_known_user_by_kyc_status() {
    let h = harness(MockGateway {
        kyc_status: Mutex::new(KycStatus::Pending),
        ..Default::default()
    })
    .await;
    seed_linked_account(&h.store).await;
    seed_session(&h.store, Step::SignupEmail, FlowData::Idle).await;

    let messages = h.dispatcher.dispatch(identity(), InboundEvent::text("hi")).await;

    assert_eq!(step_of(&h.store).await, Step::KycComplete);
    assert!(text_of(&messages).contains("pending"));
}

#[tokio::test]
async fn greeting_resets_unknown_identity_to_language_selection() {
    let h = harness(MockGateway::default()).await;
    seed_session(&h.store, Step::SignupEmail, FlowData::Idle).await;

    let messages = h
        .dispatcher
        .dispatch(identity(), InboundEvent::text("hello"))
        .await;

    assert_eq!(step_of(&h.store).await, Step::LanguageSelection);
    assert!(has_template(&messages, |t| matches!(
        t,
        Template::LanguagePicker
    )));
}

#[tokio::test]
async fn language_selection_suppresses_interrupts() {
    let h = harness(MockGateway::default()).await;
    seed_session(&h.store, Step::LanguageSelection, FlowData::Idle).await;

    // "hi" is not a supported language, so it is treated as picker input.
    let messages = h.dispatcher.dispatch(identity(), InboundEvent::text("hi")).await;

    assert_eq!(step_of(&h.store).await, Step::LanguageSelection);
    assert!(text_of(&messages).contains("supported languages"));
}

#[tokio::test]
async fn logout_clears_linkage_and_session() {
    let h = harness(MockGateway::default()).await;
    seed_linked_account(&h.store).await;
    seed_session(&h.store, Step::MainMenu, FlowData::Idle).await;

    let messages = h
        .dispatcher
        .dispatch(identity(), InboundEvent::text("logout"))
        .await;

    assert!(h.store.get_session(&identity()).await.unwrap().is_none());
    assert!(h
        .store
        .get_linked_account(&identity())
        .await
        .unwrap()
        .is_none());
    assert!(text_of(&messages).contains("logged out"));
}

// ── Signup validation ───────────────────────────────────────────────

#[tokio::test]
async fn password_policy_is_enforced() {
    let h = harness(MockGateway::default()).await;
    seed_session(
        &h.store,
        Step::SignupPassword,
        FlowData::Signup(Default::default()),
    )
    .await;

    // No uppercase, no special char: rejected, no state change.
    h.dispatcher
        .dispatch(identity(), InboundEvent::text("abc123"))
        .await;
    assert_eq!(step_of(&h.store).await, Step::SignupPassword);

    // Meets the policy: accepted.
    h.dispatcher
        .dispatch(identity(), InboundEvent::text("Abc123!"))
        .await;
    assert_eq!(step_of(&h.store).await, Step::SignupConfirmPassword);
}

// ── KYC DOB validation ──────────────────────────────────────────────

#[tokio::test]
async fn dob_requires_a_real_calendar_date() {
    let h = harness(MockGateway::default()).await;
    seed_session(&h.store, Step::KycDob, FlowData::Kyc(Default::default())).await;

    // Feb 30 doesn't exist.
    h.dispatcher
        .dispatch(identity(), InboundEvent::text("02/30/1990"))
        .await;
    assert_eq!(step_of(&h.store).await, Step::KycDob);

    // Month out of range.
    h.dispatcher
        .dispatch(identity(), InboundEvent::text("13/01/1990"))
        .await;
    assert_eq!(step_of(&h.store).await, Step::KycDob);

    // Valid.
    h.dispatcher
        .dispatch(identity(), InboundEvent::text("01/31/1990"))
        .await;
    assert_eq!(step_of(&h.store).await, Step::KycUploadId);
}

// ── Deposit ─────────────────────────────────────────────────────────

fn deposit_draft_at_amount() -> FlowData {
    let mut draft = FundingDraft::default();
    draft.wallet_id = Some("w-1".to_string());
    draft.available_methods = vec![
        "match2pay".to_string(),
        "bankTransfer".to_string(),
        "whishMoney".to_string(),
    ];
    draft.method = Some(fin_assist::gateway::types::PaymentMethod::Match2pay);
    FlowData::Deposit(draft)
}

#[tokio::test]
async fn deposit_enforces_ten_dollar_minimum() {
    let h = harness(MockGateway::default()).await;
    seed_session(&h.store, Step::DepositAmount, deposit_draft_at_amount()).await;

    h.dispatcher
        .dispatch(identity(), InboundEvent::text("9.99"))
        .await;
    assert_eq!(step_of(&h.store).await, Step::DepositAmount);
    assert!(h.gateway.transactions.lock().await.is_empty());

    let messages = h
        .dispatcher
        .dispatch(identity(), InboundEvent::text("10"))
        .await;

    // Submitted, payment link surfaced, and back on the options step.
    assert_eq!(step_of(&h.store).await, Step::DepositOptions);
    let submitted = h.gateway.transactions.lock().await;
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].amount, dec!(10));
    let text = text_of(&messages);
    assert!(text.contains("https://pay.example.com/tx-1"));
    assert!(text.contains("10–15 minutes"));
    assert!(has_template(&messages, |t| matches!(
        t,
        Template::DepositOptions { .. }
    )));
}

// ── Transfer ────────────────────────────────────────────────────────

fn transfer_endpoints() -> (Vec<TransferEndpoint>, usize) {
    let endpoints = vec![
        TransferEndpoint {
            kind: EndpointKind::Wallet,
            id: "w-1".to_string(),
            label: "USD wallet".to_string(),
            balance: dec!(50),
        },
        TransferEndpoint {
            kind: EndpointKind::TradingAccount,
            id: "a-1".to_string(),
            label: "MT-1001".to_string(),
            balance: dec!(500),
        },
        TransferEndpoint {
            kind: EndpointKind::TradingAccount,
            id: "a-2".to_string(),
            label: "MT-1002".to_string(),
            balance: dec!(250),
        },
    ];
    (endpoints, 1)
}

fn transfer_draft_at_source() -> FlowData {
    let (endpoints, wallet_count) = transfer_endpoints();
    let mut draft = TransferDraft::default();
    draft.endpoints = endpoints;
    draft.wallet_count = wallet_count;
    FlowData::Transfer(draft)
}

fn transfer_draft_at_amount() -> FlowData {
    let (endpoints, wallet_count) = transfer_endpoints();
    let mut draft = TransferDraft::default();
    draft.source = Some(endpoints[0].clone());
    draft.destinations = vec![endpoints[1].clone(), endpoints[2].clone()];
    draft.destination = Some(endpoints[1].clone());
    draft.endpoints = endpoints;
    draft.wallet_count = wallet_count;
    FlowData::Transfer(draft)
}

#[tokio::test]
async fn destination_list_is_complementary_to_source_type() {
    let h = harness(MockGateway::default()).await;
    seed_session(&h.store, Step::TransferSelectSource, transfer_draft_at_source()).await;

    // Wallet source → only trading accounts offered.
    let messages = h.dispatcher.dispatch(identity(), InboundEvent::text("1")).await;
    let session = h.store.get_session(&identity()).await.unwrap().unwrap();
    match &session.data {
        FlowData::Transfer(draft) => {
            assert!(!draft.destinations.is_empty());
            assert!(draft
                .destinations
                .iter()
                .all(|d| d.kind == EndpointKind::TradingAccount));
        }
        other => panic!("wrong flow: {other:?}"),
    }
    assert!(text_of(&messages).contains("MT-1001"));

    // Account source → only wallets offered.
    let h = harness(MockGateway::default()).await;
    seed_session(&h.store, Step::TransferSelectSource, transfer_draft_at_source()).await;
    h.dispatcher.dispatch(identity(), InboundEvent::text("2")).await;
    let session = h.store.get_session(&identity()).await.unwrap().unwrap();
    match &session.data {
        FlowData::Transfer(draft) => {
            assert!(draft
                .destinations
                .iter()
                .all(|d| d.kind == EndpointKind::Wallet));
        }
        other => panic!("wrong flow: {other:?}"),
    }
}

#[tokio::test]
async fn transfer_amount_is_bounded_by_cached_balance() {
    let h = harness(MockGateway::default()).await;
    seed_session(&h.store, Step::TransferAmount, transfer_draft_at_amount()).await;

    // Over the cached 50 balance.
    let messages = h.dispatcher.dispatch(identity(), InboundEvent::text("51")).await;
    assert_eq!(step_of(&h.store).await, Step::TransferAmount);
    assert!(text_of(&messages).contains("Insufficient"));

    // Below the minimum.
    let messages = h.dispatcher.dispatch(identity(), InboundEvent::text("0")).await;
    assert_eq!(step_of(&h.store).await, Step::TransferAmount);
    assert!(text_of(&messages).contains("minimum"));

    // In range.
    let messages = h.dispatcher.dispatch(identity(), InboundEvent::text("25")).await;
    assert_eq!(step_of(&h.store).await, Step::TransferConfirmation);
    assert!(has_template(&messages, |t| matches!(
        t,
        Template::TransferConfirmation { .. }
    )));
}

#[tokio::test]
async fn confirm_replay_does_not_resubmit() {
    let h = harness(MockGateway::default()).await;
    let mut data = transfer_draft_at_amount();
    if let FlowData::Transfer(draft) = &mut data {
        draft.amount = Some(dec!(25));
    }
    seed_session(&h.store, Step::TransferConfirmation, data).await;
    seed_linked_account(&h.store).await;

    h.dispatcher
        .dispatch(identity(), InboundEvent::text("confirm"))
        .await;
    assert_eq!(step_of(&h.store).await, Step::MainMenu);
    assert_eq!(h.gateway.wallet_transfers.load(Ordering::SeqCst), 1);
    assert_eq!(h.gateway.account_transfers.load(Ordering::SeqCst), 0);

    // Replay of the same message lands in menu handling, not resubmission.
    h.dispatcher
        .dispatch(identity(), InboundEvent::text("confirm"))
        .await;
    assert_eq!(h.gateway.wallet_transfers.load(Ordering::SeqCst), 1);
    assert_eq!(step_of(&h.store).await, Step::MainMenu);
}

#[tokio::test]
async fn unexpected_confirmation_input_aborts_to_menu() {
    let h = harness(MockGateway::default()).await;
    let mut data = transfer_draft_at_amount();
    if let FlowData::Transfer(draft) = &mut data {
        draft.amount = Some(dec!(25));
    }
    seed_session(&h.store, Step::TransferConfirmation, data).await;

    let messages = h
        .dispatcher
        .dispatch(identity(), InboundEvent::text("maybe"))
        .await;

    assert_eq!(step_of(&h.store).await, Step::MainMenu);
    assert!(text_of(&messages).contains("Invalid selection"));
    assert_eq!(h.gateway.wallet_transfers.load(Ordering::SeqCst), 0);
}

// ── End-to-end: language → login ────────────────────────────────────

#[tokio::test]
async fn login_with_pending_kyc_lands_on_holding_state() {
    let h = harness(MockGateway {
        kyc_status: Mutex::new(KycStatus::Pending),
        ..Default::default()
    })
    .await;

    // First contact.
    h.dispatcher.dispatch(identity(), InboundEvent::text("hi")).await;
    assert_eq!(step_of(&h.store).await, Step::LanguageSelection);

    // Pick English → auth choice.
    let messages = h.dispatcher.dispatch(identity(), InboundEvent::text("1")).await;
    assert_eq!(step_of(&h.store).await, Step::MainMenu);
    assert!(has_template(&messages, |t| matches!(t, Template::AuthChoice)));

    // Choose login, enter credentials.
    h.dispatcher.dispatch(identity(), InboundEvent::text("1")).await;
    assert_eq!(step_of(&h.store).await, Step::LoginEmail);
    h.dispatcher
        .dispatch(identity(), InboundEvent::text("rami@example.com"))
        .await;
    assert_eq!(step_of(&h.store).await, Step::LoginPassword);
    let messages = h
        .dispatcher
        .dispatch(identity(), InboundEvent::text("Secret1!"))
        .await;

    // Pending KYC: holding state, not the main menu.
    assert_eq!(step_of(&h.store).await, Step::KycComplete);
    let text = text_of(&messages);
    assert!(text.contains("pending"));
    assert!(!has_template(&messages, |t| matches!(t, Template::MainMenu)));

    // The linkage was stored for transparent re-auth.
    assert!(h
        .store
        .get_linked_account(&identity())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn invalid_credentials_reprompt_login_email() {
    let h = harness(MockGateway {
        login_ok: false,
        ..Default::default()
    })
    .await;
    seed_session(
        &h.store,
        Step::LoginPassword,
        FlowData::Login(fin_assist::session::LoginDraft {
            email: Some("rami@example.com".to_string()),
        }),
    )
    .await;

    let messages = h
        .dispatcher
        .dispatch(identity(), InboundEvent::text("WrongPass1!"))
        .await;

    assert_eq!(step_of(&h.store).await, Step::LoginEmail);
    assert!(text_of(&messages).contains("email"));
    assert!(h
        .store
        .get_linked_account(&identity())
        .await
        .unwrap()
        .is_none());
}

// ── Agreements walk ─────────────────────────────────────────────────

#[tokio::test]
async fn accepting_agreements_one_at_a_time_completes_kyc() {
    let h = harness(MockGateway {
        agreements: vec![
            Agreement {
                id: "agr-1".to_string(),
                title: "Terms of Business".to_string(),
            },
            Agreement {
                id: "agr-2".to_string(),
                title: "Risk Disclosure".to_string(),
            },
        ],
        ..Default::default()
    })
    .await;
    seed_linked_account(&h.store).await;

    let mut draft = fin_assist::session::KycDraft::default();
    draft.agreements = vec![
        Agreement {
            id: "agr-1".to_string(),
            title: "Terms of Business".to_string(),
        },
        Agreement {
            id: "agr-2".to_string(),
            title: "Risk Disclosure".to_string(),
        },
    ];
    seed_session(&h.store, Step::KycAcceptTerms, FlowData::Kyc(draft)).await;

    // First acceptance shows the second agreement and persists the index.
    let messages = h
        .dispatcher
        .dispatch(identity(), InboundEvent::text("I ACCEPT"))
        .await;
    assert_eq!(step_of(&h.store).await, Step::KycAcceptTerms);
    assert!(text_of(&messages).contains("Risk Disclosure"));
    let session = h.store.get_session(&identity()).await.unwrap().unwrap();
    match &session.data {
        FlowData::Kyc(draft) => assert_eq!(draft.current_agreement_index, 1),
        other => panic!("wrong flow: {other:?}"),
    }

    // Anything else re-prompts without advancing.
    h.dispatcher.dispatch(identity(), InboundEvent::text("no")).await;
    let session = h.store.get_session(&identity()).await.unwrap().unwrap();
    match &session.data {
        FlowData::Kyc(draft) => assert_eq!(draft.current_agreement_index, 1),
        other => panic!("wrong flow: {other:?}"),
    }

    // Exhausting the list completes KYC and lands on the menu.
    let messages = h
        .dispatcher
        .dispatch(identity(), InboundEvent::text("I ACCEPT"))
        .await;
    assert_eq!(step_of(&h.store).await, Step::MainMenu);
    assert!(text_of(&messages).contains("Congratulations"));
}
