//! The state-machine core: resolves every inbound event to exactly one
//! handler and persists the session before the reply leaves the process.
//!
//! Resolution order:
//! 1. No session → bootstrap at `language-selection`, send the welcome.
//! 2. Global interrupts (greeting, logout) — every state except
//!    `language-selection`.
//! 3. Step-exact dispatch to the handler registered for the current step.
//! 4. Corrupted/unknown session → reset with a "session may have expired"
//!    notice.
//!
//! A final catch-all (error tier 3) guarantees the transport always gets a
//! well-formed reply: the user sees a generic apology and the session is
//! forced to the main menu.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{error, info, warn};

use crate::error::{DatabaseError, Error};
use crate::event::{Identity, InboundEvent};
use crate::flows::{self, FlowContext, gateway_failure_text, menu, route_by_kyc};
use crate::gateway::FinancialGateway;
use crate::media::MediaStore;
use crate::outbound::{OutboundMessage, Reply, Template};
use crate::session::{Session, Step};
use crate::store::Database;

static GREETING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(hi|hello|hey|menu)$").expect("greeting regex"));
static LOGOUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^logout$").expect("logout regex"));

/// Routes inbound events through the session state machine.
pub struct Dispatcher {
    ctx: FlowContext,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Database>,
        gateway: Arc<dyn FinancialGateway>,
        media: Arc<MediaStore>,
    ) -> Self {
        Self {
            ctx: FlowContext {
                store,
                gateway,
                media,
            },
        }
    }

    /// Process one inbound event end-to-end. Always returns a well-formed
    /// reply, even under total handler failure.
    pub async fn dispatch(&self, identity: Identity, event: InboundEvent) -> Vec<OutboundMessage> {
        match self.dispatch_inner(&identity, &event).await {
            Ok(messages) => messages,
            Err(err) => {
                error!(identity = %identity, error = %err, "Unhandled dispatch failure");
                self.force_main_menu(&identity).await;
                Reply::template(Template::GoBack {
                    message: "Sorry, something went wrong on our side. Please try again."
                        .to_string(),
                })
                .into_messages()
            }
        }
    }

    async fn dispatch_inner(
        &self,
        identity: &Identity,
        event: &InboundEvent,
    ) -> Result<Vec<OutboundMessage>, Error> {
        let session = match self.ctx.store.get_session(identity).await {
            Ok(session) => session,
            // Corrupted session record (unknown step, undecodable draft):
            // reset and start over.
            Err(DatabaseError::Serialization(reason)) => {
                warn!(identity = %identity, %reason, "Corrupted session; resetting");
                return self.reset_with_notice(identity).await;
            }
            Err(err) => return Err(err.into()),
        };

        // 1. First contact: bootstrap and greet. Terminal for this turn.
        let Some(mut session) = session else {
            let session = Session::bootstrap(identity.clone());
            info!(identity = %identity, "New session");
            return self.persist(session, welcome()).await;
        };

        info!(
            identity = %identity,
            step = %session.step,
            button = event.button_payload.as_deref().unwrap_or(""),
            media = event.media_count,
            "Dispatching inbound event"
        );

        // 2. Global interrupts — suppressed only during language selection.
        if session.step.honors_interrupts() {
            let input = event.input();
            if LOGOUT_RE.is_match(input) {
                return self.logout(identity).await;
            }
            if GREETING_RE.is_match(input) {
                return self.greeting(session).await;
            }
        }

        // 3. Step-exact dispatch.
        let reply = self.run_handler(&mut session, event).await?;

        // Persist before the reply becomes externally observable.
        self.persist(session, reply).await
    }

    async fn run_handler(
        &self,
        session: &mut Session,
        event: &InboundEvent,
    ) -> Result<Reply, Error> {
        let ctx = &self.ctx;
        match session.step {
            Step::LanguageSelection => menu::language_selection(ctx, session, event).await,
            Step::MainMenu => menu::main_menu(ctx, session, event).await,

            Step::SignupFirstName => flows::auth::signup_first_name(ctx, session, event).await,
            Step::SignupLastName => flows::auth::signup_last_name(ctx, session, event).await,
            Step::SignupEmail => flows::auth::signup_email(ctx, session, event).await,
            Step::SignupPhone => flows::auth::signup_phone(ctx, session, event).await,
            Step::SignupPassword => flows::auth::signup_password(ctx, session, event).await,
            Step::SignupConfirmPassword => {
                flows::auth::signup_confirm_password(ctx, session, event).await
            }
            Step::SignupReview => flows::auth::signup_review(ctx, session, event).await,

            Step::LoginEmail => flows::auth::login_email(ctx, session, event).await,
            Step::LoginPassword => flows::auth::login_password(ctx, session, event).await,

            Step::KycStart => flows::kyc::start(ctx, session, event).await,
            Step::KycStreet => flows::kyc::street(ctx, session, event).await,
            Step::KycCity => flows::kyc::city(ctx, session, event).await,
            Step::KycPostal => flows::kyc::postal(ctx, session, event).await,
            Step::KycCountry => flows::kyc::country(ctx, session, event).await,
            Step::KycDob => flows::kyc::dob(ctx, session, event).await,
            Step::KycUploadId => flows::kyc::upload_id(ctx, session, event).await,
            Step::KycUploadUtility => flows::kyc::upload_utility(ctx, session, event).await,
            Step::KycAgreements => flows::kyc::agreements(ctx, session, event).await,
            Step::KycAcceptTerms => flows::kyc::accept_terms(ctx, session, event).await,
            Step::KycComplete => flows::kyc::complete(ctx, session, event).await,

            Step::DepositOptions => flows::funding::deposit_options(ctx, session, event).await,
            Step::DepositAmount => flows::funding::deposit_amount(ctx, session, event).await,
            Step::DepositBankName => flows::funding::deposit_bank_name(ctx, session, event).await,
            Step::DepositBankAddress => {
                flows::funding::deposit_bank_address(ctx, session, event).await
            }
            Step::DepositSwiftCode => flows::funding::deposit_swift_code(ctx, session, event).await,
            Step::DepositBeneficiaryAccount => {
                flows::funding::deposit_beneficiary_account(ctx, session, event).await
            }

            Step::WithdrawOptions => flows::funding::withdraw_options(ctx, session, event).await,
            Step::WithdrawAmount => flows::funding::withdraw_amount(ctx, session, event).await,
            Step::WithdrawMatch2payAddress => {
                flows::funding::withdraw_match2pay_address(ctx, session, event).await
            }
            Step::WithdrawWishmoneyPhone => {
                flows::funding::withdraw_wishmoney_phone(ctx, session, event).await
            }
            Step::WithdrawBankName => flows::funding::withdraw_bank_name(ctx, session, event).await,
            Step::WithdrawBankAddress => {
                flows::funding::withdraw_bank_address(ctx, session, event).await
            }
            Step::WithdrawSwiftCode => {
                flows::funding::withdraw_swift_code(ctx, session, event).await
            }
            Step::WithdrawBeneficiaryAccount => {
                flows::funding::withdraw_beneficiary_account(ctx, session, event).await
            }

            Step::TransferSelectSource => flows::transfer::select_source(ctx, session, event).await,
            Step::TransferSelectDestination => {
                flows::transfer::select_destination(ctx, session, event).await
            }
            Step::TransferAmount => flows::transfer::amount(ctx, session, event).await,
            Step::TransferConfirmation => flows::transfer::confirmation(ctx, session, event).await,

            Step::AccountCreateDemoName => flows::account::demo_name(ctx, session, event).await,
            Step::AccountCreateDemoBalance => {
                flows::account::demo_balance(ctx, session, event).await
            }
            Step::AccountCreateRealName => flows::account::real_name(ctx, session, event).await,
            Step::AccountCreateRealProduct => {
                flows::account::real_product(ctx, session, event).await
            }
        }
    }

    /// Greeting interrupt: recompute where the user belongs. Known users
    /// are authenticated transparently and routed by KYC status; unknown
    /// identities fall back to language selection.
    async fn greeting(&self, mut session: Session) -> Result<Vec<OutboundMessage>, Error> {
        let linked = self
            .ctx
            .store
            .get_linked_account(&session.identity)
            .await?
            .is_some();

        if !linked {
            session.reset();
            return self.persist(session, welcome()).await;
        }

        let reply = match self.ctx.gateway.kyc_status(&session.identity).await {
            Ok(status) => route_by_kyc(&mut session, status),
            Err(err) => {
                warn!(identity = %session.identity, error = %err, "Greeting recompute failed");
                Reply::text(gateway_failure_text(&err))
            }
        };
        self.persist(session, reply).await
    }

    /// Logout interrupt: drop the account linkage and the session.
    async fn logout(&self, identity: &Identity) -> Result<Vec<OutboundMessage>, Error> {
        self.ctx.store.delete_linked_account(identity).await?;
        self.ctx.store.reset_session(identity).await?;
        info!(identity = %identity, "Logged out");
        Ok(Reply::text("You have been logged out.")
            .with_template(Template::LanguagePicker)
            .into_messages())
    }

    /// Fallback for corrupted sessions: wipe and restart at language
    /// selection with an explanatory notice.
    async fn reset_with_notice(&self, identity: &Identity) -> Result<Vec<OutboundMessage>, Error> {
        self.ctx.store.reset_session(identity).await?;
        let session = Session::bootstrap(identity.clone());
        let reply = Reply::text(
            "Sorry, we didn't understand that — your session may have expired. Let's start over.",
        )
        .with_template(Template::LanguagePicker);
        self.persist(session, reply).await
    }

    /// Durably store the session, then release the reply. A lost
    /// compare-and-swap race withholds the reply.
    async fn persist(
        &self,
        session: Session,
        reply: Reply,
    ) -> Result<Vec<OutboundMessage>, Error> {
        match self.ctx.store.upsert_session(&session).await {
            Ok(_) => Ok(reply.into_messages()),
            Err(DatabaseError::VersionConflict { identity, expected }) => {
                warn!(%identity, expected, "Concurrent session write lost");
                Ok(Reply::text(
                    "We received several messages at once — please send one at a time.",
                )
                .into_messages())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Tier-3 recovery: best-effort force of the session to the main menu.
    async fn force_main_menu(&self, identity: &Identity) {
        if let Ok(Some(mut session)) = self.ctx.store.get_session(identity).await {
            session.end_flow(Step::MainMenu);
            if let Err(err) = self.ctx.store.upsert_session(&session).await {
                warn!(identity = %identity, error = %err, "Failed to park session on main menu");
            }
        }
    }
}

fn welcome() -> Reply {
    Reply::text(menu::WELCOME).with_template(Template::LanguagePicker)
}
