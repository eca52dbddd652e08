//! Language selection and the main-menu hub.

use tracing::info;

use crate::error::Error;
use crate::event::InboundEvent;
use crate::outbound::{Reply, Template};
use crate::session::{FlowData, Language, LoginDraft, Session, SignupDraft, Step};

use super::{FlowContext, account, funding, gateway_failure_text, route_by_kyc, transfer};

/// Greeting line sent with the language picker on first contact.
pub const WELCOME: &str = "Welcome to Fin Assist — your trading companion.";

/// `language-selection` — the only state that suppresses global interrupts:
/// a supported language must be confirmed before any other command counts.
pub async fn language_selection(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let Some(language) = Language::parse(event.input()) else {
        return Ok(Reply::text("Please pick one of the supported languages.")
            .with_template(Template::LanguagePicker));
    };

    session.language = Some(language);
    info!(identity = %session.identity, ?language, "Language confirmed");

    // Known registered users are authenticated transparently and routed by
    // KYC status; everyone else gets the login / sign-up choice.
    match ctx.store.get_linked_account(&session.identity).await? {
        Some(_) => match ctx.gateway.kyc_status(&session.identity).await {
            Ok(status) => Ok(route_by_kyc(session, status)),
            Err(err) => {
                session.end_flow(Step::MainMenu);
                Ok(Reply::text(gateway_failure_text(&err)).with_template(Template::AuthChoice))
            }
        },
        None => {
            session.end_flow(Step::MainMenu);
            Ok(Reply::text("Great, you are all set.").with_template(Template::AuthChoice))
        }
    }
}

/// `main-menu` — the loop hub every flow eventually returns to.
///
/// Unlinked identities see the login / sign-up choice; linked identities
/// see the financial menu. History and referral are served inline without
/// leaving this step.
pub async fn main_menu(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let linked = ctx
        .store
        .get_linked_account(&session.identity)
        .await?
        .is_some();
    let input = event.input().to_lowercase();

    if !linked {
        return match input.as_str() {
            "1" | "login" | "log in" => {
                session.start_flow(Step::LoginEmail, FlowData::Login(LoginDraft::default()));
                Ok(Reply::text("Please enter your email address."))
            }
            "2" | "signup" | "sign up" | "register" => {
                session.start_flow(Step::SignupFirstName, FlowData::Signup(SignupDraft::default()));
                Ok(Reply::text("Let's create your account. What is your first name?"))
            }
            _ => Ok(Reply::text("Please choose an option to continue.")
                .with_template(Template::AuthChoice)),
        };
    }

    match input.as_str() {
        "1" | "deposit" => funding::start_deposit(ctx, session).await,
        "2" | "withdraw" => funding::start_withdraw(ctx, session).await,
        "3" | "transfer" => transfer::start(ctx, session).await,
        "4" | "create account" | "create_account" => {
            Ok(Reply::template(Template::TradingAccountCreate))
        }
        "create_demo" | "demo" => Ok(account::start_demo(session)),
        "create_real" | "real" => Ok(account::start_real(session)),
        "5" | "history" => history(ctx, session).await,
        "6" | "referral" => referral(ctx, session).await,
        _ => Ok(Reply::text("Sorry, I didn't get that. Here is what I can do:")
            .with_template(Template::MainMenu)),
    }
}

async fn history(ctx: &FlowContext, session: &Session) -> Result<Reply, Error> {
    match ctx.gateway.transaction_history(&session.identity).await {
        Ok(records) if records.is_empty() => {
            Ok(Reply::text("You have no transactions yet.").with_template(Template::MainMenu))
        }
        Ok(records) => {
            let lines: Vec<String> = records
                .iter()
                .take(5)
                .map(|r| {
                    format!(
                        "{} ${} — {} ({})",
                        match r.transaction_type {
                            crate::gateway::types::TransactionType::Deposit => "Deposit",
                            crate::gateway::types::TransactionType::Withdrawal => "Withdrawal",
                        },
                        r.amount,
                        r.status,
                        r.created_at.format("%Y-%m-%d")
                    )
                })
                .collect();
            Ok(
                Reply::text(format!("Your recent transactions:\n{}", lines.join("\n")))
                    .with_template(Template::MainMenu),
            )
        }
        Err(err) => Ok(Reply::text(gateway_failure_text(&err)).with_template(Template::MainMenu)),
    }
}

async fn referral(ctx: &FlowContext, session: &Session) -> Result<Reply, Error> {
    match ctx.gateway.referral_link(&session.identity).await {
        Ok(url) => Ok(
            Reply::text(format!("Share your referral link:\n{url}"))
                .with_template(Template::MainMenu),
        ),
        Err(err) => Ok(Reply::text(gateway_failure_text(&err)).with_template(Template::MainMenu)),
    }
}
