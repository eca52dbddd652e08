//! Deposit and withdrawal handlers.
//!
//! The two flows share one shape: pick a payment method, enter an amount,
//! collect the method-specific extra fields, submit. Terminal outcomes —
//! success or failure — land back on the `*-options` step so the user can
//! run repeated operations without re-navigating the menu.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use crate::error::Error;
use crate::event::InboundEvent;
use crate::gateway::types::{NewTransaction, PaymentMethod, TransactionType};
use crate::outbound::{Reply, Template};
use crate::session::{FlowData, FundingDraft, Session, Step};

use super::{FlowContext, gateway_failure_text, validate};

/// Minimum deposit/withdrawal amount in dollars.
const MIN_AMOUNT: Decimal = dec!(10);

// ── Flow entry ──────────────────────────────────────────────────────

pub async fn start_deposit(ctx: &FlowContext, session: &mut Session) -> Result<Reply, Error> {
    start(ctx, session, TransactionType::Deposit).await
}

pub async fn start_withdraw(ctx: &FlowContext, session: &mut Session) -> Result<Reply, Error> {
    start(ctx, session, TransactionType::Withdrawal).await
}

/// Fetch the implicit wallet (first one returned) and the supported payment
/// methods, cache both in the draft, and show the options picker.
async fn start(
    ctx: &FlowContext,
    session: &mut Session,
    kind: TransactionType,
) -> Result<Reply, Error> {
    let wallets = match ctx.gateway.list_wallets(&session.identity).await {
        Ok(wallets) => wallets,
        Err(err) => {
            return Ok(Reply::text(gateway_failure_text(&err)).with_template(Template::MainMenu));
        }
    };
    let Some(wallet) = wallets.first() else {
        return Ok(
            Reply::text("You don't have a wallet yet. Please contact support.")
                .with_template(Template::MainMenu),
        );
    };

    let methods = match ctx.gateway.list_payment_gateways(&session.identity).await {
        Ok(gateways) => gateways
            .into_iter()
            .filter(|g| g.enabled && PaymentMethod::from_unique_name(&g.unique_name).is_some())
            .map(|g| g.unique_name)
            .collect::<Vec<_>>(),
        Err(err) => {
            return Ok(Reply::text(gateway_failure_text(&err)).with_template(Template::MainMenu));
        }
    };
    if methods.is_empty() {
        return Ok(
            Reply::text("No payment methods are available right now. Please try again later.")
                .with_template(Template::MainMenu),
        );
    }

    let mut draft = FundingDraft::default();
    draft.wallet_id = Some(wallet.id.clone());
    draft.available_methods = methods.clone();

    match kind {
        TransactionType::Deposit => {
            session.start_flow(Step::DepositOptions, FlowData::Deposit(draft));
            Ok(Reply::template(Template::DepositOptions { methods }))
        }
        TransactionType::Withdrawal => {
            session.start_flow(Step::WithdrawOptions, FlowData::Withdraw(draft));
            Ok(Reply::template(Template::WithdrawOptions { methods }))
        }
    }
}

// ── Options (method selection) ──────────────────────────────────────

pub async fn deposit_options(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    options(ctx, session, event, TransactionType::Deposit).await
}

pub async fn withdraw_options(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    options(ctx, session, event, TransactionType::Withdrawal).await
}

async fn options(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
    kind: TransactionType,
) -> Result<Reply, Error> {
    let draft = draft_mut(session, kind);
    let Some(method) = parse_method(event.input(), &draft.available_methods) else {
        let methods = draft.available_methods.clone();
        return Ok(Reply::text("Please pick one of the listed payment methods.")
            .with_template(options_template(kind, methods)));
    };

    draft.method = Some(method);
    session.step = match kind {
        TransactionType::Deposit => Step::DepositAmount,
        TransactionType::Withdrawal => Step::WithdrawAmount,
    };
    Ok(Reply::text(format!(
        "How much would you like to {}? The minimum is ${MIN_AMOUNT}.",
        verb(kind)
    )))
}

/// Resolve a picker selection: 1-based number, unique name, or button
/// payload carrying the unique name.
fn parse_method(input: &str, available: &[String]) -> Option<PaymentMethod> {
    let input = input.trim();
    if let Ok(n) = input.parse::<usize>() {
        let name = available.get(n.checked_sub(1)?)?;
        return PaymentMethod::from_unique_name(name);
    }
    available
        .iter()
        .find(|name| name.eq_ignore_ascii_case(input))
        .and_then(|name| PaymentMethod::from_unique_name(name))
}

// ── Amount ──────────────────────────────────────────────────────────

pub async fn deposit_amount(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    amount(ctx, session, event, TransactionType::Deposit).await
}

pub async fn withdraw_amount(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    amount(ctx, session, event, TransactionType::Withdrawal).await
}

async fn amount(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
    kind: TransactionType,
) -> Result<Reply, Error> {
    let parsed = validate::parse_amount(event.input());
    let Some(value) = parsed.filter(|v| *v >= MIN_AMOUNT) else {
        return Ok(Reply::text(format!(
            "The minimum {} is ${MIN_AMOUNT}. Please enter an amount of ${MIN_AMOUNT} or more.",
            verb(kind)
        )));
    };

    let draft = draft_mut(session, kind);
    draft.amount = Some(value);
    let method = draft.method;

    match (kind, method) {
        (TransactionType::Deposit, Some(PaymentMethod::BankTransfer)) => {
            session.step = Step::DepositBankName;
            Ok(Reply::text("What is the name of your bank?"))
        }
        (TransactionType::Deposit, _) => submit(ctx, session, kind).await,
        (TransactionType::Withdrawal, Some(PaymentMethod::BankTransfer)) => {
            session.step = Step::WithdrawBankName;
            Ok(Reply::text("What is the name of your bank?"))
        }
        (TransactionType::Withdrawal, Some(PaymentMethod::Match2pay)) => {
            session.step = Step::WithdrawMatch2payAddress;
            Ok(Reply::text("What address should we send the funds to?"))
        }
        (TransactionType::Withdrawal, Some(PaymentMethod::WhishMoney)) => {
            session.step = Step::WithdrawWishmoneyPhone;
            Ok(Reply::text("What phone number is your Whish Money account under?"))
        }
        (TransactionType::Withdrawal, None) => submit(ctx, session, kind).await,
    }
}

// ── Withdrawal-only extra fields ────────────────────────────────────

pub async fn withdraw_match2pay_address(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 6) {
        return Ok(Reply::text(
            "That address looks too short. What address should we send the funds to?",
        ));
    }
    session.withdraw_mut().destination_address = Some(input.trim().to_string());
    submit(ctx, session, TransactionType::Withdrawal).await
}

pub async fn withdraw_wishmoney_phone(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 6) {
        return Ok(Reply::text(
            "That phone number looks too short. Please include the country code.",
        ));
    }
    session.withdraw_mut().phone_number = Some(input.trim().to_string());
    submit(ctx, session, TransactionType::Withdrawal).await
}

// ── Bank-transfer field chain (shared shape) ────────────────────────

pub async fn deposit_bank_name(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    bank_name(ctx, session, event, TransactionType::Deposit).await
}

pub async fn withdraw_bank_name(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    bank_name(ctx, session, event, TransactionType::Withdrawal).await
}

async fn bank_name(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
    kind: TransactionType,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 2) {
        return Ok(Reply::text("What is the name of your bank?"));
    }
    draft_mut(session, kind).bank_name = Some(input.trim().to_string());
    session.step = match kind {
        TransactionType::Deposit => Step::DepositBankAddress,
        TransactionType::Withdrawal => Step::WithdrawBankAddress,
    };
    Ok(Reply::text("What is the bank's address?"))
}

pub async fn deposit_bank_address(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    bank_address(ctx, session, event, TransactionType::Deposit).await
}

pub async fn withdraw_bank_address(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    bank_address(ctx, session, event, TransactionType::Withdrawal).await
}

async fn bank_address(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
    kind: TransactionType,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 2) {
        return Ok(Reply::text("What is the bank's address?"));
    }
    draft_mut(session, kind).bank_address = Some(input.trim().to_string());
    session.step = match kind {
        TransactionType::Deposit => Step::DepositSwiftCode,
        TransactionType::Withdrawal => Step::WithdrawSwiftCode,
    };
    Ok(Reply::text("What is the SWIFT code?"))
}

pub async fn deposit_swift_code(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    swift_code(ctx, session, event, TransactionType::Deposit).await
}

pub async fn withdraw_swift_code(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    swift_code(ctx, session, event, TransactionType::Withdrawal).await
}

async fn swift_code(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
    kind: TransactionType,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 2) {
        return Ok(Reply::text("What is the SWIFT code?"));
    }
    draft_mut(session, kind).swift_code = Some(input.trim().to_string());
    session.step = match kind {
        TransactionType::Deposit => Step::DepositBeneficiaryAccount,
        TransactionType::Withdrawal => Step::WithdrawBeneficiaryAccount,
    };
    Ok(Reply::text("And the beneficiary account number?"))
}

pub async fn deposit_beneficiary_account(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    beneficiary_account(ctx, session, event, TransactionType::Deposit).await
}

pub async fn withdraw_beneficiary_account(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    beneficiary_account(ctx, session, event, TransactionType::Withdrawal).await
}

async fn beneficiary_account(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
    kind: TransactionType,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 2) {
        return Ok(Reply::text("And the beneficiary account number?"));
    }
    draft_mut(session, kind).beneficiary_account = Some(input.trim().to_string());
    submit(ctx, session, kind).await
}

// ── Submission ──────────────────────────────────────────────────────

async fn submit(
    ctx: &FlowContext,
    session: &mut Session,
    kind: TransactionType,
) -> Result<Reply, Error> {
    let draft = draft_mut(session, kind);
    let Some(method) = draft.method else {
        // Draft lost its method — restart the picker.
        return reshow_options(session, kind, "Let's start again — pick a payment method.");
    };

    let req = NewTransaction {
        wallet_id: draft.wallet_id.clone().unwrap_or_default(),
        transaction_type: kind,
        amount: draft.amount.unwrap_or_default(),
        payment_gateway: method.unique_name().to_string(),
        bank_name: draft.bank_name.clone(),
        bank_address: draft.bank_address.clone(),
        swift_code: draft.swift_code.clone(),
        beneficiary_account: draft.beneficiary_account.clone(),
        destination_address: draft.destination_address.clone(),
        phone_number: draft.phone_number.clone(),
    };
    let echo = bank_echo(draft);

    let text = match ctx.gateway.create_transaction(&session.identity, req).await {
        Ok(outcome) => {
            info!(
                identity = %session.identity,
                transaction = %outcome.id,
                method = method.unique_name(),
                "Transaction submitted"
            );
            match method {
                PaymentMethod::Match2pay | PaymentMethod::WhishMoney => {
                    match outcome.payment_url {
                        Some(url) => format!(
                            "Complete your {} here:\n{url}\n\nThe link is valid for 10–15 minutes.",
                            verb(kind)
                        ),
                        None => format!("Your {} request has been submitted.", verb(kind)),
                    }
                }
                PaymentMethod::BankTransfer => format!(
                    "Your {} request has been submitted. Payment instructions:\n{echo}",
                    verb(kind)
                ),
            }
        }
        Err(err) => {
            warn!(identity = %session.identity, error = %err, "Transaction submission failed");
            gateway_failure_text(&err)
        }
    };

    reshow_options(session, kind, &text)
}

/// Land back on the `*-options` step with the cached method list, clearing
/// the per-transaction fields.
fn reshow_options(
    session: &mut Session,
    kind: TransactionType,
    text: &str,
) -> Result<Reply, Error> {
    let draft = draft_mut(session, kind);
    let mut fresh = FundingDraft::default();
    fresh.wallet_id = draft.wallet_id.clone();
    fresh.available_methods = draft.available_methods.clone();
    let methods = fresh.available_methods.clone();
    *draft = fresh;

    session.step = match kind {
        TransactionType::Deposit => Step::DepositOptions,
        TransactionType::Withdrawal => Step::WithdrawOptions,
    };
    Ok(Reply::text(text).with_template(options_template(kind, methods)))
}

fn bank_echo(draft: &FundingDraft) -> String {
    format!(
        "Bank: {}\nAddress: {}\nSWIFT: {}\nAccount: {}",
        draft.bank_name.as_deref().unwrap_or("-"),
        draft.bank_address.as_deref().unwrap_or("-"),
        draft.swift_code.as_deref().unwrap_or("-"),
        draft.beneficiary_account.as_deref().unwrap_or("-"),
    )
}

fn draft_mut(session: &mut Session, kind: TransactionType) -> &mut FundingDraft {
    match kind {
        TransactionType::Deposit => session.deposit_mut(),
        TransactionType::Withdrawal => session.withdraw_mut(),
    }
}

fn options_template(kind: TransactionType, methods: Vec<String>) -> Template {
    match kind {
        TransactionType::Deposit => Template::DepositOptions { methods },
        TransactionType::Withdrawal => Template::WithdrawOptions { methods },
    }
}

fn verb(kind: TransactionType) -> &'static str {
    match kind {
        TransactionType::Deposit => "deposit",
        TransactionType::Withdrawal => "withdrawal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_selection_by_number_name_and_payload() {
        let available = vec![
            "match2pay".to_string(),
            "bankTransfer".to_string(),
            "whishMoney".to_string(),
        ];
        assert_eq!(parse_method("1", &available), Some(PaymentMethod::Match2pay));
        assert_eq!(
            parse_method("banktransfer", &available),
            Some(PaymentMethod::BankTransfer)
        );
        assert_eq!(
            parse_method("whishMoney", &available),
            Some(PaymentMethod::WhishMoney)
        );
        assert_eq!(parse_method("0", &available), None);
        assert_eq!(parse_method("4", &available), None);
        assert_eq!(parse_method("paypal", &available), None);
    }

    #[test]
    fn bank_echo_uses_submitted_details() {
        let mut draft = FundingDraft::default();
        draft.bank_name = Some("Byblos Bank".to_string());
        draft.swift_code = Some("BYBALBBX".to_string());
        let echo = bank_echo(&draft);
        assert!(echo.contains("Byblos Bank"));
        assert!(echo.contains("BYBALBBX"));
        assert!(echo.contains("Address: -"));
    }
}
