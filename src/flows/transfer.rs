//! Internal transfer handlers.
//!
//! Source selection offers one combined numbered list — wallets first, then
//! trading accounts. The destination list is constrained to the
//! complementary type, so the directional gateway call is fully determined
//! by the source kind.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use crate::error::Error;
use crate::event::InboundEvent;
use crate::gateway::types::{TradingAccountKind, TransferRequest};
use crate::outbound::{Reply, Template};
use crate::session::{EndpointKind, FlowData, Session, Step, TransferDraft, TransferEndpoint};

use super::{FlowContext, gateway_failure_text, validate};

/// Minimum transfer amount.
const MIN_AMOUNT: Decimal = dec!(0.01);

const CONFIRM_PAYLOAD: &str = "CONFIRM_TRANSFER";
const CANCEL_PAYLOAD: &str = "CANCEL_TRANSFER";

/// Flow entry: fetch wallets and real trading accounts, cache the combined
/// list (balances included), and ask for the source.
pub async fn start(ctx: &FlowContext, session: &mut Session) -> Result<Reply, Error> {
    let wallets = match ctx.gateway.list_wallets(&session.identity).await {
        Ok(wallets) => wallets,
        Err(err) => {
            return Ok(Reply::text(gateway_failure_text(&err)).with_template(Template::MainMenu));
        }
    };
    let accounts = match ctx
        .gateway
        .list_accounts(&session.identity, TradingAccountKind::Real)
        .await
    {
        Ok(accounts) => accounts,
        Err(err) => {
            return Ok(Reply::text(gateway_failure_text(&err)).with_template(Template::MainMenu));
        }
    };

    if wallets.is_empty() || accounts.is_empty() {
        return Ok(Reply::text(
            "You need at least one wallet and one trading account to transfer between them.",
        )
        .with_template(Template::MainMenu));
    }

    let mut endpoints: Vec<TransferEndpoint> = wallets
        .iter()
        .map(|w| TransferEndpoint {
            kind: EndpointKind::Wallet,
            id: w.id.clone(),
            label: format!("{} wallet", w.currency),
            balance: w.balance,
        })
        .collect();
    let wallet_count = endpoints.len();
    endpoints.extend(accounts.iter().map(|a| TransferEndpoint {
        kind: EndpointKind::TradingAccount,
        id: a.id.clone(),
        label: a.name.clone(),
        balance: a.balance,
    }));

    let listing = numbered(&endpoints);
    let mut draft = TransferDraft::default();
    draft.endpoints = endpoints;
    draft.wallet_count = wallet_count;
    session.start_flow(Step::TransferSelectSource, FlowData::Transfer(draft));

    Ok(Reply::text(format!(
        "Where should the money come from?\n{listing}\n\nReply with a number."
    )))
}

pub async fn select_source(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let draft = session.transfer_mut();
    let Some(index) = parse_index(event.input(), draft.endpoints.len()) else {
        let listing = numbered(&draft.endpoints);
        return Ok(Reply::text(format!(
            "Please reply with one of the listed numbers.\n{listing}"
        )));
    };

    // Index arithmetic over the combined list: wallets occupy the first
    // `wallet_count` slots, accounts the rest.
    let source = draft.endpoints[index].clone();
    let complement = if index < draft.wallet_count {
        EndpointKind::TradingAccount
    } else {
        EndpointKind::Wallet
    };

    let destinations: Vec<TransferEndpoint> = draft
        .endpoints
        .iter()
        .filter(|e| e.kind == complement)
        .cloned()
        .collect();

    draft.source = Some(source.clone());
    draft.destinations = destinations;
    let listing = numbered(&draft.destinations);
    session.step = Step::TransferSelectDestination;

    Ok(Reply::text(format!(
        "From {} (balance {}). Where should it go?\n{listing}\n\nReply with a number.",
        source.label, source.balance
    )))
}

pub async fn select_destination(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let draft = session.transfer_mut();
    let Some(index) = parse_index(event.input(), draft.destinations.len()) else {
        let listing = numbered(&draft.destinations);
        return Ok(Reply::text(format!(
            "Please reply with one of the listed numbers.\n{listing}"
        )));
    };

    let destination = draft.destinations[index].clone();
    draft.destination = Some(destination);
    let balance = draft.source.as_ref().map(|s| s.balance).unwrap_or_default();
    session.step = Step::TransferAmount;

    Ok(Reply::text(format!(
        "How much would you like to transfer? You can send between {MIN_AMOUNT} and {balance}."
    )))
}

pub async fn amount(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let draft = session.transfer_mut();
    // Bounded by the balance cached at selection time.
    let available = draft.source.as_ref().map(|s| s.balance).unwrap_or_default();

    let Some(value) = validate::parse_amount(event.input()) else {
        return Ok(Reply::text("Please enter a numeric amount."));
    };
    if value < MIN_AMOUNT {
        return Ok(Reply::text(format!(
            "The minimum transfer is {MIN_AMOUNT}. Please enter a larger amount."
        )));
    }
    if value > available {
        return Ok(Reply::text(format!(
            "Insufficient balance: only {available} is available. Please enter a smaller amount."
        )));
    }

    draft.amount = Some(value);
    let summary = format!(
        "{value} from {} to {}",
        draft.source.as_ref().map(|s| s.label.as_str()).unwrap_or("-"),
        draft
            .destination
            .as_ref()
            .map(|d| d.label.as_str())
            .unwrap_or("-"),
    );
    session.step = Step::TransferConfirmation;

    Ok(Reply::template(Template::TransferConfirmation { summary })
        .with_text("Reply 1 to confirm or 2 to cancel."))
}

/// Confirmation accepts exactly confirm/cancel inputs; anything else aborts
/// to the main menu with an invalid-selection notice rather than
/// re-prompting.
pub async fn confirmation(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input().to_lowercase();
    let confirmed =
        input == "1" || input == "confirm" || event.button_payload.as_deref() == Some(CONFIRM_PAYLOAD);
    let cancelled =
        input == "2" || input == "cancel" || event.button_payload.as_deref() == Some(CANCEL_PAYLOAD);

    if cancelled {
        session.end_flow(Step::MainMenu);
        return Ok(Reply::text("Transfer cancelled.").with_template(Template::MainMenu));
    }
    if !confirmed {
        session.end_flow(Step::MainMenu);
        return Ok(Reply::text("Invalid selection.").with_template(Template::MainMenu));
    }

    let draft = session.transfer_mut();
    let (Some(source), Some(destination), Some(value)) = (
        draft.source.clone(),
        draft.destination.clone(),
        draft.amount,
    ) else {
        session.end_flow(Step::MainMenu);
        return Ok(Reply::text("This transfer is no longer available.")
            .with_template(Template::MainMenu));
    };

    let req = TransferRequest {
        source_id: source.id.clone(),
        destination_id: destination.id.clone(),
        amount: value,
    };

    // Directional pairing: the destination constraint makes any other
    // combination structurally unreachable.
    let result = match source.kind {
        EndpointKind::Wallet => ctx.gateway.transfer_from_wallet(&session.identity, req).await,
        EndpointKind::TradingAccount => {
            ctx.gateway.transfer_from_account(&session.identity, req).await
        }
    };

    session.end_flow(Step::MainMenu);
    match result {
        Ok(()) => {
            info!(
                identity = %session.identity,
                source = %source.id,
                destination = %destination.id,
                %value,
                "Transfer submitted"
            );
            Ok(Reply::text(format!(
                "Done! {value} has been transferred from {} to {}.",
                source.label, destination.label
            ))
            .with_template(Template::MainMenu))
        }
        Err(err) => {
            warn!(identity = %session.identity, error = %err, "Transfer failed");
            Ok(Reply::text(gateway_failure_text(&err)).with_template(Template::MainMenu))
        }
    }
}

/// Parse a 1-based list selection into a 0-based index.
fn parse_index(input: &str, len: usize) -> Option<usize> {
    let n: usize = input.trim().parse().ok()?;
    let index = n.checked_sub(1)?;
    (index < len).then_some(index)
}

fn numbered(endpoints: &[TransferEndpoint]) -> String {
    endpoints
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. {} (balance {})", i + 1, e.label, e.balance))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(kind: EndpointKind, id: &str) -> TransferEndpoint {
        TransferEndpoint {
            kind,
            id: id.to_string(),
            label: id.to_string(),
            balance: dec!(100),
        }
    }

    #[test]
    fn index_parsing_is_one_based_and_bounded() {
        assert_eq!(parse_index("1", 3), Some(0));
        assert_eq!(parse_index(" 3 ", 3), Some(2));
        assert_eq!(parse_index("0", 3), None);
        assert_eq!(parse_index("4", 3), None);
        assert_eq!(parse_index("first", 3), None);
    }

    #[test]
    fn numbered_listing_shows_balances() {
        let list = numbered(&[
            endpoint(EndpointKind::Wallet, "USD wallet"),
            endpoint(EndpointKind::TradingAccount, "MT-1001"),
        ]);
        assert!(list.starts_with("1. USD wallet (balance 100)"));
        assert!(list.contains("2. MT-1001"));
    }
}
