//! Demo and real trading-account creation.

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::error::Error;
use crate::event::InboundEvent;
use crate::gateway::types::{NewTradingAccount, TradingAccountKind};
use crate::outbound::{Reply, Template};
use crate::session::{AccountDraft, FlowData, Session, Step};

use super::{FlowContext, validate};

/// Product labels offered for real accounts, mapped to the CRM's opaque
/// product identifiers.
const PRODUCTS: &[(&str, &str)] = &[("Standard", "prod-std-001"), ("Pro", "prod-pro-001")];

pub fn start_demo(session: &mut Session) -> Reply {
    let draft = AccountDraft {
        kind: TradingAccountKind::Demo,
        ..Default::default()
    };
    session.start_flow(Step::AccountCreateDemoName, FlowData::Account(draft));
    Reply::text("What should we call your demo account?")
}

pub fn start_real(session: &mut Session) -> Reply {
    let draft = AccountDraft {
        kind: TradingAccountKind::Real,
        ..Default::default()
    };
    session.start_flow(Step::AccountCreateRealName, FlowData::Account(draft));
    Reply::text("What should we call your trading account?")
}

pub async fn demo_name(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 2) {
        return Ok(Reply::text(
            "That name looks too short. What should we call your demo account?",
        ));
    }
    session.account_mut().name = Some(input.trim().to_string());
    session.step = Step::AccountCreateDemoBalance;
    Ok(Reply::text(
        "What starting balance would you like? (virtual funds, e.g. 10000)",
    ))
}

pub async fn demo_balance(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let Some(balance) = validate::parse_amount(event.input()).filter(|v| *v > Decimal::ZERO)
    else {
        return Ok(Reply::text(
            "Please enter a positive number for the starting balance.",
        ));
    };

    let draft = session.account_mut();
    draft.balance = Some(balance);
    let req = NewTradingAccount {
        name: draft.name.clone().unwrap_or_default(),
        balance: Some(balance),
        product_id: None,
    };
    create(ctx, session, TradingAccountKind::Demo, req).await
}

pub async fn real_name(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 2) {
        return Ok(Reply::text(
            "That name looks too short. What should we call your trading account?",
        ));
    }
    session.account_mut().name = Some(input.trim().to_string());
    session.step = Step::AccountCreateRealProduct;
    Ok(Reply::text(format!(
        "Which product would you like?\n{}",
        product_listing()
    )))
}

pub async fn real_product(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let Some(product_id) = parse_product(event.input()) else {
        return Ok(Reply::text(format!(
            "Please pick one of the listed products.\n{}",
            product_listing()
        )));
    };

    let draft = session.account_mut();
    draft.product_id = Some(product_id.to_string());
    let req = NewTradingAccount {
        name: draft.name.clone().unwrap_or_default(),
        balance: None,
        product_id: Some(product_id.to_string()),
    };
    create(ctx, session, TradingAccountKind::Real, req).await
}

/// Submit the account creation; both chains return to the main menu
/// regardless of outcome, surfacing the raw gateway error text on failure.
async fn create(
    ctx: &FlowContext,
    session: &mut Session,
    kind: TradingAccountKind,
    req: NewTradingAccount,
) -> Result<Reply, Error> {
    let text = match ctx.gateway.create_trading_account(&session.identity, kind, req).await {
        Ok(account) => {
            info!(
                identity = %session.identity,
                account = %account.id,
                kind = kind.as_str(),
                "Trading account created"
            );
            format!(
                "Your {} account \"{}\" is ready (id {}).",
                kind.as_str(),
                account.name,
                account.id
            )
        }
        Err(err) => {
            warn!(identity = %session.identity, error = %err, "Trading-account creation failed");
            format!("We couldn't create the account: {err}")
        }
    };

    session.end_flow(Step::MainMenu);
    Ok(Reply::text(text).with_template(Template::MainMenu))
}

fn product_listing() -> String {
    PRODUCTS
        .iter()
        .enumerate()
        .map(|(i, (label, _))| format!("{}. {label}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_product(input: &str) -> Option<&'static str> {
    let input = input.trim();
    if let Ok(n) = input.parse::<usize>() {
        return PRODUCTS.get(n.checked_sub(1)?).map(|(_, id)| *id);
    }
    PRODUCTS
        .iter()
        .find(|(label, _)| label.eq_ignore_ascii_case(input))
        .map(|(_, id)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_selection_by_number_and_label() {
        assert_eq!(parse_product("1"), Some("prod-std-001"));
        assert_eq!(parse_product("pro"), Some("prod-pro-001"));
        assert_eq!(parse_product("Standard"), Some("prod-std-001"));
        assert_eq!(parse_product("3"), None);
        assert_eq!(parse_product("gold"), None);
    }
}
