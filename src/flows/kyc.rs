//! KYC handlers: profile fields, document uploads, and the agreement walk.

use tracing::{info, warn};

use crate::error::{Error, GatewayError};
use crate::event::InboundEvent;
use crate::gateway::types::KycSubmission;
use crate::media::DocumentKind;
use crate::outbound::{Reply, Template};
use crate::session::{Session, Step};

use super::{FlowContext, gateway_failure_text, validate};

const ACCEPT_PHRASE: &str = "i accept";
const ACCEPT_PAYLOAD: &str = "ACCEPT_AGREEMENT";
const SKIP_PAYLOAD: &str = "SKIP";

pub async fn start(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    match event.input().to_lowercase().as_str() {
        "start" | "start_kyc" | "yes" | "ok" => {
            session.step = Step::KycStreet;
            Ok(Reply::text("What is your street address?"))
        }
        "skip" => {
            session.end_flow(Step::MainMenu);
            Ok(Reply::template(Template::KycSkip).with_template(Template::MainMenu))
        }
        _ => Ok(Reply::template(Template::KycStart)),
    }
}

pub async fn street(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 5) {
        return Ok(Reply::text(
            "That address looks too short. What is your street address?",
        ));
    }
    session.kyc_mut().street = Some(input.trim().to_string());
    session.step = Step::KycCity;
    Ok(Reply::text("Which city?"))
}

pub async fn city(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 2) {
        return Ok(Reply::text("Which city? (at least 2 characters)"));
    }
    session.kyc_mut().city = Some(input.trim().to_string());
    session.step = Step::KycPostal;
    Ok(Reply::text("What is your postal code?"))
}

pub async fn postal(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 2) {
        return Ok(Reply::text("What is your postal code? (at least 2 characters)"));
    }
    session.kyc_mut().postal = Some(input.trim().to_string());
    session.step = Step::KycCountry;
    Ok(Reply::text("Which country do you live in?"))
}

pub async fn country(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 2) {
        return Ok(Reply::text("Which country? (at least 2 characters)"));
    }
    session.kyc_mut().country = Some(input.trim().to_string());
    session.step = Step::KycDob;
    Ok(Reply::text(
        "What is your date of birth? Use MM/DD/YYYY, e.g. 01/31/1990.",
    ))
}

pub async fn dob(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::valid_dob(input) {
        return Ok(Reply::text(
            "That date doesn't look right. Use MM/DD/YYYY, e.g. 01/31/1990.",
        ));
    }
    session.kyc_mut().dob = Some(input.trim().to_string());
    session.step = Step::KycUploadId;
    Ok(Reply::text(
        "Please send a photo of your government-issued ID (or a PDF scan).",
    ))
}

pub async fn upload_id(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let Some((url, content_type)) = attachment(event) else {
        return Ok(Reply::text(
            "We need an image or PDF of your ID to continue. Please send it as an attachment.",
        ));
    };

    match ctx
        .media
        .ingest(&session.identity, DocumentKind::Identity, url, content_type)
        .await
    {
        Ok(path) => {
            session.kyc_mut().id_document = Some(path.display().to_string());
            session.step = Step::KycUploadUtility;
            Ok(Reply::text(
                "Got it. Now send a recent utility bill as proof of address, or reply SKIP.",
            ))
        }
        Err(err) => {
            warn!(identity = %session.identity, error = %err, "ID document ingestion failed");
            Ok(Reply::text(
                "We couldn't read that attachment. Please send your ID as a JPEG, PNG, or PDF.",
            ))
        }
    }
}

pub async fn upload_utility(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let skipped = event.input().eq_ignore_ascii_case("skip")
        || event.button_payload.as_deref() == Some(SKIP_PAYLOAD);

    if !skipped {
        let Some((url, content_type)) = attachment(event) else {
            return Ok(Reply::text(
                "Send the utility bill as an attachment, or reply SKIP to continue without it.",
            ));
        };
        match ctx
            .media
            .ingest(&session.identity, DocumentKind::UtilityBill, url, content_type)
            .await
        {
            Ok(path) => {
                session.kyc_mut().utility_document = Some(path.display().to_string());
            }
            Err(err) => {
                warn!(identity = %session.identity, error = %err, "Utility document ingestion failed");
                return Ok(Reply::text(
                    "We couldn't read that attachment. Please send a JPEG, PNG, or PDF — or reply SKIP.",
                ));
            }
        }
    }

    submit_profile(ctx, session).await
}

/// Submit the completed profile + documents, then snapshot the agreement
/// list for the acceptance walk.
async fn submit_profile(ctx: &FlowContext, session: &mut Session) -> Result<Reply, Error> {
    let draft = session.kyc_mut();
    let submission = KycSubmission {
        street: draft.street.clone().unwrap_or_default(),
        city: draft.city.clone().unwrap_or_default(),
        postal_code: draft.postal.clone().unwrap_or_default(),
        country: draft.country.clone().unwrap_or_default(),
        date_of_birth: draft.dob.clone().unwrap_or_default(),
        id_document: draft.id_document.clone().unwrap_or_default(),
        utility_document: draft.utility_document.clone(),
    };

    if let Err(err) = ctx.gateway.submit_kyc(&session.identity, submission).await {
        warn!(identity = %session.identity, error = %err, "KYC profile submission failed");
        return Ok(Reply::text(gateway_failure_text(&err)).with_text(
            "Send the utility bill again, or reply SKIP to retry without it.",
        ));
    }

    // Agreement snapshot is captured once per KYC pass.
    let agreements = match ctx.gateway.list_agreements(&session.identity).await {
        Ok(list) => list,
        Err(err) => {
            warn!(identity = %session.identity, error = %err, "Agreement fetch failed");
            return Ok(Reply::text(gateway_failure_text(&err)).with_text(
                "Send the utility bill again, or reply SKIP to retry without it.",
            ));
        }
    };

    info!(
        identity = %session.identity,
        agreements = agreements.len(),
        "KYC profile submitted"
    );

    if agreements.is_empty() {
        return finalize(ctx, session).await;
    }

    let titles: Vec<String> = agreements
        .iter()
        .enumerate()
        .map(|(i, a)| format!("{}. {}", i + 1, a.title))
        .collect();
    let draft = session.kyc_mut();
    draft.agreements = agreements;
    draft.current_agreement_index = 0;
    session.step = Step::KycAgreements;

    Ok(Reply::text(format!(
        "Your profile has been submitted. Before we finish, please review our agreements:\n{}\n\nReply OK to begin.",
        titles.join("\n")
    )))
}

pub async fn agreements(
    _ctx: &FlowContext,
    session: &mut Session,
    _event: &InboundEvent,
) -> Result<Reply, Error> {
    let Some(current) = session.kyc_mut().current_agreement().cloned() else {
        // Snapshot is empty — nothing left to accept.
        session.step = Step::KycAcceptTerms;
        return Ok(Reply::text("Reply I ACCEPT to continue."));
    };
    session.step = Step::KycAcceptTerms;
    Ok(prompt_for(&current.title))
}

pub async fn accept_terms(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let accepted = event.input().eq_ignore_ascii_case(ACCEPT_PHRASE)
        || event.button_payload.as_deref() == Some(ACCEPT_PAYLOAD);

    let Some(current) = session.kyc_mut().current_agreement().cloned() else {
        return finalize(ctx, session).await;
    };

    if !accepted {
        return Ok(prompt_for(&current.title));
    }

    if let Err(err) = ctx
        .gateway
        .accept_agreement(&session.identity, &current.id)
        .await
    {
        warn!(identity = %session.identity, agreement = %current.id, error = %err, "Agreement acceptance failed");
        return Ok(Reply::text(gateway_failure_text(&err)));
    }

    // The advanced index is persisted (by the dispatcher) before the next
    // agreement is shown.
    let draft = session.kyc_mut();
    draft.current_agreement_index += 1;
    match draft.current_agreement().cloned() {
        Some(next) => Ok(prompt_for(&next.title)),
        None => finalize(ctx, session).await,
    }
}

/// Completion: success and failure both land on the main menu — failure
/// with a rejection-specific or generic message depending on status code.
async fn finalize(ctx: &FlowContext, session: &mut Session) -> Result<Reply, Error> {
    match ctx.gateway.complete_kyc(&session.identity).await {
        Ok(()) => {
            info!(identity = %session.identity, "KYC completed");
            session.end_flow(Step::MainMenu);
            Ok(Reply::text(
                "Congratulations — your identity has been verified! Your dashboard is ready.",
            )
            .with_template(Template::MainMenu))
        }
        Err(err) => {
            warn!(identity = %session.identity, error = %err, "KYC completion failed");
            session.end_flow(Step::MainMenu);
            let text = match err.status() {
                Some(status) if (400..500).contains(&status) => {
                    "Your verification could not be approved. \
                     Please contact support for details."
                }
                _ => "We couldn't finish your verification right now. Please try again later.",
            };
            Ok(Reply::text(text).with_template(Template::MainMenu))
        }
    }
}

/// `kyc-complete` — holding state for pending/rejected applications.
/// Re-checks status on every message.
pub async fn complete(
    ctx: &FlowContext,
    session: &mut Session,
    _event: &InboundEvent,
) -> Result<Reply, Error> {
    match ctx.gateway.kyc_status(&session.identity).await {
        Ok(status) => Ok(super::route_by_kyc(session, status)),
        Err(err) => Ok(Reply::text(gateway_failure_text(&err))),
    }
}

fn prompt_for(title: &str) -> Reply {
    Reply::text(format!("*{title}*\n\nReply I ACCEPT to accept this agreement."))
}

fn attachment(event: &InboundEvent) -> Option<(&str, &str)> {
    if !event.has_media() {
        return None;
    }
    Some((
        event.media_url.as_deref()?,
        event.media_content_type.as_deref().unwrap_or("application/octet-stream"),
    ))
}
