//! Signup and login handlers.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{Error, GatewayError};
use crate::event::InboundEvent;
use crate::gateway::types::SignupRequest;
use crate::outbound::Reply;
use crate::session::{Sensitive, Session, SignupDraft, Step};
use crate::store::LinkedAccount;

use super::{FlowContext, gateway_failure_text, route_by_kyc, validate};

// ── Signup wizard ───────────────────────────────────────────────────

pub async fn signup_first_name(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 2) {
        return Ok(Reply::text(
            "That name looks too short. What is your first name?",
        ));
    }
    session.signup_mut().first_name = Some(input.trim().to_string());
    session.step = Step::SignupLastName;
    Ok(Reply::text("And your last name?"))
}

pub async fn signup_last_name(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 2) {
        return Ok(Reply::text(
            "That name looks too short. What is your last name?",
        ));
    }
    session.signup_mut().last_name = Some(input.trim().to_string());
    session.step = Step::SignupEmail;
    Ok(Reply::text("What email address should we use?"))
}

pub async fn signup_email(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::valid_email(input) {
        return Ok(Reply::text(
            "That doesn't look like a valid email address. Please try again.",
        ));
    }
    session.signup_mut().email = Some(input.trim().to_lowercase());
    session.step = Step::SignupPhone;
    Ok(Reply::text(
        "What phone number should we put on the account? Include the country code.",
    ))
}

pub async fn signup_phone(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::min_len(input, 6) {
        return Ok(Reply::text(
            "That phone number looks too short. Please include the country code.",
        ));
    }
    session.signup_mut().phone = Some(input.trim().to_string());
    session.step = Step::SignupPassword;
    Ok(Reply::text(
        "Choose a password: at least 6 characters with an uppercase letter, \
         a digit, and one of ! @ # $ & *.",
    ))
}

pub async fn signup_password(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::valid_password(input) {
        return Ok(Reply::text(
            "That password doesn't meet the policy: at least 6 characters with \
             an uppercase letter, a digit, and one of ! @ # $ & *.",
        ));
    }
    session.signup_mut().password = Some(Sensitive::new(input));
    session.step = Step::SignupConfirmPassword;
    Ok(Reply::text("Please type the password once more to confirm."))
}

pub async fn signup_confirm_password(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    let matches = session
        .signup_mut()
        .password
        .as_ref()
        .is_some_and(|p| p.expose() == input);
    if !matches {
        return Ok(Reply::text(
            "The passwords don't match. Please type the password once more to confirm.",
        ));
    }
    session.step = Step::SignupReview;
    Ok(review_summary(session.signup_mut()))
}

pub async fn signup_review(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    match event.input().to_lowercase().as_str() {
        "confirm" => {}
        "restart" => {
            // Restart discards the whole draft, password included.
            session.data = crate::session::FlowData::Signup(SignupDraft::default());
            session.step = Step::SignupFirstName;
            return Ok(Reply::text(
                "Okay, starting over. What is your first name?",
            ));
        }
        _ => return Ok(review_summary(session.signup_mut())),
    }

    let draft = session.signup_mut();
    let Some(password) = draft.password.as_ref() else {
        // Draft lost its password (should not happen mid-wizard); restart.
        session.data = crate::session::FlowData::Signup(SignupDraft::default());
        session.step = Step::SignupFirstName;
        return Ok(Reply::text(
            "Something went wrong with your draft. Let's start over — what is your first name?",
        ));
    };

    let req = SignupRequest {
        name: draft.full_name(),
        email: draft.email.clone().unwrap_or_default(),
        password: password.expose().to_string(),
        phone_number: draft.phone.clone().unwrap_or_default(),
    };

    match ctx.gateway.signup(req).await {
        Ok(()) => {
            info!(identity = %session.identity, "Signup completed");
            // Success clears the draft (and with it the password).
            session.end_flow(Step::MainMenu);
            Ok(Reply::text(
                "Your account has been created! Log in to continue.",
            )
            .with_template(crate::outbound::Template::AuthChoice))
        }
        Err(GatewayError::Conflict(_)) => Ok(Reply::text(
            "An account with that email already exists. \
             Reply CONFIRM to try again or RESTART to start over.",
        )),
        Err(err) => {
            warn!(identity = %session.identity, error = %err, "Signup failed");
            Ok(
                Reply::text(format!("We couldn't create your account: {err}"))
                    .with_text("Reply CONFIRM to try again or RESTART to start over."),
            )
        }
    }
}

fn review_summary(draft: &SignupDraft) -> Reply {
    Reply::text(format!(
        "Here is what we have:\n\
         Name: {}\n\
         Email: {}\n\
         Phone: {}\n\n\
         Reply CONFIRM to create your account or RESTART to start over.",
        draft.full_name(),
        draft.email.as_deref().unwrap_or_default(),
        draft.phone.as_deref().unwrap_or_default(),
    ))
}

// ── Login ───────────────────────────────────────────────────────────

pub async fn login_email(
    _ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let input = event.input();
    if !validate::valid_email(input) {
        return Ok(Reply::text(
            "That doesn't look like a valid email address. Please enter your email.",
        ));
    }
    session.login_mut().email = Some(input.trim().to_lowercase());
    session.step = Step::LoginPassword;
    Ok(Reply::text("And your password?"))
}

pub async fn login_password(
    ctx: &FlowContext,
    session: &mut Session,
    event: &InboundEvent,
) -> Result<Reply, Error> {
    let password = event.input();
    if password.chars().count() < 6 {
        return Ok(Reply::text(
            "Passwords are at least 6 characters. Please try again.",
        ));
    }

    let email = session.login_mut().email.clone().unwrap_or_default();
    match ctx.gateway.login(&session.identity, &email, password).await {
        Ok(auth) => {
            let now = Utc::now();
            ctx.store
                .upsert_linked_account(&LinkedAccount {
                    identity: session.identity.clone(),
                    email,
                    login_secret: Sensitive::new(password),
                    crm_user_id: auth.user_id.clone(),
                    created_at: now,
                    updated_at: now,
                })
                .await?;
            info!(identity = %session.identity, user = %auth.user_id, "Login succeeded");
            Ok(route_by_kyc(session, auth.kyc_status))
        }
        Err(err) => {
            warn!(identity = %session.identity, error = %err, "Login failed");
            // Invalid credentials and transport failures both restart the
            // login wizard from the email prompt.
            session.login_mut().email = None;
            session.step = Step::LoginEmail;
            let text = match err {
                GatewayError::Unauthorized => {
                    "Those credentials didn't match. Let's try again — what is your email?"
                        .to_string()
                }
                other => format!(
                    "{} Let's try again — what is your email?",
                    gateway_failure_text(&other)
                ),
            };
            Ok(Reply::text(text))
        }
    }
}
