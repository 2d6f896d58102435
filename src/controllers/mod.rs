// src/controllers/mod.rs

pub mod auth_controller;
pub mod notification_controller;
pub mod user_controller;

use crate::error::{ApiError, ApiResult};
use crate::router::{AuthUser, RequestContext};
use crate::services::mail_service::OutgoingEmail;
use crate::state::AppState;

/// A body field that an earlier validation stage guarantees.
fn field<'c>(ctx: &'c RequestContext, name: &'static str) -> ApiResult<&'c str> {
    ctx.body_str(name).ok_or(ApiError::MissingContext(name))
}

fn param<'c>(ctx: &'c RequestContext, name: &'static str) -> ApiResult<&'c str> {
    ctx.param(name).ok_or(ApiError::MissingContext(name))
}

/// The caller attached by `auth_middleware`.
fn current_user(ctx: &RequestContext) -> ApiResult<&AuthUser> {
    ctx.user.as_ref().ok_or(ApiError::MissingContext("authenticated user"))
}

/// Sends mail without holding up the response. Failures are only logged.
fn deliver_in_background(state: &AppState, email: OutgoingEmail) {
    match &state.mailer {
        Some(mailer) => {
            let mailer = mailer.clone();
            actix_web::rt::spawn(async move {
                if let Err(e) = mailer.send(email).await {
                    log::error!("background email failed: {}", e);
                }
            });
        }
        None => log::warn!("mail is not configured; dropped \"{}\" to {}", email.subject, email.to),
    }
}

/// Sends mail and waits for the SMTP exchange to finish.
async fn deliver(state: &AppState, email: OutgoingEmail) -> ApiResult<()> {
    match &state.mailer {
        Some(mailer) => mailer.send(email).await,
        None => {
            log::warn!("mail is not configured; dropped \"{}\" to {}", email.subject, email.to);
            Ok(())
        }
    }
}
