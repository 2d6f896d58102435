// src/controllers/notification_controller.rs

use actix_web::http::StatusCode;
use futures::{stream, StreamExt, TryStreamExt};
use mongodb::bson::doc;
use serde_json::json;

use crate::error::ApiError;
use crate::models::user::UserModel;
use crate::router::{Reply, RequestContext, StageFuture};
use crate::services::mail_service;
use crate::state::AppState;

/// How many notification mails may be in flight at once.
const SEND_CONCURRENCY: usize = 5;

/// POST /notifications/blog
/// Mails a new-post announcement to every verified user.
pub fn send_blog_notification<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let (title, url) = match (ctx.body_str("title"), ctx.body_str("url")) {
            (Some(t), Some(u)) => (t, u),
            _ => return Ok(Reply::failure(StatusCode::BAD_REQUEST, "Title and url are required")),
        };
        let excerpt = ctx.body_str("excerpt");

        let mailer = match &state.mailer {
            Some(m) => m.clone(),
            None => {
                return Ok(Reply::failure(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Email service is not configured",
                ))
            }
        };

        let recipients: Vec<UserModel> = state
            .users_collection
            .find(doc! { "email_verified": true }, None)
            .await?
            .try_collect()
            .await?;
        let total = recipients.len();

        let results: Vec<bool> = stream::iter(recipients)
            .map(|user| {
                let mailer = mailer.clone();
                let email = mail_service::blog_notification_email(&user.email, &user.username, title, excerpt, url);
                async move {
                    match mailer.send(email).await {
                        Ok(()) => true,
                        Err(e) => {
                            log::warn!("blog notification to {} failed: {}", user.email, e);
                            false
                        }
                    }
                }
            })
            .buffer_unordered(SEND_CONCURRENCY)
            .collect()
            .await;

        let sent = results.iter().filter(|ok| **ok).count();
        log::info!("blog notification \"{}\": {}/{} delivered", title, sent, total);
        Ok(Reply::ok(
            "Blog notification sent",
            json!({ "recipients": total, "sent": sent, "failed": total - sent }),
        ))
    })
}

/// POST /test-email
/// Diagnostic endpoint. It calls an email collaborator that is never bound in
/// this service, so every invocation fails.
pub fn test_email<'a>(_state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let to = ctx.body_str("to").unwrap_or("<configured sender>");
        log::info!("Testing email to: {}", to);
        Err::<Reply, _>(ApiError::UndefinedCollaborator("emailService"))
    })
}
