// src/controllers/user_controller.rs

use actix_web::http::StatusCode;
use chrono::Duration;
use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime, Document};
use mongodb::options::FindOptions;
use serde_json::json;

use super::{current_user, deliver_in_background, param};
use crate::middleware::validation::{validate_email, validate_password, validate_username};
use crate::models::user::{Role, UserModel};
use crate::router::{Reply, RequestContext, StageFuture};
use crate::services::{auth_service, mail_service};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;

fn user_not_found() -> Reply {
    Reply::failure(StatusCode::NOT_FOUND, "User not found")
}

/// Reads `page` and `limit` from the query string. Out-of-range values are clamped.
fn pagination(ctx: &RequestContext) -> (u64, u64) {
    let read = |name: &str| ctx.query.get(name).and_then(|v| v.parse::<u64>().ok());
    let page = read("page").unwrap_or(1).max(1);
    let limit = read("limit").unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

/// Documents to skip for a page. Saturates at the largest skip MongoDB accepts
/// (a signed 64-bit count) instead of overflowing.
fn page_offset(page: u64, limit: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(limit).min(i64::MAX as u64)
}

/// GET /
/// Lists users newest first, one page at a time.
pub fn get_all_users<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let (page, limit) = pagination(ctx);
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(page_offset(page, limit))
            .limit(limit as i64)
            .build();

        let users: Vec<UserModel> = state
            .users_collection
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        let total = state.users_collection.count_documents(None, None).await?;

        Ok(Reply::ok(
            "Users retrieved successfully",
            json!({
                "users": users.iter().map(UserModel::to_response).collect::<Vec<_>>(),
                "pagination": {
                    "page": page,
                    "limit": limit,
                    "total": total,
                    "pages": (total + limit - 1) / limit,
                }
            }),
        ))
    })
}

/// GET /:id
pub fn find_by_id<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let id = param(ctx, "id")?;
        match auth_service::get_user_by_id(&state.users_collection, id).await? {
            Some(user) => Ok(Reply::ok(
                "User retrieved successfully",
                json!({ "user": user.to_response() }),
            )),
            None => Ok(user_not_found()),
        }
    })
}

/// PUT /:id
/// Updates username and email. Only administrators may change a role. A new
/// email address must be re-verified.
pub fn update_user<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let id = param(ctx, "id")?;
        let caller = current_user(ctx)?;

        let existing = match auth_service::get_user_by_id(&state.users_collection, id).await? {
            Some(u) => u,
            None => return Ok(user_not_found()),
        };

        let mut changes = Document::new();
        let mut errors: Vec<String> = Vec::new();
        let mut email_changed = false;

        if let Some(username) = ctx.body_str("username") {
            match validate_username(username) {
                Ok(()) => {
                    changes.insert("username", username);
                }
                Err(e) => errors.push(e.to_string()),
            }
        }

        if let Some(email) = ctx.body_str("email") {
            let email = email.to_lowercase();
            if let Err(e) = validate_email(&email) {
                errors.push(e.to_string());
            } else if email != existing.email {
                if auth_service::get_user(&state.users_collection, &email).await?.is_some() {
                    return Ok(Reply::failure(StatusCode::CONFLICT, "Email is already in use"));
                }
                changes.insert("email", email);
                changes.insert("email_verified", false);
                email_changed = true;
            }
        }

        if let Some(role) = ctx.body_str("role") {
            if !caller.is_admin() {
                return Ok(Reply::failure(StatusCode::FORBIDDEN, "Only admins can change user roles"));
            }
            match Role::parse(role) {
                Some(role) => {
                    changes.insert("role", role.as_str());
                }
                None => errors.push("Role must be either user or admin".to_string()),
            }
        }

        if !errors.is_empty() {
            return Ok(Reply::json(
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": "Validation failed", "errors": errors }),
            ));
        }
        if changes.is_empty() {
            return Ok(Reply::failure(StatusCode::BAD_REQUEST, "No valid fields to update"));
        }

        changes.insert("updated_at", DateTime::now());
        match state
            .users_collection
            .update_one(doc! { "_id": id }, doc! { "$set": changes }, None)
            .await
        {
            Ok(_) => {}
            Err(e) if auth_service::is_duplicate_key(&e) => {
                return Ok(Reply::failure(StatusCode::CONFLICT, "Email is already in use"))
            }
            Err(e) => return Err(e.into()),
        }

        let updated = match auth_service::get_user_by_id(&state.users_collection, id).await? {
            Some(u) => u,
            None => return Ok(user_not_found()),
        };

        if email_changed {
            let token = auth_service::set_verification_token(&state.users_collection, &updated.id).await?;
            let link = state.api_url(&format!("/verify-email/{}", token));
            deliver_in_background(
                state,
                mail_service::verification_email(&updated.email, &updated.username, &link),
            );
        }

        Ok(Reply::ok(
            "User updated successfully",
            json!({ "user": updated.to_response() }),
        ))
    })
}

/// PUT /:id/change-password
pub fn change_password<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let id = param(ctx, "id")?;
        let (current, new) = match (ctx.body_str("currentPassword"), ctx.body_str("newPassword")) {
            (Some(c), Some(n)) => (c, n),
            _ => {
                return Ok(Reply::failure(
                    StatusCode::BAD_REQUEST,
                    "Current password and new password are required",
                ))
            }
        };
        if let Err(e) = validate_password(new) {
            return Ok(Reply::failure(StatusCode::BAD_REQUEST, e));
        }
        if current == new {
            return Ok(Reply::failure(
                StatusCode::BAD_REQUEST,
                "New password must be different from the current password",
            ));
        }

        let user = match auth_service::get_user_by_id(&state.users_collection, id).await? {
            Some(u) => u,
            None => return Ok(user_not_found()),
        };
        if !auth_service::verify_password(current, &user.hashed_password) {
            return Ok(Reply::failure(StatusCode::BAD_REQUEST, "Current password is incorrect"));
        }

        auth_service::update_password(&state.users_collection, &user.id, new).await?;
        auth_service::delete_refresh_tokens(&state.tokens_collection, &user.id).await?;

        Ok(Reply::ok("Password changed successfully", json!({})))
    })
}

/// DELETE /:id
/// Removes the user and every token issued to them.
pub fn delete_user<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let id = param(ctx, "id")?;
        let result = state.users_collection.delete_one(doc! { "_id": id }, None).await?;
        if result.deleted_count == 0 {
            return Ok(user_not_found());
        }
        state
            .tokens_collection
            .delete_many(doc! { "user_id": id }, None)
            .await?;

        log::info!("deleted user {}", id);
        Ok(Reply::ok("User deleted successfully", json!({})))
    })
}

/// GET /admin/stats
pub fn get_user_stats<'a>(state: &'a AppState, _ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let users = &state.users_collection;
        let month_ago = auth_service::expires_in(Duration::days(-30));

        let total = users.count_documents(None, None).await?;
        let verified = users.count_documents(doc! { "email_verified": true }, None).await?;
        let admins = users
            .count_documents(doc! { "role": Role::Admin.as_str() }, None)
            .await?;
        let recent = users
            .count_documents(doc! { "created_at": { "$gte": month_ago } }, None)
            .await?;

        Ok(Reply::ok(
            "User statistics retrieved successfully",
            json!({
                "stats": {
                    "totalUsers": total,
                    "verifiedUsers": verified,
                    "unverifiedUsers": total.saturating_sub(verified),
                    "adminUsers": admins,
                    "newUsersLast30Days": recent,
                }
            }),
        ))
    })
}

/// DELETE /admin/cleanup-tokens
/// Deletes expired token records and clears expired one-time tokens on users.
pub fn cleanup_expired_tokens<'a>(state: &'a AppState, _ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let now = DateTime::now();

        let tokens = state
            .tokens_collection
            .delete_many(doc! { "expires_at": { "$lt": now } }, None)
            .await?;
        let resets = state
            .users_collection
            .update_many(
                doc! { "reset_expires": { "$lt": now } },
                doc! { "$unset": { "reset_token": "", "reset_expires": "" } },
                None,
            )
            .await?;
        let verifications = state
            .users_collection
            .update_many(
                doc! { "verification_expires": { "$lt": now } },
                doc! { "$unset": { "verification_token": "", "verification_expires": "" } },
                None,
            )
            .await?;

        log::info!(
            "token cleanup: {} records deleted, {} reset and {} verification tokens cleared",
            tokens.deleted_count,
            resets.modified_count,
            verifications.modified_count
        );
        Ok(Reply::ok(
            "Expired tokens cleaned up successfully",
            json!({
                "deletedTokens": tokens.deleted_count,
                "clearedResetTokens": resets.modified_count,
                "clearedVerificationTokens": verifications.modified_count,
            }),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::Method;
    use std::collections::HashMap;

    fn with_query(pairs: &[(&str, &str)]) -> RequestContext {
        let query: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RequestContext::new(Method::GET, "/").with_query(query)
    }

    #[test]
    fn pagination_defaults() {
        assert_eq!(pagination(&with_query(&[])), (1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn pagination_clamps_values() {
        assert_eq!(pagination(&with_query(&[("page", "0"), ("limit", "1000")])), (1, MAX_PAGE_SIZE));
        assert_eq!(pagination(&with_query(&[("page", "3"), ("limit", "0")])), (3, 1));
        assert_eq!(pagination(&with_query(&[("page", "abc")])), (1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn huge_page_does_not_overflow() {
        let (page, limit) = pagination(&with_query(&[("page", "18446744073709551615")]));
        assert_eq!(page, u64::MAX);
        assert_eq!(page_offset(page, limit), i64::MAX as u64);
        assert_eq!(page_offset(3, 10), 20);
        assert_eq!(page_offset(1, 10), 0);
    }
}
