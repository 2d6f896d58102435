// src/controllers/auth_controller.rs

use actix_web::http::StatusCode;
use mongodb::bson::{doc, DateTime};
use serde_json::json;

use super::{current_user, deliver, deliver_in_background, field, param};
use crate::error::{ApiError, ApiResult};
use crate::models::user::UserModel;
use crate::router::{Reply, RequestContext, StageFuture};
use crate::services::{auth_service, mail_service};
use crate::state::AppState;

/// Stores a new verification token for the user and mails the link.
async fn send_verification(state: &AppState, user: &UserModel) -> ApiResult<()> {
    let token = auth_service::set_verification_token(&state.users_collection, &user.id).await?;
    let link = state.api_url(&format!("/verify-email/{}", token));
    deliver_in_background(state, mail_service::verification_email(&user.email, &user.username, &link));
    Ok(())
}

/// POST /signup
/// Registers a new user. This endpoint:
/// - Rejects an email that is already registered.
/// - Creates the user (with password hashing in the service layer).
/// - Sends a verification email (spawned as a background task).
pub fn signup<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let username = field(ctx, "username")?;
        let email = field(ctx, "email")?;
        let password = field(ctx, "password")?;

        if auth_service::get_user(&state.users_collection, email).await?.is_some() {
            return Ok(Reply::failure(StatusCode::BAD_REQUEST, "Email already registered"));
        }

        // The service will hash this password.
        let new_user = UserModel::new(username.to_string(), email.to_string(), password.to_string());
        // A concurrent signup can still win the race to the unique index.
        let user = match auth_service::create_user(&state.users_collection, new_user).await? {
            Some(u) => u,
            None => return Ok(Reply::failure(StatusCode::BAD_REQUEST, "Email already registered")),
        };
        send_verification(state, &user).await?;

        log::info!("registered user {}", user.id);
        Ok(Reply::success(
            StatusCode::CREATED,
            "User registered successfully. Please check your email to verify your account.",
            json!({ "user": user.to_response() }),
        ))
    })
}

/// POST /login
/// Checks credentials and returns an access token and a refresh token.
pub fn login<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let email = field(ctx, "email")?;
        let password = field(ctx, "password")?;

        let user = match auth_service::get_user(&state.users_collection, email).await? {
            Some(u) => u,
            None => return Ok(Reply::failure(StatusCode::BAD_REQUEST, "Invalid credentials")),
        };

        if !auth_service::verify_password(password, &user.hashed_password) {
            return Ok(Reply::failure(StatusCode::BAD_REQUEST, "Invalid credentials"));
        }

        if !user.email_verified {
            return Ok(Reply::failure(
                StatusCode::FORBIDDEN,
                "Please verify your email before logging in",
            ));
        }

        state
            .users_collection
            .update_one(
                doc! { "_id": user.id.as_str() },
                doc! { "$set": { "last_login": DateTime::now() } },
                None,
            )
            .await?;

        let mut data = auth_service::issue_session(&state.tokens_collection, &state.auth, &user).await?;
        data["user"] = json!(user.to_response());
        Ok(Reply::ok("Login successful", data))
    })
}

/// POST /logout
/// Revokes the presented access token and every refresh token of the caller.
pub fn logout<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let user = current_user(ctx)?;
        let token = ctx
            .token
            .as_deref()
            .ok_or(ApiError::MissingContext("token"))?;

        auth_service::revoke_access_token(&state.tokens_collection, token, &user.id, user.exp).await?;
        let dropped = auth_service::delete_refresh_tokens(&state.tokens_collection, &user.id).await?;
        log::info!("user {} logged out, {} refresh tokens dropped", user.id, dropped);

        Ok(Reply::ok("Logged out successfully", json!({})))
    })
}

fn invalid_token(message: &str) -> Reply {
    Reply::json(
        StatusCode::UNAUTHORIZED,
        json!({ "success": false, "valid": false, "message": message }),
    )
}

/// GET /verify-token
/// An endpoint, not a middleware: checks the bearer token itself and reports the owner.
pub fn verify_token<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let token = match ctx.bearer_token() {
            Some(t) => t,
            None => return Ok(invalid_token("No token provided")),
        };

        let claims = match auth_service::verify_jwt_token(&state.auth, token) {
            Ok(c) => c,
            Err(_) => return Ok(invalid_token("Invalid or expired token")),
        };

        if auth_service::is_token_revoked(&state.tokens_collection, token).await? {
            return Ok(invalid_token("Token has been revoked"));
        }

        match auth_service::get_user_by_id(&state.users_collection, &claims.sub).await? {
            Some(user) => Ok(Reply::ok(
                "Token is valid",
                json!({ "valid": true, "user": user.to_response() }),
            )),
            None => Ok(Reply::failure(StatusCode::NOT_FOUND, "User not found")),
        }
    })
}

/// POST /refresh-token
/// Exchanges a refresh token for a new token pair. The old refresh token is consumed.
pub fn refresh_token<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let presented = match ctx.body_str("refreshToken") {
            Some(t) => t,
            None => return Ok(Reply::failure(StatusCode::BAD_REQUEST, "Refresh token is required")),
        };

        let record = match auth_service::find_refresh_token(&state.tokens_collection, presented).await? {
            Some(r) => r,
            None => return Ok(Reply::failure(StatusCode::UNAUTHORIZED, "Invalid refresh token")),
        };

        auth_service::delete_token(&state.tokens_collection, presented).await?;
        if record.is_expired() {
            return Ok(Reply::failure(StatusCode::UNAUTHORIZED, "Refresh token has expired"));
        }

        let user = match auth_service::get_user_by_id(&state.users_collection, &record.user_id).await? {
            Some(u) => u,
            None => return Ok(Reply::failure(StatusCode::UNAUTHORIZED, "Invalid refresh token")),
        };

        let data = auth_service::issue_session(&state.tokens_collection, &state.auth, &user).await?;
        Ok(Reply::ok("Token refreshed successfully", data))
    })
}

/// POST /forgot-password
/// Stores a reset token and mails it to the account owner.
pub fn forgot_password<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let email = match ctx.body_str("email") {
            Some(e) => e,
            None => return Ok(Reply::failure(StatusCode::BAD_REQUEST, "Email is required")),
        };

        let user = match auth_service::get_user(&state.users_collection, email).await? {
            Some(u) => u,
            None => return Ok(Reply::failure(StatusCode::NOT_FOUND, "Email not found")),
        };

        let reset_token = auth_service::set_reset_token(&state.users_collection, &user.email).await?;
        let link = state.frontend_page(&format!("/reset-password/{}", reset_token));
        deliver(
            state,
            mail_service::password_reset_email(&user.email, &user.username, &reset_token, &link),
        )
        .await?;

        Ok(Reply::ok("Password reset link sent to your email", json!({})))
    })
}

/// POST /reset-password/:token
/// Sets a new password for the holder of an unexpired reset token.
pub fn reset_password<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let token = param(ctx, "token")?;
        let password = field(ctx, "password")?;

        let user = match auth_service::find_by_reset_token(&state.users_collection, token).await? {
            Some(u) => u,
            None => {
                return Ok(Reply::failure(
                    StatusCode::BAD_REQUEST,
                    "Invalid or expired reset token",
                ))
            }
        };

        auth_service::update_password(&state.users_collection, &user.id, password).await?;
        auth_service::delete_refresh_tokens(&state.tokens_collection, &user.id).await?;

        Ok(Reply::ok("Password has been reset successfully", json!({})))
    })
}

/// GET /verify-email/:token
pub fn verify_email<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let token = param(ctx, "token")?;
        if !auth_service::verify_email_token(&state.users_collection, token).await? {
            return Ok(Reply::failure(
                StatusCode::BAD_REQUEST,
                "Invalid or expired verification token",
            ));
        }
        Ok(Reply::ok("Email verified successfully", json!({})))
    })
}

/// POST /resend-verification
pub fn resend_email_verification<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
    Box::pin(async move {
        let email = match ctx.body_str("email") {
            Some(e) => e,
            None => return Ok(Reply::failure(StatusCode::BAD_REQUEST, "Email is required")),
        };

        let user = match auth_service::get_user(&state.users_collection, email).await? {
            Some(u) => u,
            None => return Ok(Reply::failure(StatusCode::NOT_FOUND, "User not found")),
        };
        if user.email_verified {
            return Ok(Reply::failure(StatusCode::BAD_REQUEST, "Email is already verified"));
        }

        send_verification(state, &user).await?;
        Ok(Reply::ok("Verification email resent successfully", json!({})))
    })
}
