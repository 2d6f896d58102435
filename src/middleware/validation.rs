// src/middleware/validation.rs

use actix_web::http::StatusCode;
use mongodb::bson::oid::ObjectId;
use serde_json::json;

use crate::router::{Flow, Reply, RequestContext, StageFuture};
use crate::state::AppState;

/// Fields that must be present for the route being validated.
fn required_fields(route: &str) -> &'static [&'static str] {
    match route {
        "/signup" => &["username", "email", "password"],
        "/login" => &["email", "password"],
        r if r.starts_with("/reset-password") => &["password"],
        _ => &[],
    }
}

pub fn validate_username(username: &str) -> Result<(), &'static str> {
    let len = username.chars().count();
    if !(3..=30).contains(&len) {
        return Err("Username must be between 3 and 30 characters");
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("Username may only contain letters, numbers and underscores");
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.len() > 254 {
        return Err("Email address is too long");
    }
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@');
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err("Invalid email address format");
    }
    Ok(())
}

/// bcrypt ignores everything past this many bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Strength rules for any new password.
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters");
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err("Password must be at most 72 bytes");
    }
    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        return Err("Password must contain uppercase, lowercase, and digit");
    }
    Ok(())
}

/// Collects every problem with the body instead of stopping at the first.
fn user_data_errors(ctx: &RequestContext) -> Vec<String> {
    let route = ctx.route.as_deref().unwrap_or(ctx.path.as_str());
    let mut errors = Vec::new();

    for field in required_fields(route) {
        if ctx.body_str(field).is_none() {
            errors.push(format!("{} is required", field));
        }
    }

    if let Some(username) = ctx.body_str("username") {
        if let Err(e) = validate_username(username) {
            errors.push(e.to_string());
        }
    }
    if let Some(email) = ctx.body_str("email") {
        if let Err(e) = validate_email(email) {
            errors.push(e.to_string());
        }
    }
    // Login compares against the stored hash, so strength rules do not apply.
    if route != "/login" {
        if let Some(password) = ctx.body_str("password") {
            if let Err(e) = validate_password(password) {
                errors.push(e.to_string());
            }
        }
    }
    errors
}

pub fn validate_user_data<'a>(_state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Flow> {
    Box::pin(async move {
        let errors = user_data_errors(ctx);
        if errors.is_empty() {
            return Ok(Flow::Next);
        }
        Ok(Flow::Halt(Reply::json(
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "message": "Validation failed", "errors": errors }),
        )))
    })
}

/// Rejects an `:id` that is not a 24-character hex ObjectId.
pub fn validate_object_id<'a>(_state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Flow> {
    Box::pin(async move {
        match ctx.param("id") {
            Some(id) if ObjectId::parse_str(id).is_err() => Ok(Flow::Halt(Reply::failure(
                StatusCode::BAD_REQUEST,
                "Invalid user ID format",
            ))),
            _ => Ok(Flow::Next),
        }
    })
}
