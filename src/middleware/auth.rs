// src/middleware/auth.rs

use actix_web::http::StatusCode;

use crate::router::{AuthUser, Flow, Reply, RequestContext, StageFuture};
use crate::services::auth_service;
use crate::state::AppState;

fn deny(status: StatusCode, message: &str) -> Flow {
    Flow::Halt(Reply::failure(status, message))
}

/// Verifies the bearer token and attaches the caller to the context.
pub fn auth_middleware<'a>(state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Flow> {
    Box::pin(async move {
        let token = match ctx.bearer_token() {
            Some(t) => t.to_string(),
            None => {
                return Ok(deny(StatusCode::UNAUTHORIZED, "Access denied. No token provided."));
            }
        };

        let claims = match auth_service::verify_jwt_token(&state.auth, &token) {
            Ok(c) => c,
            Err(e) => {
                log::debug!("rejected token: {}", e);
                return Ok(deny(StatusCode::UNAUTHORIZED, "Invalid or expired token"));
            }
        };

        if auth_service::is_token_revoked(&state.tokens_collection, &token).await? {
            return Ok(deny(StatusCode::UNAUTHORIZED, "Token has been revoked"));
        }

        ctx.user = Some(AuthUser {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
            exp: claims.exp,
        });
        ctx.token = Some(token);
        Ok(Flow::Next)
    })
}

/// Lets only administrators through.
pub fn check_admin<'a>(_state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Flow> {
    Box::pin(async move { Ok(admin_gate(ctx)) })
}

/// Lets the account owner named by `:id`, or an administrator, through.
pub fn check_user_access<'a>(_state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Flow> {
    Box::pin(async move { Ok(owner_gate(ctx)) })
}

fn admin_gate(ctx: &RequestContext) -> Flow {
    match &ctx.user {
        None => deny(StatusCode::UNAUTHORIZED, "Authentication required"),
        Some(user) if user.is_admin() => Flow::Next,
        Some(_) => deny(StatusCode::FORBIDDEN, "Access denied. Admin privileges required."),
    }
}

fn owner_gate(ctx: &RequestContext) -> Flow {
    let user = match &ctx.user {
        Some(u) => u,
        None => return deny(StatusCode::UNAUTHORIZED, "Authentication required"),
    };
    if user.is_admin() || ctx.param("id") == Some(user.id.as_str()) {
        Flow::Next
    } else {
        deny(StatusCode::FORBIDDEN, "Access denied. You can only access your own account.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use actix_web::http::Method;

    fn as_user(id: &str, role: Role) -> RequestContext {
        let mut ctx = RequestContext::new(Method::GET, format!("/{}", id));
        ctx.user = Some(AuthUser {
            id: "64b7f0c2a1b2c3d4e5f60718".into(),
            email: "me@example.com".into(),
            role,
            exp: 0,
        });
        ctx.params.insert("id".into(), id.into());
        ctx
    }

    fn halted_with(flow: Flow) -> Option<StatusCode> {
        match flow {
            Flow::Next => None,
            Flow::Halt(reply) => Some(reply.status),
        }
    }

    #[test]
    fn admin_gate_requires_admin_role() {
        let ctx = as_user("64b7f0c2a1b2c3d4e5f60718", Role::User);
        assert_eq!(halted_with(admin_gate(&ctx)), Some(StatusCode::FORBIDDEN));

        let ctx = as_user("64b7f0c2a1b2c3d4e5f60718", Role::Admin);
        assert_eq!(halted_with(admin_gate(&ctx)), None);

        let anonymous = RequestContext::new(Method::GET, "/");
        assert_eq!(halted_with(admin_gate(&anonymous)), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn owner_gate_allows_self_and_admin() {
        let own = as_user("64b7f0c2a1b2c3d4e5f60718", Role::User);
        assert_eq!(halted_with(owner_gate(&own)), None);

        let other = as_user("aaaaaaaaaaaaaaaaaaaaaaaa", Role::User);
        assert_eq!(halted_with(owner_gate(&other)), Some(StatusCode::FORBIDDEN));

        let admin = as_user("aaaaaaaaaaaaaaaaaaaaaaaa", Role::Admin);
        assert_eq!(halted_with(owner_gate(&admin)), None);
    }
}
