// src/routes/user_routes.rs

use crate::controllers::auth_controller::{
    forgot_password, login, logout, refresh_token, resend_email_verification, reset_password, signup,
    verify_email, verify_token,
};
use crate::controllers::notification_controller::{send_blog_notification, test_email};
use crate::controllers::user_controller::{
    change_password, cleanup_expired_tokens, delete_user, find_by_id, get_all_users, get_user_stats,
    update_user,
};
use crate::middleware::auth::{auth_middleware, check_admin, check_user_access};
use crate::middleware::rate_limit::rate_limit;
use crate::middleware::request_logger::request_logger;
use crate::middleware::validation::{validate_object_id, validate_user_data};
use crate::router::{handler, middleware, Router};
use crate::state::AppState;

const FIFTEEN_MINUTES_MS: u64 = 15 * 60 * 1000;
const ONE_HOUR_MS: u64 = 60 * 60 * 1000;

/// Builds the user route table. Order matters: entries are matched top to bottom.
pub fn build(enable_test_email: bool) -> Router<AppState> {
    let auth = middleware("auth_middleware", auth_middleware);
    let admin = middleware("check_admin", check_admin);
    let owner = middleware("check_user_access", check_user_access);
    let user_data = middleware("validate_user_data", validate_user_data);
    let object_id = middleware("validate_object_id", validate_object_id);

    let mut router = Router::new();

    // Registered ahead of the logger, so it is never logged.
    if enable_test_email {
        router.post("/test-email", vec![], handler("test_email", test_email));
    }

    router.layer(middleware("request_logger", request_logger));

    // Public routes
    router
        .post(
            "/signup",
            vec![rate_limit(5, FIFTEEN_MINUTES_MS), user_data.clone()],
            handler("signup", signup),
        )
        .post(
            "/login",
            vec![rate_limit(10, FIFTEEN_MINUTES_MS), user_data.clone()],
            handler("login", login),
        )
        .post(
            "/forgot-password",
            vec![rate_limit(3, ONE_HOUR_MS)],
            handler("forgot_password", forgot_password),
        )
        .post(
            "/reset-password/:token",
            vec![user_data.clone()],
            handler("reset_password", reset_password),
        )
        .get("/verify-email/:token", vec![], handler("verify_email", verify_email))
        .post(
            "/resend-verification",
            vec![rate_limit(3, ONE_HOUR_MS)],
            handler("resend_email_verification", resend_email_verification),
        );

    // Token routes
    router
        .post("/logout", vec![auth.clone()], handler("logout", logout))
        .get("/verify-token", vec![], handler("verify_token", verify_token))
        .post("/refresh-token", vec![], handler("refresh_token", refresh_token));

    // Protected routes
    router
        .get(
            "/",
            vec![auth.clone(), admin.clone()],
            handler("get_all_users", get_all_users),
        )
        .get(
            "/:id",
            vec![object_id.clone(), auth.clone(), owner.clone()],
            handler("find_by_id", find_by_id),
        )
        .put(
            "/:id",
            vec![object_id.clone(), auth.clone(), owner.clone()],
            handler("update_user", update_user),
        )
        .put(
            "/:id/change-password",
            vec![object_id.clone(), auth.clone(), owner.clone()],
            handler("change_password", change_password),
        )
        .delete(
            "/:id",
            vec![object_id, auth.clone(), owner],
            handler("delete_user", delete_user),
        );

    // Admin routes
    router
        .get(
            "/admin/stats",
            vec![auth.clone(), admin.clone()],
            handler("get_user_stats", get_user_stats),
        )
        .delete(
            "/admin/cleanup-tokens",
            vec![auth.clone(), admin.clone()],
            handler("cleanup_expired_tokens", cleanup_expired_tokens),
        );

    // Notification routes
    router.post(
        "/notifications/blog",
        vec![auth, admin],
        handler("send_blog_notification", send_blog_notification),
    );

    router
}
