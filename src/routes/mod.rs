use std::collections::HashMap;

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::Value;

pub mod user_routes; // Module for user endpoints

use crate::router::{Reply, RequestContext, Router};
use crate::state::AppState;

/// Mounts the user router under `prefix`. Every request below the prefix goes
/// through `Router::dispatch`, which owns matching from there on.
pub fn init(cfg: &mut web::ServiceConfig, prefix: &str) {
    cfg.service(web::scope(prefix).default_service(web::to(dispatch)));
}

async fn dispatch(
    req: HttpRequest,
    body: web::Bytes,
    router: web::Data<Router<AppState>>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let ctx = match request_context(&req, &body, &state.api_prefix, state.trust_proxy) {
        Ok(ctx) => ctx,
        Err(reply) => return reply.into_response(),
    };
    router.dispatch(&state, ctx).await.into_response()
}

/// Translates an actix request into the router's context. A body that is not
/// valid JSON is rejected here, before any route runs.
pub fn request_context(
    req: &HttpRequest,
    body: &[u8],
    prefix: &str,
    trust_proxy: bool,
) -> Result<RequestContext, Reply> {
    let path = req.path();
    let path = path.strip_prefix(prefix).unwrap_or(path);
    let path = if path.is_empty() { "/" } else { path };

    let body = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(body).map_err(|e| {
            log::debug!("rejected request body: {}", e);
            Reply::failure(StatusCode::BAD_REQUEST, "Invalid JSON body")
        })?
    };

    let query = web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_default();

    let mut ctx = RequestContext::new(req.method().clone(), path)
        .with_body(body)
        .with_query(query);
    for (name, value) in req.headers() {
        if let Ok(v) = value.to_str() {
            ctx.headers.insert(name.as_str().to_string(), v.to_string());
        }
    }
    ctx.client_ip = client_ip(req, trust_proxy);
    Ok(ctx)
}

/// The socket peer, unless forwarded headers are explicitly trusted.
fn client_ip(req: &HttpRequest, trust_proxy: bool) -> Option<String> {
    if trust_proxy {
        if let Some(ip) = req.connection_info().realip_remote_addr() {
            return Some(ip.to_string());
        }
    }
    req.peer_addr().map(|addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::Method;
    use actix_web::test::TestRequest;

    #[test]
    fn strips_prefix_and_reads_request() {
        let req = TestRequest::with_uri("/api/users/64b7f0c2a1b2c3d4e5f60718?page=2")
            .method(Method::PUT)
            .insert_header(("Authorization", "Bearer t0k"))
            .to_http_request();
        let ctx = request_context(&req, br#"{"username":"neo"}"#, "/api/users", false).unwrap();

        assert_eq!(ctx.method, Method::PUT);
        assert_eq!(ctx.path, "/64b7f0c2a1b2c3d4e5f60718");
        assert_eq!(ctx.query.get("page").map(String::as_str), Some("2"));
        assert_eq!(ctx.bearer_token(), Some("t0k"));
        assert_eq!(ctx.body_str("username"), Some("neo"));
    }

    #[test]
    fn bare_prefix_is_root() {
        let req = TestRequest::with_uri("/api/users").to_http_request();
        let ctx = request_context(&req, b"", "/api/users", false).unwrap();
        assert_eq!(ctx.path, "/");
        assert!(ctx.body.as_object().map_or(false, |o| o.is_empty()));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let req = TestRequest::with_uri("/api/users/login").method(Method::POST).to_http_request();
        let reply = request_context(&req, b"{not json", "/api/users", false).unwrap_err();
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    fn forwarded_request() -> HttpRequest {
        TestRequest::with_uri("/api/users/signup")
            .method(Method::POST)
            .peer_addr("1.2.3.4:5555".parse().unwrap())
            .insert_header(("X-Forwarded-For", "10.0.0.7"))
            .to_http_request()
    }

    #[test]
    fn client_ip_is_the_socket_peer() {
        let ctx = request_context(&forwarded_request(), b"", "/api/users", false).unwrap();
        assert_eq!(ctx.client_ip.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn forwarded_for_is_used_when_trusted() {
        let ctx = request_context(&forwarded_request(), b"", "/api/users", true).unwrap();
        assert_eq!(ctx.client_ip.as_deref(), Some("10.0.0.7"));
    }
}
