// src/router/context.rs

use std::collections::HashMap;

use actix_web::http::{Method, StatusCode};
use actix_web::HttpResponse;
use serde_json::{json, Value};

use crate::models::user::Role;

/// The identity `auth_middleware` attaches for downstream stages.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: Role,
    /// Expiry of the access token that authenticated this request (unix seconds).
    pub exp: usize,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Per-request state handed from stage to stage.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    /// Header names are stored lowercased.
    pub headers: HashMap<String, String>,
    pub body: Value,
    pub client_ip: Option<String>,
    /// Pattern of the route that matched, once dispatch has selected one.
    pub route: Option<String>,
    pub user: Option<AuthUser>,
    /// Raw bearer token accepted by `auth_middleware`.
    pub token: Option<String>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: HashMap::new(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: Value::Object(Default::default()),
            client_ip: None,
            route: None,
            user: None,
            token: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Token from an `Authorization: Bearer <token>` header.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// A string field from the JSON body, trimmed. Empty strings count as absent.
    pub fn body_str(&self, field: &str) -> Option<&str> {
        self.body
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Identity used to key rate-limit windows.
    pub fn client_key(&self) -> &str {
        self.client_ip.as_deref().unwrap_or("unknown")
    }
}

/// A complete response produced by a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
    pub headers: Vec<(String, String)>,
}

impl Reply {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            headers: Vec::new(),
        }
    }

    /// `{"success": true, "message": ..}` merged with the fields of `data`.
    pub fn success(status: StatusCode, message: &str, data: Value) -> Self {
        let mut body = json!({ "success": true, "message": message });
        if let (Some(target), Value::Object(extra)) = (body.as_object_mut(), data) {
            target.extend(extra);
        }
        Self::json(status, body)
    }

    pub fn ok(message: &str, data: Value) -> Self {
        Self::success(StatusCode::OK, message, data)
    }

    pub fn failure(status: StatusCode, message: &str) -> Self {
        Self::json(status, json!({ "success": false, "message": message }))
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn into_response(self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status);
        for (name, value) in self.headers {
            builder.insert_header((name, value));
        }
        builder.json(self.body)
    }
}

/// What a middleware decided.
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next stage.
    Next,
    /// Stop here and answer with this reply.
    Halt(Reply),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_requires_scheme() {
        let ctx = RequestContext::new(Method::GET, "/").with_header("Authorization", "Bearer abc.def");
        assert_eq!(ctx.bearer_token(), Some("abc.def"));

        let ctx = RequestContext::new(Method::GET, "/").with_header("Authorization", "Basic abc");
        assert_eq!(ctx.bearer_token(), None);

        let ctx = RequestContext::new(Method::GET, "/").with_header("Authorization", "Bearer ");
        assert_eq!(ctx.bearer_token(), None);
    }

    #[test]
    fn body_str_ignores_blank_and_non_string() {
        let ctx = RequestContext::new(Method::POST, "/")
            .with_body(json!({ "email": "  a@b.io ", "blank": "  ", "count": 3 }));
        assert_eq!(ctx.body_str("email"), Some("a@b.io"));
        assert_eq!(ctx.body_str("blank"), None);
        assert_eq!(ctx.body_str("count"), None);
        assert_eq!(ctx.body_str("missing"), None);
    }

    #[test]
    fn success_merges_data_fields() {
        let reply = Reply::ok("done", json!({ "count": 2 }));
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, json!({ "success": true, "message": "done", "count": 2 }));
    }
}
