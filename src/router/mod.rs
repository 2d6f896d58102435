// src/router/mod.rs

//! Route table and pipeline execution.
//!
//! Entries are tried strictly in registration order. Layer entries (the
//! equivalent of `use`) run for every request that reaches them; the first
//! route whose method and pattern match runs its middleware and handler and
//! ends the walk.

pub mod context;
pub mod pattern;
pub mod stage;

use std::sync::Arc;

use actix_web::http::{Method, StatusCode};
use actix_web::{HttpResponse, ResponseError};

pub use context::{AuthUser, Flow, Reply, RequestContext};
pub use pattern::PathPattern;
pub use stage::{handler, middleware, Handler, Middleware, StageFuture};

use crate::error::ApiError;

pub struct Route<S> {
    method: Method,
    pattern: PathPattern,
    middleware: Vec<Arc<dyn Middleware<S>>>,
    handler: Arc<dyn Handler<S>>,
}

impl<S> Route<S> {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Stage names in execution order, handler last.
    pub fn pipeline(&self) -> Vec<&str> {
        self.middleware
            .iter()
            .map(|m| m.name())
            .chain(std::iter::once(self.handler.name()))
            .collect()
    }
}

enum Entry<S> {
    Layer(Arc<dyn Middleware<S>>),
    Route(Route<S>),
}

/// Result of dispatching one request.
#[derive(Debug)]
pub enum Outcome {
    /// The terminal handler produced the reply.
    Handled { route: String, reply: Reply },
    /// A middleware stopped the pipeline with its own reply.
    Halted {
        route: Option<String>,
        stage: String,
        reply: Reply,
    },
    NotFound,
    /// A stage failed; the request ends with a single 500.
    Failed {
        route: Option<String>,
        stage: String,
        error: ApiError,
    },
}

impl Outcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Handled { reply, .. } | Outcome::Halted { reply, .. } => reply.status,
            Outcome::NotFound => StatusCode::NOT_FOUND,
            Outcome::Failed { error, .. } => error.status_code(),
        }
    }

    pub fn into_response(self) -> HttpResponse {
        match self {
            Outcome::Handled { reply, .. } | Outcome::Halted { reply, .. } => reply.into_response(),
            Outcome::NotFound => Reply::failure(StatusCode::NOT_FOUND, "Route not found").into_response(),
            Outcome::Failed { error, .. } => error.error_response(),
        }
    }
}

/// An ordered route table, read-only once built.
pub struct Router<S> {
    entries: Vec<Entry<S>>,
}

impl<S> Default for Router<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Router<S> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Appends a middleware that runs for every request reaching this position.
    pub fn layer(&mut self, mw: Arc<dyn Middleware<S>>) -> &mut Self {
        self.entries.push(Entry::Layer(mw));
        self
    }

    /// Appends a route. The pattern is not validated.
    pub fn route(
        &mut self,
        method: Method,
        pattern: &str,
        middleware: Vec<Arc<dyn Middleware<S>>>,
        handler: Arc<dyn Handler<S>>,
    ) -> &mut Self {
        self.entries.push(Entry::Route(Route {
            method,
            pattern: PathPattern::parse(pattern),
            middleware,
            handler,
        }));
        self
    }

    pub fn get(&mut self, pattern: &str, middleware: Vec<Arc<dyn Middleware<S>>>, handler: Arc<dyn Handler<S>>) -> &mut Self {
        self.route(Method::GET, pattern, middleware, handler)
    }

    pub fn post(&mut self, pattern: &str, middleware: Vec<Arc<dyn Middleware<S>>>, handler: Arc<dyn Handler<S>>) -> &mut Self {
        self.route(Method::POST, pattern, middleware, handler)
    }

    pub fn put(&mut self, pattern: &str, middleware: Vec<Arc<dyn Middleware<S>>>, handler: Arc<dyn Handler<S>>) -> &mut Self {
        self.route(Method::PUT, pattern, middleware, handler)
    }

    pub fn delete(&mut self, pattern: &str, middleware: Vec<Arc<dyn Middleware<S>>>, handler: Arc<dyn Handler<S>>) -> &mut Self {
        self.route(Method::DELETE, pattern, middleware, handler)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route<S>> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Route(r) => Some(r),
            Entry::Layer(_) => None,
        })
    }

    /// Names of the layer middleware, in registration order.
    pub fn layers(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                Entry::Layer(m) => Some(m.name()),
                Entry::Route(_) => None,
            })
            .collect()
    }

    pub async fn dispatch(&self, state: &S, mut ctx: RequestContext) -> Outcome {
        for entry in &self.entries {
            match entry {
                Entry::Layer(mw) => match mw.handle(state, &mut ctx).await {
                    Ok(Flow::Next) => {}
                    Ok(Flow::Halt(reply)) => {
                        return Outcome::Halted {
                            route: None,
                            stage: mw.name().to_string(),
                            reply,
                        }
                    }
                    Err(error) => return failed(None, mw.name(), error),
                },
                Entry::Route(route) => {
                    if route.method != ctx.method {
                        continue;
                    }
                    if let Some(params) = route.pattern.matches(&ctx.path) {
                        ctx.params = params;
                        ctx.route = Some(route.pattern().to_string());
                        return run_pipeline(route, state, &mut ctx).await;
                    }
                }
            }
        }
        Outcome::NotFound
    }
}

async fn run_pipeline<S>(route: &Route<S>, state: &S, ctx: &mut RequestContext) -> Outcome {
    let pattern = route.pattern();
    for mw in &route.middleware {
        match mw.handle(state, ctx).await {
            Ok(Flow::Next) => {}
            Ok(Flow::Halt(reply)) => {
                return Outcome::Halted {
                    route: Some(pattern.to_string()),
                    stage: mw.name().to_string(),
                    reply,
                }
            }
            Err(error) => return failed(Some(pattern), mw.name(), error),
        }
    }

    match route.handler.call(state, ctx).await {
        Ok(reply) => Outcome::Handled {
            route: pattern.to_string(),
            reply,
        },
        Err(error) => failed(Some(pattern), route.handler.name(), error),
    }
}

fn failed(route: Option<&str>, stage: &str, error: ApiError) -> Outcome {
    log::error!(
        "stage {} failed on {}: {}",
        stage,
        route.unwrap_or("<layer>"),
        error
    );
    Outcome::Failed {
        route: route.map(str::to_string),
        stage: stage.to_string(),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records which stages ran.
    #[derive(Default)]
    struct Trace(Mutex<Vec<String>>);

    impl Trace {
        fn ran(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    enum Behaviour {
        Continue,
        Halt(StatusCode),
        Fail,
    }

    struct Step {
        name: &'static str,
        behaviour: Behaviour,
    }

    fn step(name: &'static str) -> Arc<Step> {
        Arc::new(Step { name, behaviour: Behaviour::Continue })
    }

    fn halting(name: &'static str, status: StatusCode) -> Arc<Step> {
        Arc::new(Step { name, behaviour: Behaviour::Halt(status) })
    }

    fn failing(name: &'static str) -> Arc<Step> {
        Arc::new(Step { name, behaviour: Behaviour::Fail })
    }

    impl Middleware<Trace> for Step {
        fn name(&self) -> &str {
            self.name
        }

        fn handle<'a>(&'a self, state: &'a Trace, _ctx: &'a mut RequestContext) -> StageFuture<'a, Flow> {
            Box::pin(async move {
                state.0.lock().unwrap().push(self.name.to_string());
                match self.behaviour {
                    Behaviour::Continue => Ok(Flow::Next),
                    Behaviour::Halt(status) => Ok(Flow::Halt(Reply::failure(status, self.name))),
                    Behaviour::Fail => Err(ApiError::UndefinedCollaborator("collaborator")),
                }
            })
        }
    }

    impl Handler<Trace> for Step {
        fn name(&self) -> &str {
            self.name
        }

        fn call<'a>(&'a self, state: &'a Trace, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
            Box::pin(async move {
                state.0.lock().unwrap().push(self.name.to_string());
                match self.behaviour {
                    Behaviour::Fail => Err(ApiError::UndefinedCollaborator("collaborator")),
                    _ => Ok(Reply::ok(self.name, serde_json::json!({ "params": ctx.params }))),
                }
            })
        }
    }

    fn request(method: Method, path: &str) -> RequestContext {
        RequestContext::new(method, path)
    }

    #[actix_web::test]
    async fn first_registered_match_wins() {
        let mut router: Router<Trace> = Router::new();
        router
            .get("/:id", vec![], step("by_id"))
            .get("/admin", vec![], step("admin"));

        let trace = Trace::default();
        let outcome = router.dispatch(&trace, request(Method::GET, "/admin")).await;
        match outcome {
            Outcome::Handled { route, .. } => assert_eq!(route, "/:id"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(trace.ran(), vec!["by_id"]);
    }

    #[actix_web::test]
    async fn method_must_match() {
        let mut router: Router<Trace> = Router::new();
        router.get("/thing", vec![], step("get")).post("/thing", vec![], step("post"));

        let trace = Trace::default();
        let outcome = router.dispatch(&trace, request(Method::POST, "/thing")).await;
        assert!(matches!(outcome, Outcome::Handled { .. }));
        assert_eq!(trace.ran(), vec!["post"]);
    }

    #[actix_web::test]
    async fn unmatched_path_is_not_found_without_running_handlers() {
        let mut router: Router<Trace> = Router::new();
        router.layer(step("logger")).get("/known", vec![step("mw")], step("handler"));

        let trace = Trace::default();
        let outcome = router.dispatch(&trace, request(Method::GET, "/unknown")).await;
        assert!(matches!(outcome, Outcome::NotFound));
        assert_eq!(outcome.status(), StatusCode::NOT_FOUND);
        assert_eq!(trace.ran(), vec!["logger"]);
    }

    #[actix_web::test]
    async fn halt_stops_later_stages() {
        let mut router: Router<Trace> = Router::new();
        router.post(
            "/guarded",
            vec![step("first"), halting("guard", StatusCode::UNAUTHORIZED), step("never")],
            step("handler"),
        );

        let trace = Trace::default();
        let outcome = router.dispatch(&trace, request(Method::POST, "/guarded")).await;
        match outcome {
            Outcome::Halted { route, stage, reply } => {
                assert_eq!(route.as_deref(), Some("/guarded"));
                assert_eq!(stage, "guard");
                assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(trace.ran(), vec!["first", "guard"]);
    }

    #[actix_web::test]
    async fn failure_becomes_single_500() {
        let mut router: Router<Trace> = Router::new();
        router.post("/broken", vec![failing("boom"), step("never")], step("handler"));

        let trace = Trace::default();
        let outcome = router.dispatch(&trace, request(Method::POST, "/broken")).await;
        assert_eq!(outcome.status(), StatusCode::INTERNAL_SERVER_ERROR);
        match outcome {
            Outcome::Failed { stage, .. } => assert_eq!(stage, "boom"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(trace.ran(), vec!["boom"]);
    }

    #[actix_web::test]
    async fn handler_failure_is_reported_against_handler() {
        let mut router: Router<Trace> = Router::new();
        router.post("/broken", vec![step("mw")], failing("handler"));

        let trace = Trace::default();
        let outcome = router.dispatch(&trace, request(Method::POST, "/broken")).await;
        match outcome {
            Outcome::Failed { route, stage, .. } => {
                assert_eq!(route.as_deref(), Some("/broken"));
                assert_eq!(stage, "handler");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[actix_web::test]
    async fn layers_only_apply_to_later_routes() {
        let mut router: Router<Trace> = Router::new();
        router
            .post("/early", vec![], step("early"))
            .layer(step("logger"))
            .post("/late", vec![], step("late"));

        let trace = Trace::default();
        router.dispatch(&trace, request(Method::POST, "/early")).await;
        router.dispatch(&trace, request(Method::POST, "/late")).await;
        assert_eq!(trace.ran(), vec!["early", "logger", "late"]);
    }

    #[actix_web::test]
    async fn halting_layer_ends_dispatch() {
        let mut router: Router<Trace> = Router::new();
        router
            .layer(halting("gate", StatusCode::SERVICE_UNAVAILABLE))
            .get("/", vec![], step("root"));

        let trace = Trace::default();
        let outcome = router.dispatch(&trace, request(Method::GET, "/")).await;
        match outcome {
            Outcome::Halted { route, stage, .. } => {
                assert!(route.is_none());
                assert_eq!(stage, "gate");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(trace.ran(), vec!["gate"]);
    }

    #[actix_web::test]
    async fn params_are_bound_before_pipeline_runs() {
        let mut router: Router<Trace> = Router::new();
        router.put("/:id/change-password", vec![step("mw")], step("handler"));

        let trace = Trace::default();
        let outcome = router
            .dispatch(&trace, request(Method::PUT, "/abc123/change-password"))
            .await;
        match outcome {
            Outcome::Handled { reply, .. } => {
                assert_eq!(reply.body["params"]["id"], "abc123");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn pipeline_lists_handler_last() {
        let mut router: Router<Trace> = Router::new();
        router.delete("/:id", vec![step("a"), step("b")], step("c"));
        let route = router.routes().next().unwrap();
        assert_eq!(route.method(), &Method::DELETE);
        assert_eq!(route.pipeline(), vec!["a", "b", "c"]);
    }
}
