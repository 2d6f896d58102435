// src/router/stage.rs

use std::sync::Arc;

use futures::future::BoxFuture;

use super::context::{Flow, Reply, RequestContext};
use crate::error::ApiResult;

/// Future returned by every pipeline stage.
pub type StageFuture<'a, T> = BoxFuture<'a, ApiResult<T>>;

/// A stage that may inspect or modify the context, then either continues or halts.
pub trait Middleware<S>: Send + Sync {
    fn name(&self) -> &str;

    fn handle<'a>(&'a self, state: &'a S, ctx: &'a mut RequestContext) -> StageFuture<'a, Flow>;
}

/// The final stage of a pipeline. Always produces exactly one reply.
pub trait Handler<S>: Send + Sync {
    fn name(&self) -> &str;

    fn call<'a>(&'a self, state: &'a S, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply>;
}

/// Adapts a plain function into a named middleware.
pub struct MiddlewareFn<F> {
    name: &'static str,
    f: F,
}

impl<S, F> Middleware<S> for MiddlewareFn<F>
where
    F: for<'a> Fn(&'a S, &'a mut RequestContext) -> StageFuture<'a, Flow> + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    fn handle<'a>(&'a self, state: &'a S, ctx: &'a mut RequestContext) -> StageFuture<'a, Flow> {
        (self.f)(state, ctx)
    }
}

/// Adapts a plain function into a named terminal handler.
pub struct HandlerFn<F> {
    name: &'static str,
    f: F,
}

impl<S, F> Handler<S> for HandlerFn<F>
where
    F: for<'a> Fn(&'a S, &'a mut RequestContext) -> StageFuture<'a, Reply> + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    fn call<'a>(&'a self, state: &'a S, ctx: &'a mut RequestContext) -> StageFuture<'a, Reply> {
        (self.f)(state, ctx)
    }
}

pub fn middleware<S, F>(name: &'static str, f: F) -> Arc<dyn Middleware<S>>
where
    S: 'static,
    F: for<'a> Fn(&'a S, &'a mut RequestContext) -> StageFuture<'a, Flow> + Send + Sync + 'static,
{
    Arc::new(MiddlewareFn { name, f })
}

pub fn handler<S, F>(name: &'static str, f: F) -> Arc<dyn Handler<S>>
where
    S: 'static,
    F: for<'a> Fn(&'a S, &'a mut RequestContext) -> StageFuture<'a, Reply> + Send + Sync + 'static,
{
    Arc::new(HandlerFn { name, f })
}
