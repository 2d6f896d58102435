use crate::router::{Flow, RequestContext, StageFuture};
use crate::state::AppState;

pub fn request_logger<'a>(_state: &'a AppState, ctx: &'a mut RequestContext) -> StageFuture<'a, Flow> {
    Box::pin(async move {
        log::info!("{} {} from {}", ctx.method, ctx.path, ctx.client_key());
        Ok(Flow::Next)
    })
}
