//! Fixed-window request limiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use actix_web::http::StatusCode;

use crate::router::{Flow, Middleware, Reply, RequestContext, StageFuture};

/// Counter for one client inside the current window.
struct Window {
    count: u32,
    started: Instant,
}

/// Outcome of counting one request.
#[derive(Debug, PartialEq)]
enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Allows `max_requests` per client per window. Each instance is its own
/// bucket, so two routes built with the same numbers still count separately.
pub struct RateLimit {
    name: String,
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimit {
    pub fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            name: format!("rate_limit({}, {})", max_requests, window_ms),
            max_requests,
            window: Duration::from_millis(window_ms),
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn check(&self, key: &str, now: Instant) -> Decision {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        // Drop windows that have run out so idle clients do not accumulate.
        windows.retain(|_, w| now.duration_since(w.started) < self.window);

        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });

        if entry.count >= self.max_requests {
            let elapsed = now.duration_since(entry.started);
            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }
        entry.count += 1;
        Decision::Allowed {
            remaining: self.max_requests - entry.count,
        }
    }
}

impl<S: Sync> Middleware<S> for RateLimit {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle<'a>(&'a self, _state: &'a S, ctx: &'a mut RequestContext) -> StageFuture<'a, Flow> {
        Box::pin(async move {
            match self.check(ctx.client_key(), Instant::now()) {
                Decision::Allowed { .. } => Ok(Flow::Next),
                Decision::Limited { retry_after } => {
                    log::warn!("rate limit exceeded for {} on {}", ctx.client_key(), ctx.path);
                    let secs = retry_after.as_secs().max(1);
                    let reply = Reply::failure(
                        StatusCode::TOO_MANY_REQUESTS,
                        "Too many requests, please try again later.",
                    )
                    .with_header("Retry-After", secs.to_string())
                    .with_header("X-RateLimit-Limit", self.max_requests.to_string())
                    .with_header("X-RateLimit-Remaining", "0");
                    Ok(Flow::Halt(reply))
                }
            }
        })
    }
}

/// `rate_limit(max, window_ms)` as a pipeline stage.
pub fn rate_limit<S: Sync + 'static>(max_requests: u32, window_ms: u64) -> Arc<dyn Middleware<S>> {
    Arc::new(RateLimit::new(max_requests, window_ms))
}
