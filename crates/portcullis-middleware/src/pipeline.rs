//! Ordered execution of a resolved handler chain.
//!
//! A request moves through four states:
//!
//! ```text
//! Matching ──► Executing ──┬──► Halted     (a step returned Halt)
//!                          └──► Completed  (the handler ran, or a fault was recovered)
//! ```
//!
//! `Matching` is reported by the router while it resolves the route and
//! `Executing` by [`Pipeline::run`]; both appear only as trace events. The
//! terminal state is the value `run` returns.
//!
//! Steps run strictly one after another on the request's worker. The
//! executor never spawns work and never runs two steps of one request at once.

use std::fmt;

use portcullis_core::{BoxedHandler, Handler, RequestContext};

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Resolving the route and its parameters.
    Matching,
    /// Running middleware and the handler.
    Executing,
    /// A middleware step stopped the chain; its response stands.
    Halted,
    /// The handler ran, or a fault was turned into a 500.
    Completed,
}

impl RequestState {
    /// Returns true for the two terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Halted | Self::Completed)
    }

    /// Returns the state name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Matching => "matching",
            Self::Executing => "executing",
            Self::Halted => "halted",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a route serves for one method: middleware, then one terminal handler.
#[derive(Clone)]
pub struct HandlerEntry {
    middleware: Vec<BoxedHandler>,
    handler: BoxedHandler,
}

impl HandlerEntry {
    /// Creates an entry.
    pub fn new(middleware: Vec<BoxedHandler>, handler: BoxedHandler) -> Self {
        Self {
            middleware,
            handler,
        }
    }

    /// Splits a registration chain: the last element is the handler.
    ///
    /// Returns `None` for an empty chain.
    pub fn from_chain(mut chain: Vec<BoxedHandler>) -> Option<Self> {
        let handler = chain.pop()?;
        Some(Self::new(chain, handler))
    }

    /// Returns the middleware steps, outermost first.
    pub fn middleware(&self) -> &[BoxedHandler] {
        &self.middleware
    }

    /// Returns the terminal handler.
    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    /// Returns a copy with `outer` running before the existing middleware.
    #[must_use]
    pub fn wrapped(&self, outer: &[BoxedHandler]) -> Self {
        let mut middleware = Vec::with_capacity(outer.len() + self.middleware.len());
        middleware.extend_from_slice(outer);
        middleware.extend_from_slice(&self.middleware);
        Self::new(middleware, self.handler.clone())
    }

    /// Returns the step names in execution order, the handler last.
    pub fn names(&self) -> Vec<&str> {
        self.middleware
            .iter()
            .chain(std::iter::once(&self.handler))
            .map(Handler::name)
            .collect()
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Runs the router-wide middleware followed by one entry.
///
/// # Example
///
/// ```
/// use portcullis_core::{chain, fixtures, BoxedHandler, Outcome, RequestContext};
/// use portcullis_middleware::{HandlerEntry, Pipeline, RequestState};
/// use http::{Method, StatusCode};
///
/// fn deny(ctx: &mut RequestContext) -> Outcome {
///     ctx.error(StatusCode::FORBIDDEN, "no")
/// }
/// fn view(ctx: &mut RequestContext) -> Outcome {
///     ctx.text(StatusCode::OK, "secret")
/// }
///
/// let entry = HandlerEntry::from_chain(chain![deny, view]).unwrap();
/// let mut ctx = fixtures::context(Method::GET, "/");
/// assert_eq!(Pipeline::new(&[], &entry).run(&mut ctx), RequestState::Halted);
/// assert_eq!(ctx.response().status(), StatusCode::FORBIDDEN);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'a> {
    global: &'a [BoxedHandler],
    entry: &'a HandlerEntry,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline over borrowed chains.
    pub fn new(global: &'a [BoxedHandler], entry: &'a HandlerEntry) -> Self {
        Self { global, entry }
    }

    /// Runs every step in order until one halts or the handler has run.
    ///
    /// A closed client connection halts before the next step starts.
    pub fn run(&self, ctx: &mut RequestContext) -> RequestState {
        tracing::trace!(
            request_id = %ctx.request_id(),
            state = %RequestState::Executing,
            steps = self.global.len() + self.entry.middleware().len() + 1,
            "running chain"
        );
        for step in self.global.iter().chain(self.entry.middleware()) {
            if ctx.is_cancelled() {
                tracing::debug!(request_id = %ctx.request_id(), step = step.name(), "client gone, halting");
                return RequestState::Halted;
            }
            if step.handle(ctx).is_halt() {
                tracing::trace!(request_id = %ctx.request_id(), step = step.name(), "chain halted");
                return RequestState::Halted;
            }
        }

        if ctx.is_cancelled() {
            return RequestState::Halted;
        }
        // The handler's own outcome has no successor to stop.
        let _ = self.entry.handler().handle(ctx);
        RequestState::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use portcullis_core::{fixtures, Outcome};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn tag(name: &'static str) -> BoxedHandler {
        BoxedHandler::named(name, move |ctx: &mut RequestContext| {
            let trail = ctx
                .data("trail")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            ctx.set_data("trail", format!("{trail}{name}"));
            Outcome::Continue
        })
    }

    fn trail(ctx: &RequestContext) -> &str {
        ctx.data("trail").and_then(|v| v.as_str()).unwrap_or_default()
    }

    #[test]
    fn test_runs_in_order() {
        let entry = HandlerEntry::new(vec![tag("b"), tag("c")], tag("h"));
        let global = vec![tag("a")];
        let mut ctx = fixtures::context(Method::GET, "/");
        let state = Pipeline::new(&global, &entry).run(&mut ctx);
        assert_eq!(state, RequestState::Completed);
        assert_eq!(trail(&ctx), "abch");
    }

    #[test]
    fn test_halt_skips_rest() {
        let handler_runs = Arc::new(AtomicUsize::new(0));
        let runs = Arc::clone(&handler_runs);
        let stop = BoxedHandler::new(|ctx: &mut RequestContext| ctx.error(StatusCode::FORBIDDEN, "stop"));
        let entry = HandlerEntry::new(
            vec![tag("a"), stop, tag("c")],
            BoxedHandler::new(move |_: &mut RequestContext| {
                runs.fetch_add(1, Ordering::SeqCst);
                Outcome::Halt
            }),
        );

        let mut ctx = fixtures::context(Method::GET, "/");
        assert_eq!(Pipeline::new(&[], &entry).run(&mut ctx), RequestState::Halted);
        assert_eq!(trail(&ctx), "a");
        assert_eq!(handler_runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_outcome_does_not_change_state() {
        let entry = HandlerEntry::from_chain(vec![BoxedHandler::new(|_: &mut RequestContext| Outcome::Continue)]).unwrap();
        let mut ctx = fixtures::context(Method::GET, "/");
        assert_eq!(Pipeline::new(&[], &entry).run(&mut ctx), RequestState::Completed);
    }

    #[test]
    fn test_cancelled_connection_halts() {
        let conn = portcullis_core::ConnectionState::new();
        let mut ctx = RequestContext::with_connection(fixtures::request(Method::GET, "/"), conn.clone());
        conn.close();
        let entry = HandlerEntry::new(vec![tag("a")], tag("h"));
        assert_eq!(Pipeline::new(&[], &entry).run(&mut ctx), RequestState::Halted);
        assert_eq!(trail(&ctx), "");
    }

    #[test]
    fn test_entry_helpers() {
        assert!(HandlerEntry::from_chain(Vec::new()).is_none());
        let entry = HandlerEntry::new(vec![tag("b")], tag("h")).wrapped(&[tag("a")]);
        assert_eq!(entry.names(), vec!["a", "b", "h"]);
        assert_eq!(format!("{entry:?}"), r#"["a", "b", "h"]"#);
        assert!(RequestState::Halted.is_terminal());
        assert!(!RequestState::Executing.is_terminal());
    }
}
