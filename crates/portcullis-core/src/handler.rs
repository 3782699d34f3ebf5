//! The handler contract.
//!
//! Middleware and terminal handlers share one shape: they receive the
//! request's [`RequestContext`] and report whether the chain may go on.
//! Plain functions and closures with the signature
//! `Fn(&mut RequestContext) -> Outcome` implement [`Handler`] directly.

use std::fmt;
use std::sync::Arc;

use crate::RequestContext;

/// Whether the pipeline continues after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub enum Outcome {
    /// Run the next step.
    Continue,
    /// Skip every remaining step, including the terminal handler.
    Halt,
}

impl Outcome {
    /// Returns true for [`Outcome::Halt`].
    #[must_use]
    pub const fn is_halt(self) -> bool {
        matches!(self, Self::Halt)
    }

    /// Returns true for [`Outcome::Continue`].
    #[must_use]
    pub const fn is_continue(self) -> bool {
        matches!(self, Self::Continue)
    }
}

/// A middleware step or terminal handler.
///
/// Handlers run synchronously on the request's worker and may block.
/// Their only observable effects go through the context.
///
/// # Example
///
/// ```
/// use portcullis_core::{fixtures, Handler, Outcome, RequestContext};
/// use http::{Method, StatusCode};
///
/// fn home(ctx: &mut RequestContext) -> Outcome {
///     ctx.text(StatusCode::OK, "welcome")
/// }
///
/// let mut ctx = fixtures::context(Method::GET, "/");
/// assert!(home.handle(&mut ctx).is_halt());
/// assert!(ctx.is_finished());
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Processes the request.
    fn handle(&self, ctx: &mut RequestContext) -> Outcome;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Handler for F
where
    F: Fn(&mut RequestContext) -> Outcome + Send + Sync + 'static,
{
    fn handle(&self, ctx: &mut RequestContext) -> Outcome {
        self(ctx)
    }
}

/// A shared, type-erased handler.
///
/// Cloning is cheap; the same gate can be attached to many routes.
#[derive(Clone)]
pub struct BoxedHandler {
    inner: Arc<dyn Handler>,
    name: Option<Arc<str>>,
}

impl BoxedHandler {
    /// Erases a handler.
    pub fn new<H: Handler>(handler: H) -> Self {
        Self {
            inner: Arc::new(handler),
            name: None,
        }
    }

    /// Erases a handler under an explicit log name.
    pub fn named<H: Handler>(name: impl Into<Arc<str>>, handler: H) -> Self {
        Self {
            inner: Arc::new(handler),
            name: Some(name.into()),
        }
    }
}

impl Handler for BoxedHandler {
    fn handle(&self, ctx: &mut RequestContext) -> Outcome {
        self.inner.handle(ctx)
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.inner.name())
    }
}

impl fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoxedHandler").field(&self.name()).finish()
    }
}

/// Builds a `Vec<BoxedHandler>` from handlers of mixed types.
///
/// ```
/// use portcullis_core::{chain, Outcome, RequestContext};
///
/// fn check(_: &mut RequestContext) -> Outcome { Outcome::Continue }
/// fn view(_: &mut RequestContext) -> Outcome { Outcome::Halt }
///
/// let handlers = chain![check, view];
/// assert_eq!(handlers.len(), 2);
/// ```
#[macro_export]
macro_rules! chain {
    ($($handler:expr),* $(,)?) => {
        vec![$($crate::BoxedHandler::new($handler)),*]
    };
}
