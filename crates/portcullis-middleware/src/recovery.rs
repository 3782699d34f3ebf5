//! Fault recovery at the request boundary.
//!
//! Two layers wrap every request:
//!
//! 1. The primary layer catches a panic from any middleware or handler,
//!    logs it with a backtrace, discards whatever was buffered and writes
//!    one 500. Development builds get the panic text and trace in the body;
//!    production builds get the bare status text.
//! 2. The secondary layer catches a panic raised by the primary layer
//!    itself and substitutes a fixed response built without the context.
//!
//! A panic never escapes [`Recovery::run`].
//!
//! Backtraces are captured where the panic happens by a process-wide panic
//! hook, installed on first use. The hook only acts on threads currently
//! inside [`Recovery::run`]; everywhere else the previous hook runs unchanged.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;
use portcullis_config::RunMode;
use portcullis_core::{RequestContext, Response};

use crate::pipeline::RequestState;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const INTERNAL_ERROR: &str = "Internal Server Error";

thread_local! {
    static RECOVERY_DEPTH: Cell<usize> = const { Cell::new(0) };
    static CAPTURED: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if RECOVERY_DEPTH.with(Cell::get) > 0 {
                CAPTURED.with(|slot| *slot.borrow_mut() = Some(Backtrace::force_capture()));
            } else {
                previous(info);
            }
        }));
    });
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        RECOVERY_DEPTH.with(|d| d.set(d.get() + 1));
        Self
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        RECOVERY_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// The two-layer recovery wrapper.
///
/// # Example
///
/// ```
/// use portcullis_config::RunMode;
/// use portcullis_core::fixtures;
/// use portcullis_middleware::{Recovery, RequestState};
/// use http::{Method, StatusCode};
///
/// let ctx = fixtures::context(Method::GET, "/boom");
/// let (state, response) = Recovery::new(RunMode::Prod).run(ctx, |_| panic!("index out of range"));
///
/// assert_eq!(state, RequestState::Completed);
/// assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Recovery {
    run_mode: RunMode,
}

impl Recovery {
    /// Creates the wrapper for a run mode.
    pub fn new(run_mode: RunMode) -> Self {
        Self { run_mode }
    }

    /// Runs `f` and turns the context into the response, whatever happens.
    pub fn run<F>(&self, ctx: RequestContext, f: F) -> (RequestState, Response)
    where
        F: FnOnce(&mut RequestContext) -> RequestState,
    {
        install_hook();
        let _depth = DepthGuard::enter();

        let primary = panic::catch_unwind(AssertUnwindSafe(move || {
            let mut ctx = ctx;
            let state = match panic::catch_unwind(AssertUnwindSafe(|| f(&mut ctx))) {
                Ok(state) => state,
                Err(payload) => {
                    self.respond_to_fault(&mut ctx, payload.as_ref());
                    RequestState::Completed
                }
            };
            (state, ctx.into_response())
        }));

        primary.unwrap_or_else(|_| (RequestState::Completed, fallback_response()))
    }

    fn respond_to_fault(&self, ctx: &mut RequestContext, payload: &(dyn Any + Send)) {
        let message = panic_message(payload);
        let backtrace = CAPTURED
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_else(Backtrace::force_capture);

        tracing::error!(
            request_id = %ctx.request_id(),
            http.method = %ctx.method(),
            http.path = ctx.path(),
            panic = %message,
            backtrace = %backtrace,
            "recovered from handler fault"
        );
        portcullis_telemetry::record_recovered_panic();

        if ctx.is_cancelled() {
            return;
        }

        let body = if self.run_mode.is_dev() {
            format!("PANIC: {message}\n{backtrace}")
        } else {
            INTERNAL_ERROR.to_string()
        };
        let response = ctx.response_mut();
        response.reset();
        if let Err(err) = response.respond(StatusCode::INTERNAL_SERVER_ERROR, TEXT_PLAIN, body.as_bytes()) {
            tracing::debug!(error = %err, "fault response not delivered");
        }
    }
}

/// Renders a panic payload as text.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// The fixed 500 used when recovery itself fails.
pub fn fallback_response() -> Response {
    let mut response = http::Response::new(Full::new(Bytes::from_static(INTERNAL_ERROR.as_bytes())));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    response
}
