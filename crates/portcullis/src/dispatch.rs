//! The frozen router.
//!
//! A [`Router`] is produced once by [`crate::Route::build`] and never changes
//! afterwards. It is `Send + Sync`; hosts share it behind an `Arc` and call
//! [`Router::serve`] from as many workers as they like without locking.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use http::Method;
use portcullis_config::Settings;
use portcullis_core::{BoxedHandler, ConnectionState, Handler, Request, RequestContext, Response};
use portcullis_middleware::stages::REQUEST_ID_HEADER;
use portcullis_middleware::{HandlerEntry, Pipeline, Recovery, RequestState};
use portcullis_router::{Lookup, RouteTree};
use portcullis_telemetry::{record_not_found, record_request, InFlightGuard, UNMATCHED_ROUTE};

/// Dispatches requests to the registered chains.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use portcullis::prelude::*;
/// use portcullis_core::fixtures;
/// use http::{Method, StatusCode};
///
/// fn profile(ctx: &mut RequestContext) -> Outcome {
///     let name = ctx.param("username").unwrap_or_default().to_string();
///     ctx.text(StatusCode::OK, &name)
/// }
///
/// let mut route = Route::new();
/// route.get("/{username}", chain![profile]);
/// let router = route.build(Arc::new(Settings::default())).unwrap();
///
/// let response = router.handle(fixtures::request(Method::GET, "/alice"));
/// assert_eq!(response.status(), StatusCode::OK);
/// ```
pub struct Router {
    tree: RouteTree<HandlerEntry>,
    global: Vec<BoxedHandler>,
    not_found: HandlerEntry,
    settings: Arc<Settings>,
    recovery: Recovery,
}

impl Router {
    pub(crate) fn new(
        tree: RouteTree<HandlerEntry>,
        global: Vec<BoxedHandler>,
        not_found: HandlerEntry,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            tree,
            global,
            not_found,
            recovery: Recovery::new(settings.run_mode),
            settings,
        }
    }

    /// Returns the settings snapshot the router was built with.
    #[must_use]
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Returns the number of (pattern, method) registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns true if no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Lists every registration as `(method, pattern)`.
    #[must_use]
    pub fn routes(&self) -> Vec<(String, String)> {
        self.tree
            .routes()
            .into_iter()
            .map(|(pattern, filter)| (filter.to_string(), pattern.as_str().to_string()))
            .collect()
    }

    /// Returns the step names a request would run, global middleware first.
    ///
    /// `None` when the request would fall through to the not-found handler.
    #[must_use]
    pub fn chain_names(&self, method: &Method, path: &str) -> Option<Vec<&str>> {
        let path = self.lookup_path(path);
        match self.tree.lookup(method, path, self.settings.router.head_from_get) {
            Lookup::Found(found) => Some(
                self.global
                    .iter()
                    .map(Handler::name)
                    .chain(found.entry.names())
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Serves a request on a fresh, never-closing connection.
    pub fn handle(&self, request: Request) -> Response {
        self.serve(request, ConnectionState::new())
    }

    /// Serves one request to completion.
    ///
    /// Never panics and always yields exactly one response: a fault in any
    /// step is turned into a 500 by the recovery boundary.
    pub fn serve(&self, request: Request, connection: ConnectionState) -> Response {
        let _in_flight = InFlightGuard::new();
        let started = Instant::now();

        let mut ctx = RequestContext::with_connection(request, connection);
        let method = ctx.method().clone();
        let path = ctx.path().to_string();
        let request_id = ctx.request_id().to_string();

        let (entry, route) = self.resolve(&mut ctx, &method, &path);
        let (state, response) = self
            .recovery
            .run(ctx, |ctx| Pipeline::new(&self.global, entry).run(ctx));

        let status = response.status();
        let elapsed = started.elapsed();
        record_request(route.as_deref().unwrap_or(UNMATCHED_ROUTE), status.as_u16(), elapsed);

        if self.settings.router.access_log {
            let request_id = response
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(&request_id);
            tracing::info!(
                target: "portcullis::access",
                request_id,
                http.method = %method,
                http.path = %path,
                http.status_code = status.as_u16(),
                route = route.as_deref().unwrap_or(UNMATCHED_ROUTE),
                duration_ms = elapsed.as_secs_f64() * 1000.0,
                state = state.as_str(),
                "request completed"
            );
        }

        response
    }

    /// Matches the request, binding parameters and route onto the context.
    fn resolve(
        &self,
        ctx: &mut RequestContext,
        method: &Method,
        path: &str,
    ) -> (&HandlerEntry, Option<String>) {
        tracing::trace!(
            request_id = %ctx.request_id(),
            state = %RequestState::Matching,
            %method,
            path,
            "resolving route"
        );
        let lookup_path = self.lookup_path(path);
        match self.tree.lookup(method, lookup_path, self.settings.router.head_from_get) {
            Lookup::Found(found) => {
                let pattern = found.pattern.as_str().to_string();
                if found.suppress_body() {
                    ctx.response_mut().set_suppress_body(true);
                }
                ctx.set_params(found.params);
                ctx.set_route(pattern.as_str());
                (found.entry, Some(pattern))
            }
            Lookup::MethodNotAllowed { allowed } => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    %method,
                    path,
                    ?allowed,
                    "method not registered for path, serving not found"
                );
                record_not_found();
                (&self.not_found, None)
            }
            Lookup::NotFound => {
                record_not_found();
                (&self.not_found, None)
            }
        }
    }

    fn lookup_path<'p>(&self, path: &'p str) -> &'p str {
        if self.settings.router.strip_slashes {
            strip_trailing_slashes(path)
        } else {
            path
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.tree.len())
            .field("global", &self.global)
            .field("not_found", &self.not_found)
            .field("run_mode", &self.settings.run_mode)
            .finish()
    }
}

/// Removes trailing slashes, keeping the root path.
fn strip_trailing_slashes(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}
