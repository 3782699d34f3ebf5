//! Route registration.
//!
//! A [`Route`] is the mutable registry the application fills in at startup.
//! Groups form an explicit stack of frames; every frame holds the full prefix
//! and the full middleware chain inherited from the frames above it, so a
//! leaf registration only has to look at the top of the stack.
//!
//! ```text
//! root            prefix ""            middleware []
//!  └─ group       prefix "/user"       middleware [a]
//!      └─ group   prefix "/user/keys"  middleware [a, b]
//!          └─ get "/{id}" [c, h]  ──►  "/user/keys/{id}"  [a, b, c] + h
//! ```
//!
//! Registration errors do not abort the closure API. The first one is kept
//! and returned by [`Route::build`], so a broken table never produces a
//! [`Router`].

use std::sync::Arc;

use http::Method;
use portcullis_config::Settings;
use portcullis_core::{BoxedHandler, Handler, RequestContext};
use portcullis_middleware::HandlerEntry;
use portcullis_router::{join_paths, CompileError, MethodFilter, RoutePattern, RouteTree};

use crate::dispatch::Router;

/// One level of group nesting.
#[derive(Debug, Clone, Default)]
struct Frame {
    prefix: String,
    middleware: Vec<BoxedHandler>,
}

/// The route registry.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use portcullis::prelude::*;
/// use http::StatusCode;
///
/// fn home(ctx: &mut RequestContext) -> Outcome {
///     ctx.text(StatusCode::OK, "home")
/// }
/// fn keys(ctx: &mut RequestContext) -> Outcome {
///     ctx.text(StatusCode::OK, "keys")
/// }
/// fn signed_in(ctx: &mut RequestContext) -> Outcome {
///     if ctx.is_signed_in() { Outcome::Continue } else { ctx.error(StatusCode::FORBIDDEN, "sign in") }
/// }
///
/// let mut route = Route::new();
/// route.get("/", chain![home]);
/// route.group("/user/settings", chain![signed_in], |r| {
///     r.get("/keys", chain![keys]);
/// });
///
/// let router = route.build(Arc::new(Settings::default())).unwrap();
/// assert_eq!(router.len(), 2);
/// ```
pub struct Route {
    tree: RouteTree<HandlerEntry>,
    global: Vec<BoxedHandler>,
    stack: Vec<Frame>,
    not_found: Option<HandlerEntry>,
    error: Option<CompileError>,
}

impl Default for Route {
    fn default() -> Self {
        Self::new()
    }
}

impl Route {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: RouteTree::new(),
            global: Vec::new(),
            stack: Vec::new(),
            not_found: None,
            error: None,
        }
    }

    fn prefix(&self) -> &str {
        self.stack.last().map_or("", |frame| frame.prefix.as_str())
    }

    fn inherited(&self) -> &[BoxedHandler] {
        self.stack
            .last()
            .map_or(&[], |frame| frame.middleware.as_slice())
    }

    /// Adds middleware.
    ///
    /// At the root it runs for every request, matched or not, whenever it was
    /// added. Inside a group it is appended to that group and applies to the
    /// routes registered after it.
    pub fn use_middleware<H: Handler>(&mut self, middleware: H) -> &mut Self {
        let middleware = BoxedHandler::new(middleware);
        match self.stack.last_mut() {
            Some(frame) => frame.middleware.push(middleware),
            None => self.global.push(middleware),
        }
        self
    }

    /// Registers routes under `prefix`, each preceded by `middleware`.
    ///
    /// Groups nest: the prefix and middleware of every enclosing group come
    /// first.
    pub fn group<F>(&mut self, prefix: &str, middleware: Vec<BoxedHandler>, register: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        let mut chain = self.inherited().to_vec();
        chain.extend(middleware);
        let frame = Frame {
            prefix: join_paths(self.prefix(), prefix),
            middleware: chain,
        };

        self.stack.push(frame);
        register(self);
        self.stack.pop();
        self
    }

    /// Registers a chain for `GET`.
    pub fn get(&mut self, pattern: &str, chain: Vec<BoxedHandler>) -> &mut Self {
        self.method(Method::GET, pattern, chain)
    }

    /// Registers a chain for `POST`.
    pub fn post(&mut self, pattern: &str, chain: Vec<BoxedHandler>) -> &mut Self {
        self.method(Method::POST, pattern, chain)
    }

    /// Registers a chain for `PUT`.
    pub fn put(&mut self, pattern: &str, chain: Vec<BoxedHandler>) -> &mut Self {
        self.method(Method::PUT, pattern, chain)
    }

    /// Registers a chain for `PATCH`.
    pub fn patch(&mut self, pattern: &str, chain: Vec<BoxedHandler>) -> &mut Self {
        self.method(Method::PATCH, pattern, chain)
    }

    /// Registers a chain for `DELETE`.
    pub fn delete(&mut self, pattern: &str, chain: Vec<BoxedHandler>) -> &mut Self {
        self.method(Method::DELETE, pattern, chain)
    }

    /// Registers a chain for `HEAD`.
    pub fn head(&mut self, pattern: &str, chain: Vec<BoxedHandler>) -> &mut Self {
        self.method(Method::HEAD, pattern, chain)
    }

    /// Registers a chain for `OPTIONS`.
    pub fn options(&mut self, pattern: &str, chain: Vec<BoxedHandler>) -> &mut Self {
        self.method(Method::OPTIONS, pattern, chain)
    }

    /// Registers a chain for every method without a more specific entry.
    pub fn any(&mut self, pattern: &str, chain: Vec<BoxedHandler>) -> &mut Self {
        self.method(MethodFilter::Any, pattern, chain)
    }

    /// Registers a chain for one method filter.
    ///
    /// The last element of `chain` is the handler; the rest is route-local
    /// middleware that runs after the group middleware.
    pub fn method(
        &mut self,
        filter: impl Into<MethodFilter>,
        pattern: &str,
        chain: Vec<BoxedHandler>,
    ) -> &mut Self {
        let path = join_paths(self.prefix(), pattern);
        let result = RoutePattern::parse(&path).and_then(|pattern| self.add(&pattern, filter.into(), chain));
        self.record(result);
        self
    }

    /// Starts registering several methods on one pattern.
    ///
    /// ```
    /// # use portcullis::prelude::*;
    /// # use http::StatusCode;
    /// # fn view(ctx: &mut RequestContext) -> Outcome { ctx.text(StatusCode::OK, "form") }
    /// # fn save(ctx: &mut RequestContext) -> Outcome { ctx.redirect("/") }
    /// let mut route = Route::new();
    /// route.combo("/user/settings").get(chain![view]).post(chain![save]);
    /// # assert!(route.build(std::sync::Arc::new(Settings::default())).is_ok());
    /// ```
    pub fn combo(&mut self, pattern: &str) -> Combo<'_> {
        let path = join_paths(self.prefix(), pattern);
        let pattern = match RoutePattern::parse(&path) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                self.record(Err(err));
                None
            }
        };
        Combo {
            route: self,
            pattern,
        }
    }

    /// Grafts a separately built registry under `prefix`.
    ///
    /// For the mounted routes, this registry's global middleware runs first,
    /// then the middleware of the group enclosing the mount point, then the
    /// sub-registry's own global middleware and the route's chain. The
    /// sub-registry's not-found handler is dropped.
    pub fn mount(&mut self, prefix: &str, sub: Route) -> &mut Self {
        let Route {
            tree,
            global,
            not_found,
            error,
            ..
        } = sub;

        if let Some(err) = error {
            self.record(Err(err));
            return self;
        }
        if not_found.is_some() {
            tracing::debug!(prefix, "mounted router's not-found handler is ignored");
        }

        let base = join_paths(self.prefix(), prefix);
        let mut outer = self.inherited().to_vec();
        outer.extend(global);

        for (pattern, filter, entry) in tree.into_routes() {
            let path = join_paths(&base, pattern.as_str());
            let result = RoutePattern::parse(&path)
                .and_then(|pattern| self.insert(&pattern, filter, entry.wrapped(&outer)));
            self.record(result);
        }
        self
    }

    /// Sets the handler for requests no route serves.
    ///
    /// Root middleware runs before it; group middleware does not.
    pub fn not_found(&mut self, chain: Vec<BoxedHandler>) -> &mut Self {
        match HandlerEntry::from_chain(chain) {
            Some(entry) => self.not_found = Some(entry),
            None => self.record(Err(CompileError::MissingHandler {
                pattern: "<not found>".to_string(),
                method: MethodFilter::Any.to_string(),
            })),
        }
        self
    }

    /// Returns the number of (pattern, method) registrations so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns true if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Freezes the registry.
    ///
    /// # Errors
    ///
    /// Returns the first [`CompileError`] raised during registration.
    pub fn build(self, settings: Arc<Settings>) -> Result<Router, CompileError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let not_found = self.not_found.unwrap_or_else(default_not_found);
        tracing::debug!(routes = self.tree.len(), global = self.global.len(), "route table built");
        Ok(Router::new(self.tree, self.global, not_found, settings))
    }

    fn add(
        &mut self,
        pattern: &RoutePattern,
        filter: MethodFilter,
        chain: Vec<BoxedHandler>,
    ) -> Result<(), CompileError> {
        let entry = HandlerEntry::from_chain(chain).ok_or_else(|| CompileError::MissingHandler {
            pattern: pattern.as_str().to_string(),
            method: filter.to_string(),
        })?;
        let entry = entry.wrapped(self.inherited());
        self.insert(pattern, filter, entry)
    }

    fn insert(
        &mut self,
        pattern: &RoutePattern,
        filter: MethodFilter,
        entry: HandlerEntry,
    ) -> Result<(), CompileError> {
        let method = filter.to_string();
        tracing::trace!(route = %pattern, %method, chain = ?entry, "registering route");
        if self.tree.insert(pattern, filter, entry)?.is_some() {
            tracing::warn!(route = %pattern, %method, "route registered twice, keeping the last");
        }
        Ok(())
    }

    fn record(&mut self, result: Result<(), CompileError>) {
        if let Err(err) = result {
            tracing::error!(error = %err, "invalid route");
            self.error.get_or_insert(err);
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("routes", &self.tree.len())
            .field("global", &self.global)
            .field("depth", &self.stack.len())
            .field("error", &self.error)
            .finish()
    }
}

/// Registers several method chains on one compiled pattern.
///
/// Created by [`Route::combo`]. A pattern that failed to compile makes every
/// call a no-op; the error is already recorded on the registry.
pub struct Combo<'a> {
    route: &'a mut Route,
    pattern: Option<RoutePattern>,
}

impl Combo<'_> {
    /// Adds a `GET` chain.
    pub fn get(self, chain: Vec<BoxedHandler>) -> Self {
        self.method(Method::GET, chain)
    }

    /// Adds a `POST` chain.
    pub fn post(self, chain: Vec<BoxedHandler>) -> Self {
        self.method(Method::POST, chain)
    }

    /// Adds a `PUT` chain.
    pub fn put(self, chain: Vec<BoxedHandler>) -> Self {
        self.method(Method::PUT, chain)
    }

    /// Adds a `PATCH` chain.
    pub fn patch(self, chain: Vec<BoxedHandler>) -> Self {
        self.method(Method::PATCH, chain)
    }

    /// Adds a `DELETE` chain.
    pub fn delete(self, chain: Vec<BoxedHandler>) -> Self {
        self.method(Method::DELETE, chain)
    }

    /// Adds a chain for one method filter.
    pub fn method(self, filter: impl Into<MethodFilter>, chain: Vec<BoxedHandler>) -> Self {
        if let Some(pattern) = &self.pattern {
            let result = self.route.add(pattern, filter.into(), chain);
            self.route.record(result);
        }
        self
    }
}

fn default_not_found() -> HandlerEntry {
    HandlerEntry::new(
        Vec::new(),
        BoxedHandler::named("not_found", |ctx: &mut RequestContext| ctx.not_found()),
    )
}
