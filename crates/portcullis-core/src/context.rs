//! Request context types.
//!
//! The [`RequestContext`] carries all per-request state through the middleware
//! chain and into the handler. It is created when a route matches, owned by
//! the worker serving the request, and dropped once the response is handed
//! back to the host. It is never shared, so nothing in it is locked.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{COOKIE, LOCATION};
use http::{HeaderMap, Method, StatusCode, Uri};
use portcullis_router::Params;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::access::Repository;
use crate::error::PortcullisError;
use crate::handler::Outcome;
use crate::identity::{CallerIdentity, SignedInUser};
use crate::response::{ConnectionState, Response, ResponseWriter, WriteError};

/// The request type handed to the router by the host.
pub type Request = http::Request<Bytes>;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log lines of one request sortable.
///
/// # Example
///
/// ```
/// use portcullis_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(RequestId::parse(&id.to_string()), Some(id));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parses an ID propagated in a header.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Per-request state shared by the middleware chain and the handler.
///
/// # Example
///
/// ```
/// use portcullis_core::{fixtures, RequestContext};
/// use http::{Method, StatusCode};
///
/// let mut ctx = fixtures::context(Method::GET, "/explore/repos?q=rust&page=2");
/// assert_eq!(ctx.path(), "/explore/repos");
/// assert_eq!(ctx.query("q").as_deref(), Some("rust"));
///
/// ctx.set_data("Title", "Explore");
/// let _ = ctx.text(StatusCode::OK, "ok");
/// assert!(ctx.is_finished());
/// ```
pub struct RequestContext {
    request_id: RequestId,
    request: Request,
    params: Params,
    route: Option<String>,
    data: Map<String, Value>,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    identity: CallerIdentity,
    csrf_valid: bool,
    repository: Option<Repository>,
    response: ResponseWriter,
    started_at: Instant,
}

impl RequestContext {
    /// Creates a context for a request on a connection that cannot be observed closing.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self::with_connection(request, ConnectionState::new())
    }

    /// Creates a context bound to the host's connection state.
    #[must_use]
    pub fn with_connection(request: Request, connection: ConnectionState) -> Self {
        Self {
            request_id: RequestId::new(),
            request,
            params: Params::new(),
            route: None,
            data: Map::new(),
            extensions: HashMap::new(),
            identity: CallerIdentity::Anonymous,
            csrf_valid: false,
            repository: None,
            response: ResponseWriter::new(connection),
            started_at: Instant::now(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Replaces the request ID (e.g. with one propagated by a proxy).
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request_id = request_id;
    }

    /// Returns the raw request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Returns the request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// Returns the path and query string as sent.
    #[must_use]
    pub fn request_uri(&self) -> &str {
        self.request
            .uri()
            .path_and_query()
            .map_or_else(|| self.path(), |pq| pq.as_str())
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// Returns a request header as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name)?.to_str().ok()
    }

    /// Returns the request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// Returns a decoded query parameter.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.request.uri().query()?;
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if decode_form(key)? == name {
                decode_form(value)
            } else {
                None
            }
        })
    }

    /// Returns a cookie value sent by the client.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.request
            .headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .find_map(|pair| {
                let (key, value) = pair.trim().split_once('=')?;
                (key == name).then_some(value)
            })
    }

    /// Returns the extracted path parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Returns a path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Installs the parameters bound by the route match.
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// Returns the pattern of the matched route, if any.
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Records the pattern of the matched route.
    pub fn set_route(&mut self, pattern: impl Into<String>) {
        self.route = Some(pattern.into());
    }

    /// Returns a value from the data bag.
    #[must_use]
    pub fn data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Stores a value in the data bag.
    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Returns the whole data bag, e.g. for a template renderer.
    #[must_use]
    pub fn data_map(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Stores a typed extension, replacing one of the same type.
    pub fn insert_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns a typed extension.
    #[must_use]
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    /// Returns a typed extension for modification.
    pub fn extension_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut())
    }

    /// Removes and returns a typed extension.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok())
            .map(|boxed| *boxed)
    }

    /// Returns the caller identity.
    #[must_use]
    pub fn identity(&self) -> &CallerIdentity {
        &self.identity
    }

    /// Sets the caller identity.
    pub fn set_identity(&mut self, identity: impl Into<CallerIdentity>) {
        self.identity = identity.into();
    }

    /// Returns true if a user is signed in.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.identity.is_signed_in()
    }

    /// Returns the signed-in user.
    #[must_use]
    pub fn signed_in_user(&self) -> Option<&SignedInUser> {
        self.identity.signed_in_user()
    }

    /// Returns true if the request carried a valid CSRF token.
    #[must_use]
    pub fn csrf_valid(&self) -> bool {
        self.csrf_valid
    }

    /// Records the CSRF check result.
    pub fn set_csrf_valid(&mut self, valid: bool) {
        self.csrf_valid = valid;
    }

    /// Returns the repository the request operates on.
    #[must_use]
    pub fn repository(&self) -> Option<&Repository> {
        self.repository.as_ref()
    }

    /// Attaches the repository and the caller's permission on it.
    pub fn set_repository(&mut self, repository: Repository) {
        self.repository = Some(repository);
    }

    /// Returns the response writer.
    #[must_use]
    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    /// Returns the raw response writer, e.g. for streaming protocols.
    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    /// Returns true once a response has been written.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.response.is_written()
    }

    /// Returns true once the client has disconnected.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.response.connection().is_closed()
    }

    /// Returns the time elapsed since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Writes a plain-text response.
    pub fn text(&mut self, status: StatusCode, body: &str) -> Outcome {
        let result = self.response.respond(status, TEXT_PLAIN, body.as_bytes());
        self.settle(result)
    }

    /// Writes a JSON response.
    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) -> Outcome {
        match serde_json::to_vec(value) {
            Ok(body) => {
                let result = self.response.respond(status, APPLICATION_JSON, &body);
                self.settle(result)
            }
            Err(err) => {
                tracing::error!(request_id = %self.request_id, error = %err, "failed to encode JSON response");
                self.error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }

    /// Writes an error response with a plain-text message.
    pub fn error(&mut self, status: StatusCode, message: &str) -> Outcome {
        self.text(status, message)
    }

    /// Reports an error to the client using its status and public message.
    pub fn fail(&mut self, err: &PortcullisError) -> Outcome {
        tracing::debug!(
            request_id = %self.request_id,
            category = err.category().as_str(),
            error = %err,
            "request rejected"
        );
        self.error(err.status_code(), &err.public_message())
    }

    /// Writes the standard 404 response.
    pub fn not_found(&mut self) -> Outcome {
        self.error(StatusCode::NOT_FOUND, "Not Found")
    }

    /// Redirects with `302 Found`.
    pub fn redirect(&mut self, location: &str) -> Outcome {
        self.redirect_with(StatusCode::FOUND, location)
    }

    /// Redirects with `301 Moved Permanently`.
    pub fn redirect_permanent(&mut self, location: &str) -> Outcome {
        self.redirect_with(StatusCode::MOVED_PERMANENTLY, location)
    }

    fn redirect_with(&mut self, status: StatusCode, location: &str) -> Outcome {
        if let Err(err) = self.response.set_header(LOCATION.as_str(), location) {
            tracing::error!(request_id = %self.request_id, error = %err, "unusable redirect location");
            return self.error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
        let body = format!(
            "<a href=\"{}\">{}</a>.\n",
            html_escape(location),
            status.canonical_reason().unwrap_or("Redirect")
        );
        let result = self.response.respond(status, TEXT_HTML, body.as_bytes());
        self.settle(result)
    }

    /// Adds a `Set-Cookie` header; the value is percent-encoded.
    ///
    /// # Errors
    ///
    /// Fails if the cookie does not form a valid header.
    pub fn set_cookie(&mut self, name: &str, value: &str, path: &str) -> Result<(), WriteError> {
        let cookie = format!(
            "{name}={}; Path={path}; HttpOnly; SameSite=Lax",
            urlencoding::encode(value)
        );
        self.response.append_header("set-cookie", &cookie)
    }

    /// Consumes the context, producing the response for the host.
    #[must_use]
    pub fn into_response(self) -> Response {
        self.response.into_response()
    }

    /// Turns a write result into `Halt`; a write to a closed connection is
    /// logged, not escalated.
    fn settle(&self, result: Result<(), WriteError>) -> Outcome {
        if let Err(err) = result {
            tracing::debug!(request_id = %self.request_id, error = %err, "response write failed");
        }
        Outcome::Halt
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", self.method())
            .field("path", &self.path())
            .field("params", &self.params)
            .field("identity", &self.identity.log_id())
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

fn decode_form(s: &str) -> Option<String> {
    urlencoding::decode(&s.replace('+', " "))
        .ok()
        .map(std::borrow::Cow::into_owned)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessMode, Permission};
    use crate::fixtures;

    #[test]
    fn test_query_decoding() {
        let ctx = fixtures::context(Method::GET, "/search?q=hello+world&tab=%E2%9C%93&flag");
        assert_eq!(ctx.query("q").as_deref(), Some("hello world"));
        assert_eq!(ctx.query("tab").as_deref(), Some("✓"));
        assert_eq!(ctx.query("flag").as_deref(), Some(""));
        assert_eq!(ctx.query("missing"), None);
    }

    #[test]
    fn test_cookies() {
        let request = http::Request::builder()
            .uri("/")
            .header(COOKIE, "lang=en-US; i_like_gitea=abc123")
            .body(Bytes::new())
            .unwrap();
        let ctx = RequestContext::new(request);
        assert_eq!(ctx.cookie("i_like_gitea"), Some("abc123"));
        assert_eq!(ctx.cookie("lang"), Some("en-US"));
        assert_eq!(ctx.cookie("nope"), None);
    }

    #[test]
    fn test_extensions() {
        #[derive(Debug, PartialEq)]
        struct Locale(&'static str);

        let mut ctx = fixtures::context(Method::GET, "/");
        ctx.insert_extension(Locale("de"));
        assert_eq!(ctx.extension::<Locale>(), Some(&Locale("de")));
        if let Some(locale) = ctx.extension_mut::<Locale>() {
            locale.0 = "fr";
        }
        assert_eq!(ctx.remove_extension::<Locale>(), Some(Locale("fr")));
        assert!(ctx.extension::<Locale>().is_none());
    }

    #[test]
    fn test_redirect_keeps_cookie() {
        let mut ctx = fixtures::context(Method::GET, "/user/settings");
        ctx.set_cookie("redirect_to", "/user/settings?tab=keys", "/").unwrap();
        assert_eq!(ctx.redirect("/user/login"), Outcome::Halt);

        let response = ctx.into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/user/login");
        let cookie = response.headers()["set-cookie"].to_str().unwrap();
        assert!(cookie.starts_with("redirect_to=%2Fuser%2Fsettings%3Ftab%3Dkeys;"));
    }

    #[test]
    fn test_permanent_redirect() {
        let mut ctx = fixtures::context(Method::GET, "/apple-touch-icon.png");
        let _ = ctx.redirect_permanent("/assets/img/apple-touch-icon.png");
        assert_eq!(ctx.response().status(), StatusCode::MOVED_PERMANENTLY);
    }

    #[test]
    fn test_unusable_redirect_location_is_a_server_error() {
        let mut ctx = fixtures::context(Method::GET, "/user/login");
        assert_eq!(ctx.redirect("/user/settings\r\nx-injected: 1"), Outcome::Halt);
        assert_eq!(ctx.response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(ctx.response().headers().get(LOCATION).is_none());
        assert_eq!(ctx.response().body(), b"Internal Server Error");
    }

    #[test]
    fn test_fail_uses_public_message() {
        let mut ctx = fixtures::context(Method::POST, "/repo/create");
        let _ = ctx.fail(&PortcullisError::bad_request("csrf", "Invalid CSRF token."));
        assert_eq!(ctx.response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(ctx.response().body(), b"Invalid CSRF token.");
    }

    #[test]
    fn test_cancelled_writes_still_halt() {
        let connection = ConnectionState::new();
        let mut ctx = RequestContext::with_connection(fixtures::request(Method::GET, "/"), connection.clone());
        connection.close();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.text(StatusCode::OK, "late"), Outcome::Halt);
        assert!(!ctx.is_finished());
    }

    #[test]
    fn test_identity_and_repository() {
        let mut ctx = fixtures::context(Method::GET, "/alice/proj");
        assert!(!ctx.is_signed_in());
        ctx.set_identity(fixtures::alice());
        assert_eq!(ctx.signed_in_user().map(|u| u.name.as_str()), Some("alice"));

        ctx.set_repository(Repository::new("alice", "proj", Permission::new(AccessMode::Owner)));
        assert!(ctx.repository().is_some_and(|r| r.permission.is_admin()));
    }
}
