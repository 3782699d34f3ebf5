//! In-memory client driving a [`Router`].

use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use portcullis::{Route, Router};
use portcullis_config::Settings;
use serde::Serialize;

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;

/// Sends requests straight into a [`Router`], no socket involved.
///
/// Requests run on Tokio's blocking pool, exactly as the server runs them,
/// so handlers may block and faults are recovered the same way.
///
/// ```
/// use http::StatusCode;
/// use portcullis::prelude::*;
/// use portcullis_test::TestClient;
///
/// # tokio_test::block_on(async {
/// let mut route = Route::new();
/// route.get("/{username}", chain![|ctx: &mut RequestContext| {
///     let name = ctx.param("username").unwrap_or_default().to_string();
///     ctx.text(StatusCode::OK, &name)
/// }]);
///
/// let client = TestClient::from_route(route).unwrap();
/// client.get("/alice").send().await.assert_body_eq("alice");
/// # });
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct TestClient {
    router: Arc<Router>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Wraps a built router.
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
            default_headers: Vec::new(),
        }
    }

    /// Builds `route` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::Compile`] if the route table does not compile.
    pub fn from_route(route: Route) -> Result<Self, TestError> {
        Self::with_settings(route, Settings::default())
    }

    /// Builds `route` with the given settings.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::Compile`] if the route table does not compile.
    pub fn with_settings(route: Route, settings: Settings) -> Result<Self, TestError> {
        Ok(Self::new(route.build(Arc::new(settings))?))
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Returns the router under test.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::get(uri))
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::post(uri))
    }

    /// Starts a PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::put(uri))
    }

    /// Starts a PATCH request.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::patch(uri))
    }

    /// Starts a DELETE request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::delete(uri))
    }

    /// Starts an OPTIONS request.
    pub fn options(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::options(uri))
    }

    /// Starts a HEAD request.
    pub fn head(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::head(uri))
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequestBuilder::new(method, uri))
    }

    /// Serves a prepared request.
    ///
    /// # Errors
    ///
    /// Fails if the worker task is lost or the body cannot be read.
    pub async fn execute(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let router = Arc::clone(&self.router);
        let request = request.into_http_request();
        let response = tokio::task::spawn_blocking(move || router.handle(request))
            .await
            .map_err(|e| TestError::Processing(e.to_string()))?;
        TestResponse::from_http(response).await
    }
}

/// A request bound to a [`TestClient`].
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, builder: TestRequestBuilder) -> Self {
        let builder = client
            .default_headers
            .iter()
            .fold(builder, |builder, (name, value)| builder.header(name, value));
        Self { client, builder }
    }

    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Adds a cookie.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.builder = self.builder.cookie(name, value);
        self
    }

    /// Sends a matching CSRF cookie and header.
    pub fn csrf_token(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.csrf_token(token);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sets a form body.
    pub fn form<K: AsRef<str>, V: AsRef<str>>(mut self, pairs: &[(K, V)]) -> Self {
        self.builder = self.builder.form(pairs);
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request is malformed; use [`try_send`](Self::try_send)
    /// to inspect the error instead.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(err) => panic!("test request failed: {err}"),
        }
    }

    /// Sends the request.
    ///
    /// # Errors
    ///
    /// See [`TestRequestBuilder::build`] and [`TestClient::execute`].
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        self.client.execute(request).await
    }
}
