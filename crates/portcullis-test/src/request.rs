//! Test request building.

use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use portcullis_core::Request;
use serde::Serialize;

use crate::error::TestError;

/// A request ready to hand to a [`TestClient`](crate::TestClient).
#[derive(Debug)]
pub struct TestRequest {
    /// HTTP method
    pub method: Method,
    /// Request target
    pub uri: Uri,
    /// Request headers, cookies included
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
}

impl TestRequest {
    /// Starts a GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Starts a PATCH request.
    pub fn patch(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PATCH, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Starts an OPTIONS request.
    pub fn options(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::OPTIONS, uri)
    }

    /// Starts a HEAD request.
    pub fn head(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::HEAD, uri)
    }

    /// Converts into the request type the router serves.
    #[must_use]
    pub fn into_http_request(self) -> Request {
        let mut request = http::Request::new(self.body);
        *request.method_mut() = self.method;
        *request.uri_mut() = self.uri;
        *request.headers_mut() = self.headers;
        request
    }
}

/// Builder for [`TestRequest`].
///
/// Invalid header names or values are remembered and reported by
/// [`build`](Self::build), so chains never panic halfway.
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    body: Option<Bytes>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a builder for `method` and `uri`.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: None,
            error: None,
        }
    }

    /// Sets a header, replacing any previous value.
    ///
    /// ```
    /// use portcullis_test::TestRequest;
    ///
    /// let request = TestRequest::get("/explore/repos")
    ///     .header("x-request-id", "req-1")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(request.headers["x-request-id"], "req-1");
    /// ```
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        let parsed = HeaderName::try_from(name)
            .map_err(|e| TestError::InvalidHeader(format!("{name}: {e}")))
            .and_then(|n| {
                HeaderValue::try_from(value.as_ref())
                    .map(|v| (n, v))
                    .map_err(|e| TestError::InvalidHeader(format!("{name}: {e}")))
            });
        match parsed {
            Ok((name, value)) => {
                self.headers.insert(name, value);
            }
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    /// Sets the `Content-Type` header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Adds a cookie. All cookies are sent in one `Cookie` header.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Sends a matching `_csrf` cookie and `x-csrf-token` header.
    pub fn csrf_token(self, token: impl AsRef<str>) -> Self {
        let token = token.as_ref();
        self.cookie("_csrf", token).header("x-csrf-token", token)
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON body and `Content-Type: application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Some(Bytes::from(bytes)),
            Err(err) => {
                self.error.get_or_insert(TestError::Json(err));
            }
        }
        self.content_type("application/json")
    }

    /// Sets a form body from key/value pairs.
    ///
    /// ```
    /// use portcullis_test::TestRequest;
    ///
    /// let request = TestRequest::post("/user/login")
    ///     .form(&[("user_name", "alice"), ("redirect_to", "/a b")])
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(request.body, "user_name=alice&redirect_to=%2Fa%20b");
    /// ```
    pub fn form<K: AsRef<str>, V: AsRef<str>>(mut self, pairs: &[(K, V)]) -> Self {
        let encoded = pairs
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    urlencoding::encode(k.as_ref()),
                    urlencoding::encode(v.as_ref())
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        self.body = Some(Bytes::from(encoded));
        self.content_type("application/x-www-form-urlencoded")
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Returns the first invalid header or body, or an unparseable URI.
    pub fn build(mut self) -> Result<TestRequest, TestError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }

        let uri: Uri = self
            .uri
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("invalid URI '{}': {e}", self.uri)))?;

        if !self.cookies.is_empty() {
            let line = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            let value = HeaderValue::try_from(line)
                .map_err(|e| TestError::InvalidHeader(format!("cookie: {e}")))?;
            self.headers.insert(header::COOKIE, value);
        }

        Ok(TestRequest {
            method: self.method,
            uri,
            headers: self.headers,
            body: self.body.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cookies_share_one_header() {
        let request = TestRequest::get("/")
            .cookie("i_like_gitea", "s3ss10n")
            .cookie("lang", "en-US")
            .build()
            .unwrap();
        assert_eq!(request.headers[header::COOKIE], "i_like_gitea=s3ss10n; lang=en-US");
    }

    #[test]
    fn test_csrf_token_sets_cookie_and_header() {
        let request = TestRequest::post("/user/logout").csrf_token("t0k3n").build().unwrap();
        assert_eq!(request.headers["x-csrf-token"], "t0k3n");
        assert_eq!(request.headers[header::COOKIE], "_csrf=t0k3n");
    }

    #[test]
    fn test_json_body() {
        let request = TestRequest::post("/api/repos")
            .json(&json!({"name": "proj"}))
            .build()
            .unwrap();
        assert_eq!(request.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(request.body, r#"{"name":"proj"}"#);
    }

    #[test]
    fn test_invalid_header_reported_at_build() {
        let err = TestRequest::get("/")
            .header("bad header", "x")
            .header("x-fine", "ok")
            .build()
            .unwrap_err();
        assert!(matches!(err, TestError::InvalidHeader(_)));
    }

    #[test]
    fn test_invalid_uri() {
        let err = TestRequest::get("http://[::1").build().unwrap_err();
        assert!(matches!(err, TestError::RequestBuild(_)));
    }

    #[test]
    fn test_into_http_request() {
        let request = TestRequest::put("/alice/proj/settings?tab=units")
            .body("payload")
            .build()
            .unwrap()
            .into_http_request();
        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.uri().path(), "/alice/proj/settings");
        assert_eq!(request.uri().query(), Some("tab=units"));
        assert_eq!(request.body(), "payload");
    }
}
