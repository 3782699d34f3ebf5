//! Buffered response writer.
//!
//! Handlers write into a [`ResponseWriter`]; the host turns it into an
//! [`http::Response`] once the pipeline returns. Output is buffered until
//! then, which lets fault recovery discard a half-written response and
//! replace it with a single 500.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use thiserror::Error;

/// The response type produced for the host.
pub type Response = http::Response<Full<Bytes>>;

/// A failed response write.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The client went away; nothing more will be delivered.
    #[error("connection closed by client")]
    ConnectionClosed,

    /// A header name or value was not valid HTTP.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader {
        /// The header being set
        name: String,
        /// Why it was rejected
        reason: String,
    },
}

impl From<WriteError> for io::Error {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::ConnectionClosed => Self::new(io::ErrorKind::BrokenPipe, err),
            WriteError::InvalidHeader { .. } => Self::new(io::ErrorKind::InvalidInput, err),
        }
    }
}

/// Liveness of the client connection serving a request.
///
/// The host flips it when the client disconnects; handlers observe it
/// through failed writes and [`crate::RequestContext::is_cancelled`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    closed: Arc<AtomicBool>,
}

impl ConnectionState {
    /// Creates an open connection state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the connection closed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Returns true once the client has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// The response being assembled for one request.
///
/// # Example
///
/// ```
/// use portcullis_core::{ConnectionState, ResponseWriter};
/// use http::StatusCode;
///
/// let mut writer = ResponseWriter::new(ConnectionState::new());
/// writer.set_status(StatusCode::CREATED).unwrap();
/// writer.write_str("done").unwrap();
///
/// let response = writer.into_response();
/// assert_eq!(response.status(), StatusCode::CREATED);
/// ```
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    written: bool,
    suppress_body: bool,
    connection: ConnectionState,
}

impl ResponseWriter {
    /// Creates an empty `200 OK` response bound to a connection.
    #[must_use]
    pub fn new(connection: ConnectionState) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            written: false,
            suppress_body: false,
            connection,
        }
    }

    fn check_open(&self) -> Result<(), WriteError> {
        if self.connection.is_closed() {
            Err(WriteError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status and marks the response as written.
    ///
    /// # Errors
    ///
    /// Fails with [`WriteError::ConnectionClosed`] if the client is gone.
    pub fn set_status(&mut self, status: StatusCode) -> Result<(), WriteError> {
        self.check_open()?;
        self.status = status;
        self.written = true;
        Ok(())
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the response headers for in-place edits.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Replaces a header.
    ///
    /// # Errors
    ///
    /// Fails if the name or value is not valid HTTP.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), WriteError> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Adds a header, keeping existing values of the same name.
    ///
    /// # Errors
    ///
    /// Fails if the name or value is not valid HTTP.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<(), WriteError> {
        let (name, value) = parse_header(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Appends body bytes.
    ///
    /// For a `HEAD` served by a `GET` route the bytes are counted but dropped.
    ///
    /// # Errors
    ///
    /// Fails with [`WriteError::ConnectionClosed`] if the client is gone.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        self.check_open()?;
        self.written = true;
        if !self.suppress_body {
            self.body.extend_from_slice(data);
        }
        Ok(data.len())
    }

    /// Appends UTF-8 text to the body.
    ///
    /// # Errors
    ///
    /// Fails with [`WriteError::ConnectionClosed`] if the client is gone.
    pub fn write_str(&mut self, text: &str) -> Result<usize, WriteError> {
        self.write(text.as_bytes())
    }

    /// Returns true once a status or body byte has been written.
    #[must_use]
    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Returns the buffered body length.
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Returns the buffered body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Drops body bytes from now on.
    pub fn set_suppress_body(&mut self, suppress: bool) {
        self.suppress_body = suppress;
    }

    /// Returns true if body bytes are being dropped.
    #[must_use]
    pub fn suppresses_body(&self) -> bool {
        self.suppress_body
    }

    /// Discards status, headers and body, keeping the connection binding.
    pub fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        self.written = false;
    }

    /// Returns the connection this writer delivers to.
    #[must_use]
    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    /// Finalises the response.
    #[must_use]
    pub fn into_response(self) -> Response {
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }

    /// Writes a complete response in one step, replacing any buffered body.
    ///
    /// Headers already set (cookies, `Location`) are kept.
    ///
    /// # Errors
    ///
    /// Fails with [`WriteError::ConnectionClosed`] if the client is gone.
    pub fn respond(
        &mut self,
        status: StatusCode,
        content_type: &'static str,
        body: &[u8],
    ) -> Result<(), WriteError> {
        self.check_open()?;
        self.body.clear();
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.set_status(status)?;
        self.write(body)?;
        Ok(())
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(Self::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.check_open()?)
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), WriteError> {
    let invalid = |reason: String| WriteError::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    Ok((header, value))
}
