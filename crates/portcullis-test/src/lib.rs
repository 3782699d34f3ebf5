//! # Portcullis Test
//!
//! In-memory testing for portcullis routers. Requests go through the full
//! dispatch path (global middleware, group middleware, gates, recovery)
//! without binding a port.
//!
//! ## Example
//!
//! ```
//! use http::StatusCode;
//! use portcullis::prelude::*;
//! use portcullis_test::TestClient;
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::default();
//! let gates = Gates::new(std::sync::Arc::new(settings.clone()));
//!
//! let mut route = Route::new();
//! route.get("/user/settings", chain![gates.req_sign_in(), |ctx: &mut RequestContext| {
//!     ctx.text(StatusCode::OK, "settings")
//! }]);
//!
//! let client = TestClient::with_settings(route, settings).unwrap();
//! client
//!     .get("/user/settings")
//!     .send()
//!     .await
//!     .assert_redirect(StatusCode::FOUND, "/user/login");
//! # });
//! ```

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
