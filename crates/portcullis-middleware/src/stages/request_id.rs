//! Request ID propagation.
//!
//! Every context starts with a fresh UUID v7. Behind a trusted proxy the
//! stage adopts a valid `X-Request-ID` instead; either way the ID is echoed
//! on the response so clients can quote it.

use portcullis_core::{Handler, Outcome, RequestContext, RequestId};

/// The header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Adopts or keeps the request ID and echoes it on the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdStage {
    trust_incoming: bool,
}

impl RequestIdStage {
    /// Always keeps the generated ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts a valid incoming `X-Request-ID`.
    pub fn trust_incoming() -> Self {
        Self {
            trust_incoming: true,
        }
    }
}

impl Handler for RequestIdStage {
    fn handle(&self, ctx: &mut RequestContext) -> Outcome {
        if self.trust_incoming {
            if let Some(id) = ctx.header(REQUEST_ID_HEADER).and_then(RequestId::parse) {
                ctx.set_request_id(id);
            }
        }

        let id = ctx.request_id().to_string();
        if let Err(err) = ctx.response_mut().set_header(REQUEST_ID_HEADER, &id) {
            tracing::debug!(error = %err, "request id header not set");
        }
        Outcome::Continue
    }

    fn name(&self) -> &str {
        "request_id"
    }
}
