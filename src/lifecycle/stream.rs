//! Per-stream context
//!
//! One context per HTTP exchange. It only holds the stream id and a
//! shared handle on the module configuration, so nothing leaks between
//! streams.

use std::rc::Rc;

use crate::config::FilterConfig;
use crate::headers::{inject_response_headers, rewrite_request_path, InjectionReport};
use crate::host::Host;
use crate::telemetry::RewriteOutcome;

/// Host-assigned stream identifier, used for log correlation only
pub type StreamId = u32;

#[derive(Debug, Clone)]
pub struct StreamContext {
    id: StreamId,
    config: Rc<FilterConfig>,
}

impl StreamContext {
    pub fn new(id: StreamId, config: Rc<FilterConfig>) -> Self {
        Self { id, config }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Rewrite `:path` with the module rule
    pub fn on_request_headers<H: Host + ?Sized>(&self, host: &H) -> RewriteOutcome {
        rewrite_request_path(host, self.id, self.config.rule())
    }

    /// Add the static headers and `configData`
    pub fn on_response_headers<H: Host + ?Sized>(&self, host: &H) -> InjectionReport {
        inject_response_headers(host, self.id, self.config.raw_payload())
    }
}
