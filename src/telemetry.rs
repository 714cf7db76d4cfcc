//! Telemetry Module for the path rewrite filter
//!
//! In Wasm, we emit structured logs that can be collected by
//! Envoy's access logging or external collectors.

use log::{info, warn};
use serde::Serialize;

/// Audit line prefix, for grepping in Envoy logs
pub const AUDIT_PREFIX: &str = "[PATH-REWRITE-AUDIT]";

/// Outcome of a request header pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteOutcome {
    /// Path matched and was written back
    Rewritten,
    /// No match or no rule; path left as-is
    Unchanged,
    /// `:path` could not be read
    ReadFailed,
    /// Rewritten path could not be written back
    WriteFailed,
}

impl RewriteOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RewriteOutcome::ReadFailed | RewriteOutcome::WriteFailed)
    }
}

/// One rewrite decision for one stream
#[derive(Debug, Clone, Serialize)]
pub struct RewriteEvent {
    pub stream_id: u32,
    pub outcome: RewriteOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RewriteEvent {
    pub fn new(stream_id: u32, outcome: RewriteOutcome) -> Self {
        Self {
            stream_id,
            outcome,
            original_path: None,
            rewritten_path: None,
            reason: None,
        }
    }

    pub fn with_original(mut self, path: &str) -> Self {
        self.original_path = Some(path.to_string());
        self
    }

    pub fn with_rewritten(mut self, path: &str) -> Self {
        self.rewritten_path = Some(path.to_string());
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    /// Log the event
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) if self.outcome.is_failure() => warn!("{} {}", AUDIT_PREFIX, json),
            Ok(json) => info!("{} {}", AUDIT_PREFIX, json),
            Err(e) => warn!("Failed to serialize rewrite event: {}", e),
        }
    }
}
