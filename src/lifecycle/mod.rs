//! Lifecycle Dispatcher
//!
//! Explicit state machine over the events Envoy delivers:
//! module start/stop and, per stream, start, request headers,
//! response headers and end. The proxy-wasm contexts in `filter.rs`
//! only translate SDK callbacks into [`LifecycleEvent`]s.
//!
//! ```text
//! Uninitialized --start ok--> Started --stop--> Stopped
//!       |                                          ^
//!       +--start err--> Failed -------stop---------+
//! ```

pub mod stream;

pub use stream::{StreamContext, StreamId};

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::{ConfigError, FilterConfig};
use crate::host::Host;

/// Module lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Uninitialized,
    Started,
    /// Configuration failed; no stream is accepted
    Failed,
    Stopped,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleState::Uninitialized => "uninitialized",
            ModuleState::Started => "started",
            ModuleState::Failed => "failed",
            ModuleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Events issued by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    ModuleStart,
    StreamStart(StreamId),
    RequestHeaders {
        stream: StreamId,
        num_headers: usize,
        end_of_stream: bool,
    },
    ResponseHeaders {
        stream: StreamId,
        num_headers: usize,
        end_of_stream: bool,
    },
    StreamEnd(StreamId),
    ModuleStop,
}

/// Why an event was refused
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("configuration rejected: {0}")]
    Configuration(#[from] ConfigError),
    #[error("module is {0}, not started")]
    NotStarted(ModuleState),
    #[error("module already {0}, configuration is set once")]
    AlreadyStarted(ModuleState),
    #[error("stream {0} is already active")]
    DuplicateStream(StreamId),
    #[error("stream {0} is not active")]
    UnknownStream(StreamId),
}

/// Owns the module configuration and every active stream context
#[derive(Debug)]
pub struct Dispatcher {
    state: ModuleState,
    config: Option<Rc<FilterConfig>>,
    streams: HashMap<StreamId, StreamContext>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            state: ModuleState::Uninitialized,
            config: None,
            streams: HashMap::new(),
        }
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn config(&self) -> Option<&FilterConfig> {
        self.config.as_deref()
    }

    pub fn active_streams(&self) -> usize {
        self.streams.len()
    }

    /// Apply one host event. Per-stream errors never touch other streams.
    pub fn dispatch<H: Host + ?Sized>(
        &mut self,
        event: LifecycleEvent,
        host: &H,
    ) -> Result<(), DispatchError> {
        match event {
            LifecycleEvent::ModuleStart => {
                let config = Self::load_config(host);
                self.start(config)
            }
            LifecycleEvent::StreamStart(id) => self.open_stream(id),
            LifecycleEvent::RequestHeaders {
                stream,
                num_headers,
                end_of_stream,
            } => {
                debug!(
                    "[context_id={}] on_http_request_headers({}, {})",
                    stream, num_headers, end_of_stream
                );
                self.stream(stream)?.on_request_headers(host);
                Ok(())
            }
            LifecycleEvent::ResponseHeaders {
                stream,
                num_headers,
                end_of_stream,
            } => {
                debug!(
                    "[context_id={}] on_http_response_headers({}, {})",
                    stream, num_headers, end_of_stream
                );
                self.stream(stream)?.on_response_headers(host);
                Ok(())
            }
            LifecycleEvent::StreamEnd(id) => self.close_stream(id),
            LifecycleEvent::ModuleStop => {
                self.stop();
                Ok(())
            }
        }
    }

    /// Fetch and compile the configuration. A failed fetch is treated as
    /// "no payload".
    fn load_config<H: Host + ?Sized>(host: &H) -> Result<FilterConfig, ConfigError> {
        let payload = match host.plugin_configuration() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed read plug-in config: {}", e);
                None
            }
        };

        if let Some(bytes) = payload.as_deref() {
            info!("read plug-in config: {}", String::from_utf8_lossy(bytes));
        }

        FilterConfig::initialize(payload.as_deref())
    }

    /// Install a configuration built by the caller
    pub fn start(&mut self, config: Result<FilterConfig, ConfigError>) -> Result<(), DispatchError> {
        if self.state != ModuleState::Uninitialized {
            return Err(DispatchError::AlreadyStarted(self.state));
        }

        match config {
            Ok(config) => {
                if config.is_noop() {
                    info!("No plug-in configuration, path rewriting disabled");
                } else if let Some(rule) = config.rule() {
                    info!(
                        "Path rewrite filter started: '{}' -> '{}'",
                        rule.pattern(),
                        rule.replacement()
                    );
                }
                self.config = Some(Rc::new(config));
                self.state = ModuleState::Started;
                Ok(())
            }
            Err(e) => {
                warn!("Path rewrite filter failed to start: {}", e);
                self.state = ModuleState::Failed;
                Err(e.into())
            }
        }
    }

    fn open_stream(&mut self, id: StreamId) -> Result<(), DispatchError> {
        let config = match (&self.state, &self.config) {
            (ModuleState::Started, Some(config)) => Rc::clone(config),
            _ => return Err(DispatchError::NotStarted(self.state)),
        };

        if self.streams.contains_key(&id) {
            return Err(DispatchError::DuplicateStream(id));
        }

        debug!("[context_id={}] stream started", id);
        self.streams.insert(id, StreamContext::new(id, config));
        Ok(())
    }

    fn stream(&self, id: StreamId) -> Result<&StreamContext, DispatchError> {
        self.streams.get(&id).ok_or(DispatchError::UnknownStream(id))
    }

    fn close_stream(&mut self, id: StreamId) -> Result<(), DispatchError> {
        match self.streams.remove(&id) {
            Some(_) => {
                debug!("[context_id={}] stream done", id);
                Ok(())
            }
            None => Err(DispatchError::UnknownStream(id)),
        }
    }

    /// Release everything. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.state == ModuleState::Stopped {
            return;
        }

        info!(
            "Path rewrite filter stopping ({} active streams dropped)",
            self.streams.len()
        );
        self.streams.clear();
        self.config = None;
        self.state = ModuleState::Stopped;
    }
}
