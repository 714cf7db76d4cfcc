//! Host boundary
//!
//! The filter only ever talks to Envoy through the [`Host`] trait. The
//! production implementation goes through `proxy_wasm::hostcalls` so a
//! failing host call surfaces as a [`HostError`] rather than a panic.
//! Header values are fetched as bytes: the SDK's string getter unwraps
//! its UTF-8 decode.

use proxy_wasm::hostcalls;
use proxy_wasm::types::{BufferType, MapType, Status};
use thiserror::Error;

/// Request pseudo-header holding the path
pub const PATH_HEADER: &str = ":path";

/// A host call that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("host call {call} failed: {status}")]
pub struct HostError {
    /// Name of the failing call
    pub call: &'static str,
    /// Status reported by the host
    pub status: String,
}

impl HostError {
    pub fn new(call: &'static str, status: impl Into<String>) -> Self {
        Self {
            call,
            status: status.into(),
        }
    }

    fn from_status(call: &'static str, status: Status) -> Self {
        Self::new(call, format!("{:?}", status))
    }
}

/// Decode a raw request header value; invalid UTF-8 is a read failure
pub fn decode_request_header(value: Option<Vec<u8>>) -> Result<Option<String>, HostError> {
    value
        .map(String::from_utf8)
        .transpose()
        .map_err(|_| HostError::new("get_http_request_header", "invalid UTF-8"))
}

/// Services the filter consumes from the proxy
pub trait Host {
    /// Plugin configuration buffer; `None` when nothing was configured
    fn plugin_configuration(&self) -> Result<Option<Vec<u8>>, HostError>;

    fn request_header(&self, name: &str) -> Result<Option<String>, HostError>;

    fn set_request_header(&self, name: &str, value: &str) -> Result<(), HostError>;

    fn add_response_header(&self, name: &str, value: &str) -> Result<(), HostError>;
}

/// [`Host`] backed by the Envoy proxy-wasm ABI
#[derive(Debug, Default, Clone, Copy)]
pub struct ProxyWasmHost;

impl Host for ProxyWasmHost {
    fn plugin_configuration(&self) -> Result<Option<Vec<u8>>, HostError> {
        hostcalls::get_buffer(BufferType::PluginConfiguration, 0, usize::MAX)
            .map_err(|s| HostError::from_status("get_plugin_configuration", s))
    }

    fn request_header(&self, name: &str) -> Result<Option<String>, HostError> {
        let value = hostcalls::get_map_value_bytes(MapType::HttpRequestHeaders, name)
            .map_err(|s| HostError::from_status("get_http_request_header", s))?;
        decode_request_header(value)
    }

    fn set_request_header(&self, name: &str, value: &str) -> Result<(), HostError> {
        hostcalls::set_map_value(MapType::HttpRequestHeaders, name, Some(value))
            .map_err(|s| HostError::from_status("set_http_request_header", s))
    }

    fn add_response_header(&self, name: &str, value: &str) -> Result<(), HostError> {
        hostcalls::add_map_value(MapType::HttpResponseHeaders, name, value)
            .map_err(|s| HostError::from_status("add_http_response_header", s))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory host with per-call failure injection

    use super::{decode_request_header, Host, HostError, PATH_HEADER};
    use std::cell::RefCell;
    use std::collections::HashSet;

    #[derive(Default)]
    pub struct MockHost {
        pub configuration: Option<Vec<u8>>,
        pub fail_configuration: bool,
        pub request_headers: RefCell<Vec<(String, String)>>,
        /// `:path` as raw bytes, served in place of `request_headers`
        pub raw_path: Option<Vec<u8>>,
        pub response_headers: RefCell<Vec<(String, String)>>,
        pub fail_request_read: bool,
        pub fail_request_write: bool,
        /// Response header names whose addition fails
        pub failing_response_headers: HashSet<String>,
        /// Number of request header writes attempted
        pub request_writes: RefCell<usize>,
    }

    impl MockHost {
        pub fn with_configuration(payload: &str) -> Self {
            Self {
                configuration: Some(payload.as_bytes().to_vec()),
                ..Default::default()
            }
        }

        pub fn with_path(self, path: &str) -> Self {
            self.request_headers
                .borrow_mut()
                .push((":path".to_string(), path.to_string()));
            self
        }

        pub fn with_raw_path(self, path: &[u8]) -> Self {
            Self {
                raw_path: Some(path.to_vec()),
                ..self
            }
        }

        pub fn path(&self) -> Option<String> {
            self.request_headers
                .borrow()
                .iter()
                .find(|(k, _)| k == ":path")
                .map(|(_, v)| v.clone())
        }

        pub fn response_header(&self, name: &str) -> Option<String> {
            self.response_headers
                .borrow()
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    impl Host for MockHost {
        fn plugin_configuration(&self) -> Result<Option<Vec<u8>>, HostError> {
            if self.fail_configuration {
                return Err(HostError::new("get_plugin_configuration", "InternalFailure"));
            }
            Ok(self.configuration.clone())
        }

        fn request_header(&self, name: &str) -> Result<Option<String>, HostError> {
            if self.fail_request_read {
                return Err(HostError::new("get_http_request_header", "BadArgument"));
            }
            if let (PATH_HEADER, Some(raw)) = (name, &self.raw_path) {
                return decode_request_header(Some(raw.clone()));
            }
            Ok(self
                .request_headers
                .borrow()
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()))
        }

        fn set_request_header(&self, name: &str, value: &str) -> Result<(), HostError> {
            *self.request_writes.borrow_mut() += 1;
            if self.fail_request_write {
                return Err(HostError::new("set_http_request_header", "BadArgument"));
            }
            let mut headers = self.request_headers.borrow_mut();
            headers.retain(|(k, _)| k != name);
            headers.push((name.to_string(), value.to_string()));
            Ok(())
        }

        fn add_response_header(&self, name: &str, value: &str) -> Result<(), HostError> {
            if self.failing_response_headers.contains(name) {
                return Err(HostError::new("add_http_response_header", "InternalFailure"));
            }
            self.response_headers
                .borrow_mut()
                .push((name.to_string(), value.to_string()));
            Ok(())
        }
    }
}
