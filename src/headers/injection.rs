//! Response Header Injection
//!
//! Every response gets the same static headers plus `configData`.
//! Each addition is best-effort: a failing header is logged and skipped.

use log::warn;

use crate::host::Host;

/// Headers added to every response. Keys are unique.
pub const INJECTED_HEADERS: &[(&str, &str)] = &[
    ("who-am-i", "go-wasm-demo"),
    ("injected-by", "istio-api!"),
    ("site", "youdianzhishi.com"),
    ("author", "阳明"),
];

/// Carries the raw plugin configuration payload
pub const CONFIG_DATA_HEADER: &str = "configData";

/// What a single injection pass managed to apply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionReport {
    pub applied: usize,
    pub failed: Vec<&'static str>,
}

impl InjectionReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record<H: Host + ?Sized>(&mut self, host: &H, stream_id: u32, name: &'static str, value: &str) {
        match host.add_response_header(name, value) {
            Ok(()) => self.applied += 1,
            Err(e) => {
                warn!(
                    "[context_id={}] failed to add response header {}: {}",
                    stream_id, name, e
                );
                self.failed.push(name);
            }
        }
    }
}

/// Add the static headers and `configData` to the response
pub fn inject_response_headers<H: Host + ?Sized>(
    host: &H,
    stream_id: u32,
    config_data: &str,
) -> InjectionReport {
    let mut report = InjectionReport::default();

    for &(name, value) in INJECTED_HEADERS {
        report.record(host, stream_id, name, value);
    }
    report.record(host, stream_id, CONFIG_DATA_HEADER, config_data);

    report
}
