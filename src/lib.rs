//! Path Rewrite Wasm Filter for Envoy Proxy
//!
//! This filter rewrites the request `:path` with a regular expression
//! (`banana/([0-9]*)` -> `status/$1`) and adds a fixed set of headers,
//! plus the raw plugin configuration, to every response.
//!
//! The proxy-wasm contexts in `filter` are thin adapters: each SDK callback
//! becomes a [`LifecycleEvent`] handed to the [`Dispatcher`].
//!
//! Targets: wasm32-wasi (Envoy proxy-wasm ABI)

pub mod config;
mod filter;
pub mod headers;
pub mod host;
pub mod lifecycle;
pub mod telemetry;

pub use lifecycle::{Dispatcher, LifecycleEvent};

// Register the filter with proxy-wasm runtime. Native test builds bring
// their own `_start`.
#[cfg(target_arch = "wasm32")]
proxy_wasm::main! {{
    proxy_wasm::set_log_level(proxy_wasm::types::LogLevel::Debug);
    proxy_wasm::set_root_context(|_| -> Box<dyn proxy_wasm::traits::RootContext> {
        Box::new(filter::RewriteRootContext::new())
    });
}}
