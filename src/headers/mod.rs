//! Header processing for the path rewrite filter
//!
//! - Request path rewriting
//! - Static response header injection

pub mod injection;
pub mod path_rewrite;

pub use injection::{inject_response_headers, InjectionReport, CONFIG_DATA_HEADER, INJECTED_HEADERS};
pub use path_rewrite::{rewrite_request_path, transform};
