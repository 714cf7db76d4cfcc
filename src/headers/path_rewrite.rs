//! Request Path Rewriting
//!
//! Reads `:path`, applies the compiled rule and writes the result back.
//! Host failures never fail the request: the path is left untouched.

use std::borrow::Cow;

use log::{debug, warn};

use crate::config::RewriteRule;
use crate::host::{Host, PATH_HEADER};
use crate::telemetry::{RewriteEvent, RewriteOutcome};

/// Rewrite `path` with `rule`. Without a rule the path is returned as-is.
pub fn transform<'p>(path: &'p str, rule: Option<&RewriteRule>) -> Cow<'p, str> {
    match rule {
        Some(rule) => rule.apply(path),
        None => Cow::Borrowed(path),
    }
}

/// Rewrite the request path of one stream in place
pub fn rewrite_request_path<H: Host + ?Sized>(
    host: &H,
    stream_id: u32,
    rule: Option<&RewriteRule>,
) -> RewriteOutcome {
    let Some(rule) = rule else {
        debug!("[context_id={}] No rewrite rule configured, path untouched", stream_id);
        return RewriteOutcome::Unchanged;
    };

    let path = match host.request_header(PATH_HEADER) {
        Ok(Some(path)) => path,
        Ok(None) => {
            warn!("[context_id={}] Request has no {} header", stream_id, PATH_HEADER);
            RewriteEvent::new(stream_id, RewriteOutcome::ReadFailed)
                .with_reason("missing :path")
                .emit();
            return RewriteOutcome::ReadFailed;
        }
        Err(e) => {
            warn!("[context_id={}] Could not get request header: {}", stream_id, e);
            RewriteEvent::new(stream_id, RewriteOutcome::ReadFailed)
                .with_reason(&e.to_string())
                .emit();
            return RewriteOutcome::ReadFailed;
        }
    };

    let result = match transform(&path, Some(rule)) {
        Cow::Borrowed(_) => {
            debug!("[context_id={}] path: {}, no match", stream_id, path);
            RewriteEvent::new(stream_id, RewriteOutcome::Unchanged)
                .with_original(&path)
                .emit();
            return RewriteOutcome::Unchanged;
        }
        Cow::Owned(result) => result,
    };

    debug!("[context_id={}] path: {}, result: {}", stream_id, path, result);

    match host.set_request_header(PATH_HEADER, &result) {
        Ok(()) => {
            RewriteEvent::new(stream_id, RewriteOutcome::Rewritten)
                .with_original(&path)
                .with_rewritten(&result)
                .emit();
            RewriteOutcome::Rewritten
        }
        Err(e) => {
            warn!(
                "[context_id={}] Could not set request header to {:?}: {}",
                stream_id, result, e
            );
            RewriteEvent::new(stream_id, RewriteOutcome::WriteFailed)
                .with_original(&path)
                .with_rewritten(&result)
                .with_reason(&e.to_string())
                .emit();
            RewriteOutcome::WriteFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_PATTERN, DEFAULT_REPLACEMENT};
    use crate::host::mock::MockHost;

    fn default_rule() -> RewriteRule {
        RewriteRule::compile(DEFAULT_PATTERN, DEFAULT_REPLACEMENT).unwrap()
    }

    #[test]
    fn test_single_match() {
        let rule = default_rule();
        assert_eq!(transform("/banana/42", Some(&rule)), "/status/42");
    }

    #[test]
    fn test_surrounding_segments_preserved() {
        let rule = default_rule();
        assert_eq!(
            transform("/api/banana/7/details?x=1", Some(&rule)),
            "/api/status/7/details?x=1"
        );
    }

    #[test]
    fn test_multiple_matches() {
        let rule = default_rule();
        assert_eq!(
            transform("/banana/1/x/banana/2", Some(&rule)),
            "/status/1/x/status/2"
        );
    }

    #[test]
    fn test_non_match_is_identity() {
        let rule = default_rule();
        for path in ["/", "/apple/1", "/Banana/1", "/bananas"] {
            assert_eq!(transform(path, Some(&rule)), path);
        }
    }

    #[test]
    fn test_rewritten_path_is_stable() {
        let rule = default_rule();
        let once = transform("/banana/42", Some(&rule)).into_owned();
        assert_eq!(transform(&once, Some(&rule)), once);
    }

    #[test]
    fn test_empty_capture() {
        // `[0-9]*` also matches zero digits
        let rule = default_rule();
        assert_eq!(transform("/banana/abc", Some(&rule)), "/status/abc");
    }

    #[test]
    fn test_no_rule_passthrough() {
        assert_eq!(transform("/banana/42", None), "/banana/42");
    }

    #[test]
    fn test_deterministic() {
        let rule = default_rule();
        let first = transform("/a/banana/9/banana/10", Some(&rule)).into_owned();
        for _ in 0..10 {
            assert_eq!(transform("/a/banana/9/banana/10", Some(&rule)), first);
        }
    }

    #[test]
    fn test_rewrite_writes_back() {
        let host = MockHost::default().with_path("/banana/7/details");
        let outcome = rewrite_request_path(&host, 1, Some(&default_rule()));

        assert_eq!(outcome, RewriteOutcome::Rewritten);
        assert_eq!(host.path().as_deref(), Some("/status/7/details"));
    }

    #[test]
    fn test_unchanged_path_not_written() {
        let host = MockHost::default().with_path("/status/7");
        let outcome = rewrite_request_path(&host, 1, Some(&default_rule()));

        assert_eq!(outcome, RewriteOutcome::Unchanged);
        assert_eq!(*host.request_writes.borrow(), 0);
    }

    #[test]
    fn test_read_failure_leaves_path() {
        let host = MockHost {
            fail_request_read: true,
            ..Default::default()
        }
        .with_path("/banana/1");

        let outcome = rewrite_request_path(&host, 1, Some(&default_rule()));
        assert_eq!(outcome, RewriteOutcome::ReadFailed);
        assert_eq!(host.path().as_deref(), Some("/banana/1"));
        assert_eq!(*host.request_writes.borrow(), 0);
    }

    #[test]
    fn test_non_utf8_path_passes_through() {
        let host = MockHost::default().with_raw_path(b"/banana/\xff");
        let outcome = rewrite_request_path(&host, 1, Some(&default_rule()));

        assert_eq!(outcome, RewriteOutcome::ReadFailed);
        assert_eq!(*host.request_writes.borrow(), 0);
    }

    #[test]
    fn test_missing_path_header() {
        let host = MockHost::default();
        let outcome = rewrite_request_path(&host, 1, Some(&default_rule()));
        assert_eq!(outcome, RewriteOutcome::ReadFailed);
    }

    #[test]
    fn test_write_failure_is_contained() {
        let host = MockHost {
            fail_request_write: true,
            ..Default::default()
        }
        .with_path("/banana/1");

        let outcome = rewrite_request_path(&host, 1, Some(&default_rule()));
        assert_eq!(outcome, RewriteOutcome::WriteFailed);
        assert_eq!(host.path().as_deref(), Some("/banana/1"));
    }

    #[test]
    fn test_no_rule_skips_host() {
        let host = MockHost {
            fail_request_read: true,
            ..Default::default()
        };
        assert_eq!(rewrite_request_path(&host, 1, None), RewriteOutcome::Unchanged);
    }
}
