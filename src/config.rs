//! Configuration module for the path rewrite filter
//!
//! Configuration is delivered through the Envoy plugin configuration
//! buffer, NOT from external files. The payload is opaque: only its
//! presence decides whether the rewrite rule is compiled.

use regex::Regex;
use std::borrow::Cow;
use thiserror::Error;

/// Pattern applied to the request path whenever a payload is present
pub const DEFAULT_PATTERN: &str = "banana/([0-9]*)";

/// Replacement template paired with [`DEFAULT_PATTERN`]
pub const DEFAULT_REPLACEMENT: &str = "status/$1";

/// Compiled pattern plus its replacement template
#[derive(Clone, Debug)]
pub struct RewriteRule {
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    /// Compile a pattern once. Fails if the pattern is not a valid regex.
    pub fn compile(pattern: &str, replacement: &str) -> Result<Self, ConfigError> {
        let compiled = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            pattern: compiled,
            replacement: replacement.to_string(),
        })
    }

    /// Replace every non-overlapping match, expanding `$n` references.
    ///
    /// Returns `Cow::Borrowed` when nothing matched.
    pub fn apply<'p>(&self, path: &'p str) -> Cow<'p, str> {
        self.pattern.replace_all(path, self.replacement.as_str())
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

/// Module-wide configuration, built once at plugin start
#[derive(Clone, Debug, Default)]
pub struct FilterConfig {
    /// Payload as delivered by the host, kept for the `configData` header
    raw_payload: Option<String>,
    /// `None` when no payload was delivered: the filter runs as a no-op
    rule: Option<RewriteRule>,
}

impl FilterConfig {
    /// Build the configuration from the plugin configuration buffer.
    ///
    /// An absent or empty payload yields an empty configuration without
    /// compiling anything. Otherwise the payload is stored verbatim and the
    /// default rule is compiled; the payload content never selects the rule.
    pub fn initialize(payload: Option<&[u8]>) -> Result<Self, ConfigError> {
        match payload {
            Some(bytes) if !bytes.is_empty() => {
                Self::with_rule(bytes, DEFAULT_PATTERN, DEFAULT_REPLACEMENT)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Build a configuration with an explicit pattern and replacement
    pub fn with_rule(payload: &[u8], pattern: &str, replacement: &str) -> Result<Self, ConfigError> {
        let rule = RewriteRule::compile(pattern, replacement)?;

        Ok(Self {
            raw_payload: Some(String::from_utf8_lossy(payload).into_owned()),
            rule: Some(rule),
        })
    }

    pub fn rule(&self) -> Option<&RewriteRule> {
        self.rule.as_ref()
    }

    /// Raw payload, or `""` when none was delivered
    pub fn raw_payload(&self) -> &str {
        self.raw_payload.as_deref().unwrap_or("")
    }

    /// True when the filter leaves every path untouched
    pub fn is_noop(&self) -> bool {
        self.rule.is_none()
    }
}

/// Configuration errors. Fatal: the plugin refuses to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid rewrite pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
