use thiserror::Error;

/// Errors raised when constructing a rule or endpoint specification.
///
/// Malformed specifications are rejected up front, never silently coerced
/// into something that matches nothing.
#[derive(Debug, Error)]
pub enum RuleSpecError {
    #[error("rule specifies neither an origin nor a destination")]
    EmptyRule,

    #[error("endpoint specifies a port but no host to attach it to")]
    PortWithoutHost,

    #[error("path prefix '{path}' does not start with '/'")]
    InvalidPathPrefix { path: String },

    #[error("invalid path regex '{pattern}': {source}")]
    InvalidPath {
        pattern: String,
        source: regex::Error,
    },

    #[error("wildcard host '{host}' has an empty base domain")]
    EmptyWildcard { host: String },
}
