use std::fmt;

use regex::Regex;

use super::error::RuleSpecError;
use crate::uri::ParsedUri;

/// Host component of an [`EndpointSpec`].
///
/// Together with an absent host field (`Option::None` on the spec) this
/// covers the four host states a specification can be in:
///
/// * field absent: no host constraint at all;
/// * `NoHost`: the URI must have no authority component (`about:`, `data:`);
/// * `Empty`: the URI host must be present and empty;
/// * `Any` / `Wildcard` / `Exact`: the URI host must be present and match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSpec {
    NoHost,
    Empty,
    Any,
    /// `*.example.com`: the base domain itself or any subdomain of it.
    /// Stores the base without the leading `*.`.
    Wildcard(String),
    Exact(String),
}

impl HostSpec {
    /// Interpret a host pattern string: `*` is any host, `*.base` is a
    /// domain wildcard, the empty string is the empty-host state, anything
    /// else matches exactly.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSpecError::EmptyWildcard`] for `"*."` with nothing
    /// after it.
    pub fn from_pattern(pattern: &str) -> Result<Self, RuleSpecError> {
        if pattern.is_empty() {
            return Ok(HostSpec::Empty);
        }
        if pattern == "*" {
            return Ok(HostSpec::Any);
        }
        if let Some(base) = pattern.strip_prefix("*.") {
            if base.is_empty() {
                return Err(RuleSpecError::EmptyWildcard {
                    host: pattern.to_owned(),
                });
            }
            return Ok(HostSpec::Wildcard(base.to_owned()));
        }
        Ok(HostSpec::Exact(pattern.to_owned()))
    }

    /// The pattern text, as it appears in serialized rules. `None` for the
    /// no-host state, which serializes as an explicit `null`.
    #[must_use]
    pub fn pattern(&self) -> Option<String> {
        match self {
            HostSpec::NoHost => None,
            HostSpec::Empty => Some(String::new()),
            HostSpec::Any => Some("*".to_owned()),
            HostSpec::Wildcard(base) => Some(format!("*.{base}")),
            HostSpec::Exact(host) => Some(host.clone()),
        }
    }

    fn matches(&self, uri_host: Option<&str>) -> bool {
        match self {
            HostSpec::NoHost => uri_host.is_none(),
            HostSpec::Empty => uri_host == Some(""),
            HostSpec::Any => uri_host.is_some_and(|h| !h.is_empty()),
            HostSpec::Wildcard(base) => uri_host.is_some_and(|h| {
                h == base
                    || (h.len() > base.len()
                        && h.ends_with(base.as_str())
                        && h.as_bytes()[h.len() - base.len() - 1] == b'.')
            }),
            HostSpec::Exact(host) => uri_host == Some(host.as_str()),
        }
    }
}

/// Port component of an [`EndpointSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSpec {
    /// Exactly this port, after resolving the URI's default port.
    Specific(u16),
    /// The scheme's well-known default port. Never matches a scheme
    /// without one.
    Default,
    /// Any port, including an absent one.
    Any,
}

/// Path component of an [`EndpointSpec`].
#[derive(Debug, Clone)]
pub enum PathSpec {
    /// The URI path must start with this prefix (which starts with `/`).
    Prefix(String),
    /// The URI path must match this regex (no enclosing delimiters).
    Regex { pattern: String, compiled: Regex },
}

impl PathSpec {
    /// A prefix path constraint.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSpecError::InvalidPathPrefix`] if the prefix does not
    /// start with `/`.
    pub fn prefix(prefix: impl Into<String>) -> Result<Self, RuleSpecError> {
        let prefix = prefix.into();
        if !prefix.starts_with('/') {
            return Err(RuleSpecError::InvalidPathPrefix { path: prefix });
        }
        Ok(PathSpec::Prefix(prefix))
    }

    /// A regex path constraint, compiled eagerly so malformed patterns are
    /// rejected at rule construction rather than at match time.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSpecError::InvalidPath`] if the pattern does not
    /// compile.
    pub fn regex(pattern: impl Into<String>) -> Result<Self, RuleSpecError> {
        let pattern = pattern.into();
        match Regex::new(&pattern) {
            Ok(compiled) => Ok(PathSpec::Regex { pattern, compiled }),
            Err(source) => Err(RuleSpecError::InvalidPath { pattern, source }),
        }
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathSpec::Prefix(prefix) => path.starts_with(prefix.as_str()),
            PathSpec::Regex { compiled, .. } => compiled.is_match(path),
        }
    }
}

// Regex has no PartialEq; two path specs are equal iff their source text is.
impl PartialEq for PathSpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PathSpec::Prefix(a), PathSpec::Prefix(b)) => a == b,
            (PathSpec::Regex { pattern: a, .. }, PathSpec::Regex { pattern: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for PathSpec {}

/// A partial match pattern for one side (origin or destination) of a
/// request. Each component is optional; an absent component places no
/// constraint on the URI.
///
/// Semantics:
///   Scheme: if absent, any scheme matches. `"*"` in input data is
///     normalized to absent.
///   Host: see [`HostSpec`]. An absent host together with an absent port
///     means no authority constraint at all; an absent host with a port
///     present constrains only the port.
///   Port: if absent while a concrete host pattern is given, only the
///     scheme's default ports match; this is normalized to
///     [`PortSpec::Default`] at construction. To match any port, use
///     [`PortSpec::Any`].
///   Path: if absent, any path matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    scheme: Option<String>,
    host: Option<HostSpec>,
    port: Option<PortSpec>,
    path: Option<PathSpec>,
}

impl EndpointSpec {
    /// Build and validate an endpoint specification.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSpecError::PortWithoutHost`] for a `Specific` or
    /// `Default` port combined with the `NoHost` or `Empty` host states.
    pub fn new(
        scheme: Option<String>,
        host: Option<HostSpec>,
        port: Option<PortSpec>,
        path: Option<PathSpec>,
    ) -> Result<Self, RuleSpecError> {
        let scheme = scheme.filter(|s| s.as_str() != "*");
        let concrete_host = matches!(
            host,
            Some(HostSpec::Any | HostSpec::Wildcard(_) | HostSpec::Exact(_))
        );
        if matches!(host, Some(HostSpec::NoHost | HostSpec::Empty))
            && matches!(port, Some(PortSpec::Specific(_) | PortSpec::Default))
        {
            return Err(RuleSpecError::PortWithoutHost);
        }
        // "No port given" on a host rule means default ports only.
        let port = if concrete_host && port.is_none() {
            Some(PortSpec::Default)
        } else {
            port
        };
        Ok(Self {
            scheme,
            host,
            port,
            path,
        })
    }

    /// Shorthand for a spec constraining only the host.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSpecError`] if the pattern is malformed.
    pub fn host(pattern: &str) -> Result<Self, RuleSpecError> {
        Self::new(None, Some(HostSpec::from_pattern(pattern)?), None, None)
    }

    /// Shorthand for a spec constraining only the scheme.
    pub fn scheme_only(scheme: impl Into<String>) -> Self {
        Self {
            scheme: Some(scheme.into()).filter(|s| s.as_str() != "*"),
            host: None,
            port: None,
            path: None,
        }
    }

    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    #[must_use]
    pub fn host_spec(&self) -> Option<&HostSpec> {
        self.host.as_ref()
    }

    #[must_use]
    pub fn port(&self) -> Option<PortSpec> {
        self.port
    }

    #[must_use]
    pub fn path(&self) -> Option<&PathSpec> {
        self.path.as_ref()
    }

    /// Whether this spec places no constraint at all.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.scheme.is_none() && self.host.is_none() && self.port.is_none() && self.path.is_none()
    }

    /// Test a URI against this specification.
    ///
    /// Pure over its inputs; no side effects.
    #[must_use]
    pub fn matches(&self, uri: &ParsedUri) -> bool {
        if let Some(scheme) = &self.scheme {
            if uri.scheme() != scheme {
                return false;
            }
        }
        if let Some(host) = &self.host {
            if !host.matches(uri.host()) {
                return false;
            }
        }
        match self.port {
            // Only reachable with no concrete host: no port constraint.
            None => {}
            Some(PortSpec::Any) => {}
            Some(PortSpec::Specific(port)) => {
                if uri.effective_port() != Some(port) {
                    return false;
                }
            }
            Some(PortSpec::Default) => {
                if !uri.has_default_port() {
                    return false;
                }
            }
        }
        if let Some(path) = &self.path {
            if !path.matches(uri.path()) {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for EndpointSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = self.scheme.as_deref().unwrap_or("*");
        match &self.host {
            None if self.scheme.is_none() && self.port.is_none() => Ok(()),
            None if self.port.is_none() => write!(f, "{scheme}:<path> (host optional)"),
            None => write!(f, "{scheme}://*:{}", port_text(self.port)),
            Some(HostSpec::NoHost) => write!(f, "{scheme}:<path> (no host)"),
            Some(HostSpec::Empty) => write!(f, "{scheme}://<path> (empty host)"),
            Some(host) => {
                let host = host.pattern().unwrap_or_default();
                if self.scheme.is_some() || !matches!(self.port, Some(PortSpec::Default) | None) {
                    write!(f, "{scheme}://")?;
                }
                f.write_str(&host)?;
                if !matches!(self.port, Some(PortSpec::Default) | None) {
                    write!(f, ":{}", port_text(self.port))?;
                }
                Ok(())
            }
        }
    }
}

fn port_text(port: Option<PortSpec>) -> String {
    match port {
        Some(PortSpec::Specific(p)) => p.to_string(),
        Some(PortSpec::Any) => "*".to_owned(),
        Some(PortSpec::Default) | None => String::new(),
    }
}
