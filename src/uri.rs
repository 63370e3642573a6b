use std::fmt;
use std::net::IpAddr;

use url::Url;

use crate::error::UriParseError;

/// An already-parsed URI, the input type of the decision path.
///
/// The engine never parses raw URI strings while deciding a request; callers
/// hand over the components their URI layer extracted. [`ParsedUri::parse`]
/// is a convenience built on the `url` crate for callers that start from
/// text (and for tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri {
    scheme: String,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    raw: String,
}

impl ParsedUri {
    /// Assemble a URI from pre-extracted components.
    ///
    /// `port` is the *explicit* port only; leave it `None` when the URI did
    /// not spell one out, even if the scheme has a well-known default.
    pub fn new(
        scheme: impl Into<String>,
        host: Option<String>,
        port: Option<u16>,
        path: impl Into<String>,
    ) -> Self {
        let scheme = scheme.into();
        let path = path.into();
        let raw = match &host {
            Some(h) => match port {
                Some(p) => format!("{scheme}://{h}:{p}{path}"),
                None => format!("{scheme}://{h}{path}"),
            },
            None => format!("{scheme}:{path}"),
        };
        Self {
            scheme,
            host,
            port,
            path,
            raw,
        }
    }

    /// Parse an absolute URI string.
    ///
    /// # Errors
    ///
    /// Returns [`UriParseError`] if the string is not an absolute URI.
    pub fn parse(input: &str) -> Result<Self, UriParseError> {
        let url = Url::parse(input).map_err(|source| UriParseError {
            uri: input.to_owned(),
            source,
        })?;
        Ok(Self {
            scheme: url.scheme().to_owned(),
            host: url.host_str().map(str::to_owned),
            port: url.port(),
            path: url.path().to_owned(),
            raw: input.to_owned(),
        })
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The original text, used for prefix-based compatibility matching.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The explicit port, or the scheme's well-known default.
    #[must_use]
    pub fn effective_port(&self) -> Option<u16> {
        self.port.or_else(|| default_port_for_scheme(&self.scheme))
    }

    /// Whether the URI carries its scheme's default port, explicitly or by
    /// omission. `false` when the scheme has no well-known default.
    #[must_use]
    pub fn has_default_port(&self) -> bool {
        match default_port_for_scheme(&self.scheme) {
            Some(default) => self.effective_port() == Some(default),
            None => false,
        }
    }

    /// Approximate registrable domain of the host, e.g. `example.com` for
    /// `a.b.example.com`. IP addresses are returned whole. `None` when the
    /// URI has no host.
    #[must_use]
    pub fn base_domain(&self) -> Option<String> {
        let host = self.host.as_deref()?;
        if host.is_empty() {
            return None;
        }
        if is_ip_address(host) {
            return Some(host.to_owned());
        }
        Some(base_domain_of(host))
    }
}

impl fmt::Display for ParsedUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Well-known default port for a scheme, if any.
#[must_use]
pub fn default_port_for_scheme(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}

/// Whether a host string is an IP address (v4, or v6 with or without
/// enclosing brackets).
#[must_use]
pub fn is_ip_address(host: &str) -> bool {
    let trimmed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    trimmed.parse::<IpAddr>().is_ok()
}

/// Whether a destination string is syntactically relative: a leading `/` or
/// no scheme separator at all.
#[must_use]
pub fn is_relative_uri(uri: &str) -> bool {
    uri.starts_with('/') || !uri.contains(':')
}

/// Common second-level public suffixes. Hosts ending in one of these keep
/// three labels in their base domain instead of two.
const SECOND_LEVEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "co.jp", "ne.jp", "or.jp", "com.au", "net.au", "org.au",
    "co.nz", "com.br", "com.cn", "com.mx", "co.in", "co.za",
];

pub(crate) fn base_domain_of(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host.to_owned();
    }
    let last_two = labels[labels.len() - 2..].join(".");
    let keep = if SECOND_LEVEL_SUFFIXES.contains(&last_two.as_str()) {
        3
    } else {
        2
    };
    labels[labels.len() - keep..].join(".")
}
