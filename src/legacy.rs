//! One-time import of the legacy space-delimited rule format.
//!
//! Early versions stored rules in three preference strings: allowed
//! origins, allowed destinations, and allowed `origin|dest` pairs, each a
//! space-delimited token list. This adapter converts them to rules for the
//! current engine; it is not part of the steady-state decision path.

use std::collections::HashSet;

use thiserror::Error;

use crate::types::{EndpointSpec, HostSpec, PortSpec, Rule, RuleSpecError};
use crate::uri::{base_domain_of, is_ip_address, ParsedUri};

/// A legacy token that could not be converted. Conversion is all-or-nothing
/// per input: one bad token fails the whole import.
#[derive(Debug, Error)]
#[error("invalid legacy rule '{token}'")]
pub struct LegacyRuleParseError {
    pub token: String,
}

/// The three legacy preference strings.
#[derive(Debug, Clone, Default)]
pub struct LegacyRules {
    origins: String,
    dests: String,
    origins_to_dests: String,
}

impl LegacyRules {
    pub fn new(
        origins: impl Into<String>,
        dests: impl Into<String>,
        origins_to_dests: impl Into<String>,
    ) -> Self {
        Self {
            origins: origins.into(),
            dests: dests.into(),
            origins_to_dests: origins_to_dests.into(),
        }
    }

    /// Convert the preference strings into allow rules.
    ///
    /// Duplicate tokens collapse; tokens convert in order (origins, then
    /// destinations, then pairs).
    ///
    /// # Errors
    ///
    /// Returns [`LegacyRuleParseError`] naming the first malformed token.
    pub fn to_rules(&self) -> Result<Vec<Rule>, LegacyRuleParseError> {
        let mut rules = Vec::new();

        for token in tokens(&self.origins) {
            rules.push(Rule::from_origin(endpoint_from_token(token)?));
        }
        for token in tokens(&self.dests) {
            rules.push(Rule::from_dest(endpoint_from_token(token)?));
        }
        for token in tokens(&self.origins_to_dests) {
            let mut parts = token.split('|');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(origin), Some(dest), None) if !origin.is_empty() && !dest.is_empty() => {
                    rules.push(Rule::between(
                        endpoint_from_token(origin)?,
                        endpoint_from_token(dest)?,
                    ));
                }
                _ => {
                    return Err(LegacyRuleParseError {
                        token: token.to_owned(),
                    });
                }
            }
        }

        Ok(rules)
    }
}

/// Split on spaces, dropping empties (double spaces occur in the wild) and
/// duplicate tokens.
fn tokens(input: &str) -> impl Iterator<Item = &str> {
    let mut seen = HashSet::new();
    input
        .split(' ')
        .filter(|t| !t.is_empty())
        .filter(move |t| seen.insert(*t))
}

/// Convert one legacy endpoint token.
///
/// Tokens that parse as absolute URIs keep their scheme, host and explicit
/// port; bare tokens keep only the host part before any `/`. A host equal
/// to its registrable domain is widened to a `*.` wildcard, matching how
/// the legacy format was interpreted.
fn endpoint_from_token(token: &str) -> Result<EndpointSpec, LegacyRuleParseError> {
    let parse_error = || LegacyRuleParseError {
        token: token.to_owned(),
    };

    let build = |scheme: Option<String>,
                 host: Option<&str>,
                 port: Option<u16>|
     -> Result<EndpointSpec, RuleSpecError> {
        let host_spec = match host {
            Some(h) if should_widen_to_wildcard(h) => Some(HostSpec::Wildcard(h.to_owned())),
            Some(h) => Some(HostSpec::from_pattern(h)?),
            None => None,
        };
        let port_spec = port.map(PortSpec::Specific);
        EndpointSpec::new(scheme, host_spec, port_spec, None)
    };

    if let Ok(uri) = ParsedUri::parse(token) {
        return build(Some(uri.scheme().to_owned()), uri.host(), uri.port())
            .map_err(|_| parse_error());
    }

    let host = token.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(parse_error());
    }
    build(None, Some(host), None).map_err(|_| parse_error())
}

/// Whether a bare host should become a `*.host` wildcard: registrable
/// domains themselves are widened, subdomains, IP addresses, and
/// single-label hosts are not.
fn should_widen_to_wildcard(host: &str) -> bool {
    if is_ip_address(host) || !host.contains('.') {
        return false;
    }
    base_domain_of(host) == host
}
