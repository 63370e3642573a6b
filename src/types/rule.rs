use std::fmt;

use serde::{Deserialize, Serialize};

use super::endpoint::{EndpointSpec, PathSpec, PortSpec};
use super::error::RuleSpecError;

/// Whether a rule allows or denies the requests it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Deny,
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Allow => f.write_str("allow"),
            RuleAction::Deny => f.write_str("deny"),
        }
    }
}

/// An immutable pair of optional endpoint specifications. At least one side
/// must be present.
///
/// Equality is structural. [`Rule::canonical`] derives a deterministic
/// string key; two rules with the same canonical string are the same rule
/// regardless of how they were constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    origin: Option<EndpointSpec>,
    dest: Option<EndpointSpec>,
}

impl Rule {
    /// Build a rule from its endpoint specs.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSpecError::EmptyRule`] if both sides are absent.
    pub fn new(
        origin: Option<EndpointSpec>,
        dest: Option<EndpointSpec>,
    ) -> Result<Self, RuleSpecError> {
        if origin.is_none() && dest.is_none() {
            return Err(RuleSpecError::EmptyRule);
        }
        Ok(Self { origin, dest })
    }

    /// An origin-only rule.
    pub fn from_origin(origin: EndpointSpec) -> Self {
        Self {
            origin: Some(origin),
            dest: None,
        }
    }

    /// A destination-only rule.
    pub fn from_dest(dest: EndpointSpec) -> Self {
        Self {
            origin: None,
            dest: Some(dest),
        }
    }

    /// An origin-to-destination rule.
    pub fn between(origin: EndpointSpec, dest: EndpointSpec) -> Self {
        Self {
            origin: Some(origin),
            dest: Some(dest),
        }
    }

    #[must_use]
    pub fn origin(&self) -> Option<&EndpointSpec> {
        self.origin.as_ref()
    }

    #[must_use]
    pub fn dest(&self) -> Option<&EndpointSpec> {
        self.dest.as_ref()
    }

    /// The deterministic deduplication key for this rule.
    ///
    /// Destination before origin, fixed key order inside each endpoint, and
    /// all values JSON-escaped, so the key is stable across construction
    /// order and serialize/deserialize round-trips.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut out = String::from("{");
        if let Some(dest) = &self.dest {
            push_endpoint(&mut out, "d", dest);
        }
        if self.dest.is_some() && self.origin.is_some() {
            out.push(',');
        }
        if let Some(origin) = &self.origin {
            push_endpoint(&mut out, "o", origin);
        }
        out.push('}');
        out
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.origin, &self.dest) {
            (Some(o), Some(d)) => write!(f, "{o} -> {d}"),
            (Some(o), None) => write!(f, "{o} -> *"),
            (None, Some(d)) => write!(f, "* -> {d}"),
            (None, None) => f.write_str("* -> *"),
        }
    }
}

fn push_endpoint(out: &mut String, key: &str, spec: &EndpointSpec) {
    out.push('"');
    out.push_str(key);
    out.push_str("\":{");
    let mut first = true;
    let mut push_field = |out: &mut String, name: &str, value: &str| {
        if !first {
            out.push(',');
        }
        first = false;
        out.push('"');
        out.push_str(name);
        out.push_str("\":");
        out.push_str(value);
    };
    if let Some(host) = spec.host_spec() {
        match host.pattern() {
            Some(pattern) => push_field(out, "h", &json_string(&pattern)),
            None => push_field(out, "h", "null"),
        }
    }
    match spec.port() {
        Some(PortSpec::Specific(p)) => push_field(out, "port", &json_string(&p.to_string())),
        Some(PortSpec::Default) => push_field(out, "port", "\"-1\""),
        Some(PortSpec::Any) => push_field(out, "port", "\"*\""),
        None => {}
    }
    if let Some(scheme) = spec.scheme() {
        push_field(out, "s", &json_string(scheme));
    }
    match spec.path() {
        Some(PathSpec::Prefix(prefix)) => push_field(out, "pathPre", &json_string(prefix)),
        Some(PathSpec::Regex { pattern, .. }) => {
            push_field(out, "pathRegex", &json_string(pattern));
        }
        None => {}
    }
    out.push('}');
}

fn json_string(value: &str) -> String {
    serde_json::to_string(value).expect("strings always serialize")
}
