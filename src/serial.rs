//! JSON (de)serialization of persisted ruleset documents.
//!
//! The document shape is:
//!
//! ```json
//! {
//!   "metadata": {"version": 1, "name": "user", "source": "user"},
//!   "entries": {
//!     "allow": [{"o": {"h": "*.example.com"}}],
//!     "deny":  [{"d": {"h": "tracker.example", "s": "https"}}]
//!   }
//! }
//! ```
//!
//! Each rule carries `o` (origin) and/or `d` (destination) endpoint objects
//! with optional keys `s` (scheme), `h` (host pattern; an explicit `null`
//! means "no host"), `port` (`"*"`, `-1` for default, or a specific port),
//! `pathPre` and `pathRegex`.
//!
//! Decoding is all-or-nothing: every rule is rebuilt through the normal
//! validating constructors, and the first malformed entry fails the whole
//! document.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::types::{
    EndpointSpec, HostSpec, PathSpec, PortSpec, RawRuleset, Rule, RuleAction, RuleSpecError,
    RulesetMetadata,
};

/// The only document version this engine reads and writes.
const DOCUMENT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from (de)serializing a persisted ruleset document.
///
/// The engine does not attempt repair; callers decide whether a failure
/// means "no ruleset" or a startup error.
#[derive(Debug, Error)]
pub enum RulesetStorageError {
    #[error("failed to encode ruleset document: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to parse ruleset document: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("unsupported ruleset document version {version}, expected {DOCUMENT_VERSION}")]
    UnsupportedVersion { version: u32 },

    #[error("invalid {action} rule at index {index}: {source}")]
    InvalidRule {
        action: RuleAction,
        index: usize,
        source: RuleSpecError,
    },

    #[error("invalid port value '{value}' in {action} rule at index {index}")]
    InvalidPort {
        action: RuleAction,
        index: usize,
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Serialized type hierarchy
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct SerializedRuleset {
    metadata: RulesetMetadata,
    entries: SerializedEntries,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SerializedEntries {
    #[serde(default)]
    allow: Vec<SerializedRule>,
    #[serde(default)]
    deny: Vec<SerializedRule>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    o: Option<SerializedEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<SerializedEndpoint>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    s: Option<String>,
    /// Missing key, explicit `null`, and a pattern string are three
    /// distinct host states; the double option keeps them apart.
    #[serde(
        default,
        deserialize_with = "some_nullable",
        skip_serializing_if = "Option::is_none"
    )]
    h: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<SerializedPort>,
    #[serde(default, rename = "pathPre", skip_serializing_if = "Option::is_none")]
    path_pre: Option<String>,
    #[serde(default, rename = "pathRegex", skip_serializing_if = "Option::is_none")]
    path_regex: Option<String>,
}

/// Ports appear in stored documents as numbers or strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum SerializedPort {
    Number(i64),
    Text(String),
}

fn some_nullable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serialize a [`RawRuleset`] to its JSON document.
///
/// # Errors
///
/// Returns [`RulesetStorageError::Encode`] if JSON encoding fails.
pub fn encode(raw: &RawRuleset) -> Result<String, RulesetStorageError> {
    let doc = SerializedRuleset {
        metadata: raw.metadata().clone(),
        entries: SerializedEntries {
            allow: raw
                .rules(RuleAction::Allow)
                .iter()
                .map(serialize_rule)
                .collect(),
            deny: raw
                .rules(RuleAction::Deny)
                .iter()
                .map(serialize_rule)
                .collect(),
        },
    };
    serde_json::to_string_pretty(&doc).map_err(RulesetStorageError::Encode)
}

fn serialize_rule(rule: &Rule) -> SerializedRule {
    SerializedRule {
        o: rule.origin().map(serialize_endpoint),
        d: rule.dest().map(serialize_endpoint),
    }
}

fn serialize_endpoint(spec: &EndpointSpec) -> SerializedEndpoint {
    SerializedEndpoint {
        s: spec.scheme().map(str::to_owned),
        h: spec.host_spec().map(HostSpec::pattern),
        port: spec.port().map(|port| match port {
            PortSpec::Specific(p) => SerializedPort::Number(i64::from(p)),
            PortSpec::Default => SerializedPort::Number(-1),
            PortSpec::Any => SerializedPort::Text("*".to_owned()),
        }),
        path_pre: match spec.path() {
            Some(PathSpec::Prefix(prefix)) => Some(prefix.clone()),
            _ => None,
        },
        path_regex: match spec.path() {
            Some(PathSpec::Regex { pattern, .. }) => Some(pattern.clone()),
            _ => None,
        },
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Deserialize a JSON document into a validated [`RawRuleset`].
///
/// # Errors
///
/// Returns [`RulesetStorageError`] on malformed JSON, a version other than
/// 1, or any rule that fails validation.
pub fn decode(document: &str) -> Result<RawRuleset, RulesetStorageError> {
    let doc: SerializedRuleset =
        serde_json::from_str(document).map_err(RulesetStorageError::Parse)?;
    if doc.metadata.version != DOCUMENT_VERSION {
        return Err(RulesetStorageError::UnsupportedVersion {
            version: doc.metadata.version,
        });
    }
    let allow = decode_rules(doc.entries.allow, RuleAction::Allow)?;
    let deny = decode_rules(doc.entries.deny, RuleAction::Deny)?;
    Ok(RawRuleset::from_parts(doc.metadata, allow, deny))
}

fn decode_rules(
    entries: Vec<SerializedRule>,
    action: RuleAction,
) -> Result<Vec<Rule>, RulesetStorageError> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| decode_rule(entry, action, index))
        .collect()
}

fn decode_rule(
    entry: SerializedRule,
    action: RuleAction,
    index: usize,
) -> Result<Rule, RulesetStorageError> {
    let origin = entry
        .o
        .map(|e| decode_endpoint(e, action, index))
        .transpose()?;
    let dest = entry
        .d
        .map(|e| decode_endpoint(e, action, index))
        .transpose()?;
    Rule::new(origin, dest).map_err(|source| RulesetStorageError::InvalidRule {
        action,
        index,
        source,
    })
}

fn decode_endpoint(
    endpoint: SerializedEndpoint,
    action: RuleAction,
    index: usize,
) -> Result<EndpointSpec, RulesetStorageError> {
    let spec_error = |source| RulesetStorageError::InvalidRule {
        action,
        index,
        source,
    };
    let host = match endpoint.h {
        None => None,
        Some(None) => Some(HostSpec::NoHost),
        Some(Some(pattern)) => Some(HostSpec::from_pattern(&pattern).map_err(spec_error)?),
    };
    let port = endpoint
        .port
        .map(|port| decode_port(port, action, index))
        .transpose()?;
    let path = match (endpoint.path_pre, endpoint.path_regex) {
        (Some(prefix), _) => Some(PathSpec::prefix(prefix).map_err(spec_error)?),
        (None, Some(pattern)) => Some(PathSpec::regex(pattern).map_err(spec_error)?),
        (None, None) => None,
    };
    EndpointSpec::new(endpoint.s, host, port, path).map_err(spec_error)
}

fn decode_port(
    port: SerializedPort,
    action: RuleAction,
    index: usize,
) -> Result<PortSpec, RulesetStorageError> {
    let invalid = |value: String| RulesetStorageError::InvalidPort {
        action,
        index,
        value,
    };
    match port {
        SerializedPort::Number(-1) => Ok(PortSpec::Default),
        SerializedPort::Number(n) => u16::try_from(n)
            .ok()
            .filter(|p| *p > 0)
            .map(PortSpec::Specific)
            .ok_or_else(|| invalid(n.to_string())),
        SerializedPort::Text(text) if text == "*" => Ok(PortSpec::Any),
        SerializedPort::Text(text) => match text.parse::<u16>() {
            Ok(p) if p > 0 => Ok(PortSpec::Specific(p)),
            _ => Err(invalid(text)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RuleSource;

    fn sample_ruleset() -> RawRuleset {
        let mut raw = RawRuleset::new();
        raw.metadata_mut().name = Some("user".to_owned());
        raw.add_rule(
            RuleAction::Allow,
            Rule::from_origin(EndpointSpec::host("*.foo.com").unwrap()),
        );
        raw.add_rule(
            RuleAction::Allow,
            Rule::between(
                EndpointSpec::host("a.com").unwrap(),
                EndpointSpec::host("b.com").unwrap(),
            ),
        );
        raw.add_rule(
            RuleAction::Deny,
            Rule::from_dest(
                EndpointSpec::new(
                    Some("https".to_owned()),
                    Some(HostSpec::Exact("tracker.example".to_owned())),
                    Some(PortSpec::Any),
                    Some(PathSpec::prefix("/pixel").unwrap()),
                )
                .unwrap(),
            ),
        );
        raw
    }

    #[test]
    fn round_trip_preserves_ruleset() {
        let raw = sample_ruleset();
        let json = encode(&raw).unwrap();
        let restored = decode(&json).unwrap();
        assert_eq!(raw, restored);
    }

    #[test]
    fn decode_minimal_document() {
        let raw = decode(r#"{"metadata": {"version": 1}, "entries": {}}"#).unwrap();
        assert!(raw.is_empty());
        assert_eq!(raw.metadata().source, RuleSource::User);
    }

    #[test]
    fn decode_rejects_wrong_version() {
        let result = decode(r#"{"metadata": {"version": 2}, "entries": {}}"#);
        assert!(matches!(
            result,
            Err(RulesetStorageError::UnsupportedVersion { version: 2 })
        ));
    }

    #[test]
    fn decode_rejects_missing_metadata() {
        assert!(matches!(
            decode(r#"{"entries": {}}"#),
            Err(RulesetStorageError::Parse(_))
        ));
    }

    #[test]
    fn decode_rejects_empty_rule() {
        let doc = r#"{"metadata": {"version": 1}, "entries": {"allow": [{}]}}"#;
        assert!(matches!(
            decode(doc),
            Err(RulesetStorageError::InvalidRule {
                action: RuleAction::Allow,
                index: 0,
                source: RuleSpecError::EmptyRule,
            })
        ));
    }

    #[test]
    fn decode_rejects_bad_regex() {
        let doc = r#"{
            "metadata": {"version": 1},
            "entries": {"deny": [{"d": {"h": "x.com", "pathRegex": "(unclosed"}}]}
        }"#;
        assert!(matches!(
            decode(doc),
            Err(RulesetStorageError::InvalidRule {
                action: RuleAction::Deny,
                source: RuleSpecError::InvalidPath { .. },
                ..
            })
        ));
    }

    #[test]
    fn decode_rejects_bad_port() {
        let doc = r#"{
            "metadata": {"version": 1},
            "entries": {"allow": [{"o": {"h": "x.com", "port": "eighty"}}]}
        }"#;
        assert!(matches!(
            decode(doc),
            Err(RulesetStorageError::InvalidPort { .. })
        ));
    }

    #[test]
    fn decode_null_host_is_no_host_state() {
        let doc = r#"{
            "metadata": {"version": 1},
            "entries": {"allow": [{"o": {"s": "about", "h": null}}]}
        }"#;
        let raw = decode(doc).unwrap();
        let rule = &raw.rules(RuleAction::Allow)[0];
        assert_eq!(
            rule.origin().unwrap().host_spec(),
            Some(&HostSpec::NoHost)
        );
    }

    #[test]
    fn decode_port_variants() {
        let doc = r#"{
            "metadata": {"version": 1},
            "entries": {"allow": [
                {"o": {"h": "a.com", "port": "*"}},
                {"o": {"h": "b.com", "port": 8080}},
                {"o": {"h": "c.com", "port": "8443"}},
                {"o": {"h": "d.com", "port": -1}}
            ]}
        }"#;
        let raw = decode(doc).unwrap();
        let ports: Vec<Option<PortSpec>> = raw
            .rules(RuleAction::Allow)
            .iter()
            .map(|r| r.origin().unwrap().port())
            .collect();
        assert_eq!(
            ports,
            vec![
                Some(PortSpec::Any),
                Some(PortSpec::Specific(8080)),
                Some(PortSpec::Specific(8443)),
                Some(PortSpec::Default),
            ]
        );
    }

    #[test]
    fn legacy_scheme_star_normalizes_to_unconstrained() {
        let doc = r#"{
            "metadata": {"version": 1},
            "entries": {"allow": [{"o": {"s": "*", "h": "a.com"}}]}
        }"#;
        let raw = decode(doc).unwrap();
        assert_eq!(raw.rules(RuleAction::Allow)[0].origin().unwrap().scheme(), None);
    }
}
