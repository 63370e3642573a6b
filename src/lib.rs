//! A rule matching and policy decision engine for cross-origin request
//! control.
//!
//! For every outgoing request a document makes, the engine decides whether
//! the destination may be contacted from the origin. Rules are partial
//! patterns over (scheme, host, port, path) for either side of a request;
//! rule sources (user rules, temporary session rules, subscriptions,
//! vendor compatibility rules, and a default policy) are combined in a
//! fixed precedence order by [`PolicyManager::check`], which returns a
//! [`RequestResult`] carrying the verdict and the matched rules as
//! evidence.
//!
//! The decision path is synchronous, infallible and side-effect-free; all
//! I/O (persistence, subscription fetching, UI) belongs to external
//! collaborators that hand the engine already-parsed data.

mod compat;
mod error;
mod legacy;
mod manager;
mod queue;
mod serial;
mod types;
mod uri;

pub use compat::{CompatibilityRule, CompatibilityRules};
pub use error::{PolicyError, UriParseError};
pub use legacy::{LegacyRuleParseError, LegacyRules};
pub use manager::{DefaultPolicy, PolicyManager, RuleChangeKind};
pub use queue::RuleChangeQueue;
pub use serial::RulesetStorageError;
pub use types::{
    EndpointSpec, HostSpec, MatchKind, PathSpec, PortSpec, RawRuleset, Reason, RequestResult,
    Rule, RuleAction, RuleMatch, RuleSource, RuleSpecError, Ruleset, RulesetIdentity,
    RulesetMetadata,
};
pub use uri::{default_port_for_scheme, is_ip_address, is_relative_uri, ParsedUri};
