mod endpoint;
mod error;
mod raw;
mod request_result;
mod rule;
mod ruleset;

pub use endpoint::{EndpointSpec, HostSpec, PathSpec, PortSpec};
pub use error::RuleSpecError;
pub use raw::{RawRuleset, RuleSource, RulesetMetadata};
pub use request_result::{Reason, RequestResult, RulesetIdentity};
pub use rule::{Rule, RuleAction};
pub use ruleset::{MatchKind, RuleMatch, Ruleset};
