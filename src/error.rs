use thiserror::Error;

use crate::legacy::LegacyRuleParseError;
use crate::serial::RulesetStorageError;
use crate::types::RuleSpecError;

/// A URI string that could not be parsed into components.
#[derive(Debug, Error)]
#[error("invalid URI '{uri}': {source}")]
pub struct UriParseError {
    pub uri: String,
    #[source]
    pub source: url::ParseError,
}

/// Unified error type covering rule construction, document storage, legacy
/// imports, and URI parsing.
///
/// The decision path itself (`check`, `check_redirect`, `rule_exists`)
/// never returns an error; this type only appears on construction and
/// conversion boundaries.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(transparent)]
    Spec(#[from] RuleSpecError),

    #[error(transparent)]
    Storage(#[from] RulesetStorageError),

    #[error(transparent)]
    Legacy(#[from] LegacyRuleParseError),

    #[error(transparent)]
    Uri(#[from] UriParseError),
}
