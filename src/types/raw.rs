use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rule::{Rule, RuleAction};
use super::ruleset::Ruleset;
use crate::serial::{self, RulesetStorageError};

/// Where a ruleset came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSource {
    #[default]
    User,
    Subscription,
}

/// Metadata carried by a persisted ruleset document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetMetadata {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub source: RuleSource,
}

impl Default for RulesetMetadata {
    fn default() -> Self {
        Self {
            version: 1,
            name: None,
            source: RuleSource::User,
        }
    }
}

/// The canonical, serializable form of a ruleset: ordered allow and deny
/// entry lists plus metadata.
///
/// Mutations go through [`add_rule`](Self::add_rule) and
/// [`remove_rule`](Self::remove_rule), both deduplicating through the
/// rules' canonical strings, so adding an existing rule and removing a
/// missing one are no-ops. The matching index is derived with
/// [`to_ruleset`](Self::to_ruleset) and must be re-derived after a
/// mutation before the next check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRuleset {
    metadata: RulesetMetadata,
    allow: Vec<Rule>,
    deny: Vec<Rule>,
}

impl RawRuleset {
    /// An empty ruleset: version 1, no name, user source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_metadata(metadata: RulesetMetadata) -> Self {
        Self {
            metadata,
            allow: Vec::new(),
            deny: Vec::new(),
        }
    }

    pub(crate) fn from_parts(metadata: RulesetMetadata, allow: Vec<Rule>, deny: Vec<Rule>) -> Self {
        Self {
            metadata,
            allow,
            deny,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &RulesetMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut RulesetMetadata {
        &mut self.metadata
    }

    #[must_use]
    pub fn rules(&self, action: RuleAction) -> &[Rule] {
        match action {
            RuleAction::Allow => &self.allow,
            RuleAction::Deny => &self.deny,
        }
    }

    #[must_use]
    pub fn allow_rule_count(&self) -> usize {
        self.allow.len()
    }

    #[must_use]
    pub fn deny_rule_count(&self) -> usize {
        self.deny.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }

    /// Whether a rule with the same canonical string is present.
    #[must_use]
    pub fn rule_exists(&self, action: RuleAction, rule: &Rule) -> bool {
        let canonical = rule.canonical();
        self.rules(action).iter().any(|r| r.canonical() == canonical)
    }

    /// Add a rule. Returns whether anything changed; adding a rule that is
    /// already present (by canonical string) is a no-op.
    pub fn add_rule(&mut self, action: RuleAction, rule: Rule) -> bool {
        if self.rule_exists(action, &rule) {
            return false;
        }
        debug!(%action, rule = %rule, "adding rule");
        match action {
            RuleAction::Allow => self.allow.push(rule),
            RuleAction::Deny => self.deny.push(rule),
        }
        true
    }

    /// Remove the rule with the same canonical string, if present. Returns
    /// whether anything changed; removing an absent rule is a no-op, not an
    /// error.
    pub fn remove_rule(&mut self, action: RuleAction, rule: &Rule) -> bool {
        let canonical = rule.canonical();
        let entries = match action {
            RuleAction::Allow => &mut self.allow,
            RuleAction::Deny => &mut self.deny,
        };
        let Some(idx) = entries.iter().position(|r| r.canonical() == canonical) else {
            return false;
        };
        debug!(%action, rule = %rule, "removing rule");
        entries.remove(idx);
        true
    }

    /// Build the matching index reflecting the current entries.
    #[must_use]
    pub fn to_ruleset(&self, name: impl Into<String>) -> Ruleset {
        let name = name.into();
        debug!(
            name = %name,
            allow = self.allow.len(),
            deny = self.deny.len(),
            "deriving ruleset index"
        );
        let mut ruleset = Ruleset::with_name(name);
        for rule in &self.allow {
            ruleset.add_entry(RuleAction::Allow, rule);
        }
        for rule in &self.deny {
            ruleset.add_entry(RuleAction::Deny, rule);
        }
        ruleset
    }

    /// Serialize to the persisted JSON document shape.
    ///
    /// # Errors
    ///
    /// Returns [`RulesetStorageError`] if encoding fails.
    pub fn to_json(&self) -> Result<String, RulesetStorageError> {
        serial::encode(self)
    }

    /// Deserialize from a persisted JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`RulesetStorageError`] on malformed documents, unsupported
    /// versions, or rules that fail validation.
    pub fn from_json(document: &str) -> Result<Self, RulesetStorageError> {
        serial::decode(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::endpoint::EndpointSpec;
    use crate::uri::ParsedUri;

    fn origin_rule(pattern: &str) -> Rule {
        Rule::from_origin(EndpointSpec::host(pattern).unwrap())
    }

    #[test]
    fn add_rule_is_idempotent() {
        let mut raw = RawRuleset::new();
        assert!(raw.add_rule(RuleAction::Allow, origin_rule("a")));
        assert!(!raw.add_rule(RuleAction::Allow, origin_rule("a")));
        assert_eq!(raw.allow_rule_count(), 1);
    }

    #[test]
    fn remove_rule_is_idempotent() {
        let mut raw = RawRuleset::new();
        raw.add_rule(RuleAction::Allow, origin_rule("a"));
        assert!(raw.remove_rule(RuleAction::Allow, &origin_rule("a")));
        assert!(!raw.remove_rule(RuleAction::Allow, &origin_rule("a")));
        assert_eq!(raw.allow_rule_count(), 0);
    }

    #[test]
    fn actions_are_independent() {
        let mut raw = RawRuleset::new();
        raw.add_rule(RuleAction::Allow, origin_rule("a"));
        raw.add_rule(RuleAction::Deny, origin_rule("a"));
        assert_eq!(raw.allow_rule_count(), 1);
        assert_eq!(raw.deny_rule_count(), 1);
        assert!(raw.rule_exists(RuleAction::Allow, &origin_rule("a")));
        assert!(raw.rule_exists(RuleAction::Deny, &origin_rule("a")));

        raw.remove_rule(RuleAction::Allow, &origin_rule("a"));
        assert!(!raw.rule_exists(RuleAction::Allow, &origin_rule("a")));
        assert!(raw.rule_exists(RuleAction::Deny, &origin_rule("a")));
    }

    #[test]
    fn to_ruleset_reflects_entries() {
        let mut raw = RawRuleset::new();
        raw.add_rule(RuleAction::Allow, origin_rule("*.foo.com"));
        let ruleset = raw.to_ruleset("user");

        let origin = ParsedUri::parse("https://a.foo.com/").unwrap();
        let dest = ParsedUri::parse("https://bar.com/").unwrap();
        let (allow, deny) = ruleset.check(&origin, &dest);
        assert_eq!(allow.len(), 1);
        assert!(deny.is_empty());
    }

    #[test]
    fn to_ruleset_after_removal() {
        let mut raw = RawRuleset::new();
        raw.add_rule(RuleAction::Allow, origin_rule("*.foo.com"));
        raw.remove_rule(RuleAction::Allow, &origin_rule("*.foo.com"));
        let ruleset = raw.to_ruleset("user");

        let origin = ParsedUri::parse("https://a.foo.com/").unwrap();
        let dest = ParsedUri::parse("https://bar.com/").unwrap();
        let (allow, _) = ruleset.check(&origin, &dest);
        assert!(allow.is_empty());
    }

    #[test]
    fn default_metadata() {
        let raw = RawRuleset::new();
        assert_eq!(raw.metadata().version, 1);
        assert_eq!(raw.metadata().name, None);
        assert_eq!(raw.metadata().source, RuleSource::User);
    }
}
