use std::fmt;

use super::raw::RuleSource;
use super::ruleset::RuleMatch;

/// Why a request was allowed or denied when no explicit rule (or not only
/// an explicit rule) decided it.
///
/// This is the shared vocabulary between the engine and its callers; the
/// decision path produces only a subset (`UserPolicy`, `SubscriptionPolicy`,
/// the default-policy tags, `Compatibility`, `RelativeUrl`), while tags
/// like `LinkClick` or `FormSubmission` are attached by the request
/// processing layer on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    UserPolicy,
    SubscriptionPolicy,
    /// The configured default policy decided, in the recorded direction.
    DefaultPolicy { allow: bool },
    /// Allow and deny rules conflicted and the default policy broke the
    /// tie. Kept for callers that surface conflicting-rule state; the
    /// engine itself resolves in-tier conflicts toward deny.
    DefaultPolicyInconsistentRules { allow: bool },
    /// Allowed because origin and destination share a registrable domain
    /// under the same-domain default policy.
    DefaultSameDomain,
    /// Allowed by a vendor compatibility rule.
    Compatibility,
    /// Allowed because the destination is a relative URL.
    RelativeUrl,
    LinkClick,
    FormSubmission,
    HistoryRequest,
    UserAllowedRedirect,
    IdenticalIdentifier,
}

impl Reason {
    /// Whether this tag by itself means the request is allowed.
    #[must_use]
    pub fn implies_allow(self) -> bool {
        match self {
            Reason::UserPolicy | Reason::SubscriptionPolicy => false,
            Reason::DefaultPolicy { allow } | Reason::DefaultPolicyInconsistentRules { allow } => {
                allow
            }
            Reason::DefaultSameDomain
            | Reason::Compatibility
            | Reason::RelativeUrl
            | Reason::LinkClick
            | Reason::FormSubmission
            | Reason::HistoryRequest
            | Reason::UserAllowedRedirect
            | Reason::IdenticalIdentifier => true,
        }
    }

    /// Whether this tag by itself means the request is denied.
    #[must_use]
    pub fn implies_deny(self) -> bool {
        match self {
            Reason::DefaultPolicy { allow } | Reason::DefaultPolicyInconsistentRules { allow } => {
                !allow
            }
            _ => false,
        }
    }

    /// Whether the default policy decided (or would decide) this request.
    #[must_use]
    pub fn is_default_policy(self) -> bool {
        matches!(
            self,
            Reason::DefaultPolicy { .. }
                | Reason::DefaultPolicyInconsistentRules { .. }
                | Reason::DefaultSameDomain
        )
    }
}

/// Identifies the ruleset a matched rule came from, for display and for
/// routing removal requests back to the right store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesetIdentity {
    name: String,
    source: RuleSource,
}

impl RulesetIdentity {
    pub(crate) fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: RuleSource::User,
        }
    }

    pub(crate) fn subscription(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: RuleSource::Subscription,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source(&self) -> RuleSource {
        self.source
    }

    /// Whether the rule came from a user-owned store (`user` or `temp`).
    #[must_use]
    pub fn is_user_ruleset(&self) -> bool {
        self.source == RuleSource::User
    }
}

impl fmt::Display for RulesetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The outcome of checking one request: every allow rule and every deny
/// rule that matched, each tagged with its ruleset, plus a [`Reason`].
///
/// `is_allowed` and `is_denied` can both be true when conflicting rules
/// matched; the result deliberately does not collapse that, so callers can
/// surface the conflict. The decision precedence (deny wins inside a tier)
/// is applied by the policy manager choosing which tier's result to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestResult {
    matched_allow_rules: Vec<(RulesetIdentity, RuleMatch)>,
    matched_deny_rules: Vec<(RulesetIdentity, RuleMatch)>,
    reason: Reason,
}

impl RequestResult {
    /// A result decided by the reason tag alone, with no matched rules.
    #[must_use]
    pub fn from_reason(reason: Reason) -> Self {
        Self {
            matched_allow_rules: Vec::new(),
            matched_deny_rules: Vec::new(),
            reason,
        }
    }

    pub(crate) fn with_matches(
        matched_allow_rules: Vec<(RulesetIdentity, RuleMatch)>,
        matched_deny_rules: Vec<(RulesetIdentity, RuleMatch)>,
        reason: Reason,
    ) -> Self {
        Self {
            matched_allow_rules,
            matched_deny_rules,
            reason,
        }
    }

    #[must_use]
    pub fn matched_allow_rules(&self) -> &[(RulesetIdentity, RuleMatch)] {
        &self.matched_allow_rules
    }

    #[must_use]
    pub fn matched_deny_rules(&self) -> &[(RulesetIdentity, RuleMatch)] {
        &self.matched_deny_rules
    }

    #[must_use]
    pub fn reason(&self) -> Reason {
        self.reason
    }

    #[must_use]
    pub fn allow_rules_exist(&self) -> bool {
        !self.matched_allow_rules.is_empty()
    }

    #[must_use]
    pub fn deny_rules_exist(&self) -> bool {
        !self.matched_deny_rules.is_empty()
    }

    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.allow_rules_exist() || self.reason.implies_allow()
    }

    #[must_use]
    pub fn is_denied(&self) -> bool {
        self.deny_rules_exist() || self.reason.implies_deny()
    }

    /// Whether the default policy decided this request.
    #[must_use]
    pub fn is_default_policy(&self) -> bool {
        self.reason.is_default_policy()
    }

    /// Denied by an explicit rule rather than by the default policy.
    #[must_use]
    pub fn is_denied_by_rules(&self) -> bool {
        !self.is_allowed() && !self.is_default_policy()
    }
}
