use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compat::CompatibilityRules;
use crate::types::{
    RawRuleset, Reason, RequestResult, Rule, RuleAction, RuleMatch, RuleSource, Ruleset,
    RulesetIdentity,
};
use crate::uri::{is_relative_uri, ParsedUri};

/// What happens to a request no explicit rule decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultPolicy {
    Allow,
    #[default]
    Deny,
    /// Allow iff origin and destination share a registrable domain.
    AllowSameDomain,
}

/// The six rule-change intents a UI can issue, dispatched through
/// [`PolicyManager::apply_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleChangeKind {
    Allow,
    AllowTemporary,
    StopAllow,
    Deny,
    DenyTemporary,
    StopDeny,
}

impl RuleChangeKind {
    #[must_use]
    pub fn action(self) -> RuleAction {
        match self {
            RuleChangeKind::Allow | RuleChangeKind::AllowTemporary | RuleChangeKind::StopAllow => {
                RuleAction::Allow
            }
            RuleChangeKind::Deny | RuleChangeKind::DenyTemporary | RuleChangeKind::StopDeny => {
                RuleAction::Deny
            }
        }
    }

    #[must_use]
    pub fn is_removal(self) -> bool {
        matches!(self, RuleChangeKind::StopAllow | RuleChangeKind::StopDeny)
    }

    #[must_use]
    pub fn is_temporary(self) -> bool {
        matches!(
            self,
            RuleChangeKind::AllowTemporary | RuleChangeKind::DenyTemporary
        )
    }
}

impl fmt::Display for RuleChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RuleChangeKind::Allow => "allow",
            RuleChangeKind::AllowTemporary => "allow-temp",
            RuleChangeKind::StopAllow => "stop-allow",
            RuleChangeKind::Deny => "deny",
            RuleChangeKind::DenyTemporary => "deny-temp",
            RuleChangeKind::StopDeny => "stop-deny",
        };
        f.write_str(text)
    }
}

/// A raw ruleset together with its derived matching index. The index is
/// rebuilt whole after each mutation, never edited in place, so a reader
/// holding the manager across a mutation boundary never sees a partial
/// index.
#[derive(Debug)]
struct StoredRuleset {
    raw: RawRuleset,
    index: Ruleset,
}

impl StoredRuleset {
    fn new(name: &str, raw: RawRuleset) -> Self {
        let index = raw.to_ruleset(name);
        Self { raw, index }
    }

    fn rebuild(&mut self, name: &str) {
        self.index = self.raw.to_ruleset(name);
    }
}

/// Owns the named rulesets (`user`, `temp`, one per subscription) and
/// implements the cross-ruleset decision algorithm.
///
/// Collaborators receive a `PolicyManager` explicitly; there is no shared
/// global instance. Persistence is external: callers read
/// [`user_ruleset`](Self::user_ruleset) after a mutation that returns
/// `true` and write it wherever they store documents. The `temp` store is
/// session-only and never handed out for persistence.
#[derive(Debug)]
pub struct PolicyManager {
    default_policy: DefaultPolicy,
    compatibility: CompatibilityRules,
    user: StoredRuleset,
    temp: StoredRuleset,
    subscriptions: BTreeMap<String, StoredRuleset>,
}

impl PolicyManager {
    #[must_use]
    pub fn new(default_policy: DefaultPolicy) -> Self {
        Self {
            default_policy,
            compatibility: CompatibilityRules::empty(),
            user: StoredRuleset::new("user", RawRuleset::new()),
            temp: StoredRuleset::new("temp", RawRuleset::new()),
            subscriptions: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_compatibility_rules(mut self, rules: CompatibilityRules) -> Self {
        self.compatibility = rules;
        self
    }

    #[must_use]
    pub fn default_policy(&self) -> DefaultPolicy {
        self.default_policy
    }

    pub fn set_default_policy(&mut self, policy: DefaultPolicy) {
        self.default_policy = policy;
    }

    #[must_use]
    pub fn compatibility_rules(&self) -> &CompatibilityRules {
        &self.compatibility
    }

    // -----------------------------------------------------------------
    // Ruleset loading
    // -----------------------------------------------------------------

    /// Install an already-deserialized user ruleset, replacing the current
    /// one. Temporary rules are revoked, matching a fresh session start.
    pub fn load_user_ruleset(&mut self, raw: RawRuleset) {
        info!(
            allow = raw.allow_rule_count(),
            deny = raw.deny_rule_count(),
            "loading user ruleset"
        );
        self.user = StoredRuleset::new("user", raw);
        self.revoke_temporary_rules();
    }

    /// Install or replace one subscription's ruleset.
    pub fn load_subscription_ruleset(&mut self, id: impl Into<String>, raw: RawRuleset) {
        let id = id.into();
        info!(
            subscription = %id,
            allow = raw.allow_rule_count(),
            deny = raw.deny_rule_count(),
            "loading subscription ruleset"
        );
        let stored = StoredRuleset::new(&id, raw);
        self.subscriptions.insert(id, stored);
    }

    /// Drop one subscription's ruleset. Returns whether it was loaded.
    pub fn unload_subscription_ruleset(&mut self, id: &str) -> bool {
        let removed = self.subscriptions.remove(id).is_some();
        if removed {
            info!(subscription = %id, "unloaded subscription ruleset");
        }
        removed
    }

    #[must_use]
    pub fn subscription_ids(&self) -> Vec<&str> {
        self.subscriptions.keys().map(String::as_str).collect()
    }

    /// The persisted user ruleset, for external storage.
    #[must_use]
    pub fn user_ruleset(&self) -> &RawRuleset {
        &self.user.raw
    }

    /// The session-only temporary ruleset. Read access for UI display;
    /// never persisted.
    #[must_use]
    pub fn temporary_ruleset(&self) -> &RawRuleset {
        &self.temp.raw
    }

    #[must_use]
    pub fn user_rule_count(&self) -> usize {
        self.user.raw.allow_rule_count() + self.user.raw.deny_rule_count()
    }

    #[must_use]
    pub fn temporary_rules_exist(&self) -> bool {
        !self.temp.raw.is_empty()
    }

    // -----------------------------------------------------------------
    // Rule mutation
    // -----------------------------------------------------------------

    /// Add a rule to the user store, or to the session-only temporary
    /// store. Returns whether anything changed.
    pub fn add_rule(&mut self, action: RuleAction, rule: Rule, temporary: bool) -> bool {
        info!(%action, temporary, rule = %rule, "add rule");
        let store = if temporary { &mut self.temp } else { &mut self.user };
        let changed = store.raw.add_rule(action, rule);
        if changed {
            let name = if temporary { "temp" } else { "user" };
            store.rebuild(name);
        }
        changed
    }

    /// Remove a rule from both the user and the temporary store; a single
    /// undo clears the rule wherever it lives. Returns whether anything
    /// changed.
    pub fn remove_rule(&mut self, action: RuleAction, rule: &Rule) -> bool {
        info!(%action, rule = %rule, "remove rule");
        let mut changed = false;
        if self.user.raw.remove_rule(action, rule) {
            self.user.rebuild("user");
            changed = true;
        }
        if self.temp.raw.remove_rule(action, rule) {
            self.temp.rebuild("temp");
            changed = true;
        }
        changed
    }

    /// Clear every temporary rule; used for end-of-private-session
    /// semantics.
    pub fn revoke_temporary_rules(&mut self) {
        self.temp = StoredRuleset::new("temp", RawRuleset::new());
    }

    /// Dispatch one UI rule-change intent.
    pub fn apply_change(&mut self, kind: RuleChangeKind, rule: Rule) -> bool {
        match kind {
            RuleChangeKind::Allow => self.add_rule(RuleAction::Allow, rule, false),
            RuleChangeKind::AllowTemporary => self.add_rule(RuleAction::Allow, rule, true),
            RuleChangeKind::StopAllow => self.remove_rule(RuleAction::Allow, &rule),
            RuleChangeKind::Deny => self.add_rule(RuleAction::Deny, rule, false),
            RuleChangeKind::DenyTemporary => self.add_rule(RuleAction::Deny, rule, true),
            RuleChangeKind::StopDeny => self.remove_rule(RuleAction::Deny, &rule),
        }
    }

    /// Whether the rule is present in the user store, the temporary store,
    /// or any subscription. Total; never errors.
    #[must_use]
    pub fn rule_exists(&self, action: RuleAction, rule: &Rule) -> bool {
        self.user.raw.rule_exists(action, rule)
            || self.temp.raw.rule_exists(action, rule)
            || self
                .subscriptions
                .values()
                .any(|s| s.raw.rule_exists(action, rule))
    }

    // -----------------------------------------------------------------
    // Request decision
    // -----------------------------------------------------------------

    /// Decide a request on the content-policy path, where the destination
    /// is always absolute. Tiers: user rules, subscription rules,
    /// compatibility rules, default policy.
    #[must_use]
    pub fn check(&self, origin: &ParsedUri, dest: &ParsedUri) -> RequestResult {
        self.decide(origin, dest, None)
    }

    /// Decide a redirect, whose destination may be a relative URL. Adds
    /// the relative-URL tier between subscription and compatibility rules.
    #[must_use]
    pub fn check_redirect(&self, origin: &ParsedUri, dest: &str) -> RequestResult {
        match ParsedUri::parse(dest) {
            Ok(dest_uri) => self.decide(origin, &dest_uri, Some(dest)),
            Err(_) if is_relative_uri(dest) => RequestResult::from_reason(Reason::RelativeUrl),
            Err(_) => {
                // Unparseable and not relative. Explicit rules cannot match
                // without a parsed destination, but compatibility prefixes
                // and the default policy still apply.
                if self.compatibility.find_match(origin.as_str(), dest).is_some() {
                    return RequestResult::from_reason(Reason::Compatibility);
                }
                match self.default_policy {
                    DefaultPolicy::Allow => {
                        RequestResult::from_reason(Reason::DefaultPolicy { allow: true })
                    }
                    DefaultPolicy::Deny | DefaultPolicy::AllowSameDomain => {
                        RequestResult::from_reason(Reason::DefaultPolicy { allow: false })
                    }
                }
            }
        }
    }

    /// Run the user and temporary rulesets as one logical tier.
    #[must_use]
    pub fn check_against_user_rules(&self, origin: &ParsedUri, dest: &ParsedUri) -> RequestResult {
        let (allow, deny) = self.user_tier_matches(origin, dest);
        RequestResult::with_matches(allow, deny, Reason::UserPolicy)
    }

    /// Run the union of all subscription rulesets as one tier.
    #[must_use]
    pub fn check_against_subscription_rules(
        &self,
        origin: &ParsedUri,
        dest: &ParsedUri,
    ) -> RequestResult {
        let (allow, deny) = self.subscription_tier_matches(origin, dest);
        RequestResult::with_matches(allow, deny, Reason::SubscriptionPolicy)
    }

    fn decide(&self, origin: &ParsedUri, dest: &ParsedUri, dest_raw: Option<&str>) -> RequestResult {
        // Tier 1: user intent, deny winning over allow within the tier.
        let (allow, deny) = self.user_tier_matches(origin, dest);
        if !allow.is_empty() || !deny.is_empty() {
            return RequestResult::with_matches(allow, deny, Reason::UserPolicy);
        }

        // Tier 2: subscriptions, same conflict handling.
        let (allow, deny) = self.subscription_tier_matches(origin, dest);
        if !allow.is_empty() || !deny.is_empty() {
            return RequestResult::with_matches(allow, deny, Reason::SubscriptionPolicy);
        }

        // Tier 3: relative destinations, redirect path only.
        if let Some(raw) = dest_raw {
            if is_relative_uri(raw) {
                return RequestResult::from_reason(Reason::RelativeUrl);
            }
        }

        // Tier 4: vendor compatibility traffic. Overridable only by an
        // explicit rule in tier 1 or 2.
        if self
            .compatibility
            .find_match(origin.as_str(), dest_raw.unwrap_or(dest.as_str()))
            .is_some()
        {
            return RequestResult::from_reason(Reason::Compatibility);
        }

        // Tier 5: the default policy.
        self.check_by_default_policy(origin, dest)
    }

    fn check_by_default_policy(&self, origin: &ParsedUri, dest: &ParsedUri) -> RequestResult {
        match self.default_policy {
            DefaultPolicy::Allow => {
                RequestResult::from_reason(Reason::DefaultPolicy { allow: true })
            }
            DefaultPolicy::Deny => {
                RequestResult::from_reason(Reason::DefaultPolicy { allow: false })
            }
            DefaultPolicy::AllowSameDomain => match (origin.base_domain(), dest.base_domain()) {
                (Some(origin_domain), Some(dest_domain)) if origin_domain == dest_domain => {
                    RequestResult::from_reason(Reason::DefaultSameDomain)
                }
                _ => RequestResult::from_reason(Reason::DefaultPolicy { allow: false }),
            },
        }
    }

    fn user_tier_matches(
        &self,
        origin: &ParsedUri,
        dest: &ParsedUri,
    ) -> (TaggedMatches, TaggedMatches) {
        let mut allow = Vec::new();
        let mut deny = Vec::new();
        for stored in [&self.user, &self.temp] {
            collect_matches(stored, RuleSource::User, origin, dest, &mut allow, &mut deny);
        }
        (allow, deny)
    }

    fn subscription_tier_matches(
        &self,
        origin: &ParsedUri,
        dest: &ParsedUri,
    ) -> (TaggedMatches, TaggedMatches) {
        let mut allow = Vec::new();
        let mut deny = Vec::new();
        for stored in self.subscriptions.values() {
            collect_matches(
                stored,
                RuleSource::Subscription,
                origin,
                dest,
                &mut allow,
                &mut deny,
            );
        }
        (allow, deny)
    }
}

type TaggedMatches = Vec<(RulesetIdentity, RuleMatch)>;

fn collect_matches(
    stored: &StoredRuleset,
    source: RuleSource,
    origin: &ParsedUri,
    dest: &ParsedUri,
    allow: &mut TaggedMatches,
    deny: &mut TaggedMatches,
) {
    let name = stored.index.name().unwrap_or_default();
    let identity = match source {
        RuleSource::User => RulesetIdentity::user(name),
        RuleSource::Subscription => RulesetIdentity::subscription(name),
    };
    let (matched_allow, matched_deny) = stored.index.check(origin, dest);
    allow.extend(
        matched_allow
            .into_iter()
            .map(|m| (identity.clone(), m)),
    );
    deny.extend(matched_deny.into_iter().map(|m| (identity.clone(), m)));
}

impl Default for PolicyManager {
    fn default() -> Self {
        Self::new(DefaultPolicy::default())
    }
}
