use std::collections::HashMap;
use std::fmt;

use super::endpoint::{EndpointSpec, HostSpec};
use super::rule::{Rule, RuleAction};
use crate::uri::{is_ip_address, ParsedUri};

/// Which side(s) of a rule produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Origin,
    Dest,
    OriginToDest,
}

/// One rule that matched a request, reconstructed from the index so the
/// caller can canonicalize it or build a removal request from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    kind: MatchKind,
    rule: Rule,
}

impl RuleMatch {
    #[must_use]
    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    #[must_use]
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    #[must_use]
    pub fn into_rule(self) -> Rule {
        self.rule
    }
}

/// A rule node holds one endpoint pattern plus the action flags attached to
/// it. Several raw rules can merge into one node: an origin-only allow rule
/// and an origin-only deny rule for the same endpoint share it.
#[derive(Debug)]
struct RuleNode {
    spec: EndpointSpec,
    allow_origin: bool,
    deny_origin: bool,
    allow_destination: bool,
    deny_destination: bool,
    /// For origin-to-destination rules, the destination side index.
    destinations: Option<Box<Ruleset>>,
}

impl RuleNode {
    fn new(spec: EndpointSpec) -> Self {
        Self {
            spec,
            allow_origin: false,
            deny_origin: false,
            allow_destination: false,
            deny_destination: false,
            destinations: None,
        }
    }
}

#[derive(Debug, Default)]
struct RuleList {
    nodes: Vec<RuleNode>,
}

impl RuleList {
    /// Find the node for this endpoint pattern, creating it if absent.
    fn add(&mut self, spec: &EndpointSpec) -> &mut RuleNode {
        if let Some(idx) = self.nodes.iter().position(|n| n.spec == *spec) {
            return &mut self.nodes[idx];
        }
        self.nodes.push(RuleNode::new(spec.clone()));
        let idx = self.nodes.len() - 1;
        &mut self.nodes[idx]
    }

    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// One level of the domain trie. Keys of `lower` are domain labels; the
/// label `*` holds wildcard rules for this level.
#[derive(Debug, Default)]
struct DomainEntry {
    rules: RuleList,
    lower: HashMap<String, DomainEntry>,
}

/// An in-memory index of rules, queryable against a concrete
/// (origin, destination) URI pair.
///
/// Hosted rules live in a domain trie keyed by reversed host labels (with
/// `*` children for wildcard rules) or in an exact-match IP map; rules
/// without a host constraint live in a flat list. The index only narrows
/// the candidate set: every candidate re-runs the full endpoint match, so
/// the index shape never changes what matches.
///
/// A `Ruleset` is immutable once derived from a
/// [`RawRuleset`](super::RawRuleset); mutations go through the raw form and
/// re-derive the index, so concurrent readers never observe a partial
/// update.
#[derive(Debug, Default)]
pub struct Ruleset {
    name: Option<String>,
    /// Rules whose host is unconstrained, `NoHost`, or `Empty`.
    hostless: RuleList,
    /// Root of the domain trie, the implicit domain `.`.
    domain_root: DomainEntry,
    ip_hosts: HashMap<String, RuleList>,
}

impl Ruleset {
    #[must_use]
    pub(crate) fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Index one rule under the given action.
    pub(crate) fn add_entry(&mut self, action: RuleAction, rule: &Rule) {
        match (rule.origin(), rule.dest()) {
            (Some(origin), Some(dest)) => {
                let node = self.list_for(origin).add(origin);
                let destinations = node.destinations.get_or_insert_with(Box::default);
                let dest_node = destinations.list_for(dest).add(dest);
                match action {
                    RuleAction::Allow => dest_node.allow_destination = true,
                    RuleAction::Deny => dest_node.deny_destination = true,
                }
            }
            (Some(origin), None) => {
                let node = self.list_for(origin).add(origin);
                match action {
                    RuleAction::Allow => node.allow_origin = true,
                    RuleAction::Deny => node.deny_origin = true,
                }
            }
            (None, Some(dest)) => {
                let node = self.list_for(dest).add(dest);
                match action {
                    RuleAction::Allow => node.allow_destination = true,
                    RuleAction::Deny => node.deny_destination = true,
                }
            }
            // Unreachable: Rule construction rejects the empty pair.
            (None, None) => {}
        }
    }

    /// Return every allow rule and every deny rule matching the pair.
    ///
    /// All matches are returned; precedence between allow and deny is the
    /// caller's concern. Pure over its inputs and safe to call
    /// concurrently.
    #[must_use]
    pub fn check(&self, origin: &ParsedUri, dest: &ParsedUri) -> (Vec<RuleMatch>, Vec<RuleMatch>) {
        let mut allow = Vec::new();
        let mut deny = Vec::new();

        // Origin rules and origin-to-destination rules.
        for list in self.candidate_lists(origin.host()) {
            for node in &list.nodes {
                if !node.spec.matches(origin) {
                    continue;
                }
                if node.allow_origin {
                    allow.push(RuleMatch {
                        kind: MatchKind::Origin,
                        rule: Rule::from_origin(node.spec.clone()),
                    });
                }
                if node.deny_origin {
                    deny.push(RuleMatch {
                        kind: MatchKind::Origin,
                        rule: Rule::from_origin(node.spec.clone()),
                    });
                }
                let Some(destinations) = &node.destinations else {
                    continue;
                };
                for dest_list in destinations.candidate_lists(dest.host()) {
                    for dest_node in &dest_list.nodes {
                        if !dest_node.spec.matches(dest) {
                            continue;
                        }
                        if dest_node.allow_destination {
                            allow.push(RuleMatch {
                                kind: MatchKind::OriginToDest,
                                rule: Rule::between(node.spec.clone(), dest_node.spec.clone()),
                            });
                        }
                        if dest_node.deny_destination {
                            deny.push(RuleMatch {
                                kind: MatchKind::OriginToDest,
                                rule: Rule::between(node.spec.clone(), dest_node.spec.clone()),
                            });
                        }
                    }
                }
            }
        }

        // Destination-only rules.
        for list in self.candidate_lists(dest.host()) {
            for node in &list.nodes {
                if !node.spec.matches(dest) {
                    continue;
                }
                if node.allow_destination {
                    allow.push(RuleMatch {
                        kind: MatchKind::Dest,
                        rule: Rule::from_dest(node.spec.clone()),
                    });
                }
                if node.deny_destination {
                    deny.push(RuleMatch {
                        kind: MatchKind::Dest,
                        rule: Rule::from_dest(node.spec.clone()),
                    });
                }
            }
        }

        (allow, deny)
    }

    /// The rule list a spec's host pattern files under, creating trie and
    /// map entries as needed.
    fn list_for(&mut self, spec: &EndpointSpec) -> &mut RuleList {
        match spec.host_spec() {
            None | Some(HostSpec::NoHost) | Some(HostSpec::Empty) => &mut self.hostless,
            Some(HostSpec::Any) => {
                &mut self
                    .domain_root
                    .lower
                    .entry("*".to_owned())
                    .or_default()
                    .rules
            }
            Some(HostSpec::Wildcard(base)) => {
                let entry = Self::domain_entry(&mut self.domain_root, base);
                &mut entry.lower.entry("*".to_owned()).or_default().rules
            }
            Some(HostSpec::Exact(host)) => {
                if is_ip_address(host) {
                    self.ip_hosts.entry(host.clone()).or_default()
                } else {
                    &mut Self::domain_entry(&mut self.domain_root, host).rules
                }
            }
        }
    }

    fn domain_entry<'a>(root: &'a mut DomainEntry, host: &str) -> &'a mut DomainEntry {
        let mut cur = root;
        for label in host.rsplit('.') {
            cur = cur.lower.entry(label.to_owned()).or_default();
        }
        cur
    }

    /// Candidate rule lists for a URI host: the hostless list, then trie
    /// entries top-down with wildcard children at each level, or the exact
    /// IP entry.
    fn candidate_lists(&self, host: Option<&str>) -> Vec<&RuleList> {
        let mut lists = Vec::new();
        if !self.hostless.is_empty() {
            lists.push(&self.hostless);
        }
        let Some(host) = host else {
            return lists;
        };
        if host.is_empty() {
            return lists;
        }
        if let Some(star) = self.domain_root.lower.get("*") {
            lists.push(&star.rules);
        }
        if is_ip_address(host) {
            if let Some(list) = self.ip_hosts.get(host) {
                lists.push(list);
            }
            return lists;
        }
        let mut cur = &self.domain_root;
        for label in host.rsplit('.') {
            match cur.lower.get(label) {
                Some(next) => {
                    cur = next;
                    if !cur.rules.is_empty() {
                        lists.push(&cur.rules);
                    }
                    if let Some(star) = cur.lower.get("*") {
                        lists.push(&star.rules);
                    }
                }
                None => break,
            }
        }
        lists
    }
}

impl fmt::Display for Ruleset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ruleset({})", self.name.as_deref().unwrap_or("unnamed"))
    }
}
