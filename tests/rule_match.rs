use crossguard::{
    EndpointSpec, HostSpec, MatchKind, ParsedUri, PathSpec, PortSpec, RawRuleset, Rule,
    RuleAction,
};

fn uri(s: &str) -> ParsedUri {
    ParsedUri::parse(s).unwrap()
}

fn host(pattern: &str) -> EndpointSpec {
    EndpointSpec::host(pattern).unwrap()
}

fn ruleset_of(entries: &[(RuleAction, Rule)]) -> crossguard::Ruleset {
    let mut raw = RawRuleset::new();
    for (action, rule) in entries {
        raw.add_rule(*action, rule.clone());
    }
    raw.to_ruleset("test")
}

#[test]
fn origin_wildcard_rule_end_to_end() {
    let ruleset = ruleset_of(&[(
        RuleAction::Allow,
        Rule::from_origin(host("*.foo.com")),
    )]);

    let (allow, deny) = ruleset.check(&uri("https://a.foo.com/"), &uri("https://bar.com/"));
    assert_eq!(allow.len(), 1);
    assert!(deny.is_empty());
    assert_eq!(allow[0].kind(), MatchKind::Origin);

    // Only the origin side is constrained; any destination works.
    let (allow, _) = ruleset.check(&uri("https://foo.com/"), &uri("ftp://elsewhere.net/"));
    assert_eq!(allow.len(), 1);

    // Unrelated origins do not match.
    let (allow, _) = ruleset.check(&uri("https://foo.com.evil.org/"), &uri("https://bar.com/"));
    assert!(allow.is_empty());
}

#[test]
fn the_three_rule_shapes_each_match_one_request() {
    // Mirrors the classic origin / dest / origin-to-dest triple.
    let origin = uri("http://www.foo.com/");
    let dest = uri("https://www.example.com/");

    let shapes = [
        Rule::from_origin(host("*.foo.com")),
        Rule::from_dest(host("www.example.com")),
        Rule::between(host("*.foo.com"), host("www.example.com")),
    ];

    for rule in shapes {
        let ruleset = ruleset_of(&[(RuleAction::Allow, rule.clone())]);
        let (allow, deny) = ruleset.check(&origin, &dest);
        assert_eq!(allow.len(), 1, "rule {rule} should match once");
        assert!(deny.is_empty());
        assert_eq!(allow[0].rule().canonical(), rule.canonical());
    }
}

#[test]
fn two_sided_rule_requires_both_sides() {
    let ruleset = ruleset_of(&[(
        RuleAction::Deny,
        Rule::between(host("a.com"), host("b.com")),
    )]);

    let (_, deny) = ruleset.check(&uri("https://a.com/"), &uri("https://b.com/"));
    assert_eq!(deny.len(), 1);
    assert_eq!(deny[0].kind(), MatchKind::OriginToDest);

    let (_, deny) = ruleset.check(&uri("https://a.com/"), &uri("https://c.com/"));
    assert!(deny.is_empty());

    let (_, deny) = ruleset.check(&uri("https://c.com/"), &uri("https://b.com/"));
    assert!(deny.is_empty());
}

#[test]
fn scheme_constrained_rule() {
    let spec = EndpointSpec::new(
        Some("https".to_owned()),
        Some(HostSpec::Wildcard("example.com".to_owned())),
        None,
        None,
    )
    .unwrap();
    let ruleset = ruleset_of(&[(RuleAction::Allow, Rule::from_dest(spec))]);

    let (allow, _) = ruleset.check(&uri("http://o.com/"), &uri("https://example.com/"));
    assert_eq!(allow.len(), 1);
    let (allow, _) = ruleset.check(&uri("http://o.com/"), &uri("http://example.com/"));
    assert!(allow.is_empty());
}

#[test]
fn scheme_only_rule_matches_across_hosts() {
    let ruleset = ruleset_of(&[(
        RuleAction::Allow,
        Rule::from_dest(EndpointSpec::scheme_only("data")),
    )]);

    let (allow, _) = ruleset.check(&uri("https://o.com/"), &uri("data:text/plain,hi"));
    assert_eq!(allow.len(), 1);
}

#[test]
fn default_port_semantics_via_index() {
    // A host rule without a port means default ports only.
    let ruleset = ruleset_of(&[(RuleAction::Allow, Rule::from_dest(host("example.com")))]);

    let (allow, _) = ruleset.check(&uri("https://o.com/"), &uri("http://example.com/"));
    assert_eq!(allow.len(), 1);
    let (allow, _) = ruleset.check(&uri("https://o.com/"), &uri("http://example.com:8080/"));
    assert!(allow.is_empty());

    // With an any-port spec both match.
    let spec = EndpointSpec::new(
        None,
        Some(HostSpec::Exact("example.com".to_owned())),
        Some(PortSpec::Any),
        None,
    )
    .unwrap();
    let ruleset = ruleset_of(&[(RuleAction::Allow, Rule::from_dest(spec))]);
    let (allow, _) = ruleset.check(&uri("https://o.com/"), &uri("http://example.com:8080/"));
    assert_eq!(allow.len(), 1);
}

#[test]
fn path_constrained_rule() {
    let spec = EndpointSpec::new(
        None,
        Some(HostSpec::Exact("api.example.com".to_owned())),
        Some(PortSpec::Any),
        Some(PathSpec::prefix("/v1/").unwrap()),
    )
    .unwrap();
    let ruleset = ruleset_of(&[(RuleAction::Allow, Rule::from_dest(spec))]);

    let (allow, _) = ruleset.check(&uri("https://o.com/"), &uri("https://api.example.com/v1/users"));
    assert_eq!(allow.len(), 1);
    let (allow, _) = ruleset.check(&uri("https://o.com/"), &uri("https://api.example.com/v2/users"));
    assert!(allow.is_empty());
}

#[test]
fn no_host_rule_matches_hostless_uris_only() {
    let spec = EndpointSpec::new(None, Some(HostSpec::NoHost), None, None).unwrap();
    let ruleset = ruleset_of(&[(RuleAction::Allow, Rule::from_origin(spec))]);

    let (allow, _) = ruleset.check(&uri("about:blank"), &uri("https://x.com/"));
    assert_eq!(allow.len(), 1);
    let (allow, _) = ruleset.check(&uri("https://host.com/"), &uri("https://x.com/"));
    assert!(allow.is_empty());
}

#[test]
fn matches_from_both_allow_and_deny_are_all_returned() {
    let ruleset = ruleset_of(&[
        (RuleAction::Allow, Rule::from_dest(host("x.com"))),
        (RuleAction::Allow, Rule::from_dest(host("*.x.com"))),
        (RuleAction::Deny, Rule::from_dest(host("x.com"))),
    ]);

    let (allow, deny) = ruleset.check(&uri("https://o.com/"), &uri("https://x.com/"));
    assert_eq!(allow.len(), 2);
    assert_eq!(deny.len(), 1);
}

#[test]
fn matched_rules_can_drive_removal() {
    let rule = Rule::between(host("*.foo.com"), host("bar.com"));
    let mut raw = RawRuleset::new();
    raw.add_rule(RuleAction::Allow, rule.clone());

    let ruleset = raw.to_ruleset("user");
    let (allow, _) = ruleset.check(&uri("https://www.foo.com/"), &uri("https://bar.com/"));
    assert_eq!(allow.len(), 1);

    // The reconstructed rule removes the original entry.
    let reconstructed = allow[0].rule().clone();
    assert!(raw.remove_rule(RuleAction::Allow, &reconstructed));
    assert_eq!(raw.allow_rule_count(), 0);
}
