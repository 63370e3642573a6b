
use crossguard::{DefaultPolicy, PolicyManager, RawRuleset, RuleChangeKind, RuleChangeQueue};
use proptest::prelude::*;
use strategies::{arb_action, arb_entries, arb_rule, arb_uri};

// ---------------------------------------------------------------------------
// Invariant 1: Mutation idempotence
//
// Adding a rule twice is the same as adding it once; likewise for removal.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn add_twice_equals_add_once(action in arb_action(), rule in arb_rule()) {
        let mut once = RawRuleset::new();
        once.add_rule(action, rule.clone());

        let mut twice = RawRuleset::new();
        twice.add_rule(action, rule.clone());
        twice.add_rule(action, rule);

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn remove_twice_equals_remove_once(
        entries in arb_entries(),
        action in arb_action(),
        rule in arb_rule(),
    ) {
        let mut base = RawRuleset::new();
        for (a, r) in &entries {
            base.add_rule(*a, r.clone());
        }

        let mut once = base.clone();
        once.remove_rule(action, &rule);

        let mut twice = base;
        twice.remove_rule(action, &rule);
        twice.remove_rule(action, &rule);

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn add_then_remove_is_identity_when_absent(
        action in arb_action(),
        rule in arb_rule(),
    ) {
        let mut raw = RawRuleset::new();
        prop_assume!(!raw.rule_exists(action, &rule));
        raw.add_rule(action, rule.clone());
        raw.remove_rule(action, &rule);
        prop_assert_eq!(raw, RawRuleset::new());
    }
}

// ---------------------------------------------------------------------------
// Invariant 2: Canonicalization consistency
//
// Structural equality and canonical-string equality must coincide.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn canonical_iff_structural(r1 in arb_rule(), r2 in arb_rule()) {
        prop_assert_eq!(r1 == r2, r1.canonical() == r2.canonical());
    }

    #[test]
    fn canonical_is_deterministic(rule in arb_rule()) {
        prop_assert_eq!(rule.canonical(), rule.clone().canonical());
    }
}

// ---------------------------------------------------------------------------
// Invariant 3: Document round-trip
//
// deserialize(serialize(R)) == R for every ruleset the engine can build.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn document_round_trip(entries in arb_entries()) {
        let mut raw = RawRuleset::new();
        for (action, rule) in entries {
            raw.add_rule(action, rule);
        }
        let json = raw.to_json().expect("encoding never fails for valid rulesets");
        let restored = RawRuleset::from_json(&json).expect("own output must decode");
        prop_assert_eq!(raw, restored);
    }
}

// ---------------------------------------------------------------------------
// Invariant 4: Decision determinism
//
// check() is a pure function: same ruleset and URIs, same result, under
// repetition and under index rebuilds.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn check_is_deterministic(
        entries in arb_entries(),
        origin in arb_uri(),
        dest in arb_uri(),
    ) {
        let mut raw = RawRuleset::new();
        for (action, rule) in &entries {
            raw.add_rule(*action, rule.clone());
        }
        let ruleset = raw.to_ruleset("prop");
        let first = ruleset.check(&origin, &dest);
        for _ in 0..3 {
            prop_assert_eq!(ruleset.check(&origin, &dest), first.clone());
        }

        // A rebuilt index gives the same answer.
        let rebuilt = raw.to_ruleset("prop");
        prop_assert_eq!(rebuilt.check(&origin, &dest), first);
    }

    #[test]
    fn manager_check_is_total_and_consistent(
        entries in arb_entries(),
        origin in arb_uri(),
        dest in arb_uri(),
    ) {
        let mut manager = PolicyManager::new(DefaultPolicy::Deny);
        for (action, rule) in entries {
            manager.add_rule(action, rule, false);
        }
        let first = manager.check(&origin, &dest);
        prop_assert_eq!(manager.check(&origin, &dest), first.clone());
        // Every request gets a verdict one way or the other.
        prop_assert!(first.is_allowed() || first.is_denied());
    }
}

// ---------------------------------------------------------------------------
// Invariant 5: Batched changes converge
//
// Surviving queue intents touch distinct (action, canonical) slots, so
// applying them in any order produces the same ruleset state.
// ---------------------------------------------------------------------------

fn arb_kind() -> impl Strategy<Value = RuleChangeKind> {
    prop_oneof![
        Just(RuleChangeKind::Allow),
        Just(RuleChangeKind::AllowTemporary),
        Just(RuleChangeKind::StopAllow),
        Just(RuleChangeKind::Deny),
        Just(RuleChangeKind::DenyTemporary),
        Just(RuleChangeKind::StopDeny),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn queue_drain_order_does_not_matter(
        pushes in prop::collection::vec((arb_kind(), arb_rule()), 0..10),
    ) {
        let mut queue = RuleChangeQueue::new();
        for (kind, rule) in &pushes {
            queue.push(*kind, rule.clone());
        }
        let surviving: Vec<_> = queue
            .pending()
            .map(|(kind, rule)| (kind, rule.clone()))
            .collect();

        let mut forward = PolicyManager::new(DefaultPolicy::Deny);
        for (kind, rule) in &surviving {
            forward.apply_change(*kind, rule.clone());
        }

        let mut backward = PolicyManager::new(DefaultPolicy::Deny);
        for (kind, rule) in surviving.iter().rev() {
            backward.apply_change(*kind, rule.clone());
        }

        prop_assert_eq!(forward.user_ruleset(), backward.user_ruleset());
        prop_assert_eq!(forward.temporary_ruleset(), backward.temporary_ruleset());
    }
}
