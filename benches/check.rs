use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crossguard::{
    DefaultPolicy, EndpointSpec, ParsedUri, PolicyManager, RawRuleset, Rule, RuleAction,
};

/// Build a manager with `n` user allow rules and `n` subscription deny
/// rules across distinct hosts.
fn build_manager(n: usize) -> PolicyManager {
    let mut manager = PolicyManager::new(DefaultPolicy::Deny);
    for i in 0..n {
        let rule = Rule::from_dest(EndpointSpec::host(&format!("allowed{i}.example.com")).unwrap());
        manager.add_rule(RuleAction::Allow, rule, false);
    }
    let mut blocklist = RawRuleset::new();
    for i in 0..n {
        let rule = Rule::from_dest(EndpointSpec::host(&format!("blocked{i}.ads.example")).unwrap());
        blocklist.add_rule(RuleAction::Deny, rule);
    }
    manager.load_subscription_ruleset("blocklist", blocklist);
    manager
}

fn bench_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager_check");

    for &n in &[10, 100, 1000] {
        let manager = build_manager(n);
        let origin = ParsedUri::parse("https://site.example.org/page").unwrap();
        let hit = ParsedUri::parse(&format!("https://allowed{}.example.com/x", n / 2)).unwrap();
        let miss = ParsedUri::parse("https://unrelated.example.net/x").unwrap();

        group.bench_function(format!("{n}_rules_hit"), |b| {
            b.iter(|| manager.check(black_box(&origin), black_box(&hit)));
        });
        group.bench_function(format!("{n}_rules_miss_default"), |b| {
            b.iter(|| manager.check(black_box(&origin), black_box(&miss)));
        });
    }

    group.finish();
}

fn bench_index_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_rebuild");

    for &n in &[10, 100, 1000] {
        let mut raw = RawRuleset::new();
        for i in 0..n {
            let rule =
                Rule::from_dest(EndpointSpec::host(&format!("host{i}.example.com")).unwrap());
            raw.add_rule(RuleAction::Allow, rule);
        }
        group.bench_function(format!("{n}_rules"), |b| {
            b.iter(|| black_box(raw.to_ruleset("bench")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_check, bench_index_rebuild);
criterion_main!(benches);
