use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::manager::{PolicyManager, RuleChangeKind};
use crate::types::{Rule, RuleAction};

#[derive(Debug)]
struct PendingChange {
    kind: RuleChangeKind,
    rule: Rule,
}

/// Batches rule-change intents before they are applied.
///
/// Intents are keyed by `(action, canonical rule string)`. Pushing the
/// opposite intent for a key (a removal after a pending add, or an add
/// after a pending removal) cancels the pending intent instead of queueing
/// a second operation, so repeated UI toggles collapse to one net effect.
///
/// Because [`PolicyManager::apply_change`] is idempotent, draining N
/// surviving intents converges to the same ruleset state in any order.
#[derive(Debug, Default)]
pub struct RuleChangeQueue {
    pending: HashMap<(RuleAction, String), PendingChange>,
}

impl RuleChangeQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an intent, cancelling a pending opposite intent for the same
    /// rule. A same-direction push replaces the pending one (e.g. a
    /// temporary add upgrading a pending persistent add).
    pub fn push(&mut self, kind: RuleChangeKind, rule: Rule) {
        let key = (kind.action(), rule.canonical());
        match self.pending.entry(key) {
            Entry::Occupied(entry) => {
                if entry.get().kind.is_removal() == kind.is_removal() {
                    entry.into_mut().kind = kind;
                } else {
                    entry.remove();
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingChange { kind, rule });
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The pending intents, in no particular order.
    pub fn pending(&self) -> impl Iterator<Item = (RuleChangeKind, &Rule)> {
        self.pending.values().map(|p| (p.kind, &p.rule))
    }

    /// Drop every pending intent without applying it.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Apply every pending intent to the manager, emptying the queue.
    /// Returns how many intents actually changed a ruleset.
    pub fn drain_into(&mut self, manager: &mut PolicyManager) -> usize {
        let mut changed = 0;
        for (_, pending) in self.pending.drain() {
            if manager.apply_change(pending.kind, pending.rule) {
                changed += 1;
            }
        }
        changed
    }
}
