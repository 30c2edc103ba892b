//! First-match-wins rule evaluation (C4).

use crate::matcher::Predicate;
use sluice_core::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    Forward,
    Drop,
}

/// One routing rule: a name, an optional predicate, an action, and (for
/// `forward`) the ordered transforms and destinations to apply.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub predicate: Predicate,
    pub action: Action,
    pub destinations: Vec<String>,
    pub transforms: Vec<String>,
}

/// The outcome of routing one record through the rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Forward to these destinations (in order) after applying these
    /// transforms (in order).
    Forward {
        rule: String,
        destinations: Vec<String>,
        transforms: Vec<String>,
    },
    /// Dropped by an explicit rule action.
    DroppedByFilter { rule: String },
    /// No rule matched.
    DroppedNoMatch,
}

/// An ordered, immutable list of rules. Pure and deterministic: the
/// decision depends only on `(record, rules)`.
#[derive(Debug, Clone, Default)]
pub struct Router {
    rules: Vec<Rule>,
}

impl Router {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Evaluates rules in order; the first match wins and no further rules
    /// are considered.
    pub fn route(&self, record: &Record) -> Outcome {
        for rule in &self.rules {
            if rule.predicate.matches(record) {
                return match rule.action {
                    Action::Drop => Outcome::DroppedByFilter {
                        rule: rule.name.clone(),
                    },
                    Action::Forward => Outcome::Forward {
                        rule: rule.name.clone(),
                        destinations: rule.destinations.clone(),
                        transforms: rule.transforms.clone(),
                    },
                };
            }
        }
        Outcome::DroppedNoMatch
    }
}
