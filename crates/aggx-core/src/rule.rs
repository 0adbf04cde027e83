//! # Rule System
//!
//! This module defines the rule trait and rule registry used to produce aggregate plan
//! alternatives.
//!
//! ## Rule Types
//!
//! - **Transformation rules** (`RuleType::Transformation`): rewrite a logical subtree into
//!   an equivalent logical subtree, e.g. spelling AVG out as SUM and COUNT.
//! - **Implementation rules** (`RuleType::Implementation`): map a logical aggregate to
//!   physical aggregates, e.g. a single hash aggregate or a fragment/coordinator pair.
//!
//! ## Application
//!
//! A rule declares a `Pattern`; `apply` is only called on subtrees that match it. `apply`
//! returns the alternatives it produced, or an error. An empty result means the rule
//! declined. Errors abort the alternative being built, not the caller: an unsupported
//! function lets the caller move on to other alternatives, an internal fault is a defect
//! and should stop compilation of the query.
//!
//! Rules never mutate the subtree they are given. Every alternative is a new tree that
//! shares unchanged inputs with the original.

use crate::config::PlannerConfig;
use crate::error::Result;
use crate::pattern::{matches, Pattern};
use crate::rel::{Rel, RelRef};
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Classification of rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleType {
    /// Logical -> Logical rewrite.
    Transformation,
    /// Logical -> Physical implementation.
    Implementation,
}

/// Context passed to rules during application.
pub struct OptContext<'a> {
    pub config: &'a PlannerConfig,
}

/// A rule rewrites or implements a subtree.
pub trait Rule: Send + Sync {
    /// Unique name of this rule.
    fn name(&self) -> &str;

    fn rule_type(&self) -> RuleType;

    /// Pattern that this rule matches against.
    fn pattern(&self) -> Pattern;

    /// Apply the rule to a matching subtree.
    fn apply(&self, rel: &RelRef, ctx: &OptContext) -> Result<Vec<RelRef>>;

    /// Hash for fingerprinting (to avoid re-applying rules).
    fn rule_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.name().hash(&mut hasher);
        hasher.finish()
    }
}

/// Registry of rules.
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn transformation_rules(&self) -> Vec<&dyn Rule> {
        self.rules()
            .filter(|r| r.rule_type() == RuleType::Transformation)
            .collect()
    }

    pub fn implementation_rules(&self) -> Vec<&dyn Rule> {
        self.rules()
            .filter(|r| r.rule_type() == RuleType::Implementation)
            .collect()
    }

    /// Rules of the given type whose pattern matches `rel`.
    pub fn matching_rules(&self, rule_type: RuleType, rel: &Rel) -> Vec<&dyn Rule> {
        self.rules()
            .filter(|r| r.rule_type() == rule_type && matches(rel, &r.pattern()))
            .collect()
    }

    /// Apply every matching rule of the given type and collect the alternatives.
    ///
    /// A recoverable error drops that rule's alternatives; an internal fault is returned.
    pub fn apply_all(&self, rule_type: RuleType, rel: &RelRef, ctx: &OptContext) -> Result<Vec<RelRef>> {
        let mut alternatives = Vec::new();
        for rule in self.matching_rules(rule_type, rel) {
            match rule.apply(rel, ctx) {
                Ok(produced) => {
                    debug!(rule = rule.name(), produced = produced.len(), "rule applied");
                    alternatives.extend(produced);
                }
                Err(err) if err.is_recoverable() => {
                    debug!(rule = rule.name(), error = %err, "rule alternative discarded");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(alternatives)
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InternalFault, PlanError};
    use crate::expr::AggregateKind;
    use crate::rel::TableScan;
    use crate::schema::{DataType, Field, RowType};
    use crate::stats::Statistics;
    use std::sync::Arc;

    struct Fixed(&'static str, RuleType, Result<usize>);

    impl Rule for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn rule_type(&self) -> RuleType {
            self.1
        }

        fn pattern(&self) -> Pattern {
            Pattern::Leaf
        }

        fn apply(&self, rel: &RelRef, _ctx: &OptContext) -> Result<Vec<RelRef>> {
            self.2.clone().map(|n| vec![rel.clone(); n])
        }
    }

    fn leaf() -> RelRef {
        Arc::new(Rel::Scan(TableScan::new(
            "t",
            RowType::new(vec![Field::new("a", DataType::Integer, false)]),
            Statistics::unknown(),
        )))
    }

    #[test]
    fn test_recoverable_errors_are_skipped() {
        let mut registry = RuleRegistry::new();
        registry.add_rule(Box::new(Fixed("two", RuleType::Implementation, Ok(2))));
        registry.add_rule(Box::new(Fixed(
            "unsupported",
            RuleType::Implementation,
            Err(PlanError::UnsupportedAggregate {
                function: AggregateKind::ListAgg,
            }),
        )));
        registry.add_rule(Box::new(Fixed("rewrite", RuleType::Transformation, Ok(1))));

        let config = PlannerConfig::default();
        let ctx = OptContext { config: &config };
        let produced = registry.apply_all(RuleType::Implementation, &leaf(), &ctx).unwrap();
        assert_eq!(produced.len(), 2);
        assert_eq!(registry.transformation_rules().len(), 1);
        assert_ne!(registry.rules().next().unwrap().rule_hash(), 0);

        registry.add_rule(Box::new(Fixed(
            "broken",
            RuleType::Implementation,
            Err(InternalFault::InvalidSplitCount(0).into()),
        )));
        assert!(registry.apply_all(RuleType::Implementation, &leaf(), &ctx).is_err());
    }
}
