//! # Declarative Pattern Matching for Rules
//!
//! Each rule declares a `Pattern` describing the tree shape it can rewrite. Callers check
//! the pattern before calling `apply()`, so a rule never has to defend against plans it
//! was not written for.
//!
//! ## Pattern Language
//!
//! - `Pattern::Operator(kind, children)`: matches a node of the given kind whose inputs
//!   match the child patterns, one for one.
//! - `Pattern::Any`: matches any subtree. The usual child pattern.
//! - `Pattern::Leaf`: matches only nodes without inputs.
//! - `Pattern::OneOf(alternatives)`: matches if any alternative does. Aggregate rules
//!   use it to accept both a bare aggregate and a HAVING filter sitting on one.

use crate::rel::{Rel, RelKind};

/// Pattern for matching plan subtrees.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Match a node kind with child patterns.
    Operator(RelKind, Vec<Pattern>),
    /// Match any subtree.
    Any,
    /// Match a leaf node (no inputs).
    Leaf,
    /// Match if any of the alternatives matches.
    OneOf(Vec<Pattern>),
}

impl Pattern {
    /// Match a logical aggregate.
    pub fn aggregate() -> Self {
        Pattern::Operator(RelKind::Aggregate, vec![Pattern::Any])
    }

    /// Match a filter on top of a logical aggregate (a HAVING clause).
    pub fn filter_aggregate() -> Self {
        Pattern::Operator(RelKind::Filter, vec![Pattern::aggregate()])
    }

    /// Match a logical aggregate, with or without a HAVING filter above it.
    pub fn aggregate_with_having() -> Self {
        Pattern::OneOf(vec![Pattern::filter_aggregate(), Pattern::aggregate()])
    }
}

/// Check if a subtree matches a pattern.
pub fn matches(rel: &Rel, pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Any => true,
        Pattern::Leaf => rel.inputs().is_empty(),
        Pattern::OneOf(alternatives) => alternatives.iter().any(|p| matches(rel, p)),
        Pattern::Operator(kind, child_patterns) => {
            if rel.kind() != *kind {
                return false;
            }
            let inputs = rel.inputs();
            if inputs.len() != child_patterns.len() {
                return false;
            }
            inputs
                .iter()
                .zip(child_patterns.iter())
                .all(|(input, child_pattern)| matches(input, child_pattern))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{AggregateCall, ScalarExpr};
    use crate::group_set::GroupSet;
    use crate::logical::LogicalAggregate;
    use crate::rel::{Filter, TableScan};
    use crate::schema::{DataType, Field, RowType};
    use crate::stats::Statistics;
    use std::sync::Arc;

    #[test]
    fn test_aggregate_patterns() {
        let scan = Arc::new(Rel::Scan(TableScan::new(
            "t",
            RowType::new(vec![Field::new("flag", DataType::Boolean, false)]),
            Statistics::unknown(),
        )));
        let agg = Arc::new(Rel::Aggregate(
            LogicalAggregate::create(scan.clone(), GroupSet::of(&[0]), None, vec![AggregateCall::count_star()])
                .unwrap(),
        ));
        let having = Rel::Filter(Filter::create(agg.clone(), ScalarExpr::column(0)).unwrap());
        let plain_filter = Rel::Filter(Filter::create(scan.clone(), ScalarExpr::column(0)).unwrap());

        assert!(matches(&agg, &Pattern::aggregate()));
        assert!(matches(&having, &Pattern::aggregate_with_having()));
        assert!(matches(&agg, &Pattern::aggregate_with_having()));
        assert!(!matches(&plain_filter, &Pattern::aggregate_with_having()));
        assert!(matches(&scan, &Pattern::Leaf));
        assert!(!matches(&agg, &Pattern::Leaf));
    }
}
