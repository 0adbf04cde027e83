//! # Aggregate Implementation Rules
//!
//! This module provides two implementation rules for a logical Aggregate whose input sits
//! at a single site. Both produce one `Unsplit` physical aggregate with split count 1; they
//! differ only in grouping strategy. Partitioned inputs are left to
//! `DistributedAggregateSplitRule`.
//!
//! Both rules also match a Filter directly on top of the aggregate. The filter's
//! predicate is over the aggregate's output row, so it becomes the physical node's HAVING
//! predicate and the Filter node disappears.
//!
//! ## Hash Aggregate (`ImplHashAggregateRule`)
//!
//! Groups through a hash table keyed by the group-by columns. Works with any input
//! ordering, at the price of memory proportional to the number of groups.
//!
//! ## Serial Aggregate (`ImplSerialAggregateRule`)
//!
//! Processes input rows in a single pass and closes a group when the keys change. Needs
//! only the current group's accumulators, but expects input clustered on the group keys.

use aggx_core::error::Result;
use aggx_core::expr::ScalarExpr;
use aggx_core::logical::LogicalAggregate;
use aggx_core::pattern::Pattern;
use aggx_core::physical::{AggregateRole, GroupingStrategy, PhysicalAggregate};
use aggx_core::rel::{Rel, RelRef};
use aggx_core::rule::{OptContext, Rule, RuleType};
use std::sync::Arc;
use tracing::debug;

/// The logical aggregate at `rel`, and the HAVING predicate if `rel` is a Filter on one.
pub fn aggregate_and_having(rel: &Rel) -> Option<(&LogicalAggregate, Option<ScalarExpr>)> {
    match rel {
        Rel::Aggregate(agg) => Some((agg, None)),
        Rel::Filter(filter) => match filter.input().as_ref() {
            Rel::Aggregate(agg) => Some((agg, Some(filter.predicate().clone()))),
            _ => None,
        },
        _ => None,
    }
}

fn implement_single_site(rel: &RelRef, strategy: GroupingStrategy) -> Result<Vec<RelRef>> {
    let Some((agg, having)) = aggregate_and_having(rel) else {
        return Ok(vec![]);
    };
    if agg.input().distribution().is_partitioned() {
        return Ok(vec![]);
    }
    let physical = PhysicalAggregate::from_logical(agg, strategy, AggregateRole::Unsplit, 1, having)?;
    debug!(strategy = strategy.op_name(), "implemented single-site aggregate");
    Ok(vec![Arc::new(Rel::PhysicalAggregate(physical))])
}

/// Implement a single-site logical aggregate as a hash aggregate.
pub struct ImplHashAggregateRule;

impl Rule for ImplHashAggregateRule {
    fn name(&self) -> &str {
        "ImplHashAggregate"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> Pattern {
        Pattern::aggregate_with_having()
    }

    fn apply(&self, rel: &RelRef, _ctx: &OptContext) -> Result<Vec<RelRef>> {
        implement_single_site(rel, GroupingStrategy::Hash)
    }
}

/// Implement a single-site logical aggregate as a serial aggregate.
pub struct ImplSerialAggregateRule;

impl Rule for ImplSerialAggregateRule {
    fn name(&self) -> &str {
        "ImplSerialAggregate"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> Pattern {
        Pattern::aggregate_with_having()
    }

    fn apply(&self, rel: &RelRef, _ctx: &OptContext) -> Result<Vec<RelRef>> {
        implement_single_site(rel, GroupingStrategy::Serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggx_core::config::PlannerConfig;
    use aggx_core::expr::{AggregateCall, AggregateKind, BinaryOp, ScalarValue};
    use aggx_core::group_set::GroupSet;
    use aggx_core::properties::Distribution;
    use aggx_core::rel::{Filter, TableScan};
    use aggx_core::schema::{DataType, Field, RowType};
    use aggx_core::stats::Statistics;

    fn aggregate(distribution: Distribution) -> RelRef {
        let scan = Arc::new(Rel::Scan(
            TableScan::new(
                "t",
                RowType::new(vec![
                    Field::new("k", DataType::Integer, false),
                    Field::new("v", DataType::Integer, true),
                ]),
                Statistics::unknown(),
            )
            .with_distribution(distribution),
        ));
        Arc::new(Rel::Aggregate(
            LogicalAggregate::create(
                scan,
                GroupSet::of(&[0]),
                None,
                vec![AggregateCall::new(AggregateKind::Sum, vec![1])],
            )
            .unwrap(),
        ))
    }

    #[test]
    fn test_single_site_aggregate_is_unsplit() {
        let config = PlannerConfig::default();
        let ctx = OptContext { config: &config };
        let produced = ImplSerialAggregateRule
            .apply(&aggregate(Distribution::Single), &ctx)
            .unwrap();
        let Rel::PhysicalAggregate(agg) = produced[0].as_ref() else {
            panic!("expected a physical aggregate");
        };
        assert_eq!(agg.strategy(), GroupingStrategy::Serial);
        assert_eq!(agg.role(), AggregateRole::Unsplit);
        assert_eq!(agg.split_count(), 1);
    }

    #[test]
    fn test_having_filter_is_absorbed() {
        let config = PlannerConfig::default();
        let ctx = OptContext { config: &config };
        let predicate = ScalarExpr::binary(
            BinaryOp::Lt,
            ScalarExpr::column(1),
            ScalarExpr::literal(ScalarValue::Int64(100)),
        );
        let having: RelRef = Arc::new(Rel::Filter(
            Filter::create(aggregate(Distribution::Broadcast { partitions: 3 }), predicate.clone())
                .unwrap(),
        ));
        let produced = ImplHashAggregateRule.apply(&having, &ctx).unwrap();
        let Rel::PhysicalAggregate(agg) = produced[0].as_ref() else {
            panic!("expected a physical aggregate");
        };
        assert_eq!(agg.having(), Some(&predicate));
    }

    #[test]
    fn test_partitioned_input_is_declined() {
        let config = PlannerConfig::default();
        let ctx = OptContext { config: &config };
        let partitioned = aggregate(Distribution::Hash {
            keys: vec![0],
            partitions: 8,
        });
        assert!(ImplHashAggregateRule.apply(&partitioned, &ctx).unwrap().is_empty());
    }
}
