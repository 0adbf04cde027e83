//! # Logical Aggregate
//!
//! The GROUP BY node as the algebra builder produces it: input, grouping sets and
//! aggregate calls, with no execution strategy or distribution decided yet. Nodes are
//! immutable; `copy` always builds a new node.
//!
//! ## Cost
//!
//! The logical cost is exploratory. It is the node's row-count estimate scaled by
//! `AggregateCostHeuristic`: a factor of 10 (configurable) per AVG-like call. The bias
//! pushes the search toward the alternative in which averages are spelled out as SUM and
//! COUNT. It is a heuristic and does not model execution time.

use crate::aggregate::AggregateCore;
use crate::cost::{AggregateCostHeuristic, Cost, CostFactory};
use crate::error::Result;
use crate::explain::OrderedFields;
use crate::expr::AggregateCall;
use crate::group_set::GroupSet;
use crate::rel::RelRef;
use crate::schema::RowType;

#[derive(Debug, Clone, Hash)]
pub struct LogicalAggregate {
    core: AggregateCore,
}

impl LogicalAggregate {
    /// Build a logical aggregate. `group_sets` defaults to `[group_set]`.
    pub fn create(
        input: RelRef,
        group_set: GroupSet,
        group_sets: Option<Vec<GroupSet>>,
        agg_calls: Vec<AggregateCall>,
    ) -> Result<Self> {
        Ok(Self {
            core: AggregateCore::new(input, group_set, group_sets, agg_calls)?,
        })
    }

    /// New node with the given parts. The original is left untouched.
    pub fn copy(
        &self,
        input: RelRef,
        group_set: GroupSet,
        group_sets: Option<Vec<GroupSet>>,
        agg_calls: Vec<AggregateCall>,
    ) -> Result<Self> {
        Self::create(input, group_set, group_sets, agg_calls)
    }

    /// Same node over a different input.
    pub fn with_input(&self, input: RelRef) -> Result<Self> {
        self.copy(
            input,
            self.group_set().clone(),
            Some(self.group_sets().to_vec()),
            self.agg_calls().to_vec(),
        )
    }

    pub fn core(&self) -> &AggregateCore {
        &self.core
    }

    pub fn input(&self) -> &RelRef {
        self.core.input()
    }

    pub fn group_set(&self) -> &GroupSet {
        self.core.group_set()
    }

    pub fn group_sets(&self) -> &[GroupSet] {
        self.core.group_sets()
    }

    pub fn agg_calls(&self) -> &[AggregateCall] {
        self.core.agg_calls()
    }

    pub fn row_type(&self) -> &RowType {
        self.core.row_type()
    }

    pub fn cost(
        &self,
        row_count: f64,
        heuristic: &AggregateCostHeuristic,
        factory: &dyn CostFactory,
    ) -> Cost {
        heuristic.cost(factory, row_count, self.agg_calls())
    }

    pub fn describe(&self) -> OrderedFields {
        self.core.describe_into(OrderedFields::new("Aggregate"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::DefaultCostFactory;
    use crate::expr::AggregateKind;
    use crate::rel::{Rel, TableScan};
    use crate::schema::{DataType, Field};
    use crate::stats::Statistics;
    use std::sync::Arc;

    fn scan() -> RelRef {
        Arc::new(Rel::Scan(TableScan::new(
            "t",
            RowType::new(vec![
                Field::new("k", DataType::Integer, false),
                Field::new("v", DataType::Float, true),
            ]),
            Statistics::new(500.0, 50_000.0),
        )))
    }

    #[test]
    fn test_cost_scales_per_avg() {
        let agg = LogicalAggregate::create(
            scan(),
            GroupSet::of(&[0]),
            None,
            vec![
                AggregateCall::new(AggregateKind::Avg, vec![1]),
                AggregateCall::new(AggregateKind::Avg, vec![1]).distinct(),
                AggregateCall::new(AggregateKind::Min, vec![1]),
            ],
        )
        .unwrap();
        let cost = agg.cost(50.0, &AggregateCostHeuristic::default(), &DefaultCostFactory);
        assert_eq!(cost.rows, 5_000.0);

        let flat = agg.cost(50.0, &AggregateCostHeuristic::new(1.0), &DefaultCostFactory);
        assert_eq!(flat.rows, 50.0);
    }

    #[test]
    fn test_copy_leaves_original() {
        let agg = LogicalAggregate::create(
            scan(),
            GroupSet::of(&[0]),
            None,
            vec![AggregateCall::count_star()],
        )
        .unwrap();
        let copy = agg
            .copy(scan(), GroupSet::empty(), None, vec![AggregateCall::new(AggregateKind::Max, vec![1])])
            .unwrap();
        assert_eq!(agg.row_type().names(), vec!["k", "$f1"]);
        assert_eq!(copy.row_type().names(), vec!["$f0"]);
        assert_eq!(agg.describe().to_string(), "Aggregate(group={0}, aggs=[COUNT()])");
    }
}
