//! # AVG Decomposition
//!
//! Rewrites every AVG call of a logical aggregate into a SUM and a COUNT over the same
//! argument, and puts the division in a Project above the aggregate:
//!
//! ```text
//! Aggregate[group, AVG($1), MAX($2)]
//!   =>
//! Project[$0, /($1, $2), $3]
//!   Aggregate[group, SUM($1), COUNT($1), MAX($2)]
//! ```
//!
//! The rewritten aggregate holds only decomposable calls (when the originals were), so it
//! can be split across partitions. Calls computing the same value are shared: `AVG(x)`
//! next to an existing `SUM(x)` reuses it. DISTINCT carries over to both halves.
//!
//! The Project keeps the original output row (names, types and order), so the rewrite is
//! invisible to the nodes above it.

use aggx_core::error::Result;
use aggx_core::expr::{AggregateCall, AggregateKind, BinaryOp, ColumnRef, ScalarExpr};
use aggx_core::logical::LogicalAggregate;
use aggx_core::pattern::Pattern;
use aggx_core::rel::{Project, Rel, RelRef};
use aggx_core::rule::{OptContext, Rule, RuleType};
use std::sync::Arc;
use tracing::debug;

/// Position of `call` in `calls`, appending it if no call computes the same value.
fn find_or_add(calls: &mut Vec<AggregateCall>, call: AggregateCall) -> usize {
    if let Some(pos) = calls.iter().position(|c| c.same_computation(&call)) {
        return pos;
    }
    calls.push(call);
    calls.len() - 1
}

/// Rewrite the AVG calls of `agg`. Returns `None` when there are none.
pub fn decompose_avg(agg: &LogicalAggregate) -> Result<Option<RelRef>> {
    if !agg.agg_calls().iter().any(|c| c.kind.is_avg_like()) {
        return Ok(None);
    }

    let group_count = agg.group_set().cardinality();
    let original = agg.row_type();
    let mut calls: Vec<AggregateCall> = Vec::new();
    let mut projected: Vec<ScalarExpr> = (0..group_count)
        .map(|i| ScalarExpr::Column(ColumnRef::new(i)))
        .collect();

    for call in agg.agg_calls() {
        let expr = if call.kind.is_avg_like() {
            let mut sum = AggregateCall::new(AggregateKind::Sum, call.args.clone());
            let mut count = AggregateCall::new(AggregateKind::Count, call.args.clone());
            sum.distinct = call.distinct;
            count.distinct = call.distinct;
            let sum_pos = find_or_add(&mut calls, sum);
            let count_pos = find_or_add(&mut calls, count);
            ScalarExpr::binary(
                BinaryOp::Div,
                ScalarExpr::column(group_count + sum_pos),
                ScalarExpr::column(group_count + count_pos),
            )
        } else {
            let pos = find_or_add(&mut calls, call.clone());
            ScalarExpr::column(group_count + pos)
        };
        projected.push(expr);
    }

    let reduced = agg.copy(
        agg.input().clone(),
        agg.group_set().clone(),
        Some(agg.group_sets().to_vec()),
        calls,
    )?;
    debug!(
        before = agg.agg_calls().len(),
        after = reduced.agg_calls().len(),
        "decomposed AVG calls"
    );

    let projections = projected
        .into_iter()
        .zip(original.fields().iter().cloned())
        .collect();
    let project = Project::create(Arc::new(Rel::Aggregate(reduced)), projections)?;
    Ok(Some(Arc::new(Rel::Project(project))))
}

/// Replace AVG by SUM / COUNT so the aggregate becomes splittable.
pub struct AvgDecompositionRule;

impl Rule for AvgDecompositionRule {
    fn name(&self) -> &str {
        "AvgDecomposition"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Transformation
    }

    fn pattern(&self) -> Pattern {
        Pattern::aggregate()
    }

    fn apply(&self, rel: &RelRef, _ctx: &OptContext) -> Result<Vec<RelRef>> {
        let Rel::Aggregate(agg) = rel.as_ref() else {
            return Ok(vec![]);
        };
        Ok(decompose_avg(agg)?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggx_core::group_set::GroupSet;
    use aggx_core::rel::TableScan;
    use aggx_core::schema::{DataType, Field, RowType};
    use aggx_core::stats::Statistics;

    fn scan() -> RelRef {
        Arc::new(Rel::Scan(TableScan::new(
            "m",
            RowType::new(vec![
                Field::new("host", DataType::Varchar, false),
                Field::new("latency", DataType::Float, true),
            ]),
            Statistics::unknown(),
        )))
    }

    #[test]
    fn test_shares_existing_sum() {
        let agg = LogicalAggregate::create(
            scan(),
            GroupSet::of(&[0]),
            None,
            vec![
                AggregateCall::new(AggregateKind::Sum, vec![1]).named("total"),
                AggregateCall::new(AggregateKind::Avg, vec![1]).named("mean"),
                AggregateCall::new(AggregateKind::Avg, vec![1]).named("mean_again"),
            ],
        )
        .unwrap();
        let rewritten = decompose_avg(&agg).unwrap().unwrap();
        let Rel::Project(project) = rewritten.as_ref() else {
            panic!("expected a project");
        };
        let Rel::Aggregate(reduced) = project.input().as_ref() else {
            panic!("expected an aggregate under the project");
        };
        let calls: Vec<String> = reduced.agg_calls().iter().map(|c| c.to_string()).collect();
        assert_eq!(calls, vec!["SUM($1)", "COUNT($1)"]);

        let exprs: Vec<String> = project.exprs().iter().map(|e| e.to_string()).collect();
        assert_eq!(exprs, vec!["$0", "$1", "/($1, $2)", "/($1, $2)"]);
        assert_eq!(rewritten.row_type(), agg.row_type());
    }

    #[test]
    fn test_without_avg_is_declined() {
        let agg = LogicalAggregate::create(
            scan(),
            GroupSet::of(&[0]),
            None,
            vec![AggregateCall::count_star()],
        )
        .unwrap();
        assert!(decompose_avg(&agg).unwrap().is_none());
    }
}
