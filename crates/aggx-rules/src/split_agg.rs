//! # Distributed Aggregate Split
//!
//! Implements a logical aggregate whose input is spread over `P > 1` partitions as two
//! physical stages:
//!
//! ```text
//! Coordinator aggregate   (merge calls over the fragment output, HAVING)
//!   Exchange              (gather, or hash on the group keys)
//!     Fragment aggregate  (original calls, split_count = P, once per partition)
//!       input
//! ```
//!
//! The fragment computes partial results per group on each partition. The exchange
//! brings every partial row of a group to one site, and the coordinator combines them.
//! That is only correct for *decomposable* calls, whose partial results can be merged
//! into the single-site answer:
//!
//! | call               | merge over the partial column |
//! |--------------------|-------------------------------|
//! | SUM                | SUM                           |
//! | $SUM0              | $SUM0                         |
//! | COUNT, COUNT(*)    | $SUM0                         |
//! | MIN / MAX          | MIN / MAX                     |
//!
//! MIN and MAX stay decomposable under DISTINCT. `split_aggregate` fails with an internal
//! fault on any other call instead of producing a wrong merge. The rule never hands it
//! one: aggregates holding AVG are left to `reduce_avg`, and other non-decomposable
//! calls (COUNT(DISTINCT), variance, ...) are aggregated once over a gathering exchange.
//!
//! ## Coordinator Schema
//!
//! The coordinator groups on the leading fragment columns and its call `i` reads fragment
//! column `group_count + i`. It reuses the field names of the single-site aggregate, and
//! the merge functions preserve types, so the coordinator's output row is the row the
//! original aggregate would have produced. HAVING is attached to the coordinator only;
//! applying it to partial results would drop groups too early.
//!
//! ## Single-Site Input
//!
//! When the input is not partitioned the rule short-circuits to a single `Unsplit`
//! aggregate with split count 1.

use crate::impl_agg::aggregate_and_having;
use aggx_core::config::MergeDistribution;
use aggx_core::error::{InternalFault, Result};
use aggx_core::expr::{AggregateCall, AggregateKind, ScalarExpr};
use aggx_core::group_set::GroupSet;
use aggx_core::logical::LogicalAggregate;
use aggx_core::pattern::Pattern;
use aggx_core::physical::{AggregateRole, GroupingStrategy, PhysicalAggregate};
use aggx_core::properties::Distribution;
use aggx_core::rel::{Exchange, Rel, RelRef};
use aggx_core::rule::{OptContext, Rule, RuleType};
use std::sync::Arc;
use tracing::{debug, trace};

/// The three nodes produced by a split, top of the tree last.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub fragment: RelRef,
    pub exchange: RelRef,
    pub coordinator: RelRef,
}

/// Function the coordinator uses to combine partial results of `kind`.
pub fn merge_kind(kind: AggregateKind) -> Option<AggregateKind> {
    match kind {
        AggregateKind::Sum => Some(AggregateKind::Sum),
        AggregateKind::Sum0 | AggregateKind::Count => Some(AggregateKind::Sum0),
        AggregateKind::Min => Some(AggregateKind::Min),
        AggregateKind::Max => Some(AggregateKind::Max),
        AggregateKind::Avg
        | AggregateKind::AnyValue
        | AggregateKind::StddevPop
        | AggregateKind::StddevSamp
        | AggregateKind::VarPop
        | AggregateKind::VarSamp
        | AggregateKind::ListAgg
        | AggregateKind::CovarPop => None,
    }
}

pub fn is_decomposable(call: &AggregateCall) -> bool {
    if call.distinct {
        return matches!(call.kind, AggregateKind::Min | AggregateKind::Max);
    }
    merge_kind(call.kind).is_some()
}

/// Build the fragment / exchange / coordinator stages for `agg` over `partitions`
/// partitions.
pub fn split_aggregate(
    agg: &LogicalAggregate,
    having: Option<ScalarExpr>,
    partitions: u32,
    strategy: GroupingStrategy,
    merge: MergeDistribution,
) -> Result<SplitOutcome> {
    if agg.group_sets().len() != 1 {
        return Err(InternalFault::MultipleGroupingSets(agg.group_sets().len()).into());
    }

    let mut merge_calls = Vec::with_capacity(agg.agg_calls().len());
    let group_count = agg.group_set().cardinality();
    for (call_idx, call) in agg.agg_calls().iter().enumerate() {
        let merge_fn = merge_kind(call.kind)
            .filter(|_| is_decomposable(call))
            .ok_or(InternalFault::NonDecomposable {
                call: call_idx,
                function: call.kind,
            })?;
        let output = group_count + call_idx;
        let mut merged = AggregateCall::new(merge_fn, vec![output]);
        merged.name = agg.row_type().field(output).map(|f| f.name.clone());
        trace!(call = %call, merge = %merged, "merge call");
        merge_calls.push(merged);
    }

    let fragment: RelRef = Arc::new(Rel::PhysicalAggregate(PhysicalAggregate::create(
        agg.input().clone(),
        agg.group_set().clone(),
        agg.agg_calls().to_vec(),
        strategy,
        AggregateRole::FragmentOnly,
        partitions,
        None,
    )?));

    let distribution = match merge {
        MergeDistribution::HashOnGroupKeys if group_count > 0 => Distribution::Hash {
            keys: (0..group_count).collect(),
            partitions,
        },
        MergeDistribution::Gather | MergeDistribution::HashOnGroupKeys => Distribution::Single,
    };
    let coordinator_split = distribution.partition_count();
    let exchange: RelRef = Arc::new(Rel::Exchange(Exchange::new(fragment.clone(), distribution)));

    let coordinator: RelRef = Arc::new(Rel::PhysicalAggregate(PhysicalAggregate::create(
        exchange.clone(),
        GroupSet::range(0, group_count),
        merge_calls,
        strategy,
        AggregateRole::Coordinator,
        coordinator_split,
        having,
    )?));

    debug!(
        partitions,
        coordinator_split,
        group_count,
        calls = agg.agg_calls().len(),
        "split aggregate into fragment and coordinator"
    );
    Ok(SplitOutcome {
        fragment,
        exchange,
        coordinator,
    })
}

/// Gather every partition to one site and aggregate there once.
fn gather_unsplit(
    agg: &LogicalAggregate,
    having: Option<ScalarExpr>,
    strategy: GroupingStrategy,
) -> Result<RelRef> {
    let exchange: RelRef = Arc::new(Rel::Exchange(Exchange::new(
        agg.input().clone(),
        Distribution::Single,
    )));
    let gathered = agg.with_input(exchange)?;
    let single = PhysicalAggregate::from_logical(&gathered, strategy, AggregateRole::Unsplit, 1, having)?;
    Ok(Arc::new(Rel::PhysicalAggregate(single)))
}

/// Implement a logical aggregate as a fragment / coordinator pair when its input is
/// partitioned, or as a single aggregate when it is not.
///
/// Aggregates holding AVG are declined: `AvgDecompositionRule` rewrites them into a
/// splittable form. Other calls without a merge function are implemented over a gathering
/// exchange instead of being split.
pub struct DistributedAggregateSplitRule;

impl Rule for DistributedAggregateSplitRule {
    fn name(&self) -> &str {
        "DistributedAggregateSplit"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> Pattern {
        Pattern::aggregate_with_having()
    }

    fn apply(&self, rel: &RelRef, ctx: &OptContext) -> Result<Vec<RelRef>> {
        let Some((agg, having)) = aggregate_and_having(rel) else {
            return Ok(vec![]);
        };
        let strategy = ctx.config.default_strategy;
        let partitions = agg.input().distribution().partition_count();

        if partitions <= 1 {
            let single = PhysicalAggregate::from_logical(agg, strategy, AggregateRole::Unsplit, 1, having)?;
            return Ok(vec![Arc::new(Rel::PhysicalAggregate(single))]);
        }
        if !ctx.config.enable_distributed_split {
            debug!(partitions, "distributed split disabled");
            return Ok(vec![]);
        }
        if agg.agg_calls().iter().any(|c| c.kind.is_avg_like()) {
            debug!(partitions, "AVG left to decomposition");
            return Ok(vec![]);
        }
        if !agg.agg_calls().iter().all(is_decomposable) {
            debug!(partitions, "non-decomposable call, gathering input");
            return Ok(vec![gather_unsplit(agg, having, strategy)?]);
        }

        let outcome = split_aggregate(agg, having, partitions, strategy, ctx.config.merge_distribution)?;
        Ok(vec![outcome.coordinator])
    }
}
