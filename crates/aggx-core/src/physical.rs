//! # Physical Aggregate
//!
//! The lowered aggregate node. On top of the logical shape it fixes a grouping strategy,
//! its role in a distributed aggregation, the number of execution units it runs on and an
//! optional HAVING predicate, and it knows how to lower itself into a runtime plan node.
//!
//! ## Strategy and Role
//!
//! Both are closed enums and every match over them is exhaustive:
//!
//! - `GroupingStrategy::Hash` groups through a hash table; `Serial` expects its input
//!   clustered on the group keys. The strategy only selects the runtime node kind.
//! - `AggregateRole::FragmentOnly` runs once per partition and emits partial results;
//!   `Coordinator` merges partial results after an exchange; `Unsplit` is an ordinary
//!   single-site aggregate with no merge involved.
//!
//! Role and split count are stated separately by the caller. The only combination
//! rejected is an `Unsplit` node with more than one execution unit.
//!
//! ## Lowering
//!
//! `to_runtime_plan` checks every call's arity before it builds anything, then:
//!
//! 1. creates the runtime aggregate node and attaches this node's output schema;
//! 2. walks the calls in declaration order with an output cursor starting at
//!    `first_agg_field_index(group_set)`. Each call is mapped through
//!    `runtime_aggregate_type` (an unmapped kind fails the alternative), its argument is
//!    converted as a reference into the *input* row, and a zero-argument COUNT becomes
//!    COUNT(*);
//! 3. adds one group-by expression per group bit in ascending order, typed and named by
//!    the corresponding leading *output* field and reading the key's input position;
//! 4. binds the HAVING predicate against the output row and attaches it;
//! 5. lowers the input and links it as the only child.
//!
//! ## Digest
//!
//! `digest()` is the base description (strategy, input fingerprint, group key, calls,
//! role) followed by `_split_<n>`, `_coordinator_<bool>` and the HAVING text. Equal
//! digests mean interchangeable alternatives.

use crate::aggregate::AggregateCore;
use crate::convert::{runtime_aggregate_type, ExpressionConverter};
use crate::cost::{Cost, CostFactory};
use crate::error::{InternalFault, PlanError, Result};
use crate::explain::OrderedFields;
use crate::expr::{AggregateCall, AggregateKind, ScalarExpr};
use crate::group_set::{first_agg_field_index, GroupSet};
use crate::logical::LogicalAggregate;
use crate::rel::RelRef;
use crate::runtime::{AggregateNodeKind, AggregateOpCode, RuntimePlanNode};
use crate::schema::RowType;
use crate::stats::MetadataQuery;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

/// How rows are grouped at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupingStrategy {
    Hash,
    Serial,
}

impl GroupingStrategy {
    pub fn node_kind(&self) -> AggregateNodeKind {
        match self {
            GroupingStrategy::Hash => AggregateNodeKind::HashAggregate,
            GroupingStrategy::Serial => AggregateNodeKind::SerialAggregate,
        }
    }

    pub fn op_name(&self) -> &'static str {
        match self {
            GroupingStrategy::Hash => "HashAggregate",
            GroupingStrategy::Serial => "SerialAggregate",
        }
    }
}

/// Part a physical aggregate plays in a distributed aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateRole {
    /// Per-partition partial aggregation.
    FragmentOnly,
    /// Final merge of partial results.
    Coordinator,
    /// Single-stage aggregation at one site.
    Unsplit,
}

impl fmt::Display for AggregateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateRole::FragmentOnly => f.write_str("fragment"),
            AggregateRole::Coordinator => f.write_str("coordinator"),
            AggregateRole::Unsplit => f.write_str("unsplit"),
        }
    }
}

#[derive(Debug, Clone, Hash)]
pub struct PhysicalAggregate {
    core: AggregateCore,
    strategy: GroupingStrategy,
    role: AggregateRole,
    split_count: u32,
    having: Option<ScalarExpr>,
}

impl PhysicalAggregate {
    /// Build a physical aggregate with a single grouping set.
    pub fn create(
        input: RelRef,
        group_set: GroupSet,
        agg_calls: Vec<AggregateCall>,
        strategy: GroupingStrategy,
        role: AggregateRole,
        split_count: u32,
        having: Option<ScalarExpr>,
    ) -> Result<Self> {
        let core = AggregateCore::new(input, group_set, None, agg_calls)?;
        Self::from_core(core, strategy, role, split_count, having)
    }

    /// Implement a logical aggregate as-is, keeping its grouping sets.
    pub fn from_logical(
        logical: &LogicalAggregate,
        strategy: GroupingStrategy,
        role: AggregateRole,
        split_count: u32,
        having: Option<ScalarExpr>,
    ) -> Result<Self> {
        Self::from_core(logical.core().clone(), strategy, role, split_count, having)
    }

    fn from_core(
        core: AggregateCore,
        strategy: GroupingStrategy,
        role: AggregateRole,
        split_count: u32,
        having: Option<ScalarExpr>,
    ) -> Result<Self> {
        if split_count < 1 {
            return Err(InternalFault::InvalidSplitCount(split_count).into());
        }
        if role == AggregateRole::Unsplit && split_count > 1 {
            return Err(InternalFault::InconsistentRole { role, split_count }.into());
        }
        if let Some(predicate) = &having {
            let field_count = core.row_type().field_count();
            if let Some(col) = predicate.columns().into_iter().find(|c| c.index >= field_count) {
                return Err(InternalFault::ColumnOutOfBounds {
                    index: col.index,
                    field_count,
                }
                .into());
            }
        }
        Ok(Self {
            core,
            strategy,
            role,
            split_count,
            having,
        })
    }

    /// New node with the given parts and this node's strategy, role, split and HAVING.
    pub fn copy(
        &self,
        input: RelRef,
        group_set: GroupSet,
        group_sets: Option<Vec<GroupSet>>,
        agg_calls: Vec<AggregateCall>,
    ) -> Result<Self> {
        let core = AggregateCore::new(input, group_set, group_sets, agg_calls)?;
        Self::from_core(core, self.strategy, self.role, self.split_count, self.having.clone())
    }

    pub fn with_input(&self, input: RelRef) -> Result<Self> {
        self.copy(
            input,
            self.group_set().clone(),
            Some(self.group_sets().to_vec()),
            self.agg_calls().to_vec(),
        )
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

    pub fn strategy(&self) -> GroupingStrategy {
        self.strategy
    }

    pub fn role(&self) -> AggregateRole {
        self.role
    }

    pub fn split_count(&self) -> u32 {
        self.split_count
    }

    pub fn having(&self) -> Option<&ScalarExpr> {
        self.having.as_ref()
    }

    pub fn is_coordinator(&self) -> bool {
        self.role == AggregateRole::Coordinator
    }

    /// Cost of the rows this node actually consumes. No heuristic multiplier.
    pub fn cost(&self, mq: &dyn MetadataQuery, factory: &dyn CostFactory) -> Cost {
        factory.make_cost(mq.row_count(self.input()), 0.0, 0.0)
    }

    fn base_description(&self) -> OrderedFields {
        self.core
            .describe_into(OrderedFields::new(self.strategy.op_name()))
            .item("role", self.role)
    }

    pub fn describe(&self) -> OrderedFields {
        self.base_description()
            .item("split", self.split_count)
            .item_if(
                "having",
                self.having.as_ref().map(|h| h.to_string()).unwrap_or_default(),
                self.having.is_some(),
            )
    }

    pub fn digest(&self) -> String {
        let mut digest = self
            .base_description()
            .digest_with_inputs(&[self.input().fingerprint()]);
        digest.push_str(&format!(
            "_split_{}_coordinator_{}",
            self.split_count,
            self.is_coordinator()
        ));
        if let Some(having) = &self.having {
            digest.push_str(&having.to_string());
        }
        digest
    }

    /// Lower this node and its input into a runtime plan.
    pub fn to_runtime_plan(&self, conv: &dyn ExpressionConverter) -> Result<RuntimePlanNode> {
        let group_set = self.core.single_group_set()?;
        let calls = self.agg_calls();

        for (call_idx, call) in calls.iter().enumerate() {
            if call.args.len() > 1 {
                return Err(InternalFault::TooManyArguments {
                    call: call_idx,
                    function: call.kind,
                    count: call.args.len(),
                }
                .into());
            }
        }

        debug!(
            strategy = self.strategy.op_name(),
            role = %self.role,
            split = self.split_count,
            group = %group_set,
            calls = calls.len(),
            "lowering physical aggregate"
        );

        let input_type = self.input().row_type();
        let output_type = self.row_type();

        let mut node = RuntimePlanNode::aggregate(self.strategy.node_kind());
        node.set_output_schema(conv.row_schema_from_row_type(output_type));

        let mut cursor = first_agg_field_index(group_set);
        for (call_idx, call) in calls.iter().enumerate() {
            let op = runtime_aggregate_type(call.kind)
                .ok_or(PlanError::UnsupportedAggregate { function: call.kind })?;
            let (op, source) = match call.args.first() {
                Some(&position) => {
                    let field = input_type.field(position).ok_or(InternalFault::ArgumentOutOfBounds {
                        call: call_idx,
                        position,
                        field_count: input_type.field_count(),
                    })?;
                    (op, Some(conv.field_ref_to_expr(position, field)))
                }
                None if call.kind == AggregateKind::Count => (AggregateOpCode::CountStar, None),
                None => (op, None),
            };
            trace!(call = %call, op = %op, output = cursor, "aggregate entry");
            node.add_aggregate(op, call.distinct, cursor, source);
            cursor += 1;
        }

        for (output, bit) in group_set.iter().enumerate() {
            let field = output_type.field(output).ok_or(InternalFault::ColumnOutOfBounds {
                index: output,
                field_count: output_type.field_count(),
            })?;
            node.add_group_by_expression(conv.field_ref_to_expr(bit, field));
        }

        if let Some(having) = &self.having {
            node.set_post_predicate(conv.convert_predicate(having, output_type)?);
        }

        let child = self.input().to_runtime_plan(conv)?;
        node.add_and_link_child(child);

        debug!(columns = node.output_schema.len(), "physical aggregate lowered");
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::DefaultExpressionConverter;
    use crate::expr::{BinaryOp, ScalarValue};
    use crate::rel::{Rel, TableScan};
    use crate::schema::{DataType, Field};
    use crate::stats::Statistics;
    use std::sync::Arc;

    fn scan() -> RelRef {
        Arc::new(Rel::Scan(TableScan::new(
            "orders",
            RowType::new(vec![
                Field::new("id", DataType::BigInt, false),
                Field::new("region", DataType::Varchar, false),
                Field::new("amount", DataType::Integer, true),
            ]),
            Statistics::unknown(),
        )))
    }

    fn unsplit(group: &[usize], calls: Vec<AggregateCall>) -> PhysicalAggregate {
        PhysicalAggregate::create(
            scan(),
            GroupSet::of(group),
            calls,
            GroupingStrategy::Hash,
            AggregateRole::Unsplit,
            1,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_role_and_split_checks() {
        let err = PhysicalAggregate::create(
            scan(),
            GroupSet::of(&[1]),
            vec![],
            GroupingStrategy::Hash,
            AggregateRole::Unsplit,
            4,
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PlanError::Internal(InternalFault::InconsistentRole { split_count: 4, .. })
        ));

        let err = PhysicalAggregate::create(
            scan(),
            GroupSet::of(&[1]),
            vec![],
            GroupingStrategy::Hash,
            AggregateRole::FragmentOnly,
            0,
            None,
        )
        .unwrap_err();
        assert_eq!(err, PlanError::Internal(InternalFault::InvalidSplitCount(0)));

        let coordinator = PhysicalAggregate::create(
            scan(),
            GroupSet::of(&[1]),
            vec![],
            GroupingStrategy::Serial,
            AggregateRole::Coordinator,
            1,
            None,
        )
        .unwrap();
        assert!(coordinator.is_coordinator());
        assert!(!unsplit(&[1], vec![]).is_coordinator());
    }

    #[test]
    fn test_non_prefix_group_keys_read_input_positions() {
        let agg = unsplit(&[1, 2], vec![AggregateCall::new(AggregateKind::Max, vec![0])]);
        let node = agg.to_runtime_plan(&DefaultExpressionConverter).unwrap();
        let plan = node.as_aggregate().unwrap();
        assert_eq!(
            plan.group_by,
            vec![
                ScalarExpr::Column(crate::expr::ColumnRef::named(1, "region")),
                ScalarExpr::Column(crate::expr::ColumnRef::named(2, "amount")),
            ]
        );
        assert_eq!(plan.aggregates[0].output_column, 2);
        assert_eq!(node.output_schema.names(), vec!["region", "amount", "$f2"]);
    }

    #[test]
    fn test_unsupported_function_names_it() {
        let agg = unsplit(&[], vec![AggregateCall::new(AggregateKind::StddevPop, vec![2])]);
        let err = agg.to_runtime_plan(&DefaultExpressionConverter).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "Unsupported aggregate function: STDDEV_POP");
    }

    #[test]
    fn test_having_is_bound_to_output_row() {
        let having = ScalarExpr::binary(
            BinaryOp::Gt,
            ScalarExpr::column(1),
            ScalarExpr::literal(ScalarValue::Int64(3)),
        );
        let agg = PhysicalAggregate::create(
            scan(),
            GroupSet::of(&[1]),
            vec![AggregateCall::count_star().named("cnt")],
            GroupingStrategy::Hash,
            AggregateRole::Unsplit,
            1,
            Some(having),
        )
        .unwrap();
        let node = agg.to_runtime_plan(&DefaultExpressionConverter).unwrap();
        let predicate = node.as_aggregate().unwrap().post_predicate.clone().unwrap();
        assert_eq!(predicate.columns()[0].name.as_deref(), Some("cnt"));
        assert!(agg.digest().ends_with("_split_1_coordinator_false>($1, 3)"));

        let bad = PhysicalAggregate::create(
            scan(),
            GroupSet::of(&[1]),
            vec![],
            GroupingStrategy::Hash,
            AggregateRole::Unsplit,
            1,
            Some(ScalarExpr::column(5)),
        );
        assert!(matches!(
            bad,
            Err(PlanError::Internal(InternalFault::ColumnOutOfBounds { index: 5, .. }))
        ));
    }

    #[test]
    fn test_describe_items() {
        let agg = unsplit(&[1], vec![AggregateCall::count_star()]);
        let desc = agg.describe();
        assert_eq!(desc.op(), "HashAggregate");
        assert_eq!(desc.get("group"), Some("{1}"));
        assert_eq!(desc.get("role"), Some("unsplit"));
        assert_eq!(desc.get("split"), Some("1"));
        assert_eq!(desc.get("having"), None);
    }
}
