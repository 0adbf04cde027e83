//! # Runtime Plan Nodes
//!
//! The lowering target. A runtime plan node is flat and positionally addressed: it owns
//! an output schema, a body describing the operator, and its already-lowered children.
//! The runtime never looks back at the relational tree, so everything it needs (aggregate
//! operator codes, output column slots, group-by expressions, post-aggregation filter)
//! must be recorded here.
//!
//! Nodes are built by the lowering functions in `physical` and `rel` through the small
//! mutating API below (`add_aggregate`, `add_group_by_expression`, `set_post_predicate`,
//! `add_and_link_child`). Once returned to the caller they are treated as values.

use crate::expr::ScalarExpr;
use crate::properties::Distribution;
use crate::schema::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;

/// Runtime aggregate operator codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateOpCode {
    Sum,
    Count,
    /// COUNT(*): counts rows, takes no input expression.
    CountStar,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggregateOpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateOpCode::Sum => "AGGREGATE_SUM",
            AggregateOpCode::Count => "AGGREGATE_COUNT",
            AggregateOpCode::CountStar => "AGGREGATE_COUNT_STAR",
            AggregateOpCode::Avg => "AGGREGATE_AVG",
            AggregateOpCode::Min => "AGGREGATE_MIN",
            AggregateOpCode::Max => "AGGREGATE_MAX",
        };
        f.write_str(name)
    }
}

/// One column of a runtime node's output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

/// Output schema of a runtime node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeSchema {
    pub columns: Vec<SchemaColumn>,
}

impl NodeSchema {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// A single aggregate computed by an aggregate node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateEntry {
    pub op: AggregateOpCode,
    pub distinct: bool,
    /// Output column the result is written to.
    pub output_column: usize,
    /// Input expression; `None` for COUNT(*).
    pub input: Option<ScalarExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateNodeKind {
    HashAggregate,
    SerialAggregate,
}

impl fmt::Display for AggregateNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateNodeKind::HashAggregate => f.write_str("HASHAGGREGATE"),
            AggregateNodeKind::SerialAggregate => f.write_str("AGGREGATE"),
        }
    }
}

/// Body of an aggregate runtime node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatePlan {
    pub kind: AggregateNodeKind,
    pub aggregates: Vec<AggregateEntry>,
    pub group_by: Vec<ScalarExpr>,
    pub post_predicate: Option<ScalarExpr>,
}

impl AggregatePlan {
    pub fn new(kind: AggregateNodeKind) -> Self {
        Self {
            kind,
            aggregates: Vec::new(),
            group_by: Vec::new(),
            post_predicate: None,
        }
    }
}

/// Operator-specific part of a runtime node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanNodeBody {
    Aggregate(AggregatePlan),
    SeqScan { table: String },
    Filter { predicate: ScalarExpr },
    Projection { exprs: Vec<ScalarExpr> },
    Exchange { distribution: Distribution },
}

impl PlanNodeBody {
    pub fn name(&self) -> String {
        match self {
            PlanNodeBody::Aggregate(agg) => agg.kind.to_string(),
            PlanNodeBody::SeqScan { .. } => "SEQSCAN".to_string(),
            PlanNodeBody::Filter { .. } => "FILTER".to_string(),
            PlanNodeBody::Projection { .. } => "PROJECTION".to_string(),
            PlanNodeBody::Exchange { .. } => "EXCHANGE".to_string(),
        }
    }
}

/// A node of the runtime execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimePlanNode {
    pub body: PlanNodeBody,
    pub output_schema: NodeSchema,
    pub children: Vec<RuntimePlanNode>,
}

impl RuntimePlanNode {
    pub fn new(body: PlanNodeBody) -> Self {
        Self {
            body,
            output_schema: NodeSchema::default(),
            children: Vec::new(),
        }
    }

    pub fn aggregate(kind: AggregateNodeKind) -> Self {
        Self::new(PlanNodeBody::Aggregate(AggregatePlan::new(kind)))
    }

    pub fn set_output_schema(&mut self, schema: NodeSchema) {
        self.output_schema = schema;
    }

    pub fn add_and_link_child(&mut self, child: RuntimePlanNode) {
        self.children.push(child);
    }

    pub fn as_aggregate(&self) -> Option<&AggregatePlan> {
        match &self.body {
            PlanNodeBody::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    fn aggregate_mut(&mut self) -> Option<&mut AggregatePlan> {
        match &mut self.body {
            PlanNodeBody::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    /// Record an aggregate. No-op on non-aggregate nodes.
    pub fn add_aggregate(
        &mut self,
        op: AggregateOpCode,
        distinct: bool,
        output_column: usize,
        input: Option<ScalarExpr>,
    ) {
        if let Some(agg) = self.aggregate_mut() {
            agg.aggregates.push(AggregateEntry {
                op,
                distinct,
                output_column,
                input,
            });
        }
    }

    pub fn add_group_by_expression(&mut self, expr: ScalarExpr) {
        if let Some(agg) = self.aggregate_mut() {
            agg.group_by.push(expr);
        }
    }

    pub fn set_post_predicate(&mut self, predicate: ScalarExpr) {
        if let Some(agg) = self.aggregate_mut() {
            agg.post_predicate = Some(predicate);
        }
    }

    /// Indented, one-node-per-line rendering of the plan.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        let _ = write!(out, "{}{}", "  ".repeat(depth), self.body.name());
        match &self.body {
            PlanNodeBody::Aggregate(agg) => {
                let aggs: Vec<String> = agg
                    .aggregates
                    .iter()
                    .map(|a| {
                        let input = a.input.as_ref().map(|e| e.to_string()).unwrap_or_default();
                        let distinct = if a.distinct { "DISTINCT " } else { "" };
                        format!("{}({}{})->${}", a.op, distinct, input, a.output_column)
                    })
                    .collect();
                let keys: Vec<String> = agg.group_by.iter().map(|e| e.to_string()).collect();
                let _ = write!(out, " aggs=[{}] group_by=[{}]", aggs.join(", "), keys.join(", "));
                if let Some(p) = &agg.post_predicate {
                    let _ = write!(out, " having={}", p);
                }
            }
            PlanNodeBody::SeqScan { table } => {
                let _ = write!(out, " table={}", table);
            }
            PlanNodeBody::Filter { predicate } => {
                let _ = write!(out, " predicate={}", predicate);
            }
            PlanNodeBody::Projection { exprs } => {
                let exprs: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
                let _ = write!(out, " exprs=[{}]", exprs.join(", "));
            }
            PlanNodeBody::Exchange { distribution } => {
                let _ = write!(out, " distribution={}", distribution);
            }
        }
        out.push('\n');
        for child in &self.children {
            child.explain_into(out, depth + 1);
        }
    }
}
