//! # Relational Plan Nodes
//!
//! The algebra the aggregate planner rewrites and lowers. Trees are immutable and shared
//! through `RelRef = Arc<Rel>`, so alternatives explored by the search can reuse subtrees
//! freely and can be built on different threads without locking. Rewrites always build
//! new nodes (`with_inputs`, the `copy` functions on the aggregates).
//!
//! ## Node Kinds
//!
//! - `Scan`: a table with a declared row type, statistics and distribution.
//! - `Filter`, `Project`: row-level operators.
//! - `Exchange`: redistributes its input (gather to one site, or hash partition).
//! - `Aggregate`: the logical GROUP BY node (see `logical`).
//! - `PhysicalAggregate`: a lowered aggregate with strategy, role and split count (see
//!   `physical`).
//!
//! ## Identity
//!
//! `fingerprint()` is a structural 64-bit hash of the whole subtree, computed from the
//! node values rather than from their printed form. `digest()` is the readable identity
//! of one node: its description with the fingerprints of its inputs in place of the
//! inputs themselves. Physical aggregates extend it with split, role and HAVING.
//!
//! ## Lowering
//!
//! `to_runtime_plan` lowers a fully physical tree. A logical aggregate still present at
//! that point is an internal fault.

use crate::config::PlannerConfig;
use crate::convert::ExpressionConverter;
use crate::cost::{Cost, CostFactory};
use crate::error::{InternalFault, Result};
use crate::explain::{bracketed, OrderedFields};
use crate::expr::ScalarExpr;
use crate::logical::LogicalAggregate;
use crate::physical::{AggregateRole, PhysicalAggregate};
use crate::properties::Distribution;
use crate::runtime::{PlanNodeBody, RuntimePlanNode};
use crate::schema::{Field, RowType};
use crate::stats::{
    derive_aggregate_stats, derive_filter_stats, sanitize_row_count, MetadataQuery, Statistics,
    DEFAULT_FILTER_SELECTIVITY,
};
use std::collections::hash_map::DefaultHasher;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub type RelRef = Arc<Rel>;

/// A base table.
#[derive(Debug, Clone)]
pub struct TableScan {
    table: String,
    row_type: RowType,
    stats: Statistics,
    distribution: Distribution,
}

impl TableScan {
    /// A table stored at a single site.
    pub fn new(table: impl Into<String>, row_type: RowType, stats: Statistics) -> Self {
        Self {
            table: table.into(),
            row_type,
            stats,
            distribution: Distribution::Single,
        }
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }
}

// Column statistics do not identify a scan; the row count is hashed by bit pattern.
impl Hash for TableScan {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.table.hash(state);
        self.row_type.hash(state);
        self.distribution.hash(state);
        self.stats.row_count.to_bits().hash(state);
    }
}

#[derive(Debug, Clone, Hash)]
pub struct Filter {
    input: RelRef,
    predicate: ScalarExpr,
}

impl Filter {
    pub fn create(input: RelRef, predicate: ScalarExpr) -> Result<Self> {
        check_columns(std::slice::from_ref(&predicate), input.row_type())?;
        Ok(Self { input, predicate })
    }

    pub fn input(&self) -> &RelRef {
        &self.input
    }

    pub fn predicate(&self) -> &ScalarExpr {
        &self.predicate
    }
}

#[derive(Debug, Clone, Hash)]
pub struct Project {
    input: RelRef,
    exprs: Vec<ScalarExpr>,
    row_type: RowType,
}

impl Project {
    /// Project `input` through `(expression, output field)` pairs.
    pub fn create(input: RelRef, projections: Vec<(ScalarExpr, Field)>) -> Result<Self> {
        let (exprs, fields): (Vec<ScalarExpr>, Vec<Field>) = projections.into_iter().unzip();
        check_columns(&exprs, input.row_type())?;
        Ok(Self {
            input,
            exprs,
            row_type: RowType::new(fields),
        })
    }

    pub fn input(&self) -> &RelRef {
        &self.input
    }

    pub fn exprs(&self) -> &[ScalarExpr] {
        &self.exprs
    }
}

#[derive(Debug, Clone, Hash)]
pub struct Exchange {
    input: RelRef,
    distribution: Distribution,
}

impl Exchange {
    pub fn new(input: RelRef, distribution: Distribution) -> Self {
        Self { input, distribution }
    }

    pub fn input(&self) -> &RelRef {
        &self.input
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }
}

fn check_columns(exprs: &[ScalarExpr], row_type: &RowType) -> Result<()> {
    let field_count = row_type.field_count();
    for expr in exprs {
        if let Some(col) = expr.columns().into_iter().find(|c| c.index >= field_count) {
            return Err(InternalFault::ColumnOutOfBounds {
                index: col.index,
                field_count,
            }
            .into());
        }
    }
    Ok(())
}

/// Node kinds, without data. Used by rule patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelKind {
    Scan,
    Filter,
    Project,
    Exchange,
    Aggregate,
    PhysicalAggregate,
}

impl RelKind {
    pub fn name(&self) -> &'static str {
        match self {
            RelKind::Scan => "Scan",
            RelKind::Filter => "Filter",
            RelKind::Project => "Project",
            RelKind::Exchange => "Exchange",
            RelKind::Aggregate => "Aggregate",
            RelKind::PhysicalAggregate => "PhysicalAggregate",
        }
    }
}

/// A relational plan node.
#[derive(Debug, Clone, Hash)]
pub enum Rel {
    Scan(TableScan),
    Filter(Filter),
    Project(Project),
    Exchange(Exchange),
    Aggregate(LogicalAggregate),
    PhysicalAggregate(PhysicalAggregate),
}

impl Rel {
    pub fn kind(&self) -> RelKind {
        match self {
            Rel::Scan(_) => RelKind::Scan,
            Rel::Filter(_) => RelKind::Filter,
            Rel::Project(_) => RelKind::Project,
            Rel::Exchange(_) => RelKind::Exchange,
            Rel::Aggregate(_) => RelKind::Aggregate,
            Rel::PhysicalAggregate(_) => RelKind::PhysicalAggregate,
        }
    }

    pub fn row_type(&self) -> &RowType {
        match self {
            Rel::Scan(scan) => &scan.row_type,
            Rel::Filter(filter) => filter.input.row_type(),
            Rel::Project(project) => &project.row_type,
            Rel::Exchange(exchange) => exchange.input.row_type(),
            Rel::Aggregate(agg) => agg.row_type(),
            Rel::PhysicalAggregate(agg) => agg.row_type(),
        }
    }

    pub fn inputs(&self) -> Vec<&RelRef> {
        match self {
            Rel::Scan(_) => vec![],
            Rel::Filter(filter) => vec![&filter.input],
            Rel::Project(project) => vec![&project.input],
            Rel::Exchange(exchange) => vec![&exchange.input],
            Rel::Aggregate(agg) => vec![agg.input()],
            Rel::PhysicalAggregate(agg) => vec![agg.input()],
        }
    }

    /// Same node over new inputs.
    pub fn with_inputs(&self, inputs: Vec<RelRef>) -> Result<Rel> {
        let kind = self.kind();
        let mut inputs = inputs.into_iter();
        let mut next = || inputs.next().ok_or(InternalFault::MissingInput(kind.name()));
        Ok(match self {
            Rel::Scan(scan) => Rel::Scan(scan.clone()),
            Rel::Filter(filter) => Rel::Filter(Filter::create(next()?, filter.predicate.clone())?),
            Rel::Project(project) => {
                let projections = project
                    .exprs
                    .iter()
                    .cloned()
                    .zip(project.row_type.fields().iter().cloned())
                    .collect();
                Rel::Project(Project::create(next()?, projections)?)
            }
            Rel::Exchange(exchange) => {
                Rel::Exchange(Exchange::new(next()?, exchange.distribution.clone()))
            }
            Rel::Aggregate(agg) => Rel::Aggregate(agg.with_input(next()?)?),
            Rel::PhysicalAggregate(agg) => Rel::PhysicalAggregate(agg.with_input(next()?)?),
        })
    }

    pub fn distribution(&self) -> Distribution {
        match self {
            Rel::Scan(scan) => scan.distribution.clone(),
            Rel::Exchange(exchange) => exchange.distribution.clone(),
            Rel::Filter(_) | Rel::Project(_) | Rel::Aggregate(_) | Rel::PhysicalAggregate(_) => self
                .inputs()
                .first()
                .map(|input| input.distribution())
                .unwrap_or_default(),
        }
    }

    pub fn statistics(&self) -> Statistics {
        match self {
            Rel::Scan(scan) => scan.stats.clone(),
            Rel::Filter(filter) => {
                derive_filter_stats(&filter.input.statistics(), DEFAULT_FILTER_SELECTIVITY)
            }
            Rel::Project(project) => {
                let input = project.input.statistics();
                Statistics::new(input.row_count, input.total_size_bytes)
            }
            Rel::Exchange(exchange) => exchange.input.statistics(),
            Rel::Aggregate(agg) => derive_aggregate_stats(&agg.input().statistics(), agg.group_set()),
            Rel::PhysicalAggregate(agg) => {
                let input = agg.input().statistics();
                let mut stats = derive_aggregate_stats(&input, agg.group_set());
                // Every partition can emit each group once.
                if agg.role() == AggregateRole::FragmentOnly {
                    stats.row_count = (stats.row_count * f64::from(agg.split_count()))
                        .min(sanitize_row_count(input.row_count))
                        .max(1.0);
                }
                stats
            }
        }
    }

    pub fn estimate_row_count(&self) -> f64 {
        sanitize_row_count(self.statistics().row_count)
    }

    /// Logical aggregates get the exploratory heuristic; everything else costs the rows
    /// it handles.
    pub fn cost(&self, mq: &dyn MetadataQuery, factory: &dyn CostFactory, config: &PlannerConfig) -> Cost {
        match self {
            Rel::Aggregate(agg) => agg.cost(mq.row_count(self), &config.cost_heuristic(), factory),
            Rel::PhysicalAggregate(agg) => agg.cost(mq, factory),
            _ => factory.make_cost(mq.row_count(self), 0.0, 0.0),
        }
    }

    pub fn describe(&self) -> OrderedFields {
        match self {
            Rel::Scan(scan) => OrderedFields::new("Scan")
                .item("table", &scan.table)
                .item_if("distribution", &scan.distribution, scan.distribution.is_partitioned()),
            Rel::Filter(filter) => OrderedFields::new("Filter").item("condition", &filter.predicate),
            Rel::Project(project) => OrderedFields::new("Project")
                .item("exprs", bracketed(&project.exprs))
                .item("names", bracketed(&project.row_type.names())),
            Rel::Exchange(exchange) => {
                OrderedFields::new("Exchange").item("distribution", &exchange.distribution)
            }
            Rel::Aggregate(agg) => agg.describe(),
            Rel::PhysicalAggregate(agg) => agg.describe(),
        }
    }

    pub fn digest(&self) -> String {
        match self {
            Rel::PhysicalAggregate(agg) => agg.digest(),
            _ => {
                let fingerprints: Vec<u64> = self.inputs().iter().map(|i| i.fingerprint()).collect();
                self.describe().digest_with_inputs(&fingerprints)
            }
        }
    }

    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Indented tree, one node per line.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        let _ = writeln!(out, "{}{}", "  ".repeat(depth), self.describe());
        for input in self.inputs() {
            input.explain_into(out, depth + 1);
        }
    }

    /// Lower this tree into a runtime plan.
    pub fn to_runtime_plan(&self, conv: &dyn ExpressionConverter) -> Result<RuntimePlanNode> {
        let body = match self {
            Rel::PhysicalAggregate(agg) => return agg.to_runtime_plan(conv),
            Rel::Aggregate(_) => return Err(InternalFault::NotPhysical("Aggregate").into()),
            Rel::Scan(scan) => PlanNodeBody::SeqScan {
                table: scan.table.clone(),
            },
            Rel::Filter(filter) => PlanNodeBody::Filter {
                predicate: conv.convert_predicate(&filter.predicate, filter.input.row_type())?,
            },
            Rel::Project(project) => PlanNodeBody::Projection {
                exprs: project
                    .exprs
                    .iter()
                    .map(|e| conv.convert_predicate(e, project.input.row_type()))
                    .collect::<Result<Vec<_>>>()?,
            },
            Rel::Exchange(exchange) => PlanNodeBody::Exchange {
                distribution: exchange.distribution.clone(),
            },
        };
        let mut node = RuntimePlanNode::new(body);
        node.set_output_schema(conv.row_schema_from_row_type(self.row_type()));
        for input in self.inputs() {
            node.add_and_link_child(input.to_runtime_plan(conv)?);
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::DefaultExpressionConverter;
    use crate::error::PlanError;
    use crate::expr::{AggregateCall, AggregateKind, BinaryOp, ScalarValue};
    use crate::group_set::GroupSet;
    use crate::schema::DataType;
    use crate::stats::ColumnStatistics;

    fn scan(partitions: u32) -> RelRef {
        let table = TableScan::new(
            "sales",
            RowType::new(vec![
                Field::new("store", DataType::Integer, false),
                Field::new("amount", DataType::Decimal, true),
            ]),
            Statistics::new(10_000.0, 1_000_000.0).with_column(0, ColumnStatistics::new(40.0, 0.0)),
        );
        let table = if partitions > 1 {
            table.with_distribution(Distribution::RoundRobin { partitions })
        } else {
            table
        };
        Arc::new(Rel::Scan(table))
    }

    #[test]
    fn test_filter_passes_row_type_and_distribution() {
        let filter = Rel::Filter(
            Filter::create(
                scan(4),
                ScalarExpr::binary(
                    BinaryOp::Gt,
                    ScalarExpr::column(1),
                    ScalarExpr::literal(ScalarValue::Int64(0)),
                ),
            )
            .unwrap(),
        );
        assert_eq!(filter.row_type().names(), vec!["store", "amount"]);
        assert_eq!(filter.distribution().partition_count(), 4);
        assert_eq!(filter.estimate_row_count(), 1_000.0);

        let bad = Filter::create(scan(1), ScalarExpr::column(2));
        assert!(matches!(
            bad,
            Err(PlanError::Internal(InternalFault::ColumnOutOfBounds { index: 2, .. }))
        ));
    }

    #[test]
    fn test_fingerprint_is_structural() {
        let a = Rel::Exchange(Exchange::new(scan(4), Distribution::Single));
        let b = Rel::Exchange(Exchange::new(scan(4), Distribution::Single));
        let c = Rel::Exchange(Exchange::new(scan(2), Distribution::Single));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.digest(), b.digest());
        assert!(a.digest().starts_with("Exchange(input=#"));
    }

    #[test]
    fn test_logical_aggregate_is_not_lowered() {
        let agg = Rel::Aggregate(
            LogicalAggregate::create(scan(1), GroupSet::of(&[0]), None, vec![AggregateCall::count_star()])
                .unwrap(),
        );
        assert_eq!(agg.estimate_row_count(), 40.0);
        let err = agg.to_runtime_plan(&DefaultExpressionConverter).unwrap_err();
        assert_eq!(err, PlanError::Internal(InternalFault::NotPhysical("Aggregate")));
    }

    #[test]
    fn test_with_inputs_requires_input() {
        let exchange = Rel::Exchange(Exchange::new(scan(4), Distribution::Single));
        let err = exchange.with_inputs(vec![]).unwrap_err();
        assert_eq!(err, PlanError::Internal(InternalFault::MissingInput("Exchange")));

        let moved = exchange.with_inputs(vec![scan(2)]).unwrap();
        assert_eq!(moved.inputs()[0].distribution().partition_count(), 2);
    }

    #[test]
    fn test_project_with_narrower_input_is_rejected() {
        let project = Rel::Project(
            Project::create(
                scan(1),
                vec![(ScalarExpr::column(1), Field::new("amount", DataType::Decimal, true))],
            )
            .unwrap(),
        );
        let narrow: RelRef = Arc::new(Rel::Scan(TableScan::new(
            "stores",
            RowType::new(vec![Field::new("store", DataType::Integer, false)]),
            Statistics::unknown(),
        )));
        let err = project.with_inputs(vec![narrow]).unwrap_err();
        assert_eq!(
            err,
            PlanError::Internal(InternalFault::ColumnOutOfBounds {
                index: 1,
                field_count: 1,
            })
        );

        let same = project.with_inputs(vec![scan(4)]).unwrap();
        assert_eq!(same.row_type(), project.row_type());
    }

    #[test]
    fn test_explain_tree() {
        let agg = Rel::Aggregate(
            LogicalAggregate::create(
                scan(1),
                GroupSet::of(&[0]),
                None,
                vec![AggregateCall::new(AggregateKind::Sum, vec![1])],
            )
            .unwrap(),
        );
        assert_eq!(
            agg.explain(),
            "Aggregate(group={0}, aggs=[SUM($1)])\n  Scan(table=sales)\n"
        );
    }
}
