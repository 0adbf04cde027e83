//! # Expression Conversion
//!
//! Lowering hands every expression it emits to an `ExpressionConverter`. The converter
//! owns the mapping from relational fields and predicates to the runtime's scalar
//! expressions and schemas; the aggregate lowering only decides *which* field or
//! predicate gets converted and where the result goes.
//!
//! `DefaultExpressionConverter` binds expressions positionally: a field reference becomes
//! a named column reference, and a predicate has every column reference checked against
//! the row it will be evaluated over and annotated with that row's field name.
//!
//! The fixed function table `runtime_aggregate_type` also lives here. Kinds it does not
//! map have no runtime operator and are rejected during lowering.

use crate::error::{InternalFault, Result};
use crate::expr::{AggregateKind, ColumnRef, ScalarExpr};
use crate::runtime::{AggregateOpCode, NodeSchema, SchemaColumn};
use crate::schema::{Field, RowType};

/// Converts relational expressions and row types into their runtime form.
pub trait ExpressionConverter: Send + Sync {
    /// Expression reading field `index` of a row, where `field` describes that position.
    fn field_ref_to_expr(&self, index: usize, field: &Field) -> ScalarExpr;

    /// Bind a predicate against the row type it is evaluated over.
    fn convert_predicate(&self, predicate: &ScalarExpr, row_type: &RowType) -> Result<ScalarExpr>;

    fn row_schema_from_row_type(&self, row_type: &RowType) -> NodeSchema;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExpressionConverter;

impl ExpressionConverter for DefaultExpressionConverter {
    fn field_ref_to_expr(&self, index: usize, field: &Field) -> ScalarExpr {
        ScalarExpr::Column(ColumnRef::named(index, field.name.clone()))
    }

    fn convert_predicate(&self, predicate: &ScalarExpr, row_type: &RowType) -> Result<ScalarExpr> {
        let field_count = row_type.field_count();
        if let Some(col) = predicate.columns().into_iter().find(|c| c.index >= field_count) {
            return Err(InternalFault::ColumnOutOfBounds {
                index: col.index,
                field_count,
            }
            .into());
        }
        Ok(predicate.map_columns(&mut |col: &ColumnRef| match row_type.field(col.index) {
            Some(field) => self.field_ref_to_expr(col.index, field),
            None => ScalarExpr::Column(col.clone()),
        }))
    }

    fn row_schema_from_row_type(&self, row_type: &RowType) -> NodeSchema {
        NodeSchema {
            columns: row_type
                .fields()
                .iter()
                .map(|f| SchemaColumn {
                    name: f.name.clone(),
                    data_type: f.data_type,
                    nullable: f.nullable,
                })
                .collect(),
        }
    }
}

/// Runtime operator for an aggregate kind, or `None` if the runtime cannot execute it.
///
/// COUNT maps to the field-counting operator here; lowering switches a zero-argument
/// COUNT to `AggregateOpCode::CountStar`.
pub fn runtime_aggregate_type(kind: AggregateKind) -> Option<AggregateOpCode> {
    match kind {
        AggregateKind::Count => Some(AggregateOpCode::Count),
        AggregateKind::Sum | AggregateKind::Sum0 => Some(AggregateOpCode::Sum),
        AggregateKind::Avg => Some(AggregateOpCode::Avg),
        AggregateKind::Min => Some(AggregateOpCode::Min),
        AggregateKind::Max => Some(AggregateOpCode::Max),
        AggregateKind::AnyValue
        | AggregateKind::StddevPop
        | AggregateKind::StddevSamp
        | AggregateKind::VarPop
        | AggregateKind::VarSamp
        | AggregateKind::ListAgg
        | AggregateKind::CovarPop => None,
    }
}
