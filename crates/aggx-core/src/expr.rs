//! # Scalar Expressions and Aggregate Calls
//!
//! This module defines the two expression vocabularies the aggregate planner works with.
//!
//! ## Scalar Expressions (`ScalarExpr`)
//! Row-level computations: column references, literals, arithmetic, comparisons, boolean
//! logic and function calls. They appear as group-by keys, aggregate arguments, HAVING
//! predicates and projection outputs. Column references are *positional*: `$2` is the third
//! field of whatever row the expression is evaluated against.
//!
//! ## Aggregate Calls (`AggregateCall`)
//! One aggregate function application inside an aggregate node: the function kind, the
//! input positions of its arguments, the DISTINCT flag and an optional declared name. The
//! runtime executes only zero- or one-argument aggregates; wider calls may exist in a
//! logical tree but are rejected when the node is lowered.
//!
//! The `Display` forms are stable and compact (`$1`, `>($1, 10)`, `SUM($2)`). They are
//! used in digests, so two structurally identical expressions always print identically.

use crate::schema::DataType;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Reference to a field by position, with the name it had when the reference was made.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub index: usize,
    pub name: Option<String>,
}

impl ColumnRef {
    pub fn new(index: usize) -> Self {
        Self { index, name: None }
    }

    pub fn named(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: Some(name.into()),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.index)
    }
}

/// Scalar value for expressions.
///
/// Uses `OrderedFloat` for `f64` so that literals can take part in Eq/Hash comparisons
/// (needed for digests and rule deduplication).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Utf8(String),
    /// Days since 1970-01-01.
    Date(i32),
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a == b,
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ScalarValue {}

impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int64(v) => v.hash(state),
            Self::Float64(v) => v.hash(state),
            Self::Utf8(v) => v.hash(state),
            Self::Date(v) => v.hash(state),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("NULL"),
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::Int64(v) => write!(f, "{}", v),
            ScalarValue::Float64(v) => write!(f, "{:?}", v.into_inner()),
            ScalarValue::Utf8(v) => write!(f, "'{}'", v.replace('\'', "''")),
            ScalarValue::Date(v) => write!(f, "DATE({})", v),
        }
    }
}

/// Scalar expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarExpr {
    /// Positional field reference.
    Column(ColumnRef),
    Literal(ScalarValue),
    BinaryOp {
        op: BinaryOp,
        left: Box<ScalarExpr>,
        right: Box<ScalarExpr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<ScalarExpr>,
    },
    Function {
        name: String,
        args: Vec<ScalarExpr>,
    },
    /// Conjunction stored flat, so predicates can be split without walking nested ANDs.
    And(Vec<ScalarExpr>),
    Or(Vec<ScalarExpr>),
}

impl ScalarExpr {
    pub fn column(index: usize) -> Self {
        ScalarExpr::Column(ColumnRef::new(index))
    }

    pub fn literal(value: ScalarValue) -> Self {
        ScalarExpr::Literal(value)
    }

    pub fn binary(op: BinaryOp, left: ScalarExpr, right: ScalarExpr) -> Self {
        ScalarExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Return all column references in this expression.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut cols = Vec::new();
        self.collect_columns(&mut cols);
        cols
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            ScalarExpr::Column(c) => out.push(c),
            ScalarExpr::Literal(_) => {}
            ScalarExpr::BinaryOp { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            ScalarExpr::UnaryOp { operand, .. } => operand.collect_columns(out),
            ScalarExpr::Function { args, .. } => {
                for a in args {
                    a.collect_columns(out);
                }
            }
            ScalarExpr::And(exprs) | ScalarExpr::Or(exprs) => {
                for e in exprs {
                    e.collect_columns(out);
                }
            }
        }
    }

    /// Flatten AND-chains: (A AND (B AND C)) → [A, B, C].
    pub fn conjuncts(&self) -> Vec<&ScalarExpr> {
        match self {
            ScalarExpr::And(exprs) => exprs.iter().flat_map(|e| e.conjuncts()).collect(),
            other => vec![other],
        }
    }

    /// Rewrite every column reference through `f`, leaving the rest of the tree intact.
    pub fn map_columns<F>(&self, f: &mut F) -> ScalarExpr
    where
        F: FnMut(&ColumnRef) -> ScalarExpr,
    {
        match self {
            ScalarExpr::Column(c) => f(c),
            ScalarExpr::Literal(v) => ScalarExpr::Literal(v.clone()),
            ScalarExpr::BinaryOp { op, left, right } => ScalarExpr::BinaryOp {
                op: *op,
                left: Box::new(left.map_columns(f)),
                right: Box::new(right.map_columns(f)),
            },
            ScalarExpr::UnaryOp { op, operand } => ScalarExpr::UnaryOp {
                op: *op,
                operand: Box::new(operand.map_columns(f)),
            },
            ScalarExpr::Function { name, args } => ScalarExpr::Function {
                name: name.clone(),
                args: args.iter().map(|a| a.map_columns(f)).collect(),
            },
            ScalarExpr::And(exprs) => {
                ScalarExpr::And(exprs.iter().map(|e| e.map_columns(f)).collect())
            }
            ScalarExpr::Or(exprs) => ScalarExpr::Or(exprs.iter().map(|e| e.map_columns(f)).collect()),
        }
    }
}

impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarExpr::Column(c) => write!(f, "{}", c),
            ScalarExpr::Literal(v) => write!(f, "{}", v),
            ScalarExpr::BinaryOp { op, left, right } => write!(f, "{}({}, {})", op, left, right),
            ScalarExpr::UnaryOp { op, operand } => write!(f, "{}({})", op, operand),
            ScalarExpr::Function { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ScalarExpr::And(exprs) => {
                write!(f, "AND(")?;
                write_list(f, exprs)?;
                write!(f, ")")
            }
            ScalarExpr::Or(exprs) => {
                write!(f, "OR(")?;
                write_list(f, exprs)?;
                write!(f, ")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[ScalarExpr]) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", e)?;
    }
    Ok(())
}

/// Binary operators for comparison and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        f.write_str(symbol)
    }
}

/// Unary operators for boolean logic and null checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
    IsNotNull,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnaryOp::Not => "NOT",
            UnaryOp::Neg => "-",
            UnaryOp::IsNull => "IS NULL",
            UnaryOp::IsNotNull => "IS NOT NULL",
        };
        f.write_str(name)
    }
}

/// Aggregate function kinds as they appear in the logical algebra.
///
/// Not every kind has a runtime operator; see `convert::runtime_aggregate_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateKind {
    Count,
    Sum,
    /// SUM that yields 0 instead of NULL over an empty input.
    Sum0,
    Avg,
    Min,
    Max,
    AnyValue,
    StddevPop,
    StddevSamp,
    VarPop,
    VarSamp,
    ListAgg,
    CovarPop,
}

impl AggregateKind {
    /// Mean-like aggregates that the runtime evaluates as a division over SUM and COUNT.
    pub fn is_avg_like(&self) -> bool {
        matches!(self, AggregateKind::Avg)
    }

    /// Result type of this aggregate given the type of its (first) argument.
    pub fn return_type(&self, arg: Option<DataType>) -> (DataType, bool) {
        match self {
            AggregateKind::Count => (DataType::BigInt, false),
            AggregateKind::Sum | AggregateKind::Sum0 => {
                let ty = match arg {
                    Some(t) if t.is_integer() => DataType::BigInt,
                    Some(t) => t,
                    None => DataType::BigInt,
                };
                (ty, *self == AggregateKind::Sum)
            }
            AggregateKind::Avg
            | AggregateKind::Min
            | AggregateKind::Max
            | AggregateKind::AnyValue => (arg.unwrap_or(DataType::BigInt), true),
            AggregateKind::StddevPop
            | AggregateKind::StddevSamp
            | AggregateKind::VarPop
            | AggregateKind::VarSamp
            | AggregateKind::CovarPop => (DataType::Float, true),
            AggregateKind::ListAgg => (DataType::Varchar, true),
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateKind::Count => "COUNT",
            AggregateKind::Sum => "SUM",
            AggregateKind::Sum0 => "$SUM0",
            AggregateKind::Avg => "AVG",
            AggregateKind::Min => "MIN",
            AggregateKind::Max => "MAX",
            AggregateKind::AnyValue => "ANY_VALUE",
            AggregateKind::StddevPop => "STDDEV_POP",
            AggregateKind::StddevSamp => "STDDEV_SAMP",
            AggregateKind::VarPop => "VAR_POP",
            AggregateKind::VarSamp => "VAR_SAMP",
            AggregateKind::ListAgg => "LISTAGG",
            AggregateKind::CovarPop => "COVAR_POP",
        };
        f.write_str(name)
    }
}

/// One aggregate function application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateCall {
    pub kind: AggregateKind,
    /// Input field positions of the arguments. COUNT(*) has none.
    pub args: Vec<usize>,
    pub distinct: bool,
    /// Output field name requested by the query, if any.
    pub name: Option<String>,
}

impl AggregateCall {
    pub fn new(kind: AggregateKind, args: Vec<usize>) -> Self {
        Self {
            kind,
            args,
            distinct: false,
            name: None,
        }
    }

    pub fn count_star() -> Self {
        Self::new(AggregateKind::Count, vec![])
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Same call with different argument positions (used when re-basing onto a new input).
    pub fn with_args(&self, args: Vec<usize>) -> Self {
        Self {
            args,
            ..self.clone()
        }
    }

    /// Calls that compute the same value regardless of the requested output name.
    pub fn same_computation(&self, other: &AggregateCall) -> bool {
        self.kind == other.kind && self.args == other.args && self.distinct == other.distinct
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind)?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "${}", arg)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_positional() {
        let having = ScalarExpr::And(vec![
            ScalarExpr::binary(
                BinaryOp::Gt,
                ScalarExpr::Column(ColumnRef::named(1, "cnt")),
                ScalarExpr::literal(ScalarValue::Int64(10)),
            ),
            ScalarExpr::UnaryOp {
                op: UnaryOp::IsNotNull,
                operand: Box::new(ScalarExpr::column(0)),
            },
        ]);
        assert_eq!(having.to_string(), "AND(>($1, 10), IS NOT NULL($0))");
    }

    #[test]
    fn test_aggregate_call_display() {
        assert_eq!(AggregateCall::count_star().to_string(), "COUNT()");
        assert_eq!(
            AggregateCall::new(AggregateKind::Sum, vec![2]).distinct().to_string(),
            "SUM(DISTINCT $2)"
        );
    }

    #[test]
    fn test_return_types() {
        assert_eq!(AggregateKind::Count.return_type(None), (DataType::BigInt, false));
        assert_eq!(
            AggregateKind::Sum.return_type(Some(DataType::Integer)),
            (DataType::BigInt, true)
        );
        assert_eq!(
            AggregateKind::Sum0.return_type(Some(DataType::BigInt)),
            (DataType::BigInt, false)
        );
        assert_eq!(
            AggregateKind::Max.return_type(Some(DataType::Varchar)),
            (DataType::Varchar, true)
        );
    }

    #[test]
    fn test_map_columns_shifts_references() {
        let expr = ScalarExpr::binary(BinaryOp::Add, ScalarExpr::column(0), ScalarExpr::column(2));
        let shifted = expr.map_columns(&mut |c| ScalarExpr::column(c.index + 1));
        assert_eq!(shifted.to_string(), "+($1, $3)");
    }
}
