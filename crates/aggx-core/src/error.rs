//! # Planning Errors
//!
//! Lowering a plan alternative can fail in two very different ways, and callers must be
//! able to tell them apart:
//!
//! - **Unsupported function** (`PlanError::UnsupportedAggregate`): the query asked for an
//!   aggregate the runtime cannot execute. This is a property of the user's query. The
//!   search framework may discard the alternative and keep looking.
//! - **Internal fault** (`PlanError::Internal`): the tree handed to the planner violates a
//!   structural contract (too many aggregate arguments, a group key outside the row, a
//!   non-decomposable call reaching the split rule, ...). These indicate a defect upstream
//!   and must halt compilation of the query with a diagnosable message.
//!
//! Cost anomalies are never errors; see `cost` and `stats`.

use crate::expr::AggregateKind;
use crate::physical::AggregateRole;

/// Result alias used throughout the planner.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Errors that can occur while building, splitting or lowering plan nodes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// The aggregate function has no runtime operator.
    #[error("Unsupported aggregate function: {function}")]
    UnsupportedAggregate { function: AggregateKind },
    /// A structural invariant was violated.
    #[error("Internal planner error: {0}")]
    Internal(#[from] InternalFault),
}

impl PlanError {
    /// Whether the search framework may drop this alternative and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlanError::UnsupportedAggregate { .. })
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, PlanError::Internal(_))
    }
}

/// Internal-consistency faults. Each variant names the contract that was broken.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InternalFault {
    /// The runtime only supports zero- or one-argument aggregates.
    #[error("aggregate call #{call} ({function}) has {count} arguments, at most 1 is supported")]
    TooManyArguments {
        call: usize,
        function: AggregateKind,
        count: usize,
    },
    #[error("group key {bit} is outside the input row ({field_count} fields)")]
    GroupKeyOutOfBounds { bit: usize, field_count: usize },
    #[error("aggregate call #{call} references argument {position} outside the input row ({field_count} fields)")]
    ArgumentOutOfBounds {
        call: usize,
        position: usize,
        field_count: usize,
    },
    #[error("column ${index} is outside the row ({field_count} fields)")]
    ColumnOutOfBounds { index: usize, field_count: usize },
    #[error("physical aggregates take exactly one grouping set, got {0}")]
    MultipleGroupingSets(usize),
    #[error("grouping set {set} is not a subset of the group key {group_set}")]
    GroupingSetNotSubset { set: String, group_set: String },
    #[error("aggregate call #{call} ({function}) cannot be split across partitions")]
    NonDecomposable { call: usize, function: AggregateKind },
    #[error("split count must be at least 1, got {0}")]
    InvalidSplitCount(u32),
    #[error("role {role:?} is inconsistent with split count {split_count}")]
    InconsistentRole { role: AggregateRole, split_count: u32 },
    #[error("{0} node reached physical lowering")]
    NotPhysical(&'static str),
    #[error("{0} node is missing its input")]
    MissingInput(&'static str),
}
