//! # Aggregate Node Core
//!
//! State and checks shared by the logical and physical aggregate nodes: the input, the
//! grouping sets, the aggregate calls and the derived output row type.
//!
//! ## Output Row Type
//!
//! The output row is positional and always laid out the same way:
//!
//! ```text
//! [ group field for bit b0, group field for bit b1, ... | call 0, call 1, ... ]
//!    ascending group-set bits                             declaration order
//! ```
//!
//! Group fields copy the input field at their bit (name, type, nullability). Call fields
//! are typed by `AggregateKind::return_type` over the call's argument type and named by
//! the call's declared name, or `$f<output index>` when it has none. Duplicate names are
//! made unique. The first call field sits at `first_agg_field_index(group_set)`.
//!
//! ## Construction Checks
//!
//! Construction fails with an internal fault when a group bit or an argument position is
//! outside the input row, or when a grouping set is not a subset of the group key. Calls
//! with more than one argument are legal here; the runtime restriction is enforced when
//! a physical node is lowered.

use crate::error::{InternalFault, Result};
use crate::explain::{bracketed, OrderedFields};
use crate::expr::AggregateCall;
use crate::group_set::{first_agg_field_index, GroupSet};
use crate::rel::RelRef;
use crate::schema::{uniquify_names, Field, RowType};
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub struct AggregateCore {
    input: RelRef,
    group_set: GroupSet,
    group_sets: Vec<GroupSet>,
    agg_calls: Vec<AggregateCall>,
    row_type: RowType,
}

impl AggregateCore {
    /// Validate the shape and derive the output row type.
    ///
    /// `group_sets` defaults to `[group_set]` when `None`.
    pub fn new(
        input: RelRef,
        group_set: GroupSet,
        group_sets: Option<Vec<GroupSet>>,
        agg_calls: Vec<AggregateCall>,
    ) -> Result<Self> {
        let input_type = input.row_type();
        let field_count = input_type.field_count();

        if let Some(bit) = group_set.max_bit().filter(|&b| b >= field_count) {
            return Err(InternalFault::GroupKeyOutOfBounds { bit, field_count }.into());
        }

        let group_sets = group_sets.unwrap_or_else(|| vec![group_set.clone()]);
        for set in &group_sets {
            if !set.is_subset(&group_set) {
                return Err(InternalFault::GroupingSetNotSubset {
                    set: set.to_string(),
                    group_set: group_set.to_string(),
                }
                .into());
            }
        }

        for (call_idx, call) in agg_calls.iter().enumerate() {
            if let Some(&position) = call.args.iter().find(|&&p| p >= field_count) {
                return Err(InternalFault::ArgumentOutOfBounds {
                    call: call_idx,
                    position,
                    field_count,
                }
                .into());
            }
        }

        let row_type = derive_row_type(input_type, &group_set, &group_sets, &agg_calls);
        Ok(Self {
            input,
            group_set,
            group_sets,
            agg_calls,
            row_type,
        })
    }

    pub fn input(&self) -> &RelRef {
        &self.input
    }

    pub fn group_set(&self) -> &GroupSet {
        &self.group_set
    }

    pub fn group_sets(&self) -> &[GroupSet] {
        &self.group_sets
    }

    pub fn agg_calls(&self) -> &[AggregateCall] {
        &self.agg_calls
    }

    pub fn row_type(&self) -> &RowType {
        &self.row_type
    }

    pub fn group_count(&self) -> usize {
        self.group_set.cardinality()
    }

    /// The single active grouping set, for nodes that cannot carry more than one.
    pub fn single_group_set(&self) -> Result<&GroupSet> {
        match self.group_sets.as_slice() {
            [only] => Ok(only),
            sets => Err(InternalFault::MultipleGroupingSets(sets.len()).into()),
        }
    }

    /// Items shared by every aggregate description.
    pub(crate) fn describe_into(&self, desc: OrderedFields) -> OrderedFields {
        let simple = self.group_sets.len() == 1 && self.group_sets[0] == self.group_set;
        desc.item("group", &self.group_set)
            .item_if("groups", bracketed(&self.group_sets), !simple)
            .item_if("aggs", bracketed(&self.agg_calls), !self.agg_calls.is_empty())
    }
}

impl Hash for AggregateCore {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.input.hash(state);
        self.group_set.hash(state);
        self.group_sets.hash(state);
        self.agg_calls.hash(state);
    }
}

fn derive_row_type(
    input_type: &RowType,
    group_set: &GroupSet,
    group_sets: &[GroupSet],
    agg_calls: &[AggregateCall],
) -> RowType {
    let mut fields: Vec<Field> = Vec::with_capacity(group_set.cardinality() + agg_calls.len());

    for bit in group_set.iter() {
        if let Some(field) = input_type.field(bit) {
            let mut field = field.clone();
            // A key missing from some grouping set is NULL in that set's rows.
            if group_sets.iter().any(|set| !set.contains(bit)) {
                field.nullable = true;
            }
            fields.push(field);
        }
    }

    let first = first_agg_field_index(group_set);
    for (i, call) in agg_calls.iter().enumerate() {
        let arg_type = call
            .args
            .first()
            .and_then(|&p| input_type.field(p))
            .map(|f| f.data_type);
        let (data_type, nullable) = call.kind.return_type(arg_type);
        let name = call
            .name
            .clone()
            .unwrap_or_else(|| format!("$f{}", first + i));
        fields.push(Field::new(name, data_type, nullable));
    }

    uniquify_names(&mut fields);
    RowType::new(fields)
}
