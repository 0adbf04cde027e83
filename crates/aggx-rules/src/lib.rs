//! # Built-in Aggregate Rules
//!
//! This crate provides the rules that turn logical aggregates into physical ones.
//!
//! ## Transformation Rules (Logical -> Logical)
//!
//! - **`AvgDecompositionRule`**: rewrites AVG into SUM and COUNT plus a division in a
//!   Project above the aggregate, so that the aggregate can be split.
//!
//! ## Implementation Rules (Logical -> Physical)
//!
//! - **`ImplHashAggregateRule`**: single-site aggregate using a hash table.
//! - **`ImplSerialAggregateRule`**: single-site aggregate over clustered input.
//! - **`DistributedAggregateSplitRule`**: fragment aggregate per partition, an exchange,
//!   and a coordinator aggregate merging the partial results.
//!
//! All implementation rules turn a Filter sitting directly on the aggregate into the
//! physical node's HAVING predicate.

pub mod impl_agg;
pub mod reduce_avg;
pub mod split_agg;

use aggx_core::rule::RuleRegistry;

/// Create a rule registry with all built-in rules.
pub fn default_rule_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();

    registry.add_rule(Box::new(reduce_avg::AvgDecompositionRule));

    registry.add_rule(Box::new(impl_agg::ImplHashAggregateRule));
    registry.add_rule(Box::new(impl_agg::ImplSerialAggregateRule));
    registry.add_rule(Box::new(split_agg::DistributedAggregateSplitRule));

    registry
}
