//! # aggx-core: Aggregate Lowering for a Partitioned SQL Engine
//!
//! This crate holds the algebra and the lowering contract for GROUP BY aggregation. A
//! logical aggregate is implemented as one physical aggregate, or as a per-partition
//! fragment aggregate and a coordinator aggregate joined by an exchange. Either way it
//! lowers into flat, positionally addressed runtime plan nodes.
//!
//! The contract that matters most is positional: an aggregate's output row is the
//! group-by fields in ascending group-set order, then one field per aggregate call in
//! declaration order. Every piece of this crate (row-type derivation, lowering, the
//! split in `aggx-rules`) is written against that layout.
//!
//! ## Module Overview
//!
//! - **`schema`**: data types, fields and row types.
//! - **`group_set`**: grouping sets as bit-sets, and `first_agg_field_index`.
//! - **`expr`**: scalar expressions and aggregate calls.
//! - **`aggregate`**: state and checks shared by logical and physical aggregates.
//! - **`logical`**: the logical aggregate and its exploratory cost.
//! - **`physical`**: the physical aggregate, its role and strategy, digest and lowering.
//! - **`rel`**: the relational node enum, fingerprints, digests, explain and lowering.
//! - **`runtime`**: the runtime plan node model that lowering produces.
//! - **`convert`**: the expression-conversion seam and the runtime function table.
//! - **`cost`**: cost values, the cost factory and the AVG cost heuristic.
//! - **`stats`**: statistics, derivation formulas and the metadata query.
//! - **`properties`**: data distribution.
//! - **`explain`**: structured node descriptions.
//! - **`rule`** / **`pattern`**: the rule trait, registry and pattern matcher.
//! - **`config`**: planner configuration.
//! - **`error`**: the planner error type.

pub mod aggregate;
pub mod config;
pub mod convert;
pub mod cost;
pub mod error;
pub mod explain;
pub mod expr;
pub mod group_set;
pub mod logical;
pub mod pattern;
pub mod physical;
pub mod properties;
pub mod rel;
pub mod rule;
pub mod runtime;
pub mod schema;
pub mod stats;
