//! # Statistics for Cost Estimation
//!
//! Row-count estimates drive the cost of every aggregate alternative. Statistics for
//! intermediate nodes are derived bottom-up from the scans:
//!
//! - **Filter**: output_rows = input_rows * selectivity. Column NDVs are scaled by the
//!   same ratio.
//! - **Aggregate**: output_rows = product of NDVs of the group-by columns, capped by input
//!   rows. A global aggregate (no group-by columns) always produces 1 row.
//! - **Project / Exchange**: row count passes through unchanged.
//!
//! ## Degenerate Estimates
//!
//! Missing statistics, zero rows, NaN or infinite estimates are not errors. They are
//! clamped by `sanitize_row_count` so that every cost derived from them is finite and
//! comparable.

use crate::group_set::GroupSet;
use crate::rel::Rel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default filter selectivity when we can't determine it.
pub const DEFAULT_FILTER_SELECTIVITY: f64 = 0.1;

/// Estimated bytes per output row when nothing better is known.
pub const DEFAULT_ROW_SIZE_BYTES: f64 = 100.0;

/// Statistics for a relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub row_count: f64,
    pub total_size_bytes: f64,
    /// Per-column statistics keyed by field position.
    pub column_stats: HashMap<usize, ColumnStatistics>,
}

impl Statistics {
    pub fn new(row_count: f64, total_size_bytes: f64) -> Self {
        Self {
            row_count,
            total_size_bytes,
            column_stats: HashMap::new(),
        }
    }

    /// Statistics for a relation nothing is known about.
    pub fn unknown() -> Self {
        Self::new(1000.0, 1000.0 * DEFAULT_ROW_SIZE_BYTES)
    }

    pub fn with_column(mut self, index: usize, stats: ColumnStatistics) -> Self {
        self.column_stats.insert(index, stats);
        self
    }
}

/// Per-column statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStatistics {
    /// Number of distinct values (NDV).
    pub distinct_count: f64,
    /// Fraction of rows that are NULL [0.0, 1.0].
    pub null_fraction: f64,
}

impl ColumnStatistics {
    pub fn new(distinct_count: f64, null_fraction: f64) -> Self {
        Self {
            distinct_count,
            null_fraction,
        }
    }
}

/// Clamp a row-count estimate into a finite, non-negative value.
///
/// NaN and negative estimates become 0; positive infinity becomes `f64::MAX`.
pub fn sanitize_row_count(rows: f64) -> f64 {
    if rows.is_nan() || rows < 0.0 {
        0.0
    } else if rows.is_infinite() {
        f64::MAX
    } else {
        rows
    }
}

/// Derive statistics for filter output.
pub fn derive_filter_stats(input: &Statistics, selectivity: f64) -> Statistics {
    let input_rows = sanitize_row_count(input.row_count);
    let row_count = (input_rows * selectivity).max(1.0);
    let ratio = if input_rows > 0.0 {
        row_count / input_rows
    } else {
        1.0
    };

    let column_stats = input
        .column_stats
        .iter()
        .map(|(&index, stats)| {
            let mut cs = stats.clone();
            cs.distinct_count = (cs.distinct_count * ratio).max(1.0).min(row_count);
            (index, cs)
        })
        .collect();

    Statistics {
        row_count,
        total_size_bytes: sanitize_row_count(input.total_size_bytes) * ratio,
        column_stats,
    }
}

/// Derive statistics for aggregate output.
///
/// The number of output groups is estimated as the product of NDVs of all group-by
/// columns, the worst case where every combination of values exists. Capped by the input
/// row count and floored at 1. Group-by columns keep their NDVs at their new output
/// positions; aggregate result columns get no column statistics.
pub fn derive_aggregate_stats(input: &Statistics, group_set: &GroupSet) -> Statistics {
    let input_rows = sanitize_row_count(input.row_count);
    let mut row_count = 1.0_f64;
    for bit in group_set.iter() {
        let ndv = input
            .column_stats
            .get(&bit)
            .map(|s| sanitize_row_count(s.distinct_count))
            .unwrap_or(input_rows);
        row_count *= ndv;
    }
    row_count = sanitize_row_count(row_count).min(input_rows).max(1.0);

    let column_stats = group_set
        .iter()
        .enumerate()
        .filter_map(|(output, bit)| {
            input.column_stats.get(&bit).map(|cs| {
                let mut cs = cs.clone();
                cs.distinct_count = cs.distinct_count.min(row_count);
                (output, cs)
            })
        })
        .collect();

    Statistics {
        row_count,
        total_size_bytes: row_count * DEFAULT_ROW_SIZE_BYTES,
        column_stats,
    }
}

/// Metadata provider the cost functions query for row counts.
pub trait MetadataQuery {
    fn row_count(&self, rel: &Rel) -> f64;
}

/// Derives row counts from the statistics carried by the scans of the tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMetadataQuery;

impl MetadataQuery for DefaultMetadataQuery {
    fn row_count(&self, rel: &Rel) -> f64 {
        sanitize_row_count(rel.statistics().row_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_stats_product_of_ndvs() {
        let input = Statistics::new(10_000.0, 1_000_000.0)
            .with_column(0, ColumnStatistics::new(10.0, 0.0))
            .with_column(2, ColumnStatistics::new(50.0, 0.0));
        let stats = derive_aggregate_stats(&input, &GroupSet::of(&[0, 2]));
        assert_eq!(stats.row_count, 500.0);
        // Column 2 of the input is output column 1.
        assert_eq!(stats.column_stats[&1].distinct_count, 50.0);
    }

    #[test]
    fn test_aggregate_stats_capped_and_floored() {
        let input = Statistics::new(100.0, 10_000.0)
            .with_column(0, ColumnStatistics::new(1000.0, 0.0));
        assert_eq!(derive_aggregate_stats(&input, &GroupSet::of(&[0])).row_count, 100.0);

        let empty = Statistics::new(0.0, 0.0);
        assert_eq!(derive_aggregate_stats(&empty, &GroupSet::empty()).row_count, 1.0);
    }

    #[test]
    fn test_degenerate_row_counts_stay_finite() {
        assert_eq!(sanitize_row_count(f64::NAN), 0.0);
        assert_eq!(sanitize_row_count(-3.0), 0.0);
        assert_eq!(sanitize_row_count(f64::INFINITY), f64::MAX);

        let input = Statistics::new(f64::NAN, f64::NAN);
        let filtered = derive_filter_stats(&input, DEFAULT_FILTER_SELECTIVITY);
        assert!(filtered.row_count.is_finite());
        assert!(filtered.total_size_bytes.is_finite());
    }
}
