//! # Cost Model
//!
//! Costs compare plan alternatives. A `Cost` has three dimensions (rows processed, CPU,
//! I/O) and is ordered primarily by rows: aggregate alternatives differ mostly in how many
//! rows they touch.
//!
//! ## Logical vs. Physical Aggregate Cost
//!
//! - **Logical** aggregates are costed for exploration. The cost is the node's own
//!   row-count estimate times a heuristic multiplier: 10x for every AVG-like call. AVG is
//!   evaluated as SUM/COUNT plus a division, so a plan that spells the average out as
//!   separate SUM and COUNT calls should win whenever that rewrite is available. This is a
//!   bias for the search, not a model of execution time; `AggregateCostHeuristic` keeps
//!   it overridable.
//! - **Physical** aggregates are costed by the input row count with no multiplier, which
//!   reflects what the runtime actually processes.
//!
//! Every cost is finite. Degenerate inputs (zero, NaN, infinite row counts) are clamped
//! rather than rejected, so any two costs can always be compared.

use crate::expr::AggregateCall;
use crate::stats::sanitize_row_count;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Estimated expense of a plan. Lower is better.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cost {
    pub rows: f64,
    pub cpu: f64,
    pub io: f64,
}

impl Cost {
    pub fn zero() -> Self {
        Self {
            rows: 0.0,
            cpu: 0.0,
            io: 0.0,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.rows.is_finite() && self.cpu.is_finite() && self.io.is_finite()
    }
}

/// Epsilon-based equality to handle floating-point imprecision in cost comparisons.
impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        approx_eq(self.rows, other.rows)
            && approx_eq(self.cpu, other.cpu)
            && approx_eq(self.io, other.io)
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        if !approx_eq(self.rows, other.rows) {
            return self.rows.partial_cmp(&other.rows);
        }
        if !approx_eq(self.cpu, other.cpu) {
            return self.cpu.partial_cmp(&other.cpu);
        }
        self.io.partial_cmp(&other.io)
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= f64::EPSILON * scale
}

/// Creates `Cost` values. Pluggable so that a search framework can supply its own cost
/// representation rules.
pub trait CostFactory: Send + Sync {
    fn make_cost(&self, rows: f64, cpu: f64, io: f64) -> Cost;
}

/// Clamps every dimension into a finite, non-negative value.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCostFactory;

impl CostFactory for DefaultCostFactory {
    fn make_cost(&self, rows: f64, cpu: f64, io: f64) -> Cost {
        Cost {
            rows: sanitize_row_count(rows),
            cpu: sanitize_row_count(cpu),
            io: sanitize_row_count(io),
        }
    }
}

/// Exploratory cost heuristic for logical aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateCostHeuristic {
    /// Factor applied once per AVG-like aggregate call.
    pub avg_multiplier: f64,
}

impl Default for AggregateCostHeuristic {
    fn default() -> Self {
        Self {
            avg_multiplier: 10.0,
        }
    }
}

impl AggregateCostHeuristic {
    pub fn new(avg_multiplier: f64) -> Self {
        Self { avg_multiplier }
    }

    /// Product of the per-call multipliers: `avg_multiplier ^ (number of AVG-like calls)`.
    pub fn multiplier(&self, calls: &[AggregateCall]) -> f64 {
        calls
            .iter()
            .filter(|call| call.kind.is_avg_like())
            .fold(1.0, |acc, _| acc * self.avg_multiplier)
    }

    pub fn cost(&self, factory: &dyn CostFactory, row_count: f64, calls: &[AggregateCall]) -> Cost {
        let rows = sanitize_row_count(row_count) * self.multiplier(calls);
        factory.make_cost(rows, 0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::AggregateKind;

    fn calls(kinds: &[AggregateKind]) -> Vec<AggregateCall> {
        kinds.iter().map(|k| AggregateCall::new(*k, vec![0])).collect()
    }

    #[test]
    fn test_avg_multiplier_per_call() {
        let heuristic = AggregateCostHeuristic::default();
        let factory = DefaultCostFactory;
        let none = heuristic.cost(&factory, 100.0, &calls(&[AggregateKind::Sum, AggregateKind::Count]));
        let one = heuristic.cost(&factory, 100.0, &calls(&[AggregateKind::Avg, AggregateKind::Sum]));
        let two = heuristic.cost(&factory, 100.0, &calls(&[AggregateKind::Avg, AggregateKind::Avg]));
        assert_eq!(none.rows, 100.0);
        assert_eq!(one.rows, 1_000.0);
        assert_eq!(two.rows, 10_000.0);
        assert!(none < one && one < two);
    }

    #[test]
    fn test_degenerate_costs_are_finite() {
        let heuristic = AggregateCostHeuristic::default();
        let factory = DefaultCostFactory;
        let nan = heuristic.cost(&factory, f64::NAN, &calls(&[AggregateKind::Avg]));
        assert!(nan.is_finite());
        assert_eq!(nan.rows, 0.0);

        let many_avgs = calls(&[AggregateKind::Avg; 400]);
        let overflow = heuristic.cost(&factory, 1e10, &many_avgs);
        assert!(overflow.is_finite());
        assert_eq!(overflow, Cost { rows: f64::MAX, cpu: 0.0, io: 0.0 });
    }

    #[test]
    fn test_ordering_by_rows_first() {
        let cheap = DefaultCostFactory.make_cost(10.0, 500.0, 0.0);
        let expensive = DefaultCostFactory.make_cost(20.0, 0.0, 0.0);
        assert!(cheap < expensive);
        assert!(Cost::zero() < cheap);
    }
}
