//! # Planner Configuration
//!
//! Tuning knobs for aggregate planning. The struct deserializes with `#[serde(default)]`,
//! so a configuration document only needs to name the keys it overrides.

use crate::cost::AggregateCostHeuristic;
use crate::physical::GroupingStrategy;
use serde::{Deserialize, Serialize};

/// How partial rows travel from fragment aggregates to the coordinator aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeDistribution {
    /// Send every partial row to a single site.
    #[default]
    Gather,
    /// Re-partition partial rows on the group keys so each group lands on one site.
    /// Global aggregates (no group keys) always gather.
    HashOnGroupKeys,
}

/// Configuration for the aggregate rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Grouping strategy used by the distributed split rule.
    pub default_strategy: GroupingStrategy,
    /// Cost factor per AVG-like call in a logical aggregate.
    pub avg_cost_multiplier: f64,
    /// When false, aggregates over partitioned input are left for other rules.
    pub enable_distributed_split: bool,
    pub merge_distribution: MergeDistribution,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_strategy: GroupingStrategy::Hash,
            avg_cost_multiplier: AggregateCostHeuristic::default().avg_multiplier,
            enable_distributed_split: true,
            merge_distribution: MergeDistribution::Gather,
        }
    }
}

impl PlannerConfig {
    pub fn cost_heuristic(&self) -> AggregateCostHeuristic {
        AggregateCostHeuristic::new(self.avg_cost_multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.default_strategy, GroupingStrategy::Hash);
        assert_eq!(config.avg_cost_multiplier, 10.0);
        assert!(config.enable_distributed_split);
        assert_eq!(config.merge_distribution, MergeDistribution::Gather);
    }

    #[test]
    fn test_partial_document_overrides_named_keys() {
        let config: PlannerConfig = serde_json::from_str(
            r#"{ "default_strategy": "Serial", "merge_distribution": "hash_on_group_keys" }"#,
        )
        .unwrap();
        assert_eq!(config.default_strategy, GroupingStrategy::Serial);
        assert_eq!(config.merge_distribution, MergeDistribution::HashOnGroupKeys);
        assert_eq!(config.avg_cost_multiplier, 10.0);
        assert_eq!(config.cost_heuristic().avg_multiplier, 10.0);
    }
}
