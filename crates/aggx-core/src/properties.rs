//! # Distribution Properties
//!
//! A relational node's distribution describes how its output rows are spread across the
//! execution units of the cluster. The aggregate planner only needs one question answered
//! about it: *across how many partitions is the input spread?* A single-partition input
//! can be aggregated in one step; a partitioned input needs a fragment aggregate per
//! partition and a coordinator aggregate after an exchange.
//!
//! ## Distributions
//!
//! - **Single**: all rows at one site (the coordinator, or an unpartitioned table).
//! - **Hash**: rows partitioned by a hash of the given column positions.
//! - **RoundRobin**: rows spread evenly with no locality guarantee.
//! - **Broadcast**: every partition holds a full copy. Aggregating any one copy gives the
//!   complete answer, so the aggregate planner treats it like a single site.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data distribution of a relational node's output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distribution {
    #[default]
    Single,
    Hash { keys: Vec<usize>, partitions: u32 },
    RoundRobin { partitions: u32 },
    Broadcast { partitions: u32 },
}

impl Distribution {
    /// Number of execution units holding a *distinct* slice of the rows.
    pub fn partition_count(&self) -> u32 {
        match self {
            Distribution::Single | Distribution::Broadcast { .. } => 1,
            Distribution::Hash { partitions, .. } | Distribution::RoundRobin { partitions } => {
                (*partitions).max(1)
            }
        }
    }

    pub fn is_partitioned(&self) -> bool {
        self.partition_count() > 1
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Single => f.write_str("single"),
            Distribution::Hash { keys, partitions } => {
                write!(f, "hash[")?;
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "${}", k)?;
                }
                write!(f, "]x{}", partitions)
            }
            Distribution::RoundRobin { partitions } => write!(f, "round_robin x{}", partitions),
            Distribution::Broadcast { partitions } => write!(f, "broadcast x{}", partitions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_count() {
        assert_eq!(Distribution::Single.partition_count(), 1);
        assert_eq!(Distribution::Broadcast { partitions: 8 }.partition_count(), 1);
        assert_eq!(
            Distribution::Hash { keys: vec![0], partitions: 4 }.partition_count(),
            4
        );
        assert_eq!(Distribution::RoundRobin { partitions: 0 }.partition_count(), 1);
        assert!(!Distribution::RoundRobin { partitions: 1 }.is_partitioned());
    }
}
