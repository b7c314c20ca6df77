// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Edges and data distribution descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// How records are routed from producer to consumer instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Distribution {
    /// Not constrained by the planner.
    Unknown,
    /// One-to-one forwarding between instances.
    Forward,
    /// Hash partitioned on the listed input field indices.
    #[serde(rename = "hash")]
    HashOn {
        /// Partition key field indices, in key order.
        keys: Vec<usize>,
    },
    /// Every record to every consumer instance.
    Broadcast,
    /// All records to a single consumer instance.
    Singleton,
}

impl Distribution {
    /// Hash distribution on `keys`.
    pub fn hash(keys: impl Into<Vec<usize>>) -> Self {
        Self::HashOn { keys: keys.into() }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Forward => f.write_str("forward"),
            Self::HashOn { keys } => {
                f.write_str("hash[")?;
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}")?;
                }
                f.write_str("]")
            }
            Self::Broadcast => f.write_str("broadcast"),
            Self::Singleton => f.write_str("single"),
        }
    }
}

/// Whether the consumer may start before the producer finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BufferingMode {
    /// Records stream through as produced.
    #[default]
    Pipelined,
    /// The producer's output is fully materialized first.
    Blocking,
}

/// Directed data connection between two nodes.
///
/// Among a target's incoming edges, list order is the input ordinal: the
/// first edge feeds input 0 (for a join, the left side).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Producing node id.
    pub source: NodeId,
    /// Consuming node id.
    pub target: NodeId,
    /// Routing between producer and consumer.
    pub distribution: Distribution,
    /// Added in 1.1.0; absent means pipelined.
    #[serde(default)]
    pub buffering_mode: BufferingMode,
}

impl Edge {
    /// Pipelined edge with the given distribution.
    pub fn new(source: NodeId, target: NodeId, distribution: Distribution) -> Self {
        Self {
            source,
            target,
            distribution,
            buffering_mode: BufferingMode::Pipelined,
        }
    }

    /// Pipelined forward edge.
    pub fn forward(source: NodeId, target: NodeId) -> Self {
        Self::new(source, target, Distribution::Forward)
    }

    /// Same edge with a different buffering mode.
    #[must_use]
    pub fn with_buffering(mut self, mode: BufferingMode) -> Self {
        self.buffering_mode = mode;
        self
    }
}
