//! Producer identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known kinds of resources that contribute prefix metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Workload endpoint.
    Endpoint,
    /// Cluster node.
    Node,
    /// The local agent itself.
    Daemon,
    /// Network policy object.
    Policy,
    /// Peer-cluster object.
    ClusterMesh,
    /// Entry restored from a snapshot.
    Restored,
}

impl ResourceKind {
    /// Returns the canonical name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Endpoint => "endpoint",
            Self::Node => "node",
            Self::Daemon => "daemon",
            Self::Policy => "policy",
            Self::ClusterMesh => "clustermesh",
            Self::Restored => "restored",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a single metadata producer.
///
/// Opaque to the reconciliation logic; only its lexicographic order matters,
/// and that order is the tie-break among producers of equal priority.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Builds `kind/namespace/name`.
    #[must_use]
    pub fn new(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        Self(format!("{kind}/{namespace}/{name}"))
    }

    /// The ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
