//! Source classes and source-priority evaluation.
//!
//! Every contribution to a prefix is tagged with the [`Source`] class of the
//! producer that wrote it. The class carries no data of its own; it only
//! matters when contributions compete, at which point a [`SourcePriority`]
//! decides which class is preferred.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Class of producer a piece of prefix metadata originates from.
///
/// # Examples
///
/// ```
/// use prefixinfo::Source;
///
/// let source: Source = "kube-apiserver".parse().unwrap();
/// assert_eq!(source, Source::KubeApiServer);
/// assert_eq!(Source::default(), Source::Unspec);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// The orchestrator API server itself.
    #[serde(rename = "kube-apiserver")]
    KubeApiServer,

    /// Generated by the local agent.
    Local,

    /// Read from a shared key/value store.
    #[serde(rename = "kvstore")]
    KvStore,

    /// Derived from a custom resource.
    CustomResource,

    /// Derived from standard orchestrator objects (cluster identity).
    #[serde(rename = "k8s")]
    Kubernetes,

    /// Learned from a peer cluster.
    #[serde(rename = "clustermesh")]
    ClusterMesh,

    /// Read from a local directory.
    Directory,

    /// Synthesized default when nothing better is known.
    Generated,

    /// Restored from a previous run's snapshot.
    Restored,

    /// No source recorded.
    #[default]
    Unspec,
}

impl Source {
    /// Every source class, in default priority order (highest first).
    pub const ALL: [Self; 10] = [
        Self::KubeApiServer,
        Self::Local,
        Self::KvStore,
        Self::CustomResource,
        Self::Kubernetes,
        Self::ClusterMesh,
        Self::Directory,
        Self::Generated,
        Self::Restored,
        Self::Unspec,
    ];

    /// Returns the canonical name of this source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::KubeApiServer => "kube-apiserver",
            Self::Local => "local",
            Self::KvStore => "kvstore",
            Self::CustomResource => "custom-resource",
            Self::Kubernetes => "k8s",
            Self::ClusterMesh => "clustermesh",
            Self::Directory => "directory",
            Self::Generated => "generated",
            Self::Restored => "restored",
            Self::Unspec => "unspec",
        }
    }

    /// Returns true if no source has been recorded.
    #[must_use]
    pub const fn is_unspec(&self) -> bool {
        matches!(self, Self::Unspec)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|src| src.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownSource {
                name: s.to_string(),
            })
    }
}

/// Source-priority oracle.
///
/// Implementations must describe a total preorder: every pair of sources is
/// comparable, and distinct sources may share a rank.
pub trait SourcePriority {
    /// Name of the priority model (for diagnostics).
    fn name(&self) -> &str;

    /// Returns true if `a` ranks at least as high as `b`.
    fn is_higher_or_equal(&self, a: Source, b: Source) -> bool;

    /// Returns true if a contribution from `new` may replace one from
    /// `existing`.
    fn allow_overwrite(&self, existing: Source, new: Source) -> bool {
        self.is_higher_or_equal(new, existing)
    }

    /// Orders sources highest priority first. Equal-rank sources compare
    /// `Equal`, so callers sorting with this must use a stable sort to keep a
    /// reproducible order.
    fn compare(&self, a: Source, b: Source) -> Ordering {
        match (self.is_higher_or_equal(a, b), self.is_higher_or_equal(b, a)) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, _) => Ordering::Greater,
        }
    }
}

/// Priority model backed by an explicit ordered list of sources.
///
/// - Sources earlier in the list rank higher.
/// - Sources missing from the list rank below every listed source.
/// - [`Source::Unspec`] always ranks lowest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityTable {
    order: Vec<Source>,
}

impl PriorityTable {
    /// Builds a table from an ordered list, highest priority first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyOrder`] for an empty list and
    /// [`ConfigError::DuplicateSource`] if a source appears twice.
    pub fn new(order: Vec<Source>) -> Result<Self, ConfigError> {
        if order.is_empty() {
            return Err(ConfigError::EmptyOrder);
        }
        for (i, src) in order.iter().enumerate() {
            if order[..i].contains(src) {
                return Err(ConfigError::DuplicateSource { duplicate: *src });
            }
        }
        Ok(Self { order })
    }

    /// Returns the configured order, highest priority first.
    #[must_use]
    pub fn order(&self) -> &[Source] {
        &self.order
    }

    /// Rank of a source; lower is better.
    fn rank(&self, source: Source) -> usize {
        if source.is_unspec() {
            return usize::MAX;
        }
        self.order
            .iter()
            .position(|s| *s == source)
            .unwrap_or(usize::MAX - 1)
    }
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self {
            order: Source::ALL.to_vec(),
        }
    }
}

impl SourcePriority for PriorityTable {
    fn name(&self) -> &str {
        "priority_table"
    }

    fn is_higher_or_equal(&self, a: Source, b: Source) -> bool {
        self.rank(a) <= self.rank(b)
    }
}
