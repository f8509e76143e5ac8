//! Detection and reporting of disagreeing contributions.
//!
//! Conflicts are not errors: every accessor on [`PrefixInfo`] resolves them
//! deterministically. They are reported so that operators can find the
//! resources that disagree.

use std::fmt;

use serde::Serialize;

use super::PrefixInfo;
use crate::labels::Labels;
use crate::metadata::{EncryptKey, TunnelPeer};
use crate::resource::ResourceId;
use crate::source::SourcePriority;

/// A disagreement between resources contributing to the same prefix.
///
/// `resource` is always the incumbent: the first resource in priority
/// order that set the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conflict {
    /// Two resources request different identity overrides.
    IdentityOverride {
        /// Incumbent resource.
        resource: ResourceId,
        /// Override labels of the incumbent.
        identity: Labels,
        /// Resource that disagrees with the incumbent.
        conflicting_resource: ResourceId,
        /// Override labels it requests.
        conflicting_identity: Labels,
    },

    /// A resource requests an identity override without any labels; the
    /// prefix keeps the aggregated labels.
    OverrideWithoutLabels {
        /// Resource carrying the bare override flag.
        resource: ResourceId,
        /// Aggregated labels used instead.
        fallback_identity: Labels,
    },

    /// Two resources name different tunnel peers.
    TunnelPeer {
        /// Incumbent resource.
        resource: ResourceId,
        /// Peer of the incumbent.
        tunnel_peer: TunnelPeer,
        /// Resource that disagrees with the incumbent.
        conflicting_resource: ResourceId,
        /// Peer it names.
        conflicting_tunnel_peer: TunnelPeer,
    },

    /// Two resources name different encryption keys.
    EncryptKey {
        /// Incumbent resource.
        resource: ResourceId,
        /// Key of the incumbent.
        key: EncryptKey,
        /// Resource that disagrees with the incumbent.
        conflicting_resource: ResourceId,
        /// Key it names.
        conflicting_key: EncryptKey,
    },
}

impl Conflict {
    /// Operator-facing description of the conflict class.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::IdentityOverride { .. } => {
                "Detected conflicting identity override for prefix. \
                 This may cause connectivity issues for this address."
            }
            Self::OverrideWithoutLabels { .. } => {
                "Detected identity override, but no labels were specified. \
                 Falling back on the old non-override labels. \
                 This may cause connectivity issues for this address."
            }
            Self::TunnelPeer { .. } => {
                "Detected conflicting tunnel peer for prefix. \
                 This may cause connectivity issues for this address."
            }
            Self::EncryptKey { .. } => {
                "Detected conflicting encryption key index for prefix. \
                 This may cause connectivity issues for this address."
            }
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentityOverride {
                resource,
                identity,
                conflicting_resource,
                conflicting_identity,
            } => write!(
                f,
                "identity_override({resource}: [{identity}] vs {conflicting_resource}: [{conflicting_identity}])"
            ),
            Self::OverrideWithoutLabels {
                resource,
                fallback_identity,
            } => write!(f, "override_without_labels({resource}, fallback [{fallback_identity}])"),
            Self::TunnelPeer {
                resource,
                tunnel_peer,
                conflicting_resource,
                conflicting_tunnel_peer,
            } => write!(
                f,
                "tunnel_peer({resource}: {tunnel_peer} vs {conflicting_resource}: {conflicting_tunnel_peer})"
            ),
            Self::EncryptKey {
                resource,
                key,
                conflicting_resource,
                conflicting_key,
            } => write!(
                f,
                "encrypt_key({resource}: {key} vs {conflicting_resource}: {conflicting_key})"
            ),
        }
    }
}

/// Receiver for conflict warnings.
pub trait DiagnosticSink {
    /// Records one conflict.
    fn warn(&mut self, conflict: &Conflict);
}

impl DiagnosticSink for Vec<Conflict> {
    fn warn(&mut self, conflict: &Conflict) {
        self.push(conflict.clone());
    }
}

/// Sink that emits each conflict as a structured `tracing` warning, scoped
/// to the prefix it was found on.
#[derive(Debug, Clone)]
pub struct TracingSink {
    prefix: String,
}

impl TracingSink {
    /// Creates a sink whose events carry `prefix` as a field.
    #[must_use]
    pub fn new(prefix: impl fmt::Display) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }
}

impl DiagnosticSink for TracingSink {
    fn warn(&mut self, conflict: &Conflict) {
        let message = conflict.message();
        match conflict {
            Conflict::IdentityOverride {
                resource,
                identity,
                conflicting_resource,
                conflicting_identity,
            } => tracing::warn!(
                prefix = %self.prefix,
                identity = %identity,
                resource = %resource,
                conflicting_identity = %conflicting_identity,
                conflicting_resource = %conflicting_resource,
                "{message}"
            ),
            Conflict::OverrideWithoutLabels {
                resource,
                fallback_identity,
            } => tracing::warn!(
                prefix = %self.prefix,
                resource = %resource,
                old_identity = %fallback_identity,
                "{message}"
            ),
            Conflict::TunnelPeer {
                resource,
                tunnel_peer,
                conflicting_resource,
                conflicting_tunnel_peer,
            } => tracing::warn!(
                prefix = %self.prefix,
                tunnel_peer = %tunnel_peer,
                resource = %resource,
                conflicting_tunnel_peer = %conflicting_tunnel_peer,
                conflicting_resource = %conflicting_resource,
                "{message}"
            ),
            Conflict::EncryptKey {
                resource,
                key,
                conflicting_resource,
                conflicting_key,
            } => tracing::warn!(
                prefix = %self.prefix,
                key = %key,
                resource = %resource,
                conflicting_key = %conflicting_key,
                conflicting_resource = %conflicting_resource,
                "{message}"
            ),
        }
    }
}

impl PrefixInfo {
    /// Lists every disagreement between resources, walking them in priority
    /// order.
    ///
    /// For each of identity override, tunnel peer and encryption key, the
    /// first resource that sets the field is the incumbent, and every later
    /// resource setting a *different* value yields one conflict. Override
    /// requests without labels yield an [`Conflict::OverrideWithoutLabels`]
    /// each.
    ///
    /// The incumbent override is chosen by priority, whereas
    /// [`PrefixInfo::identity_override`] picks its winner by label content.
    /// The resource named as incumbent is therefore not necessarily the one
    /// whose override is in effect.
    #[must_use]
    pub fn conflicts<P>(&self, priority: &P) -> Vec<Conflict>
    where
        P: SourcePriority + ?Sized,
    {
        let mut found = Vec::new();
        let mut fallback: Option<Labels> = None;

        let mut identity: Option<(&ResourceId, &Labels)> = None;
        let mut tunnel_peer: Option<(&ResourceId, TunnelPeer)> = None;
        let mut encrypt_key: Option<(&ResourceId, EncryptKey)> = None;

        for (resource, info) in self.sorted(priority) {
            if info.identity_override {
                if info.labels.is_empty() {
                    let fallback_identity = fallback
                        .get_or_insert_with(|| self.labels(priority))
                        .clone();
                    found.push(Conflict::OverrideWithoutLabels {
                        resource: resource.clone(),
                        fallback_identity,
                    });
                } else {
                    match identity {
                        Some((incumbent, labels)) if *labels != info.labels => {
                            found.push(Conflict::IdentityOverride {
                                resource: incumbent.clone(),
                                identity: labels.clone(),
                                conflicting_resource: resource.clone(),
                                conflicting_identity: info.labels.clone(),
                            });
                        }
                        Some(_) => {}
                        None => identity = Some((resource, &info.labels)),
                    }
                }
            }

            if info.tunnel_peer.is_valid() {
                match tunnel_peer {
                    Some((incumbent, peer)) if peer != info.tunnel_peer => {
                        found.push(Conflict::TunnelPeer {
                            resource: incumbent.clone(),
                            tunnel_peer: peer,
                            conflicting_resource: resource.clone(),
                            conflicting_tunnel_peer: info.tunnel_peer,
                        });
                    }
                    Some(_) => {}
                    None => tunnel_peer = Some((resource, info.tunnel_peer)),
                }
            }

            if info.encrypt_key.is_valid() {
                match encrypt_key {
                    Some((incumbent, key)) if key != info.encrypt_key => {
                        found.push(Conflict::EncryptKey {
                            resource: incumbent.clone(),
                            key,
                            conflicting_resource: resource.clone(),
                            conflicting_key: info.encrypt_key,
                        });
                    }
                    Some(_) => {}
                    None => encrypt_key = Some((resource, info.encrypt_key)),
                }
            }
        }

        found
    }

    /// Reports every conflict from [`PrefixInfo::conflicts`] to `sink`.
    /// Returns the number of conflicts reported.
    pub fn log_conflicts<P, S>(&self, priority: &P, sink: &mut S) -> usize
    where
        P: SourcePriority + ?Sized,
        S: DiagnosticSink + ?Sized,
    {
        let conflicts = self.conflicts(priority);
        for conflict in &conflicts {
            sink.warn(conflict);
        }
        conflicts.len()
    }
}
