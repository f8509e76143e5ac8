//! Per-prefix metadata reconciliation.
//!
//! A [`PrefixInfo`] holds, for one IP address or CIDR, the metadata each
//! resource contributes, kept separately per [`ResourceId`]. The effective
//! view of the prefix is derived from those contributions on demand:
//!
//! - labels are the union of every contribution, unless an identity
//!   override is present;
//! - source, tunnel peer and encryption key come from the highest-priority
//!   contribution that sets them;
//! - identity override conflicts are resolved by label content.
//!
//! # Locking
//!
//! `PrefixInfo` is not synchronized. The owner of the prefix map must hold
//! exclusive access across a whole merge/derive sequence; derived values are
//! recomputed on every call, so reading them under separate lock
//! acquisitions can observe different states. [`PrefixInfo::resolve`]
//! derives everything in one call.

mod conflicts;
mod info;

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::labels::Labels;
use crate::metadata::{EncryptKey, IpMetadata, MetadataKind, TunnelPeer};
use crate::resource::ResourceId;
use crate::source::{Source, SourcePriority};

pub use conflicts::{Conflict, DiagnosticSink, TracingSink};
pub use info::ResourceInfo;

/// Contributions from every resource for a single prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixInfo {
    resources: BTreeMap<ResourceId, ResourceInfo>,
}

/// Snapshot of a prefix's effective metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMetadata {
    /// Override labels if an override is present, otherwise the union of
    /// all contributed labels.
    pub labels: Labels,
    /// True if `labels` come from an identity override.
    pub identity_override: bool,
    /// Source of the highest-priority contribution.
    pub source: Source,
    /// Tunnel peer of the highest-priority resource that sets one.
    pub tunnel_peer: TunnelPeer,
    /// Encryption key of the highest-priority resource that sets one.
    pub encrypt_key: EncryptKey,
}

impl PrefixInfo {
    /// Creates an empty prefix entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `info` as `resource`'s contribution for its field, creating
    /// the resource's entry on first use. Like [`unmerge`](Self::unmerge),
    /// a merge that leaves the resource contributing nothing (a zero value
    /// over its last set field) drops the entry.
    pub fn merge(&mut self, resource: ResourceId, info: &IpMetadata, source: Source) {
        match self.resources.entry(resource) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().merge(info, source);
                if !entry.get().is_valid() {
                    entry.remove();
                }
            }
            Entry::Vacant(entry) => {
                let mut record = ResourceInfo::default();
                record.merge(info, source);
                if record.is_valid() {
                    entry.insert(record);
                }
            }
        }
    }

    /// Withdraws `resource`'s contribution for one field. The resource's
    /// entry is dropped once it no longer contributes anything.
    pub fn unmerge(&mut self, resource: &ResourceId, kind: MetadataKind) {
        let Some(info) = self.resources.get_mut(resource) else {
            tracing::debug!(resource = %resource, kind = %kind, "unmerge for unknown resource");
            return;
        };
        info.unmerge(kind);
        if !info.is_valid() {
            self.resources.remove(resource);
        }
    }

    /// Merges a payload that arrives without a static type.
    ///
    /// A payload that does not decode is a bug in the caller; it is logged
    /// and the prefix is left untouched.
    pub fn merge_encoded(&mut self, resource: ResourceId, raw: &serde_json::Value, source: Source) {
        match IpMetadata::decode(raw) {
            Ok(info) => self.merge(resource, &info, source),
            Err(e) => {
                tracing::error!(resource = %resource, error = %e, "BUG: invalid metadata passed to merge");
            }
        }
    }

    /// Unmerges a field named by its string tag. Unknown tags are logged as
    /// bugs and ignored.
    pub fn unmerge_named(&mut self, resource: &ResourceId, kind: &str) {
        match kind.parse::<MetadataKind>() {
            Ok(kind) => self.unmerge(resource, kind),
            Err(e) => {
                tracing::error!(resource = %resource, error = %e, "BUG: invalid metadata passed to unmerge");
            }
        }
    }

    /// Drops every contribution from `resource`. Returns true if there was
    /// one.
    pub fn remove_resource(&mut self, resource: &ResourceId) -> bool {
        self.resources.remove(resource).is_some()
    }

    /// Returns true if any resource still contributes something. Once this
    /// is false the owner may discard the prefix.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.resources.values().any(ResourceInfo::is_valid)
    }

    /// Returns true if `resource` has an entry for this prefix.
    #[must_use]
    pub fn contains(&self, resource: &ResourceId) -> bool {
        self.resources.contains_key(resource)
    }

    /// Number of resources with an entry for this prefix.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if no resource has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Returns a copy of `resource`'s contribution, if it has one.
    #[must_use]
    pub fn get(&self, resource: &ResourceId) -> Option<ResourceInfo> {
        self.resources.get(resource).cloned()
    }

    /// Resource IDs in ascending order.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceId> {
        self.resources.keys()
    }

    /// Resource IDs ordered by source priority, highest first. Resources of
    /// equal priority keep ascending ID order.
    #[must_use]
    pub fn sorted_resources<P>(&self, priority: &P) -> Vec<&ResourceId>
    where
        P: SourcePriority + ?Sized,
    {
        self.sorted(priority).into_iter().map(|(id, _)| id).collect()
    }

    fn sorted<P>(&self, priority: &P) -> Vec<(&ResourceId, &ResourceInfo)>
    where
        P: SourcePriority + ?Sized,
    {
        // BTreeMap iteration is already in ascending ID order; the stable
        // sort below keeps it among equal-priority sources.
        let mut entries: Vec<_> = self.resources.iter().collect();
        entries.sort_by(|(_, a), (_, b)| priority.compare(a.source, b.source));
        entries
    }

    /// Union of every resource's labels, applied in priority order, so a
    /// later (lower-priority) resource wins a shared key.
    #[must_use]
    pub fn labels<P>(&self, priority: &P) -> Labels
    where
        P: SourcePriority + ?Sized,
    {
        let mut labels = Labels::new();
        for (_, info) in self.sorted(priority) {
            labels.merge(&info.labels);
        }
        labels
    }

    /// Highest-priority source among all contributions, or
    /// [`Source::Unspec`] if there are none.
    #[must_use]
    pub fn source<P>(&self, priority: &P) -> Source
    where
        P: SourcePriority + ?Sized,
    {
        let mut src = Source::Unspec;
        for info in self.resources.values() {
            if priority.allow_overwrite(src, info.source) {
                src = info.source;
            }
        }
        src
    }

    /// Encryption key of the highest-priority resource that sets one.
    #[must_use]
    pub fn encrypt_key<P>(&self, priority: &P) -> EncryptKey
    where
        P: SourcePriority + ?Sized,
    {
        self.sorted(priority)
            .into_iter()
            .map(|(_, info)| info.encrypt_key)
            .find(EncryptKey::is_valid)
            .unwrap_or(EncryptKey::EMPTY)
    }

    /// Tunnel peer of the highest-priority resource that sets one.
    #[must_use]
    pub fn tunnel_peer<P>(&self, priority: &P) -> TunnelPeer
    where
        P: SourcePriority + ?Sized,
    {
        self.sorted(priority)
            .into_iter()
            .map(|(_, info)| info.tunnel_peer)
            .find(TunnelPeer::is_valid)
            .unwrap_or_default()
    }

    /// Labels of the identity override in effect, if any.
    ///
    /// Only resources that set the override flag *and* contribute labels
    /// are candidates. When several candidates disagree, the one whose
    /// [`Labels::sorted_list`] is byte-wise smallest wins. Source priority
    /// plays no part, so the winner does not move when unrelated fields
    /// change.
    ///
    /// Note that [`PrefixInfo::conflicts`] names the *priority-preferred*
    /// override as the incumbent, which can differ from the winner chosen
    /// here.
    #[must_use]
    pub fn identity_override(&self) -> Option<Labels> {
        self.resources
            .values()
            .filter(|info| info.identity_override && !info.labels.is_empty())
            .map(|info| (info.labels.sorted_list(), &info.labels))
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, labels)| labels.clone())
    }

    /// Derives the full effective view in one pass over the current state.
    #[must_use]
    pub fn resolve<P>(&self, priority: &P) -> ResolvedMetadata
    where
        P: SourcePriority + ?Sized,
    {
        let (labels, identity_override) = match self.identity_override() {
            Some(labels) => (labels, true),
            None => (self.labels(priority), false),
        };
        ResolvedMetadata {
            labels,
            identity_override,
            source: self.source(priority),
            tunnel_peer: self.tunnel_peer(priority),
            encrypt_key: self.encrypt_key(priority),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use serde_json::json;

    use super::*;
    use crate::source::PriorityTable;
    use crate::test_support::capture_events;

    fn labels(items: &[&str]) -> Labels {
        Labels::parse_all(items).unwrap()
    }

    fn peer(last: u8) -> TunnelPeer {
        TunnelPeer::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)))
    }

    fn with_sources(entries: &[(&str, Source)]) -> PrefixInfo {
        let mut prefix = PrefixInfo::new();
        for (id, src) in entries {
            prefix
                .resources
                .insert(ResourceId::from(*id), ResourceInfo { source: *src, ..ResourceInfo::default() });
        }
        prefix
    }

    #[test]
    fn test_sorted_by_resource_ids_and_source() {
        let prefix = with_sources(&[
            ("a-restored-uid", Source::Restored),
            ("node-uid", Source::CustomResource),
            ("node2-uid", Source::Local),
            ("daemon-uid", Source::Local),
            ("endpoints-uid", Source::KubeApiServer),
            ("identity-uid", Source::Kubernetes),
            ("generated-uid", Source::Generated),
        ]);

        let sorted: Vec<&str> = prefix
            .sorted_resources(&PriorityTable::default())
            .into_iter()
            .map(ResourceId::as_str)
            .collect();
        assert_eq!(
            sorted,
            vec![
                "endpoints-uid",
                "daemon-uid",
                "node2-uid",
                "node-uid",
                "identity-uid",
                "generated-uid",
                "a-restored-uid",
            ]
        );
    }

    #[test]
    fn test_empty_prefix() {
        let table = PriorityTable::default();
        let prefix = PrefixInfo::new();
        assert!(!prefix.is_valid());
        assert!(prefix.is_empty());
        assert_eq!(prefix.source(&table), Source::Unspec);
        assert_eq!(prefix.encrypt_key(&table), EncryptKey::EMPTY);
        assert!(!prefix.tunnel_peer(&table).is_valid());
        assert!(prefix.labels(&table).is_empty());
        assert_eq!(prefix.identity_override(), None);
    }

    #[test]
    fn test_unmerge_drops_empty_resource() {
        let mut prefix = PrefixInfo::new();
        let id = ResourceId::from("node-uid");
        prefix.merge(id.clone(), &IpMetadata::TunnelPeer(peer(1)), Source::CustomResource);
        prefix.merge(id.clone(), &IpMetadata::EncryptKey(EncryptKey::new(3)), Source::CustomResource);

        prefix.unmerge(&id, MetadataKind::TunnelPeer);
        assert!(prefix.contains(&id));
        assert!(prefix.is_valid());

        prefix.unmerge(&id, MetadataKind::EncryptKey);
        assert!(!prefix.contains(&id));
        assert!(!prefix.is_valid());
    }

    #[test]
    fn test_unmerge_unknown_resource_is_noop() {
        let mut prefix = PrefixInfo::new();
        prefix.merge("a".into(), &IpMetadata::EncryptKey(EncryptKey::new(1)), Source::Local);
        let before = prefix.clone();
        prefix.unmerge(&ResourceId::from("b"), MetadataKind::EncryptKey);
        assert_eq!(prefix, before);
    }

    #[test]
    fn test_source_picks_highest_priority() {
        let table = PriorityTable::default();
        let mut prefix = PrefixInfo::new();
        prefix.merge("r".into(), &IpMetadata::EncryptKey(EncryptKey::new(1)), Source::Restored);
        prefix.merge("k".into(), &IpMetadata::EncryptKey(EncryptKey::new(1)), Source::Kubernetes);
        prefix.merge("g".into(), &IpMetadata::EncryptKey(EncryptKey::new(1)), Source::Generated);
        assert_eq!(prefix.source(&table), Source::Kubernetes);
    }

    #[test]
    fn test_encrypt_key_and_tunnel_peer_follow_priority() {
        let table = PriorityTable::default();
        let mut prefix = PrefixInfo::new();
        prefix.merge("low".into(), &IpMetadata::EncryptKey(EncryptKey::new(5)), Source::Generated);
        prefix.merge("low".into(), &IpMetadata::TunnelPeer(peer(5)), Source::Generated);
        prefix.merge("high".into(), &IpMetadata::EncryptKey(EncryptKey::new(7)), Source::Local);
        prefix.merge("mid".into(), &IpMetadata::TunnelPeer(peer(6)), Source::CustomResource);

        assert_eq!(prefix.encrypt_key(&table), EncryptKey::new(7));
        assert_eq!(prefix.tunnel_peer(&table), peer(6));

        prefix.unmerge(&"high".into(), MetadataKind::EncryptKey);
        assert_eq!(prefix.encrypt_key(&table), EncryptKey::new(5));
    }

    #[test]
    fn test_labels_union_later_resource_wins_shared_key() {
        let table = PriorityTable::default();
        let mut prefix = PrefixInfo::new();
        prefix.merge("api".into(), &IpMetadata::Labels(labels(&["k8s:app=api", "k8s:x=1"])), Source::KubeApiServer);
        prefix.merge("gen".into(), &IpMetadata::Labels(labels(&["k8s:app=gen", "k8s:y=2"])), Source::Generated);

        let merged = prefix.labels(&table);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get("app").unwrap().value, "gen");
    }

    #[test]
    fn test_identity_override_requires_labels() {
        let mut prefix = PrefixInfo::new();
        prefix.merge("a".into(), &IpMetadata::OverrideIdentity(true), Source::Local);
        assert_eq!(prefix.identity_override(), None);
        assert!(prefix.is_valid());

        prefix.merge("a".into(), &IpMetadata::Labels(labels(&["reserved:host"])), Source::Local);
        assert_eq!(prefix.identity_override(), Some(labels(&["reserved:host"])));
    }

    #[test]
    fn test_identity_override_conflict_picks_smallest_content() {
        let mut prefix = PrefixInfo::new();
        // The higher-priority resource carries the larger label set.
        prefix.merge("a".into(), &IpMetadata::Labels(labels(&["k8s:z=1"])), Source::KubeApiServer);
        prefix.merge("a".into(), &IpMetadata::OverrideIdentity(true), Source::KubeApiServer);
        prefix.merge("b".into(), &IpMetadata::Labels(labels(&["k8s:a=1"])), Source::Restored);
        prefix.merge("b".into(), &IpMetadata::OverrideIdentity(true), Source::Restored);

        assert_eq!(prefix.identity_override(), Some(labels(&["k8s:a=1"])));
    }

    #[test]
    fn test_resolve_applies_override() {
        let table = PriorityTable::default();
        let mut prefix = PrefixInfo::new();
        prefix.merge("cidr".into(), &IpMetadata::Labels(labels(&["cidr:10.0.0.0/8"])), Source::Generated);
        prefix.merge("ep".into(), &IpMetadata::Labels(labels(&["k8s:app=web"])), Source::CustomResource);
        prefix.merge("ep".into(), &IpMetadata::OverrideIdentity(true), Source::CustomResource);
        prefix.merge("ep".into(), &IpMetadata::EncryptKey(EncryptKey::new(2)), Source::CustomResource);

        let resolved = prefix.resolve(&table);
        assert!(resolved.identity_override);
        assert_eq!(resolved.labels, labels(&["k8s:app=web"]));
        assert_eq!(resolved.source, Source::CustomResource);
        assert_eq!(resolved.encrypt_key, EncryptKey::new(2));
        assert!(!resolved.tunnel_peer.is_valid());

        prefix.unmerge(&"ep".into(), MetadataKind::OverrideIdentity);
        let resolved = prefix.resolve(&table);
        assert!(!resolved.identity_override);
        assert_eq!(resolved.labels.len(), 2);
    }

    #[test]
    fn test_merge_encoded() {
        let table = PriorityTable::default();
        let mut prefix = PrefixInfo::new();
        prefix.merge_encoded("a".into(), &json!({"kind": "encrypt_key", "value": 9}), Source::Local);
        assert_eq!(prefix.encrypt_key(&table), EncryptKey::new(9));

        let before = prefix.clone();
        prefix.merge_encoded("a".into(), &json!({"kind": "mtu", "value": 1500}), Source::Local);
        prefix.merge_encoded("b".into(), &json!({"kind": "encrypt_key", "value": -1}), Source::Local);
        assert_eq!(prefix, before);
    }

    #[test]
    fn test_unmerge_named() {
        let mut prefix = PrefixInfo::new();
        let id = ResourceId::from("a");
        prefix.merge(id.clone(), &IpMetadata::TunnelPeer(peer(1)), Source::Local);

        prefix.unmerge_named(&id, "tunnel");
        assert!(prefix.contains(&id));

        prefix.unmerge_named(&id, "tunnel_peer");
        assert!(!prefix.contains(&id));
    }

    #[test]
    fn test_encoded_defects_are_reported() {
        let mut prefix = PrefixInfo::new();
        prefix.merge("a".into(), &IpMetadata::EncryptKey(EncryptKey::new(1)), Source::Local);
        let before = prefix.clone();

        let events = capture_events(|| {
            prefix.merge_encoded("a".into(), &json!({"kind": "mtu", "value": 1500}), Source::Local);
            prefix.unmerge_named(&"a".into(), "mtu");
        });
        assert_eq!(prefix, before);

        let errors: Vec<_> = events.iter().filter(|e| e.level == tracing::Level::ERROR).collect();
        assert_eq!(errors.len(), 2, "{events:?}");
        assert_eq!(errors[0].message, "BUG: invalid metadata passed to merge");
        assert_eq!(errors[1].message, "BUG: invalid metadata passed to unmerge");
        assert!(errors.iter().all(|e| e.fields["resource"] == "a"));
        assert!(errors[0].fields["error"].contains("mtu"));

        let events = capture_events(|| prefix.unmerge_named(&"a".into(), "encrypt_key"));
        assert!(events.is_empty(), "{events:?}");
        assert!(!prefix.contains(&"a".into()));
    }

    #[test]
    fn test_merge_encoded_rejects_empty_label_key() {
        let table = PriorityTable::default();
        let mut prefix = PrefixInfo::new();
        prefix.merge("ep".into(), &IpMetadata::Labels(labels(&["k8s:app=web"])), Source::Local);
        let before = prefix.clone();

        let events = capture_events(|| {
            prefix.merge_encoded(
                "ep".into(),
                &json!({"kind": "labels", "value": {
                    "a": {"source": "k8s", "key": "app", "value": "db"},
                    "c": {"source": "k8s", "key": "", "value": "x"}
                }}),
                Source::Local,
            );
        });

        assert_eq!(prefix, before);
        assert_eq!(prefix.labels(&table), labels(&["k8s:app=web"]));
        assert_eq!(events.iter().filter(|e| e.level == tracing::Level::ERROR).count(), 1);
    }

    #[test]
    fn test_merge_zero_value_drops_entry() {
        let mut prefix = PrefixInfo::new();
        let id = ResourceId::from("node-uid");
        prefix.merge(id.clone(), &IpMetadata::EncryptKey(EncryptKey::new(3)), Source::CustomResource);
        assert!(prefix.contains(&id));

        prefix.merge(id.clone(), &IpMetadata::EncryptKey(EncryptKey::EMPTY), Source::CustomResource);
        assert!(!prefix.contains(&id));
        assert!(!prefix.is_valid());

        // A zero value never creates an entry either.
        prefix.merge(id.clone(), &IpMetadata::Labels(Labels::new()), Source::Local);
        prefix.merge(id.clone(), &IpMetadata::OverrideIdentity(false), Source::Local);
        assert!(prefix.is_empty());
    }

    #[test]
    fn test_get_returns_copy() {
        let mut prefix = PrefixInfo::new();
        let id = ResourceId::from("a");
        assert!(prefix.get(&id).is_none());

        prefix.merge(id.clone(), &IpMetadata::TunnelPeer(peer(2)), Source::Local);
        let record = prefix.get(&id).unwrap();
        assert_eq!(record.source(), Source::Local);
        assert_eq!(record.tunnel_peer(), peer(2));
        assert_eq!(record.encrypt_key(), EncryptKey::EMPTY);
    }

    #[test]
    fn test_remove_resource() {
        let mut prefix = PrefixInfo::new();
        prefix.merge("a".into(), &IpMetadata::OverrideIdentity(true), Source::Local);
        assert!(prefix.remove_resource(&"a".into()));
        assert!(!prefix.remove_resource(&"a".into()));
        assert!(prefix.is_empty());
    }

    #[test]
    fn test_resolved_metadata_serializes() {
        let table = PriorityTable::default();
        let mut prefix = PrefixInfo::new();
        prefix.merge("a".into(), &IpMetadata::TunnelPeer(peer(4)), Source::Local);
        let json = serde_json::to_value(prefix.resolve(&table)).unwrap();
        assert_eq!(json["source"], "local");
        assert_eq!(json["tunnel_peer"], "10.0.0.4");
        assert_eq!(json["encrypt_key"], 0);
        assert_eq!(json["identity_override"], false);
    }
}
