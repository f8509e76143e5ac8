//! Metadata contributed by a single resource.

use crate::labels::Labels;
use crate::metadata::{EncryptKey, IpMetadata, MetadataKind, TunnelPeer};
use crate::source::Source;

/// Everything one resource currently asserts about a prefix.
///
/// Every field has a zero value meaning "no contribution", and fields are set
/// and cleared independently of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceInfo {
    pub(crate) labels: Labels,
    pub(crate) source: Source,
    pub(crate) identity_override: bool,
    pub(crate) tunnel_peer: TunnelPeer,
    pub(crate) encrypt_key: EncryptKey,
}

impl ResourceInfo {
    /// Overwrites the field `info` belongs to and records `source` as the
    /// last writer.
    pub fn merge(&mut self, info: &IpMetadata, source: Source) {
        match info {
            IpMetadata::Labels(labels) => self.labels = labels.clone(),
            IpMetadata::OverrideIdentity(flag) => self.identity_override = *flag,
            IpMetadata::TunnelPeer(peer) => self.tunnel_peer = *peer,
            IpMetadata::EncryptKey(key) => self.encrypt_key = *key,
        }
        self.source = source;
    }

    /// Resets the selected field to its zero value. The recorded source is
    /// left alone.
    pub fn unmerge(&mut self, kind: MetadataKind) {
        match kind {
            MetadataKind::Labels => self.labels = Labels::new(),
            MetadataKind::OverrideIdentity => self.identity_override = false,
            MetadataKind::TunnelPeer => self.tunnel_peer = TunnelPeer::default(),
            MetadataKind::EncryptKey => self.encrypt_key = EncryptKey::EMPTY,
        }
    }

    /// Returns true if any field holds a contribution.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.labels.is_empty()
            || self.identity_override
            || self.tunnel_peer.is_valid()
            || self.encrypt_key.is_valid()
    }

    /// Labels contributed by this resource.
    #[must_use]
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Source of the most recent merge.
    #[must_use]
    pub const fn source(&self) -> Source {
        self.source
    }

    /// True if this resource asks for an identity override.
    #[must_use]
    pub const fn identity_override(&self) -> bool {
        self.identity_override
    }

    /// Tunnel peer contributed by this resource.
    #[must_use]
    pub const fn tunnel_peer(&self) -> TunnelPeer {
        self.tunnel_peer
    }

    /// Encryption key contributed by this resource.
    #[must_use]
    pub const fn encrypt_key(&self) -> EncryptKey {
        self.encrypt_key
    }
}
