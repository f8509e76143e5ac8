//! Individual metadata fields a resource may contribute to a prefix.
//!
//! Each field has a zero value meaning "no contribution". [`IpMetadata`]
//! carries one field's value and [`MetadataKind`] selects a field without a
//! value, which is all that is needed to withdraw a contribution.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MetadataError;
use crate::labels::Labels;

/// Tunnel endpoint through which a prefix is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TunnelPeer(Option<IpAddr>);

impl TunnelPeer {
    /// Creates a tunnel peer for the given address.
    #[must_use]
    pub const fn new(addr: IpAddr) -> Self {
        Self(Some(addr))
    }

    /// Returns true if an address is set.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    /// The peer address, if one is set.
    #[must_use]
    pub const fn addr(&self) -> Option<IpAddr> {
        self.0
    }
}

impl From<IpAddr> for TunnelPeer {
    fn from(addr: IpAddr) -> Self {
        Self::new(addr)
    }
}

impl fmt::Display for TunnelPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(addr) => write!(f, "{addr}"),
            None => Ok(()),
        }
    }
}

/// Index of the encryption key used for traffic to a prefix. Zero means
/// no key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptKey(u8);

impl EncryptKey {
    /// The "no key" sentinel.
    pub const EMPTY: Self = Self(0);

    /// Wraps a key index; `0` yields [`EncryptKey::EMPTY`].
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Returns true unless this is the sentinel.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 != Self::EMPTY.0
    }

    /// Raw key index.
    #[must_use]
    pub const fn index(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for EncryptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One field's worth of metadata, as contributed by a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IpMetadata {
    /// Labels describing the prefix.
    Labels(Labels),

    /// Treat the contributor's labels as the prefix's sole identity,
    /// ignoring labels from every other resource.
    OverrideIdentity(bool),

    /// Tunnel endpoint for the prefix.
    TunnelPeer(TunnelPeer),

    /// Encryption key index for the prefix.
    EncryptKey(EncryptKey),
}

impl IpMetadata {
    /// Returns the field this value belongs to.
    #[must_use]
    pub const fn kind(&self) -> MetadataKind {
        match self {
            Self::Labels(_) => MetadataKind::Labels,
            Self::OverrideIdentity(_) => MetadataKind::OverrideIdentity,
            Self::TunnelPeer(_) => MetadataKind::TunnelPeer,
            Self::EncryptKey(_) => MetadataKind::EncryptKey,
        }
    }

    /// Decodes an encoded payload of the form `{"kind": ..., "value": ...}`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::UnknownKind`] if `kind` names no field, and
    /// [`MetadataError::Decode`] for any other malformed payload.
    pub fn decode(raw: &serde_json::Value) -> Result<Self, MetadataError> {
        if let Some(kind) = raw.get("kind").and_then(serde_json::Value::as_str) {
            kind.parse::<MetadataKind>()?;
        }
        Self::deserialize(raw).map_err(|e| MetadataError::Decode {
            message: e.to_string(),
        })
    }
}

/// Selects one metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKind {
    /// The label set.
    Labels,
    /// The identity override flag.
    OverrideIdentity,
    /// The tunnel peer address.
    TunnelPeer,
    /// The encryption key index.
    EncryptKey,
}

impl MetadataKind {
    /// Every field, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Labels,
        Self::OverrideIdentity,
        Self::TunnelPeer,
        Self::EncryptKey,
    ];

    /// Tag used in encoded payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Labels => "labels",
            Self::OverrideIdentity => "override_identity",
            Self::TunnelPeer => "tunnel_peer",
            Self::EncryptKey => "encrypt_key",
        }
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataKind {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| MetadataError::UnknownKind { kind: s.to_string() })
    }
}

impl From<&IpMetadata> for MetadataKind {
    fn from(info: &IpMetadata) -> Self {
        info.kind()
    }
}
