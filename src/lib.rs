//! # prefixinfo - per-prefix metadata reconciliation
//!
//! An IP identity cache learns about a prefix (an address or CIDR) from many
//! independent resources at once: endpoints, nodes, policies, snapshots.
//! Each may contribute part of the picture. This crate keeps every
//! resource's contribution separate and derives a single, deterministic
//! effective view from them.
//!
//! ## Core Concepts
//!
//! - **ResourceId**: identifies the resource that contributed metadata
//! - **Source**: the class of that resource, ranked by a [`SourcePriority`]
//! - **IpMetadata**: one field of metadata (labels, identity override,
//!   tunnel peer, encryption key)
//! - **PrefixInfo**: all contributions for one prefix, plus the derived view
//!
//! ## Usage
//!
//! ```rust
//! use prefixinfo::{EncryptKey, IpMetadata, Labels, PrefixInfo, PriorityTable, Source};
//!
//! let priority = PriorityTable::default();
//! let mut prefix = PrefixInfo::new();
//!
//! let labels = Labels::parse_all(["k8s:app=web"]).unwrap();
//! prefix.merge("endpoint/default/web-0".into(), &IpMetadata::Labels(labels), Source::CustomResource);
//! prefix.merge("node/n1".into(), &IpMetadata::EncryptKey(EncryptKey::new(3)), Source::Local);
//!
//! let resolved = prefix.resolve(&priority);
//! assert_eq!(resolved.source, Source::Local);
//! assert_eq!(resolved.encrypt_key, EncryptKey::new(3));
//! assert!(!resolved.identity_override);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod labels;
pub mod metadata;
pub mod prefix;
pub mod resource;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export primary types at crate root for convenience
pub use config::PriorityConfig;
pub use error::{ConfigError, LabelError, MetadataError, PrefixInfoError, PrefixInfoResult};
pub use labels::{Label, Labels};
pub use metadata::{EncryptKey, IpMetadata, MetadataKind, TunnelPeer};
pub use prefix::{Conflict, DiagnosticSink, PrefixInfo, ResolvedMetadata, ResourceInfo, TracingSink};
pub use resource::{ResourceId, ResourceKind};
pub use source::{PriorityTable, Source, SourcePriority};
