//! Error types for prefixinfo.
//!
//! Reconciliation itself is total: merging, unmerging and deriving the
//! effective view never fail. Errors only surface at the boundaries where
//! untyped input enters the crate (label text, encoded metadata payloads,
//! priority configuration).

use thiserror::Error;

use crate::source::Source;

/// Errors produced while parsing label text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    /// The label has no key.
    #[error("Label key cannot be empty")]
    EmptyKey,

    /// The label text could not be split into its parts.
    #[error("Malformed label '{input}': {reason}")]
    Malformed {
        /// Offending text.
        input: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Errors produced while decoding metadata handed over without a static type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    /// The payload names a field that does not exist.
    #[error("Unknown metadata kind '{kind}'")]
    UnknownKind {
        /// The unrecognized tag.
        kind: String,
    },

    /// The payload names a known field but its value does not decode.
    #[error("Failed to decode metadata: {message}")]
    Decode {
        /// Decoder message.
        message: String,
    },
}

/// Errors produced while loading source-priority configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The document is not valid JSON for a priority config.
    #[error("Failed to parse priority config: {message}")]
    Parse {
        /// Parser message.
        message: String,
    },

    /// The priority order lists no sources.
    #[error("Priority order must not be empty")]
    EmptyOrder,

    /// A source appears twice in the priority order.
    #[error("Source '{duplicate}' is listed more than once in the priority order")]
    DuplicateSource {
        /// The repeated source.
        duplicate: Source,
    },

    /// A source name is not recognized.
    #[error("Unknown source '{name}'")]
    UnknownSource {
        /// The unrecognized name.
        name: String,
    },
}

/// Top-level error type for prefixinfo.
#[derive(Debug, Error)]
pub enum PrefixInfoError {
    /// Label parsing failed.
    #[error("Label error: {0}")]
    Label(#[from] LabelError),

    /// Metadata decoding failed.
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Priority configuration was rejected.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl PrefixInfoError {
    /// Returns true if this is a label error.
    #[must_use]
    pub const fn is_label(&self) -> bool {
        matches!(self, Self::Label(_))
    }

    /// Returns true if this is a metadata decoding error.
    #[must_use]
    pub const fn is_metadata(&self) -> bool {
        matches!(self, Self::Metadata(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias for prefixinfo operations.
pub type PrefixInfoResult<T> = Result<T, PrefixInfoError>;
