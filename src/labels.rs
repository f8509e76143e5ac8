//! Label sets attached to prefixes.
//!
//! A label is a `key=value` pair tagged with the source namespace it came
//! from (`k8s`, `reserved`, `cidr`, ...). A [`Labels`] set holds at most one
//! label per key.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::LabelError;

/// Label source used when the text form does not name one.
pub const SOURCE_UNSPEC: &str = "unspec";

/// A single label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    /// Namespace the label was taken from.
    pub source: String,
    /// Label key; never empty.
    pub key: String,
    /// Label value; may be empty.
    #[serde(default)]
    pub value: String,
}

impl Label {
    /// Creates a label.
    #[must_use]
    pub fn new(source: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parses `source:key=value`. The source and value parts are optional.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::EmptyKey`] if no key remains after stripping the
    /// source and value, and [`LabelError::Malformed`] for an empty source
    /// prefix such as `:key`.
    pub fn parse(input: &str) -> Result<Self, LabelError> {
        let input = input.trim();
        let (source, rest) = match input.split_once(':') {
            // A ':' after '=' belongs to the value.
            Some((src, rest)) if !src.contains('=') => {
                if src.is_empty() {
                    return Err(LabelError::Malformed {
                        input: input.to_string(),
                        reason: "empty source".to_string(),
                    });
                }
                (src, rest)
            }
            _ => (SOURCE_UNSPEC, input),
        };
        let (key, value) = rest.split_once('=').unwrap_or((rest, ""));
        if key.is_empty() {
            return Err(LabelError::EmptyKey);
        }
        Ok(Self::new(source, key, value))
    }

    fn write_canonical(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.source.as_bytes());
        out.push(b':');
        out.extend_from_slice(self.key.as_bytes());
        out.push(b'=');
        out.extend_from_slice(self.value.as_bytes());
        out.push(b';');
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}:{}", self.source, self.key)
        } else {
            write!(f, "{}:{}={}", self.source, self.key, self.value)
        }
    }
}

impl FromStr for Label {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A set of labels keyed by label key.
///
/// # Examples
///
/// ```
/// use prefixinfo::Labels;
///
/// let mut a = Labels::parse_all(["k8s:app=web"]).unwrap();
/// let b = Labels::parse_all(["reserved:world"]).unwrap();
/// a.merge(&b);
/// assert_eq!(a.len(), 2);
/// assert_eq!(a.sorted_list(), b"k8s:app=web;reserved:world=;".to_vec());
/// ```
///
/// Decoding accepts either the key-indexed map this type serializes to or a
/// plain list of labels. Either way the set is rebuilt from each label's own
/// `key`, so map keys that disagree with it are ignored, and a label with an
/// empty key is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, Label>);

impl Labels {
    /// Creates an empty label set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses every entry with [`Label::parse`].
    ///
    /// # Errors
    ///
    /// Returns the first parse failure.
    pub fn parse_all<I, S>(items: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        items
            .into_iter()
            .map(|s| Label::parse(s.as_ref()))
            .collect()
    }

    /// Adds a label, replacing any label with the same key.
    pub fn insert(&mut self, label: Label) {
        self.0.insert(label.key.clone(), label);
    }

    /// Union-merges `other` into `self`. Labels from `other` replace labels
    /// with the same key.
    pub fn merge(&mut self, other: &Self) {
        for (key, label) in &other.0 {
            self.0.insert(key.clone(), label.clone());
        }
    }

    /// Returns the label with the given key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Label> {
        self.0.get(key)
    }

    /// Returns true if a label with the given key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of labels in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set holds no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates labels in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.values()
    }

    /// Canonical serialization: labels sorted by key, each rendered as
    /// `source:key=value;`.
    ///
    /// Equal sets always produce equal forms, and byte-wise comparison gives
    /// a stable content-derived order. The format is not injective: a value
    /// containing `;` can render the same bytes as two separate labels.
    #[must_use]
    pub fn sorted_list(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() * 16);
        for label in self.0.values() {
            label.write_canonical(&mut out);
        }
        out
    }
}

impl FromIterator<Label> for Labels {
    fn from_iter<T: IntoIterator<Item = Label>>(iter: T) -> Self {
        let mut labels = Self::new();
        for label in iter {
            labels.insert(label);
        }
        labels
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelsRepr {
    Map(BTreeMap<String, Label>),
    List(Vec<Label>),
}

impl<'de> Deserialize<'de> for Labels {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let decoded: Vec<Label> = match LabelsRepr::deserialize(deserializer)? {
            LabelsRepr::Map(map) => map.into_values().collect(),
            LabelsRepr::List(list) => list,
        };
        if decoded.iter().any(|label| label.key.is_empty()) {
            return Err(serde::de::Error::custom(LabelError::EmptyKey));
        }
        Ok(decoded.into_iter().collect())
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.0.values().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{label}")?;
        }
        Ok(())
    }
}
