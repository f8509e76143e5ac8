//! Source-priority configuration.
//!
//! The priority between source classes is policy, not code: operators can
//! ship a JSON document naming the order, highest priority first.
//!
//! ```json
//! { "order": ["kube-apiserver", "local", "custom-resource", "k8s", "generated", "restored"] }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::source::{PriorityTable, Source};

/// Serializable description of a [`PriorityTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityConfig {
    /// Source classes, highest priority first.
    #[serde(default = "default_order")]
    pub order: Vec<Source>,
}

fn default_order() -> Vec<Source> {
    Source::ALL.to_vec()
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
        }
    }
}

impl PriorityConfig {
    /// Parses a config from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is not valid JSON or
    /// names an unknown source.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Checks the order without building a table.
    ///
    /// # Errors
    ///
    /// See [`PriorityTable::new`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        PriorityTable::new(self.order.clone()).map(|_| ())
    }

    /// Converts the config into a priority oracle.
    ///
    /// # Errors
    ///
    /// See [`PriorityTable::new`].
    pub fn into_table(self) -> Result<PriorityTable, ConfigError> {
        PriorityTable::new(self.order)
    }
}
