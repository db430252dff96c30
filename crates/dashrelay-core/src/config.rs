//! Watcher configuration.
//!
//! Both the indicator element id and the `postMessage` target origin are
//! explicit. The defaults reproduce the dashboard templates: the indicator is
//! `#loadingSpinnerInvoker` and the parent is notified with a wildcard origin.
//!
//! Across the wasm boundary the configuration travels as camelCase JSON:
//!
//! ```
//! use dashrelay_core::config::WatcherConfig;
//!
//! let config = WatcherConfig::from_json(r#"{"targetOrigin":"https://lab.example"}"#).unwrap();
//! assert_eq!(config.target_element_id, "loadingSpinnerInvoker");
//! assert_eq!(config.target_origin, "https://lab.example");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Element id of the loading indicator in the dashboard templates.
pub const DEFAULT_TARGET_ELEMENT_ID: &str = "loadingSpinnerInvoker";

/// Wildcard `postMessage` origin: deliver regardless of the parent's origin.
pub const WILDCARD_ORIGIN: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct WatcherConfig {
    /// Id of the element whose inline `visibility` is observed.
    pub target_element_id: String,
    /// Target origin handed to `postMessage`.
    pub target_origin: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            target_element_id: DEFAULT_TARGET_ELEMENT_ID.to_string(),
            target_origin: WILDCARD_ORIGIN.to_string(),
        }
    }
}

impl WatcherConfig {
    #[must_use]
    pub fn with_target_element_id(mut self, id: impl Into<String>) -> Self {
        self.target_element_id = id.into();
        self
    }

    #[must_use]
    pub fn with_target_origin(mut self, origin: impl Into<String>) -> Self {
        self.target_origin = origin.into();
        self
    }

    /// Parse and validate a JSON configuration. Missing fields keep their
    /// defaults; unknown fields are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(RelayError::Config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_element_id.trim().is_empty() {
            return Err(RelayError::invalid_config("targetElementId is blank"));
        }
        if self.target_origin.trim().is_empty() {
            return Err(RelayError::invalid_config("targetOrigin is blank"));
        }
        Ok(())
    }

    /// True when messages go out without an origin restriction.
    #[must_use]
    pub fn is_wildcard_origin(&self) -> bool {
        self.target_origin == WILDCARD_ORIGIN
    }
}
