//! Loading-state derivation and the outbound message shape.
//!
//! The indicator's inline `visibility` maps onto a single boolean:
//! `"hidden"` means idle, every other value (including empty or unset) means
//! loading. The comparison is exact; no trimming or case folding is applied,
//! matching how the dashboards write the property.

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// The one `visibility` value that means "not loading".
pub const HIDDEN: &str = "hidden";

/// Value written by the loader toggle when loading starts.
pub const VISIBLE: &str = "visible";

/// Derived loading state, serialized as `{"isLoading": <bool>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoadingState {
    pub is_loading: bool,
}

impl LoadingState {
    pub const LOADING: Self = Self { is_loading: true };
    pub const IDLE: Self = Self { is_loading: false };

    /// Derive the state from an inline `visibility` value (`None` = unset).
    #[must_use]
    pub fn from_visibility(visibility: Option<&str>) -> Self {
        Self {
            is_loading: visibility != Some(HIDDEN),
        }
    }

    /// The `visibility` value a host writes to display this state.
    #[must_use]
    pub fn visibility_value(self) -> &'static str {
        if self.is_loading { VISIBLE } else { HIDDEN }
    }

    /// Serialize to the JSON text posted to the parent context.
    #[must_use]
    pub fn to_message(self) -> String {
        serde_json::to_string(&self)
            .unwrap_or_else(|_| format!("{{\"isLoading\":{}}}", self.is_loading))
    }

    /// Parse a message produced by [`LoadingState::to_message`]. Extra fields
    /// are rejected.
    pub fn from_message(message: &str) -> Result<Self> {
        serde_json::from_str(message).map_err(RelayError::Message)
    }
}

impl From<bool> for LoadingState {
    fn from(is_loading: bool) -> Self {
        Self { is_loading }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn derivation_table() {
        assert_eq!(LoadingState::from_visibility(Some("hidden")), LoadingState::IDLE);
        assert_eq!(LoadingState::from_visibility(Some("")), LoadingState::LOADING);
        assert_eq!(LoadingState::from_visibility(Some("visible")), LoadingState::LOADING);
        assert_eq!(LoadingState::from_visibility(None), LoadingState::LOADING);
    }

    #[test]
    fn comparison_is_exact() {
        assert!(LoadingState::from_visibility(Some("Hidden")).is_loading);
        assert!(LoadingState::from_visibility(Some(" hidden")).is_loading);
        assert!(LoadingState::from_visibility(Some("collapse")).is_loading);
    }

    #[test]
    fn message_text() {
        assert_eq!(LoadingState::LOADING.to_message(), r#"{"isLoading":true}"#);
        assert_eq!(LoadingState::IDLE.to_message(), r#"{"isLoading":false}"#);
    }

    #[test]
    fn message_has_exactly_one_field() {
        let value: serde_json::Value =
            serde_json::from_str(&LoadingState::LOADING.to_message()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object["isLoading"], serde_json::Value::Bool(true));
    }

    #[test]
    fn from_message_rejects_extra_fields() {
        let err = LoadingState::from_message(r#"{"isLoading":true,"at":1}"#).unwrap_err();
        assert!(matches!(err, RelayError::Message(_)));
        assert_eq!(
            LoadingState::from_message(r#"{"isLoading":false}"#).unwrap(),
            LoadingState::IDLE
        );
    }

    #[test]
    fn visibility_value_inverts_derivation() {
        for state in [LoadingState::LOADING, LoadingState::IDLE] {
            assert_eq!(
                LoadingState::from_visibility(Some(state.visibility_value())),
                state
            );
        }
    }

    proptest! {
        #[test]
        fn only_hidden_means_idle(value in ".*") {
            let state = LoadingState::from_visibility(Some(&value));
            prop_assert_eq!(state.is_loading, value != "hidden");
        }
    }
}
