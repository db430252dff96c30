//! Mutation records as delivered by an attribute observer.

use std::fmt;
use std::str::FromStr;

use crate::error::RelayError;

/// Attribute name whose changes carry the loading indicator's state.
pub const STYLE_ATTRIBUTE: &str = "style";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Attributes,
    ChildList,
    CharacterData,
}

impl MutationKind {
    /// The DOM `MutationRecord.type` string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attributes => "attributes",
            Self::ChildList => "childList",
            Self::CharacterData => "characterData",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationKind {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attributes" => Ok(Self::Attributes),
            "childList" => Ok(Self::ChildList),
            "characterData" => Ok(Self::CharacterData),
            other => Err(RelayError::UnknownMutationKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// One reported change on an observed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    /// Local name of the changed attribute; `None` for non-attribute records.
    pub attribute_name: Option<String>,
}

impl MutationRecord {
    #[must_use]
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::Attributes,
            attribute_name: Some(name.into()),
        }
    }

    #[must_use]
    pub fn style() -> Self {
        Self::attribute(STYLE_ATTRIBUTE)
    }

    #[must_use]
    pub fn child_list() -> Self {
        Self {
            kind: MutationKind::ChildList,
            attribute_name: None,
        }
    }

    #[must_use]
    pub fn character_data() -> Self {
        Self {
            kind: MutationKind::CharacterData,
            attribute_name: None,
        }
    }

    /// True only for an attribute mutation of exactly `style`.
    #[must_use]
    pub fn is_style_change(&self) -> bool {
        self.kind == MutationKind::Attributes
            && self.attribute_name.as_deref() == Some(STYLE_ATTRIBUTE)
    }
}
